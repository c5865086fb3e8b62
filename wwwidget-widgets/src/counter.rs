// wwwidget-widgets/src/counter.rs
use serde::Deserialize;
use std::time::Duration;
use wwwidget_core::{
    Cadence, ConstructionError, FromSection, Geometry, OutputBatch, SectionConfig, Worker,
    WorkerContext, WorkerError,
};

#[derive(Debug, Deserialize)]
struct CounterSettings {
    #[serde(default = "default_label")]
    label: String,
    #[serde(default = "default_interval_ms")]
    interval_ms: u64,
}

fn default_label() -> String {
    "Counter".to_string()
}

fn default_interval_ms() -> u64 {
    100
}

/// Counts up once per interval. Handy to see the refresh pipeline work.
pub struct CounterWorker {
    geometry: Geometry,
    label: String,
    interval: Duration,
    count: u64,
}

impl FromSection for CounterWorker {
    fn from_section(section: &SectionConfig) -> Result<Self, ConstructionError> {
        let geometry = section.geometry()?;
        let settings: CounterSettings = section.settings()?;
        if settings.interval_ms == 0 {
            return Err(ConstructionError::field(
                section,
                "interval_ms",
                "must be at least 1",
            ));
        }

        Ok(Self {
            geometry,
            label: settings.label,
            interval: Duration::from_millis(settings.interval_ms),
            count: 0,
        })
    }
}

impl Worker for CounterWorker {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn produce(&mut self, _ctx: &WorkerContext) -> Result<OutputBatch, WorkerError> {
        self.count += 1;
        let mut batch = OutputBatch::new();
        batch
            .write_text(0, 0, "Counter")
            .write_text(1, 0, self.count.to_string());
        Ok(batch)
    }

    fn cadence(&self) -> Cadence {
        Cadence::Every(self.interval)
    }
}
