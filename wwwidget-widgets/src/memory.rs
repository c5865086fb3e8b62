// wwwidget-widgets/src/memory.rs
use serde::Deserialize;
use std::time::Duration;
use sysinfo::System;
use wwwidget_core::{
    Cadence, ConstructionError, FromSection, Geometry, OutputBatch, SectionConfig, Worker,
    WorkerContext, WorkerError,
};

use crate::common::{format_bytes, format_percentage, usage_percent, usage_style};

/// Memory and swap usage at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMetrics {
    /// Currently used memory in bytes
    pub used: u64,
    /// Total available memory in bytes
    pub total: u64,
    /// Currently used swap in bytes
    pub swap_used: u64,
    /// Total available swap in bytes
    pub swap_total: u64,
}

impl MemoryMetrics {
    /// Two lines per resource: usage figures, then the percentage. Lines are
    /// styled by how full the resource is; swap is omitted when there is none.
    pub fn to_batch(&self) -> OutputBatch {
        let mut batch = OutputBatch::new();
        let mut row = 0;
        let mut line = |batch: &mut OutputBatch, name: &str, used: u64, total: u64| {
            let percent = usage_percent(used, total);
            let style = usage_style(percent);
            batch
                .write_styled(
                    row,
                    0,
                    format!("{} {} / {}", name, format_bytes(used), format_bytes(total)),
                    style,
                )
                .write_styled(row + 1, 0, format_percentage(percent), style);
            row += 2;
        };

        line(&mut batch, "Mem", self.used, self.total);
        if self.swap_total > 0 {
            line(&mut batch, "Swp", self.swap_used, self.swap_total);
        }
        batch
    }
}

#[derive(Debug, Deserialize)]
struct MemorySettings {
    #[serde(default = "default_label")]
    label: String,
    #[serde(default = "default_refresh_secs")]
    refresh_secs: u64,
}

fn default_label() -> String {
    "Memory".to_string()
}

fn default_refresh_secs() -> u64 {
    2
}

/// System memory and swap usage
pub struct MemoryWorker {
    geometry: Geometry,
    label: String,
    refresh: Duration,
    system: System,
}

impl FromSection for MemoryWorker {
    fn from_section(section: &SectionConfig) -> Result<Self, ConstructionError> {
        let geometry = section.geometry()?;
        let settings: MemorySettings = section.settings()?;
        if settings.refresh_secs == 0 {
            return Err(ConstructionError::field(
                section,
                "refresh_secs",
                "must be at least 1",
            ));
        }

        Ok(Self {
            geometry,
            label: settings.label,
            refresh: Duration::from_secs(settings.refresh_secs),
            system: System::new(),
        })
    }
}

impl MemoryWorker {
    /// Poll system for current memory information
    fn poll(&mut self) -> MemoryMetrics {
        self.system.refresh_memory();
        MemoryMetrics {
            used: self.system.used_memory(),
            total: self.system.total_memory(),
            swap_used: self.system.used_swap(),
            swap_total: self.system.total_swap(),
        }
    }
}

impl Worker for MemoryWorker {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn produce(&mut self, _ctx: &WorkerContext) -> Result<OutputBatch, WorkerError> {
        Ok(self.poll().to_batch())
    }

    fn cadence(&self) -> Cadence {
        Cadence::Every(self.refresh)
    }
}
