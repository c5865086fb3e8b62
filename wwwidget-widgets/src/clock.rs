// wwwidget-widgets/src/clock.rs
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::fmt::Display;
use std::time::Duration;
use wwwidget_core::{
    Cadence, ConstructionError, FromSection, Geometry, OutputBatch, SectionConfig, Style, Worker,
    WorkerContext, WorkerError,
};

#[derive(Debug, Deserialize)]
struct ClockSettings {
    #[serde(default = "default_label")]
    label: String,
    #[serde(default = "default_time_format")]
    time_format: String,
    #[serde(default = "default_date_format")]
    date_format: String,
    #[serde(default)]
    destination_timezone: Option<String>,
    #[serde(default)]
    utc_offset_minutes: Option<i32>,
    #[serde(default = "default_refresh_secs")]
    refresh_secs: u64,
}

fn default_label() -> String {
    "Clock".to_string()
}

fn default_time_format() -> String {
    "%H:%M:%S".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_refresh_secs() -> u64 {
    1
}

fn is_valid_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Where the clock reads its time
#[derive(Debug, Clone, Copy, PartialEq)]
enum Zone {
    Local,
    Fixed(FixedOffset),
    Named(Tz),
}

/// Time of day in bold, date below it.
///
/// Uses the local time zone unless `destination_timezone` names an IANA
/// zone or `utc_offset_minutes` pins a fixed offset.
pub struct ClockWorker {
    geometry: Geometry,
    label: String,
    time_format: String,
    date_format: String,
    zone: Zone,
    refresh: Duration,
}

impl FromSection for ClockWorker {
    fn from_section(section: &SectionConfig) -> Result<Self, ConstructionError> {
        let geometry = section.geometry()?;
        let settings: ClockSettings = section.settings()?;

        if !is_valid_format(&settings.time_format) {
            return Err(ConstructionError::field(
                section,
                "time_format",
                format!("'{}' is not a valid strftime format", settings.time_format),
            ));
        }
        if !is_valid_format(&settings.date_format) {
            return Err(ConstructionError::field(
                section,
                "date_format",
                format!("'{}' is not a valid strftime format", settings.date_format),
            ));
        }
        let zone = match (&settings.destination_timezone, settings.utc_offset_minutes) {
            (Some(_), Some(_)) => {
                return Err(ConstructionError::field(
                    section,
                    "destination_timezone",
                    "cannot be combined with utc_offset_minutes",
                ));
            }
            (Some(name), None) => Zone::Named(name.parse::<Tz>().map_err(|_| {
                ConstructionError::field(
                    section,
                    "destination_timezone",
                    format!("'{}' is not a known time zone", name),
                )
            })?),
            (None, Some(minutes)) => Zone::Fixed(
                minutes
                    .checked_mul(60)
                    .and_then(FixedOffset::east_opt)
                    .ok_or_else(|| {
                        ConstructionError::field(
                            section,
                            "utc_offset_minutes",
                            "must be within one day",
                        )
                    })?,
            ),
            (None, None) => Zone::Local,
        };
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
            time_format: settings.time_format,
            date_format: settings.date_format,
            zone,
            refresh: Duration::from_secs(settings.refresh_secs),
        })
    }
}

impl ClockWorker {
    fn render(&self, now: DateTime<Utc>) -> OutputBatch {
        match self.zone {
            Zone::Local => self.render_at(&now.with_timezone(&Local)),
            Zone::Fixed(offset) => self.render_at(&now.with_timezone(&offset)),
            Zone::Named(tz) => self.render_at(&now.with_timezone(&tz)),
        }
    }

    fn render_at<Z: TimeZone>(&self, time: &DateTime<Z>) -> OutputBatch
    where
        Z::Offset: Display,
    {
        let mut batch = OutputBatch::new();
        batch
            .write_styled(0, 0, time.format(&self.time_format).to_string(), Style::BOLD)
            .write_text(1, 0, time.format(&self.date_format).to_string());
        batch
    }
}

impl Worker for ClockWorker {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn produce(&mut self, _ctx: &WorkerContext) -> Result<OutputBatch, WorkerError> {
        Ok(self.render(Utc::now()))
    }

    fn cadence(&self) -> Cadence {
        Cadence::Every(self.refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wwwidget_core::{DashboardConfig, OutputCommand};

    fn section(extra: &str) -> SectionConfig {
        let toml = format!(
            "[ClockWorker_bern]\nx = 0\ny = 0\nwidth = 20\nheight = 4\n{}\n",
            extra
        );
        DashboardConfig::from_toml_str(&toml).unwrap().sections()[0].clone()
    }

    fn texts(batch: &OutputBatch) -> Vec<(String, Option<Style>)> {
        batch
            .commands()
            .iter()
            .map(|c| match c.parse().unwrap() {
                OutputCommand::WriteText { text, style, .. } => (text, style),
                other => panic!("unexpected command {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_defaults() {
        let clock = ClockWorker::from_section(&section("")).unwrap();
        assert_eq!(clock.label(), "Clock");
        assert_eq!(clock.cadence(), Cadence::Every(Duration::from_secs(1)));
        assert_eq!(clock.zone, Zone::Local);
    }

    #[test]
    fn test_render_with_fixed_offset() {
        let clock = ClockWorker::from_section(&section(
            "label = \"Bern\"\nutc_offset_minutes = 60\ntime_format = \"%H:%M\"",
        ))
        .unwrap();
        let utc = Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap();
        let batch = clock.render(utc);
        assert_eq!(
            texts(&batch),
            [
                ("00:30".to_string(), Some(Style::BOLD)),
                ("2024-03-02".to_string(), None)
            ]
        );
    }

    #[test]
    fn test_named_zone_follows_daylight_saving() {
        let clock = ClockWorker::from_section(&section(
            "destination_timezone = \"Europe/Zurich\"\ntime_format = \"%H:%M\"",
        ))
        .unwrap();
        assert_eq!(clock.zone, Zone::Named(chrono_tz::Europe::Zurich));

        let summer = Utc.with_ymd_and_hms(2024, 7, 1, 11, 0, 0).unwrap();
        assert_eq!(texts(&clock.render(summer))[0].0, "13:00");

        let winter = Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap();
        assert_eq!(texts(&clock.render(winter))[0].0, "12:00");
    }

    #[test]
    fn test_produce_emits_two_lines() {
        let mut clock = ClockWorker::from_section(&section("")).unwrap();
        let batch = clock
            .produce(&WorkerContext::detached("ClockWorker_bern"))
            .unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_invalid_fields() {
        for (extra, field) in [
            ("time_format = \"%Q\"", "time_format"),
            ("date_format = \"%\"", "date_format"),
            ("utc_offset_minutes = 100000", "utc_offset_minutes"),
            ("destination_timezone = \"Mars/Olympus\"", "destination_timezone"),
            (
                "destination_timezone = \"Europe/Zurich\"\nutc_offset_minutes = 60",
                "destination_timezone",
            ),
            ("refresh_secs = 0", "refresh_secs"),
        ] {
            let err = ClockWorker::from_section(&section(extra)).err().unwrap();
            match err {
                ConstructionError::Field { field: f, .. } => assert_eq!(f, field, "{}", extra),
                other => panic!("{}: unexpected error {}", extra, other),
            }
        }
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let err = ClockWorker::from_section(&section("refresh_secs = \"fast\""))
            .err()
            .unwrap();
        assert!(matches!(err, ConstructionError::Invalid { .. }));
    }
}
