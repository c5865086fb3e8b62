// wwwidget-core/src/config.rs
use crate::{Geometry, LayoutError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Name of the table holding controller settings; never a widget section
pub const CONTROLLER_SECTION: &str = "controller";

/// File name looked up in the working and user config directories
pub const CONFIG_FILE_NAME: &str = "wwwidget.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Config directory not found")]
    NoConfigDir,
    #[error("No config file found, looked in: {}", display_paths(.0))]
    NotFound(Vec<PathBuf>),
    #[error("Invalid [controller] table: {0}")]
    Controller(toml::de::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A config section that could not be turned into a worker
#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    #[error("section '{section}': {source}")]
    Invalid {
        section: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("section '{section}': field '{field}' {reason}")]
    Field {
        section: String,
        field: &'static str,
        reason: String,
    },
    #[error("section '{section}': {source}")]
    Geometry {
        section: String,
        #[source]
        source: LayoutError,
    },
    #[error("section '{section}': cannot read {}: {source}", path.display())]
    Io {
        section: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConstructionError {
    pub fn field(section: &SectionConfig, field: &'static str, reason: impl Into<String>) -> Self {
        ConstructionError::Field {
            section: section.name().to_string(),
            field,
            reason: reason.into(),
        }
    }

    pub fn io(section: &SectionConfig, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConstructionError::Io {
            section: section.name().to_string(),
            path: path.into(),
            source,
        }
    }
}

/// One named section of the dashboard config
#[derive(Debug, Clone)]
pub struct SectionConfig {
    name: String,
    table: toml::Table,
}

impl SectionConfig {
    pub fn new(name: impl Into<String>, table: toml::Table) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The common `x`, `y`, `width`, `height` fields, all required
    pub fn geometry(&self) -> Result<Geometry, ConstructionError> {
        let geometry: Geometry = self.settings()?;
        geometry
            .validate()
            .map_err(|source| ConstructionError::Geometry {
                section: self.name.clone(),
                source,
            })?;
        Ok(geometry)
    }

    /// Deserialize the widget-specific fields. Unknown fields are ignored so
    /// the common geometry fields can live in the same table.
    pub fn settings<T: DeserializeOwned>(&self) -> Result<T, ConstructionError> {
        toml::Value::Table(self.table.clone())
            .try_into()
            .map_err(|source| ConstructionError::Invalid {
                section: self.name.clone(),
                source,
            })
    }
}

/// Controller tuning, read from the optional `[controller]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerSettings {
    /// Key that ends the dashboard
    pub quit_key: char,
    /// Longest time one input poll may wait when no output is pending
    pub poll_interval_ms: u64,
    /// Batches applied per loop iteration
    pub max_batches_per_tick: usize,
    /// Queued batches above which a backlog warning is logged
    pub backlog_warning: usize,
    /// Time allowed for workers to stop at shutdown
    pub shutdown_grace_ms: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            quit_key: 'q',
            poll_interval_ms: 50,
            max_batches_per_tick: 1,
            backlog_warning: 256,
            shutdown_grace_ms: 500,
        }
    }
}

impl ControllerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Parsed dashboard: controller settings plus widget sections in file order
#[derive(Debug, Clone, Default)]
pub struct DashboardConfig {
    pub controller: ControllerSettings,
    sections: Vec<SectionConfig>,
}

impl DashboardConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let root: toml::Table = toml::from_str(content)?;
        let mut config = DashboardConfig::default();

        for (name, value) in root {
            match value {
                toml::Value::Table(table) if name == CONTROLLER_SECTION => {
                    config.controller = toml::Value::Table(table)
                        .try_into()
                        .map_err(ConfigError::Controller)?;
                }
                toml::Value::Table(table) => config.sections.push(SectionConfig::new(name, table)),
                _ => warn!(key = %name, "ignoring top-level value outside any section"),
            }
        }

        Ok(config)
    }

    /// Load the dashboard config.
    ///
    /// An explicit path must exist. Without one the lookup order is
    /// `./wwwidget.toml`, then `<config dir>/wwwidget/wwwidget.toml`.
    pub fn load(path: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        match path {
            Some(path) => Self::read(path.to_path_buf()),
            None => Self::search(&std::env::current_dir()?, dirs::config_dir),
        }
    }

    /// `config_dir` is only consulted when `cwd` holds no config file
    fn search(
        cwd: &Path,
        config_dir: impl FnOnce() -> Option<PathBuf>,
    ) -> Result<(Self, PathBuf), ConfigError> {
        let local = cwd.join(CONFIG_FILE_NAME);
        if local.exists() {
            return Self::read(local);
        }

        let user = config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("wwwidget")
            .join(CONFIG_FILE_NAME);
        if user.exists() {
            return Self::read(user);
        }

        Err(ConfigError::NotFound(vec![local, user]))
    }

    fn read(path: PathBuf) -> Result<(Self, PathBuf), ConfigError> {
        let content = std::fs::read_to_string(&path)?;
        Ok((Self::from_toml_str(&content)?, path))
    }

    pub fn sections(&self) -> &[SectionConfig] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&SectionConfig> {
        self.sections.iter().find(|s| s.name() == name)
    }
}
