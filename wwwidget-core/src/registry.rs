// wwwidget-core/src/registry.rs
use crate::{ConstructionError, DashboardConfig, SectionConfig, Worker, WorkerId};
use tracing::{debug, warn};

pub type WorkerFactory =
    Box<dyn Fn(&SectionConfig) -> Result<Box<dyn Worker>, ConstructionError> + Send + Sync>;

/// Worker types that can be built straight from a config section
pub trait FromSection: Sized {
    fn from_section(section: &SectionConfig) -> Result<Self, ConstructionError>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("worker type '{0}' is already registered")]
    Duplicate(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("section '{0}' matches no registered worker type")]
    NoMatch(String),
    #[error("section '{section}' matches several worker types: {}", candidates.join(", "))]
    Ambiguous {
        section: String,
        candidates: Vec<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Construction(#[from] ConstructionError),
}

/// A section that did not produce a worker, with the reason
#[derive(Debug)]
pub struct SkippedSection {
    pub name: String,
    pub reason: BuildError,
}

/// Result of building every section of a dashboard
#[derive(Default)]
pub struct BuildReport {
    /// Built workers, in section order
    pub workers: Vec<(WorkerId, Box<dyn Worker>)>,
    pub skipped: Vec<SkippedSection>,
}

/// Static table of worker types, keyed by the section-name prefix that
/// selects them. Filled once at startup.
#[derive(Default)]
pub struct WorkerRegistry {
    factories: Vec<(String, WorkerFactory)>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        type_id: &str,
        factory: WorkerFactory,
    ) -> Result<(), RegistryError> {
        if self.factories.iter().any(|(name, _)| name == type_id) {
            return Err(RegistryError::Duplicate(type_id.to_string()));
        }
        self.factories.push((type_id.to_string(), factory));
        Ok(())
    }

    /// Registered type ids, in registration order
    pub fn list_workers(&self) -> Vec<&str> {
        self.factories.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Find the single worker type whose id prefixes `section`
    pub fn classify(&self, section: &str) -> Result<&str, ClassifyError> {
        let mut candidates = self
            .factories
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| section.starts_with(name));

        match (candidates.next(), candidates.next()) {
            (None, _) => Err(ClassifyError::NoMatch(section.to_string())),
            (Some(type_id), None) => Ok(type_id),
            (Some(first), Some(second)) => Err(ClassifyError::Ambiguous {
                section: section.to_string(),
                candidates: [first, second]
                    .into_iter()
                    .chain(candidates)
                    .map(str::to_string)
                    .collect(),
            }),
        }
    }

    pub fn build(&self, section: &SectionConfig) -> Result<Box<dyn Worker>, BuildError> {
        let type_id = self.classify(section.name())?;
        debug!(section = section.name(), type_id, "building worker");
        let factory = self
            .factories
            .iter()
            .find(|(name, _)| name == type_id)
            .map(|(_, factory)| factory)
            .ok_or_else(|| ClassifyError::NoMatch(section.name().to_string()))?;
        Ok(factory(section)?)
    }

    /// Build every section of `config`. Failing sections are logged and
    /// reported; they never stop the others.
    pub fn build_all(&self, config: &DashboardConfig) -> BuildReport {
        let mut report = BuildReport::default();
        for section in config.sections() {
            match self.build(section) {
                Ok(worker) => report
                    .workers
                    .push((WorkerId::new(section.name()), worker)),
                Err(reason) => {
                    warn!(section = section.name(), error = %reason, "skipping section");
                    report.skipped.push(SkippedSection {
                        name: section.name().to_string(),
                        reason,
                    });
                }
            }
        }
        report
    }
}

#[macro_export]
macro_rules! register_worker {
    ($registry:expr, $type_id:expr, $worker_type:ty) => {
        $registry.register(
            $type_id,
            Box::new(
                |section: &$crate::SectionConfig| -> Result<
                    Box<dyn $crate::Worker>,
                    $crate::ConstructionError,
                > {
                    let worker = <$worker_type as $crate::FromSection>::from_section(section)?;
                    Ok(Box::new(worker))
                },
            ),
        )
    };
}
