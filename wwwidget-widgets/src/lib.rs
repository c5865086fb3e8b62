pub mod clock;
pub mod common;
pub mod counter;
pub mod fortune;
pub mod memory;

pub use clock::ClockWorker;
pub use common::*;
pub use counter::CounterWorker;
pub use fortune::{CookieFilter, FortuneCookies, FortuneWorker};
pub use memory::{MemoryMetrics, MemoryWorker};

use wwwidget_core::{RegistryError, WorkerRegistry, register_worker};

/// Register every worker type shipped with wwwidget. A config section
/// selects one by starting with its type id, e.g. `[ClockWorker_bern]`.
pub fn register_builtin_workers(registry: &mut WorkerRegistry) -> Result<(), RegistryError> {
    register_worker!(registry, "FortuneWorker", FortuneWorker)?;
    register_worker!(registry, "ClockWorker", ClockWorker)?;
    register_worker!(registry, "CounterWorker", CounterWorker)?;
    register_worker!(registry, "MemoryWorker", MemoryWorker)?;
    Ok(())
}
