// wwwidget-core/src/worker.rs
use crate::{Geometry, OutputBatch, WorkerContext};
use std::fmt;
use std::time::Duration;

/// Contract every widget type implements.
///
/// A worker is moved onto its own runner thread after construction and is
/// only ever touched from there. It talks to the controller exclusively
/// through the batches it produces and, optionally, the input it accepts.
pub trait Worker: Send {
    /// Placement of the widget's bordered pane
    fn geometry(&self) -> Geometry;

    /// Text shown on the top border. Read after every production.
    fn label(&self) -> String;

    /// Build the next refresh. May block, e.g. on I/O.
    fn produce(&mut self, ctx: &WorkerContext) -> Result<OutputBatch, WorkerError>;

    /// How long the runner waits before calling `produce` again
    fn cadence(&self) -> Cadence {
        Cadence::Every(Duration::from_secs(1))
    }

    /// Whether the controller should open an input channel to this worker
    fn accepts_input(&self) -> bool {
        false
    }

    /// Handle an input event routed to this worker. Called on the runner
    /// thread, followed by an immediate production.
    fn accept_input(&mut self, _event: InputEvent) {}
}

/// Pacing between two productions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Produce again after the given delay
    Every(Duration),
    /// Produce once, then again after each delivered input event
    OnInput,
}

/// Terminal input forwarded to workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key(crossterm::event::KeyEvent),
    Mouse(crossterm::event::MouseEvent),
    Resize(u16, u16),
}

/// Failure inside a worker's production loop. Ends that worker only.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Failed(String),
}

/// Unique name of a running worker: the config section it was built from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for WorkerId {
    fn from(name: String) -> Self {
        Self(name)
    }
}
