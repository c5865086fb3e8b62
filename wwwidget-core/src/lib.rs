pub mod channel;
pub mod command;
pub mod config;
pub mod controller;
pub mod input;
pub mod layout;
pub mod registry;
mod runner;
pub mod style;
pub mod surface;
pub mod terminal;
pub mod worker;

pub use channel::{ChannelClosed, OutputMessage, OutputReceiver, OutputSender, output_channel};
pub use command::{CommandError, OutputBatch, OutputCommand, WireArg, WireCommand};
pub use config::{
    ConfigError, ConstructionError, ControllerSettings, DashboardConfig, SectionConfig,
};
pub use controller::{Controller, ControllerError, ControllerState, PointerHit};
pub use input::{CrosstermInput, InputSource};
pub use layout::{ApplyReport, Geometry, LayoutError, WindowLayout, WindowPair};
pub use registry::{
    BuildError, BuildReport, ClassifyError, FromSection, RegistryError, SkippedSection,
    WorkerFactory, WorkerRegistry,
};
pub use runner::{WorkerContext, WorkerHandle};
pub use style::Style;
pub use surface::{Cell, Surface};
pub use terminal::{CrosstermDisplay, DisplayGuard, DisplayMode, Interrupt, install_panic_logger};
pub use worker::{Cadence, InputEvent, Worker, WorkerError, WorkerId};
