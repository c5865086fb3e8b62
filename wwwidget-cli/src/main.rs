// wwwidget-cli/src/main.rs
use clap::Parser;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    fs::OpenOptions,
    io,
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    sync::Mutex,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use wwwidget_core::{
    Controller, ControllerError, CrosstermDisplay, CrosstermInput, DashboardConfig, Interrupt,
    WorkerRegistry, install_panic_logger,
};
use wwwidget_widgets::register_builtin_workers;

/// Terminal dashboard of independently refreshing widgets
#[derive(Debug, Parser)]
#[command(name = "wwwidget", version, about)]
struct Args {
    /// Dashboard config file [default: ./wwwidget.toml, then the user config dir]
    config: Option<PathBuf>,

    /// File receiving the log; the terminal belongs to the dashboard
    #[arg(long, default_value = "wwwidget.log")]
    log_file: PathBuf,

    /// Log filter, e.g. `debug` or `wwwidget_core=trace` [default: $RUST_LOG, then info]
    #[arg(long)]
    log_level: Option<String>,

    /// Print the registered worker types and exit
    #[arg(long)]
    list_workers: bool,
}

fn init_logging(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match &args.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.log_file)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| format!("tracing init failed: {e}"))?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut registry = WorkerRegistry::new();
    register_builtin_workers(&mut registry)?;

    if args.list_workers {
        for type_id in registry.list_workers() {
            println!("{}", type_id);
        }
        return Ok(());
    }

    init_logging(&args)?;

    // Config problems are reported before the terminal is touched
    let (config, path) = DashboardConfig::load(args.config.as_deref())?;
    info!(path = %path.display(), sections = config.sections().len(), "config loaded");

    install_panic_logger();
    let interrupt = Interrupt::install()?;
    let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    // The controller restores the terminal when dropped, so by the time an
    // error or panic reaches this point the screen is usable again.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<usize, ControllerError> {
        let mut controller = Controller::init(
            &config,
            &registry,
            terminal,
            CrosstermInput::new(),
            CrosstermDisplay::new(),
            interrupt,
        )?;
        controller.run()?;
        Ok(controller.skipped().len())
    }));

    match outcome {
        Ok(Ok(0)) => Ok(()),
        Ok(Ok(skipped)) => {
            eprintln!(
                "{} config section(s) skipped, see {}",
                skipped,
                args.log_file.display()
            );
            Ok(())
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(format!("wwwidget crashed, see {}", args.log_file.display()).into()),
    }
}
