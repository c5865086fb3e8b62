// wwwidget-core/src/terminal.rs
//! Terminal display mode and its restoration.
//!
//! The controller is the only owner of the terminal. Entering the display
//! mode goes through a [`DisplayGuard`], which restores the terminal exactly
//! once whether the dashboard ends by quit key, interrupt, error or panic.

use crate::runner::panic_message;
use crossterm::{
    cursor,
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};

/// Terminal mode switch used by the controller
pub trait DisplayMode {
    fn enter(&mut self) -> io::Result<()>;
    fn restore(&mut self) -> io::Result<()>;
}

/// Raw mode, alternate screen, mouse capture and a hidden cursor
#[derive(Debug, Default)]
pub struct CrosstermDisplay;

impl CrosstermDisplay {
    pub fn new() -> Self {
        Self
    }
}

impl DisplayMode for CrosstermDisplay {
    fn enter(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture, cursor::Hide)?;
        info!("terminal display mode entered");
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        let mut stdout = io::stdout();
        // Disable in reverse order of enabling, raw mode last
        let captured = execute!(stdout, DisableMouseCapture, cursor::Show);
        let screen = execute!(stdout, LeaveAlternateScreen);
        let raw = disable_raw_mode();
        let _ = stdout.flush();
        info!("terminal display mode restored");
        captured.and(screen).and(raw)
    }
}

/// Owns an entered display mode and restores it exactly once
pub struct DisplayGuard<M: DisplayMode> {
    mode: M,
    restored: AtomicBool,
}

impl<M: DisplayMode> DisplayGuard<M> {
    pub fn enter(mut mode: M) -> io::Result<Self> {
        if let Err(e) = mode.enter() {
            // Undo whatever part of the switch succeeded
            let _ = mode.restore();
            return Err(e);
        }
        Ok(Self {
            mode,
            restored: AtomicBool::new(false),
        })
    }

    /// Restore the terminal. Later calls are no-ops.
    pub fn restore(&mut self) -> io::Result<()> {
        if self.restored.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.mode.restore()
    }

    pub fn is_restored(&self) -> bool {
        self.restored.load(Ordering::SeqCst)
    }
}

impl<M: DisplayMode> Drop for DisplayGuard<M> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!(error = %e, "failed to restore terminal");
        }
    }
}

/// Shared flag raised by SIGINT/SIGTERM and observed by the controller loop
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a flag wired to the process termination signals
    pub fn install() -> io::Result<Self> {
        let interrupt = Self::new();
        #[cfg(unix)]
        {
            use signal_hook::consts::signal::{SIGINT, SIGTERM};
            for signal in [SIGINT, SIGTERM] {
                signal_hook::flag::register(signal, Arc::clone(&interrupt.flag))?;
            }
        }
        Ok(interrupt)
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Send panic reports to the log instead of the terminal the dashboard owns
pub fn install_panic_logger() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        std::panic::set_hook(Box::new(|info| {
            let thread = std::thread::current();
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_default();
            error!(
                thread = thread.name().unwrap_or("<unnamed>"),
                location = %location,
                "panic: {}",
                panic_message(info.payload())
            );
        }));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counting {
        entered: Arc<AtomicUsize>,
        restored: Arc<AtomicUsize>,
        fail_enter: bool,
    }

    impl DisplayMode for Counting {
        fn enter(&mut self) -> io::Result<()> {
            self.entered.fetch_add(1, Ordering::SeqCst);
            if self.fail_enter {
                return Err(io::Error::other("no tty"));
            }
            Ok(())
        }

        fn restore(&mut self) -> io::Result<()> {
            self.restored.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_guard_restores_once() {
        let mode = Counting::default();
        let restored = mode.restored.clone();
        let mut guard = DisplayGuard::enter(mode).unwrap();
        assert!(!guard.is_restored());

        guard.restore().unwrap();
        guard.restore().unwrap();
        drop(guard);
        assert_eq!(restored.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let mode = Counting::default();
        let restored = mode.restored.clone();
        {
            let _guard = DisplayGuard::enter(mode).unwrap();
        }
        assert_eq!(restored.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_restores_on_unwind() {
        let mode = Counting::default();
        let restored = mode.restored.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = DisplayGuard::enter(mode).unwrap();
            panic!("render failed");
        });
        assert!(result.is_err());
        assert_eq!(restored.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_enter_is_undone() {
        let mode = Counting {
            fail_enter: true,
            ..Default::default()
        };
        let restored = mode.restored.clone();
        assert!(DisplayGuard::enter(mode).is_err());
        assert_eq!(restored.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_interrupt_is_shared() {
        let interrupt = Interrupt::new();
        let seen_by_loop = interrupt.clone();
        assert!(!seen_by_loop.is_triggered());
        interrupt.trigger();
        assert!(seen_by_loop.is_triggered());
    }
}
