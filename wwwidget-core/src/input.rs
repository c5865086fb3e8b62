// wwwidget-core/src/input.rs
use crate::InputEvent;
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::io;
use std::time::Duration;

/// Source of terminal input for the controller loop
pub trait InputSource {
    /// Wait up to `timeout` for the next event. A zero timeout only checks
    /// for an event that is already pending.
    fn poll_event(&mut self, timeout: Duration) -> io::Result<Option<InputEvent>>;
}

/// Reads keyboard, mouse and resize events from the real terminal
#[derive(Debug, Default)]
pub struct CrosstermInput;

impl CrosstermInput {
    pub fn new() -> Self {
        Self
    }
}

impl InputSource for CrosstermInput {
    fn poll_event(&mut self, timeout: Duration) -> io::Result<Option<InputEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        Ok(match event::read()? {
            // Only handle key press events, not key release
            CEvent::Key(key) if key.kind == KeyEventKind::Press => Some(InputEvent::Key(key)),
            CEvent::Mouse(mouse) => Some(InputEvent::Mouse(mouse)),
            CEvent::Resize(width, height) => Some(InputEvent::Resize(width, height)),
            _ => None,
        })
    }
}

/// Ctrl+C arrives as a key event while the terminal is in raw mode
pub fn is_interrupt_key(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}
