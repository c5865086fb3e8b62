// wwwidget-core/src/style.rs
use ratatui::style::Modifier;

bitflags::bitflags! {
    /// Text attributes a worker can attach to a command.
    ///
    /// The bit values are the curses `A_*` attribute constants, so a batch
    /// written against curses attributes carries over unchanged.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Style: u32 {
        const STANDOUT  = 0x0001_0000;
        const UNDERLINE = 0x0002_0000;
        const REVERSE   = 0x0004_0000;
        const BLINK     = 0x0008_0000;
        const DIM       = 0x0010_0000;
        const BOLD      = 0x0020_0000;
    }
}

impl Default for Style {
    fn default() -> Self {
        Style::empty()
    }
}

impl Style {
    /// Decode a style from its integer form, rejecting bits that name no attribute
    pub fn from_wire(value: i64) -> Option<Self> {
        u32::try_from(value).ok().and_then(Style::from_bits)
    }

    /// Integer form of the style as carried by wire commands
    pub fn to_wire(self) -> i64 {
        i64::from(self.bits())
    }

    /// Terminal modifiers used when the style is drawn.
    ///
    /// Standout has no direct terminal equivalent; curses renders it as the
    /// terminal's best highlight, which is reverse video plus bold.
    pub fn modifiers(self) -> Modifier {
        let mut modifier = Modifier::empty();
        if self.contains(Style::STANDOUT) {
            modifier |= Modifier::REVERSED | Modifier::BOLD;
        }
        if self.contains(Style::UNDERLINE) {
            modifier |= Modifier::UNDERLINED;
        }
        if self.contains(Style::REVERSE) {
            modifier |= Modifier::REVERSED;
        }
        if self.contains(Style::BLINK) {
            modifier |= Modifier::SLOW_BLINK;
        }
        if self.contains(Style::DIM) {
            modifier |= Modifier::DIM;
        }
        if self.contains(Style::BOLD) {
            modifier |= Modifier::BOLD;
        }
        modifier
    }
}
