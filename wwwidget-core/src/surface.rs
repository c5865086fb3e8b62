// wwwidget-core/src/surface.rs
use crate::{CommandError, Style};
use ratatui::{buffer::Buffer, layout::Position};
use unicode_width::UnicodeWidthChar;

/// One character cell with the attributes it was written with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub symbol: char,
    pub style: Style,
}

impl Cell {
    pub const BLANK: Cell = Cell {
        symbol: ' ',
        style: Style::empty(),
    };

    /// Symbol held by the right half of a double-width glyph
    pub const CONTINUATION: char = '\0';

    pub fn is_continuation(&self) -> bool {
        self.symbol == Self::CONTINUATION
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::BLANK
    }
}

/// Character grid a window draws into.
///
/// Writes follow curses semantics: text runs left to right, wraps at the
/// right edge and fails once it would leave the last cell.
#[derive(Debug, Clone)]
pub struct Surface {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
    background: Style,
}

impl Surface {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::BLANK; usize::from(width) * usize::from(height)],
            background: Style::empty(),
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Blank every cell. The background attributes are kept.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    pub fn set_background(&mut self, style: Style) {
        self.background = style;
    }

    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        self.index(row, col).map(|i| &self.cells[i])
    }

    /// Attributes a cell is drawn with: its own plus the background
    pub fn effective_style(&self, row: u16, col: u16) -> Option<Style> {
        self.cell(row, col).map(|cell| cell.style | self.background)
    }

    /// Put a single character at `(row, col)`
    pub fn put(&mut self, row: u16, col: u16, symbol: char, style: Style) -> Result<(), CommandError> {
        let i = self
            .index(row, col)
            .ok_or_else(|| self.out_of_bounds(row, col))?;
        self.split_wide(i);
        self.cells[i] = Cell { symbol, style };
        Ok(())
    }

    /// Write `text` starting at `(row, col)`.
    ///
    /// Columns advance by display width. A double-width glyph that does not
    /// fit on the current row moves to the next one; zero-width characters
    /// are dropped. On overflow the characters that fit stay written and the
    /// position of the first character that did not fit is reported.
    pub fn write_text(
        &mut self,
        row: u16,
        col: u16,
        text: &str,
        style: Style,
    ) -> Result<(), CommandError> {
        if self.index(row, col).is_none() {
            return Err(self.out_of_bounds(row, col));
        }

        let (mut row, mut col) = (row, col);
        for ch in text.chars() {
            if ch == '\n' {
                row = row.saturating_add(1);
                col = 0;
                continue;
            }
            let (symbol, width) = if ch.is_control() {
                (' ', 1)
            } else {
                (ch, ch.width().unwrap_or(0))
            };
            if width == 0 {
                continue;
            }
            if col > 0 && usize::from(col) + width > usize::from(self.width) {
                row = row.saturating_add(1);
                col = 0;
            }
            self.put(row, col, symbol, style)?;
            if width > 1 {
                self.put(row, col.saturating_add(1), Cell::CONTINUATION, style)?;
            }
            col = col.saturating_add(if width > 1 { 2 } else { 1 });
        }
        Ok(())
    }

    /// Text of one row, trailing blanks included. A double-width glyph
    /// appears once.
    pub fn row_text(&self, row: u16) -> Option<String> {
        if row >= self.height {
            return None;
        }
        let start = usize::from(row) * usize::from(self.width);
        let end = start + usize::from(self.width);
        Some(
            self.cells[start..end]
                .iter()
                .filter(|c| !c.is_continuation())
                .map(|c| c.symbol)
                .collect(),
        )
    }

    /// Copy the surface into `buf` with its top-left corner at `origin`.
    /// Cells that fall outside the buffer are clipped.
    pub fn blit(&self, origin: Position, buf: &mut Buffer) {
        for row in 0..self.height {
            for col in 0..self.width {
                let Some(cell) = self.cell(row, col) else {
                    continue;
                };
                let (Some(x), Some(y)) = (origin.x.checked_add(col), origin.y.checked_add(row))
                else {
                    continue;
                };
                if let Some(target) = buf.cell_mut(Position::new(x, y)) {
                    let style = cell.style | self.background;
                    target.reset();
                    if !cell.is_continuation() {
                        target.set_char(cell.symbol);
                    }
                    target.modifier = style.modifiers();
                }
            }
        }
    }

    fn index(&self, row: u16, col: u16) -> Option<usize> {
        (row < self.height && col < self.width)
            .then(|| usize::from(row) * usize::from(self.width) + usize::from(col))
    }

    /// Overwriting either half of a double-width glyph blanks the other half
    fn split_wide(&mut self, i: usize) {
        let col = i % usize::from(self.width);
        if self.cells[i].is_continuation() {
            if col > 0 {
                self.cells[i - 1] = Cell::BLANK;
            }
        } else if col + 1 < usize::from(self.width) && self.cells[i + 1].is_continuation() {
            self.cells[i + 1] = Cell::BLANK;
        }
    }

    fn out_of_bounds(&self, row: u16, col: u16) -> CommandError {
        CommandError::OutOfBounds {
            row,
            col,
            width: self.width,
            height: self.height,
        }
    }
}
