// wwwidget-core/src/layout.rs
use crate::{CommandError, OutputBatch, OutputCommand, Style, Surface, WorkerId};
use ratatui::{buffer::Buffer, layout::Position, symbols::line};
use serde::Deserialize;
use unicode_width::UnicodeWidthChar;

/// Width of the frame drawn around every pane
pub const BORDER: u16 = 1;
/// Smallest width or height a pane may have
pub const MIN_EXTENT: u16 = 2 * BORDER + 1;
/// Column of the border row where the label starts
const LABEL_COL: u16 = 2;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("window {width}x{height} is too small, both sides must be at least 3")]
    TooSmall { width: u16, height: u16 },
    #[error("window {x},{y} {width}x{height} does not fit the coordinate space")]
    Overflow {
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    },
    #[error("a window for '{0}' is already allocated")]
    Duplicate(WorkerId),
}

/// Screen placement of a widget, in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Geometry {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Geometry {
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check the geometry can hold a bordered pane
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.width < MIN_EXTENT || self.height < MIN_EXTENT {
            return Err(LayoutError::TooSmall {
                width: self.width,
                height: self.height,
            });
        }
        if self.x.checked_add(self.width).is_none() || self.y.checked_add(self.height).is_none() {
            return Err(LayoutError::Overflow {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Drawing area left inside the border, relative to the outer origin
    pub fn inner(&self) -> Result<Geometry, LayoutError> {
        self.validate()?;
        Ok(Geometry::new(
            BORDER,
            BORDER,
            self.width - 2 * BORDER,
            self.height - 2 * BORDER,
        ))
    }

    /// Closed rectangle test: border cells count as inside
    pub fn contains(&self, col: u16, row: u16) -> bool {
        let right = u32::from(self.x) + u32::from(self.width);
        let bottom = u32::from(self.y) + u32::from(self.height);
        col >= self.x && u32::from(col) < right && row >= self.y && u32::from(row) < bottom
    }
}

/// Outcome of applying one batch to a pane
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub applied: usize,
    /// Index within the batch and reason of every skipped command
    pub failures: Vec<(usize, CommandError)>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Bordered frame plus the inset surface a worker's commands land on
#[derive(Debug, Clone)]
pub struct WindowPair {
    id: WorkerId,
    geometry: Geometry,
    label: String,
    outer: Surface,
    inner: Surface,
}

impl WindowPair {
    pub fn allocate(
        id: WorkerId,
        geometry: Geometry,
        label: impl Into<String>,
    ) -> Result<Self, LayoutError> {
        let inner = geometry.inner()?;
        let mut pair = Self {
            id,
            geometry,
            label: label.into(),
            outer: Surface::new(geometry.width, geometry.height),
            inner: Surface::new(inner.width, inner.height),
        };
        pair.draw_border();
        Ok(pair)
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn outer(&self) -> &Surface {
        &self.outer
    }

    pub fn inner(&self) -> &Surface {
        &self.inner
    }

    pub fn contains(&self, col: u16, row: u16) -> bool {
        self.geometry.contains(col, row)
    }

    /// Replace the pane content with `batch`.
    ///
    /// Every command is validated and applied on its own; failures are
    /// collected in the report and do not stop the rest of the batch.
    pub fn apply(&mut self, label: &str, batch: &OutputBatch) -> ApplyReport {
        self.inner.clear();
        if self.label != label {
            self.label = label.to_string();
        }
        self.draw_border();

        let mut report = ApplyReport::default();
        for (index, wire) in batch.commands().iter().enumerate() {
            match wire.parse().and_then(|command| self.execute(command)) {
                Ok(()) => report.applied += 1,
                Err(e) => report.failures.push((index, e)),
            }
        }
        report
    }

    fn execute(&mut self, command: OutputCommand) -> Result<(), CommandError> {
        match command {
            OutputCommand::WriteText {
                row,
                col,
                text,
                style,
            } => self
                .inner
                .write_text(row, col, &text, style.unwrap_or_default()),
            OutputCommand::SetBackground { style } => {
                self.inner.set_background(style);
                Ok(())
            }
        }
    }

    fn draw_border(&mut self) {
        let (w, h) = (self.outer.width(), self.outer.height());
        let border = line::NORMAL;
        let plain = Style::empty();
        let glyph = |s: &str| s.chars().next().unwrap_or(' ');

        self.outer.clear();
        for col in 1..w - 1 {
            let _ = self.outer.put(0, col, glyph(border.horizontal), plain);
            let _ = self.outer.put(h - 1, col, glyph(border.horizontal), plain);
        }
        for row in 1..h - 1 {
            let _ = self.outer.put(row, 0, glyph(border.vertical), plain);
            let _ = self.outer.put(row, w - 1, glyph(border.vertical), plain);
        }
        let _ = self.outer.put(0, 0, glyph(border.top_left), plain);
        let _ = self.outer.put(0, w - 1, glyph(border.top_right), plain);
        let _ = self.outer.put(h - 1, 0, glyph(border.bottom_left), plain);
        let _ = self.outer.put(h - 1, w - 1, glyph(border.bottom_right), plain);

        // The label sits on the top edge and never covers the right corner
        let room = usize::from(w.saturating_sub(LABEL_COL + BORDER));
        let mut used = 0;
        let label: String = self
            .label
            .chars()
            .map(|ch| if ch.is_control() { ' ' } else { ch })
            .take_while(|ch| {
                used += ch.width().unwrap_or(0);
                used <= room
            })
            .collect();
        let _ = self.outer.write_text(0, LABEL_COL, &label, plain);
    }

    /// Draw the frame, then the inner surface on top of it
    pub fn render(&self, buf: &mut Buffer) {
        let origin = Position::new(self.geometry.x, self.geometry.y);
        self.outer.blit(origin, buf);
        self.inner
            .blit(Position::new(origin.x + BORDER, origin.y + BORDER), buf);
    }
}

/// All panes of a dashboard, kept in allocation order
#[derive(Debug, Default)]
pub struct WindowLayout {
    panes: Vec<WindowPair>,
}

impl WindowLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(
        &mut self,
        id: WorkerId,
        geometry: Geometry,
        label: impl Into<String>,
    ) -> Result<&WindowPair, LayoutError> {
        if self.get(&id).is_some() {
            return Err(LayoutError::Duplicate(id));
        }
        self.panes.push(WindowPair::allocate(id, geometry, label)?);
        Ok(&self.panes[self.panes.len() - 1])
    }

    pub fn remove(&mut self, id: &WorkerId) -> Option<WindowPair> {
        let index = self.panes.iter().position(|p| p.id() == id)?;
        Some(self.panes.remove(index))
    }

    pub fn get(&self, id: &WorkerId) -> Option<&WindowPair> {
        self.panes.iter().find(|p| p.id() == id)
    }

    pub fn get_mut(&mut self, id: &WorkerId) -> Option<&mut WindowPair> {
        self.panes.iter_mut().find(|p| p.id() == id)
    }

    /// Pane under a pointer position. Later panes are drawn over earlier
    /// ones, so the last allocated match wins.
    pub fn resolve(&self, col: u16, row: u16) -> Option<&WindowPair> {
        self.panes.iter().rev().find(|p| p.contains(col, row))
    }

    pub fn len(&self) -> usize {
        self.panes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }

    pub fn render(&self, buf: &mut Buffer) {
        for pane in &self.panes {
            pane.render(buf);
        }
    }
}
