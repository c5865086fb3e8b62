// wwwidget-core/src/command.rs
use crate::Style;
use std::fmt;

/// Action name of a text write on the wire
pub const ACTION_WRITE_TEXT: &str = "addstr";
/// Action name of a background change on the wire
pub const ACTION_SET_BACKGROUND: &str = "bkgd";

/// A validated draw instruction, applied to a worker's inner surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputCommand {
    /// Write `text` starting at `(row, col)`
    WriteText {
        row: u16,
        col: u16,
        text: String,
        style: Option<Style>,
    },
    /// Set the background attributes of the whole surface
    SetBackground { style: Style },
}

/// Why a command could not be applied
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("'{action}' takes {expected} arguments, got {got}")]
    Arity {
        action: &'static str,
        expected: &'static str,
        got: usize,
    },
    #[error("'{action}' argument {index} must be {expected}")]
    ArgType {
        action: &'static str,
        index: usize,
        expected: &'static str,
    },
    #[error("coordinate {0} is outside 0..=65535")]
    Coordinate(i64),
    #[error("style {0:#x} contains unknown attribute bits")]
    UnknownStyleBits(i64),
    #[error("cell ({row}, {col}) is outside the {height}x{width} surface")]
    OutOfBounds {
        row: u16,
        col: u16,
        width: u16,
        height: u16,
    },
}

/// Loosely typed argument of a wire command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireArg {
    Int(i64),
    Text(String),
}

impl From<i64> for WireArg {
    fn from(value: i64) -> Self {
        WireArg::Int(value)
    }
}

impl From<u16> for WireArg {
    fn from(value: u16) -> Self {
        WireArg::Int(i64::from(value))
    }
}

impl From<&str> for WireArg {
    fn from(value: &str) -> Self {
        WireArg::Text(value.to_string())
    }
}

impl From<String> for WireArg {
    fn from(value: String) -> Self {
        WireArg::Text(value)
    }
}

impl From<Style> for WireArg {
    fn from(style: Style) -> Self {
        WireArg::Int(style.to_wire())
    }
}

/// Command as it travels from a worker to the controller: an action name
/// followed by positional arguments. Validation happens on the receiving side,
/// one command at a time, so a single bad entry never poisons its batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireCommand {
    pub action: String,
    pub args: Vec<WireArg>,
}

impl WireCommand {
    pub fn new(action: impl Into<String>, args: Vec<WireArg>) -> Self {
        Self {
            action: action.into(),
            args,
        }
    }

    /// Validate action, arity and argument types
    pub fn parse(&self) -> Result<OutputCommand, CommandError> {
        match self.action.as_str() {
            ACTION_WRITE_TEXT => {
                let action = ACTION_WRITE_TEXT;
                let (row, col, text, style) = match self.args.as_slice() {
                    [row, col, text] => (row, col, text, None),
                    [row, col, text, style] => (row, col, text, Some(style)),
                    other => {
                        return Err(CommandError::Arity {
                            action,
                            expected: "3 or 4",
                            got: other.len(),
                        });
                    }
                };

                let WireArg::Text(text) = text else {
                    return Err(CommandError::ArgType {
                        action,
                        index: 2,
                        expected: "text",
                    });
                };

                Ok(OutputCommand::WriteText {
                    row: coordinate(action, 0, row)?,
                    col: coordinate(action, 1, col)?,
                    text: text.clone(),
                    style: style.map(|s| style_arg(action, 3, s)).transpose()?,
                })
            }
            ACTION_SET_BACKGROUND => {
                let action = ACTION_SET_BACKGROUND;
                match self.args.as_slice() {
                    [style] => Ok(OutputCommand::SetBackground {
                        style: style_arg(action, 0, style)?,
                    }),
                    other => Err(CommandError::Arity {
                        action,
                        expected: "1",
                        got: other.len(),
                    }),
                }
            }
            other => Err(CommandError::UnknownAction(other.to_string())),
        }
    }
}

impl From<OutputCommand> for WireCommand {
    fn from(command: OutputCommand) -> Self {
        match command {
            OutputCommand::WriteText {
                row,
                col,
                text,
                style,
            } => {
                let mut args = vec![row.into(), col.into(), text.into()];
                if let Some(style) = style {
                    args.push(style.into());
                }
                WireCommand::new(ACTION_WRITE_TEXT, args)
            }
            OutputCommand::SetBackground { style } => {
                WireCommand::new(ACTION_SET_BACKGROUND, vec![style.into()])
            }
        }
    }
}

impl fmt::Display for WireCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.action)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match arg {
                WireArg::Int(v) => write!(f, "{}", v)?,
                WireArg::Text(s) => write!(f, "{:?}", s)?,
            }
        }
        write!(f, ")")
    }
}

fn coordinate(action: &'static str, index: usize, arg: &WireArg) -> Result<u16, CommandError> {
    match arg {
        WireArg::Int(v) => u16::try_from(*v).map_err(|_| CommandError::Coordinate(*v)),
        WireArg::Text(_) => Err(CommandError::ArgType {
            action,
            index,
            expected: "an integer",
        }),
    }
}

fn style_arg(action: &'static str, index: usize, arg: &WireArg) -> Result<Style, CommandError> {
    match arg {
        WireArg::Int(v) => Style::from_wire(*v).ok_or(CommandError::UnknownStyleBits(*v)),
        WireArg::Text(_) => Err(CommandError::ArgType {
            action,
            index,
            expected: "an integer style",
        }),
    }
}

/// One refresh of a widget: commands in the order they must be applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputBatch {
    commands: Vec<WireCommand>,
}

impl OutputBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_text(&mut self, row: u16, col: u16, text: impl Into<String>) -> &mut Self {
        self.push(OutputCommand::WriteText {
            row,
            col,
            text: text.into(),
            style: None,
        })
    }

    pub fn write_styled(
        &mut self,
        row: u16,
        col: u16,
        text: impl Into<String>,
        style: Style,
    ) -> &mut Self {
        self.push(OutputCommand::WriteText {
            row,
            col,
            text: text.into(),
            style: Some(style),
        })
    }

    pub fn set_background(&mut self, style: Style) -> &mut Self {
        self.push(OutputCommand::SetBackground { style })
    }

    pub fn push(&mut self, command: OutputCommand) -> &mut Self {
        self.commands.push(command.into());
        self
    }

    /// Append a command in wire form without validating it
    pub fn push_raw(&mut self, command: WireCommand) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn commands(&self) -> &[WireCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_write_text() {
        let cmd = WireCommand::new("addstr", vec![WireArg::Int(2), WireArg::Int(5), "hi".into()]);
        assert_eq!(
            cmd.parse(),
            Ok(OutputCommand::WriteText {
                row: 2,
                col: 5,
                text: "hi".to_string(),
                style: None,
            })
        );

        let styled = WireCommand::new(
            "addstr",
            vec![WireArg::Int(0), WireArg::Int(0), "x".into(), Style::DIM.into()],
        );
        assert_eq!(
            styled.parse(),
            Ok(OutputCommand::WriteText {
                row: 0,
                col: 0,
                text: "x".to_string(),
                style: Some(Style::DIM),
            })
        );
    }

    #[test]
    fn test_parse_set_background() {
        let cmd = WireCommand::new("bkgd", vec![Style::REVERSE.into()]);
        assert_eq!(
            cmd.parse(),
            Ok(OutputCommand::SetBackground {
                style: Style::REVERSE
            })
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let bogus = WireCommand::new("bogus", vec![WireArg::Int(1), WireArg::Int(2), WireArg::Int(3)]);
        assert_eq!(
            bogus.parse(),
            Err(CommandError::UnknownAction("bogus".to_string()))
        );

        let short = WireCommand::new("addstr", vec![WireArg::Int(1), WireArg::Int(2)]);
        assert!(matches!(short.parse(), Err(CommandError::Arity { got: 2, .. })));

        let bkgd = WireCommand::new("bkgd", vec![]);
        assert!(matches!(bkgd.parse(), Err(CommandError::Arity { got: 0, .. })));

        let swapped = WireCommand::new("addstr", vec![WireArg::Int(1), "a".into(), "b".into()]);
        assert!(matches!(
            swapped.parse(),
            Err(CommandError::ArgType { index: 1, .. })
        ));

        let negative = WireCommand::new("addstr", vec![WireArg::Int(-1), WireArg::Int(0), "a".into()]);
        assert_eq!(negative.parse(), Err(CommandError::Coordinate(-1)));

        let bad_style = WireCommand::new("bkgd", vec![WireArg::Int(7)]);
        assert_eq!(bad_style.parse(), Err(CommandError::UnknownStyleBits(7)));
    }

    #[test]
    fn test_batch_preserves_order() {
        let mut batch = OutputBatch::new();
        batch
            .write_text(0, 0, "first")
            .set_background(Style::DIM)
            .write_styled(1, 0, "second", Style::BOLD);

        let parsed: Vec<_> = batch
            .commands()
            .iter()
            .map(|c| c.parse().unwrap())
            .collect();
        assert_eq!(parsed.len(), 3);
        assert!(matches!(&parsed[0], OutputCommand::WriteText { text, .. } if text == "first"));
        assert!(matches!(parsed[1], OutputCommand::SetBackground { .. }));
        assert!(matches!(&parsed[2], OutputCommand::WriteText { text, .. } if text == "second"));
    }

    #[test]
    fn test_display() {
        let cmd = WireCommand::new("bogus", vec![WireArg::Int(1), "x".into()]);
        assert_eq!(cmd.to_string(), "bogus(1, \"x\")");
    }
}
