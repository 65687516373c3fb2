//! Outbound commands written to the controller's stdin.

use serde::{Deserialize, Serialize};

use crate::protocol::LINE_TERMINATOR;

/// A command for the controller.
///
/// Serializes with the `type` tag the controller dispatches on, e.g.
/// `{"type":"sendKeys","keys":["h","Enter"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// Feed key names or literal text to the terminal
    SendKeys { keys: Vec<String> },
    /// Ask for a `snapshot` event describing the current screen
    TakeSnapshot,
    /// Ask the controller to shut down
    Exit,
}

impl Command {
    /// Serialize as one newline-terminated protocol line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push(LINE_TERMINATOR);
        Ok(line)
    }

    /// Short name for log messages and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Command::SendKeys { .. } => "sendKeys",
            Command::TakeSnapshot => "takeSnapshot",
            Command::Exit => "exit",
        }
    }
}
