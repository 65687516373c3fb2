//! Error types for htty-session

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while driving a session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to spawn controller process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("ht binary not found. Searched: {}", display_paths(.searched))]
    BinaryNotFound { searched: Vec<PathBuf> },

    #[error("Invalid session config: {0}")]
    InvalidConfig(String),

    #[error("Controller process is not running (exit code: {})", display_code(.exit_code))]
    ProcessNotRunning { exit_code: Option<i32> },

    #[error("Failed to send {operation} to controller, child process may have exited: {source}")]
    Communication {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("No snapshot event after {attempts} attempts ({elapsed:?}); controller may have stopped responding")]
    SnapshotTimeout { attempts: usize, elapsed: Duration },

    #[error("Pattern '{pattern}' not found within {timeout:?}")]
    PatternTimeout { pattern: String, timeout: Duration },

    #[error("Pattern '{pattern}' still present after {timeout:?}")]
    PatternStillPresent { pattern: String, timeout: Duration },

    #[error("Subprocess did not complete within {timeout:?}")]
    SubprocessWaitTimeout { timeout: Duration },

    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Could not determine exit code of controller process {} after forced termination", display_pid(.controller_pid))]
    ExitCodeIndeterminate { controller_pid: Option<u32> },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    /// True for the bounded-wait failures a caller may retry with a larger timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SessionError::SnapshotTimeout { .. }
                | SessionError::PatternTimeout { .. }
                | SessionError::PatternStillPresent { .. }
                | SessionError::SubprocessWaitTimeout { .. }
        )
    }
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

fn display_pid(pid: &Option<u32>) -> String {
    pid.map_or_else(|| "<unknown pid>".to_string(), |p| p.to_string())
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
