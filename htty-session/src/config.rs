//! Session configuration

use htty_protocol::protocol::{size_arg, COMMAND_SEPARATOR, SIZE_FLAG, SUBSCRIBE_FLAG};
use htty_protocol::{Subscription, DEFAULT_SUBSCRIPTIONS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::SessionError;

pub const DEFAULT_ROWS: u16 = 30;
pub const DEFAULT_COLS: u16 = 60;

/// Delays, timeouts and retry budgets used by session operations.
///
/// No operation waits longer than the bounds configured here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Pause after a write, since `sendKeys` has no acknowledgement event
    pub settle_delay: Duration,
    /// Overall bound for one snapshot request
    pub snapshot_timeout: Duration,
    /// How long each channel poll waits for the snapshot event
    pub snapshot_retry_timeout: Duration,
    /// Empty polls tolerated before a snapshot request fails
    pub max_snapshot_retries: usize,
    /// Bound for the controller to exit once asked to
    pub exit_timeout: Duration,
    /// How long `exit` waits for an in-flight exitCode event before choosing a path
    pub exit_grace_window: Duration,
    /// Bound for the subprocess to die after each signal
    pub subprocess_wait_timeout: Duration,
    pub expect_timeout: Duration,
    pub expect_poll_slice: Duration,
    /// Take a fresh snapshot after this many examined events while expecting
    pub expect_snapshot_every: usize,
    /// Bound for the subprocess pid to be reported after spawn
    pub startup_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(100),
            snapshot_timeout: Duration::from_secs(5),
            snapshot_retry_timeout: Duration::from_millis(500),
            max_snapshot_retries: 10,
            exit_timeout: Duration::from_secs(5),
            exit_grace_window: Duration::from_millis(500),
            subprocess_wait_timeout: Duration::from_secs(2),
            expect_timeout: Duration::from_secs(5),
            expect_poll_slice: Duration::from_millis(100),
            expect_snapshot_every: 10,
            startup_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Configuration for creating a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Program and arguments to run inside the terminal
    pub command: Vec<String>,
    #[serde(default = "default_rows")]
    pub rows: u16,
    #[serde(default = "default_cols")]
    pub cols: u16,
    /// Optional path to the ht binary (defaults to discovery, see [`crate::find_ht_binary`])
    #[serde(default)]
    pub ht_path: Option<PathBuf>,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    /// Events to subscribe to on top of [`DEFAULT_SUBSCRIPTIONS`]
    #[serde(default)]
    pub extra_subscriptions: Vec<Subscription>,
    #[serde(default)]
    pub timing: Timing,
}

fn default_rows() -> u16 {
    DEFAULT_ROWS
}

fn default_cols() -> u16 {
    DEFAULT_COLS
}

impl SessionConfig {
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            ht_path: None,
            working_directory: None,
            extra_subscriptions: vec![],
            timing: Timing::default(),
        }
    }

    pub fn with_size(mut self, rows: u16, cols: u16) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    pub fn with_ht_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ht_path = Some(path.into());
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn subscribe(mut self, subscription: Subscription) -> Self {
        self.extra_subscriptions.push(subscription);
        self
    }

    /// Base subscriptions followed by extras, without duplicates.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        let mut all = DEFAULT_SUBSCRIPTIONS.to_vec();
        for sub in &self.extra_subscriptions {
            if !all.contains(sub) {
                all.push(*sub);
            }
        }
        all
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.command.is_empty() {
            return Err(SessionError::InvalidConfig("command is empty".to_string()));
        }
        if self.rows == 0 || self.cols == 0 {
            return Err(SessionError::InvalidConfig(format!(
                "terminal size must be non-zero, got {}x{}",
                self.cols, self.rows
            )));
        }
        Ok(())
    }

    /// Arguments for the controller: subscriptions, size, `--`, then the command.
    pub fn controller_args(&self) -> Vec<String> {
        let mut args = vec![
            SUBSCRIBE_FLAG.to_string(),
            Subscription::join(&self.subscriptions()),
            SIZE_FLAG.to_string(),
            size_arg(self.rows, self.cols),
            COMMAND_SEPARATOR.to_string(),
        ];
        args.extend(self.command.iter().cloned());
        args
    }
}
