use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An event stream the controller can be asked to emit via `--subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Subscription {
    Init,
    Snapshot,
    Output,
    Resize,
    Pid,
    ExitCode,
    CommandCompleted,
    Debug,
}

/// Subscriptions every session needs for snapshots, waits and exit handling.
pub const DEFAULT_SUBSCRIPTIONS: [Subscription; 7] = [
    Subscription::Init,
    Subscription::Snapshot,
    Subscription::Output,
    Subscription::Resize,
    Subscription::Pid,
    Subscription::ExitCode,
    Subscription::CommandCompleted,
];

impl Subscription {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Snapshot => "snapshot",
            Self::Output => "output",
            Self::Resize => "resize",
            Self::Pid => "pid",
            Self::ExitCode => "exitCode",
            Self::CommandCompleted => "commandCompleted",
            Self::Debug => "debug",
        }
    }

    /// Join subscriptions into the comma-separated `--subscribe` value.
    pub fn join(subscriptions: &[Subscription]) -> String {
        subscriptions
            .iter()
            .map(Subscription::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subscription {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "snapshot" => Ok(Self::Snapshot),
            "output" => Ok(Self::Output),
            "resize" => Ok(Self::Resize),
            "pid" => Ok(Self::Pid),
            "exitCode" => Ok(Self::ExitCode),
            "commandCompleted" => Ok(Self::CommandCompleted),
            "debug" => Ok(Self::Debug),
            other => Err(format!("unknown subscription event: {}", other)),
        }
    }
}
