//! Inbound events emitted by the controller.

use serde::Deserialize;
use serde_json::Value;

/// Errors decoding a single line of controller output.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Line is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Event has no string \"type\" field")]
    MissingType,

    #[error("Malformed data for {kind} event: {source}")]
    Payload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// One decoded notification from the controller.
///
/// The `type` string on the wire is dispatched exactly once, in
/// [`Event::from_value`]. Types this crate does not know are kept as
/// [`Event::Unknown`] rather than rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Init,
    Snapshot { text: String, raw_seq: String },
    Output { seq: String },
    Resize { rows: u16, cols: u16 },
    Pid { pid: u32 },
    ExitCode { code: i32 },
    CommandCompleted,
    Debug { payload: Value },
    Unknown { raw: Value },
}

#[derive(Deserialize)]
struct SnapshotData {
    text: String,
    seq: String,
}

#[derive(Deserialize)]
struct OutputData {
    seq: String,
}

#[derive(Deserialize)]
struct ResizeData {
    rows: u16,
    cols: u16,
}

#[derive(Deserialize)]
struct PidData {
    pid: u32,
}

#[derive(Deserialize)]
struct ExitCodeData {
    #[serde(rename = "exitCode")]
    exit_code: i32,
}

fn payload<T: serde::de::DeserializeOwned>(
    kind: &'static str,
    data: Value,
) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|source| DecodeError::Payload { kind, source })
}

impl Event {
    /// Decode one line of controller stdout.
    pub fn from_line(line: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(line)?;
        Self::from_value(value)
    }

    /// Decode an already-parsed JSON object.
    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingType)?
            .to_string();
        let data = value.get("data").cloned().unwrap_or(Value::Null);

        let event = match kind.as_str() {
            "init" => Event::Init,
            "snapshot" => {
                let data: SnapshotData = payload("snapshot", data)?;
                Event::Snapshot {
                    text: data.text,
                    raw_seq: data.seq,
                }
            }
            "output" => {
                let data: OutputData = payload("output", data)?;
                Event::Output { seq: data.seq }
            }
            "resize" => {
                let data: ResizeData = payload("resize", data)?;
                Event::Resize {
                    rows: data.rows,
                    cols: data.cols,
                }
            }
            "pid" => {
                let data: PidData = payload("pid", data)?;
                Event::Pid { pid: data.pid }
            }
            "exitCode" => {
                let data: ExitCodeData = payload("exitCode", data)?;
                Event::ExitCode {
                    code: data.exit_code,
                }
            }
            "commandCompleted" => Event::CommandCompleted,
            "debug" => Event::Debug { payload: data },
            _ => Event::Unknown { raw: value },
        };

        Ok(event)
    }

    /// The wire name of this event, for logging.
    pub fn name(&self) -> &str {
        match self {
            Event::Init => "init",
            Event::Snapshot { .. } => "snapshot",
            Event::Output { .. } => "output",
            Event::Resize { .. } => "resize",
            Event::Pid { .. } => "pid",
            Event::ExitCode { .. } => "exitCode",
            Event::CommandCompleted => "commandCompleted",
            Event::Debug { .. } => "debug",
            Event::Unknown { raw } => raw.get("type").and_then(Value::as_str).unwrap_or("?"),
        }
    }

    /// Events whose only effect is bookkeeping the stdout reader already did.
    ///
    /// Operations waiting for something specific may drop these for good.
    pub fn is_ambient(&self) -> bool {
        matches!(
            self,
            Event::Init
                | Event::Output { .. }
                | Event::Resize { .. }
                | Event::Pid { .. }
                | Event::ExitCode { .. }
                | Event::CommandCompleted
        )
    }
}
