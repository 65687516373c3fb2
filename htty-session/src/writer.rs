//! Serializes commands onto the controller's stdin.

use htty_protocol::Command;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::SessionError;

/// Writes one JSON line per command and flushes.
///
/// Callers must not issue overlapping commands: the protocol has no request
/// ids, so responses are matched by order alone.
#[derive(Debug)]
pub(crate) struct CommandWriter<W> {
    input: Option<W>,
}

impl<W: AsyncWrite + Unpin> CommandWriter<W> {
    pub fn new(input: W) -> Self {
        Self { input: Some(input) }
    }

    pub async fn send(&mut self, command: &Command) -> Result<(), SessionError> {
        let line = command.to_line()?;
        let operation = command.name();
        let input = self.input.as_mut().ok_or_else(|| SessionError::Communication {
            operation,
            source: io::Error::new(io::ErrorKind::BrokenPipe, "controller input already closed"),
        })?;

        debug!("Sending command: {}", line.trim_end());
        input
            .write_all(line.as_bytes())
            .await
            .map_err(|source| SessionError::Communication { operation, source })?;
        input
            .flush()
            .await
            .map_err(|source| SessionError::Communication { operation, source })?;
        Ok(())
    }

    pub async fn send_keys(&mut self, keys: Vec<String>) -> Result<(), SessionError> {
        self.send(&Command::SendKeys { keys }).await
    }

    pub async fn take_snapshot(&mut self) -> Result<(), SessionError> {
        self.send(&Command::TakeSnapshot).await
    }

    /// Send `exit`, then close the input stream.
    ///
    /// End-of-input is itself a shutdown trigger for the controller, so the
    /// stream is closed even when the write fails.
    pub async fn exit_command(&mut self) -> Result<(), SessionError> {
        let result = self.send(&Command::Exit).await;
        self.close().await;
        result
    }

    pub async fn close(&mut self) {
        if let Some(mut input) = self.input.take() {
            if let Err(e) = input.shutdown().await {
                debug!("Error closing controller input (may have already exited): {}", e);
            }
        }
    }
}
