//! Snapshot requests and their results

use htty_protocol::Event;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, Instrument};

use crate::error::SessionError;
use crate::render::ansi_to_html;
use crate::session::Session;

/// Point-in-time capture of the terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotResult {
    /// Visible grid, one line per row, padded to the terminal width
    pub text: String,
    /// `raw_seq` rendered as HTML
    pub html: String,
    /// Escape sequence that redraws the screen
    pub raw_seq: String,
}

impl SnapshotResult {
    pub fn new(text: String, raw_seq: String) -> Self {
        let html = ansi_to_html(&raw_seq);
        Self {
            text,
            html,
            raw_seq,
        }
    }

    /// Rows of the grid
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }

    /// Rows with trailing padding removed
    pub fn trimmed_lines(&self) -> Vec<&str> {
        self.lines().map(str::trim_end).collect()
    }
}

impl Session {
    /// Take a snapshot, bounded by the configured snapshot timeout.
    pub async fn snapshot(&mut self) -> Result<SnapshotResult, SessionError> {
        let timeout = self.config.timing.snapshot_timeout;
        self.snapshot_within(timeout).await
    }

    /// Take a snapshot, giving up after `timeout` or after the retry budget
    /// is spent, whichever comes first.
    pub async fn snapshot_within(
        &mut self,
        timeout: Duration,
    ) -> Result<SnapshotResult, SessionError> {
        let span = self.span.clone();
        self.request_snapshot(timeout).instrument(span).await
    }

    /// The snapshot round trip.
    ///
    /// Ambient events popped on the way are dropped, since the stdout reader
    /// has already recorded them. Anything else is held aside and put back
    /// on the channel before returning.
    ///
    /// Answers to earlier requests that timed out are skipped, so the
    /// result always comes from this request. Once the budget is spent the
    /// queue is still drained once without waiting, which catches an answer
    /// that arrived during the settle delay.
    pub(crate) async fn request_snapshot(
        &mut self,
        timeout: Duration,
    ) -> Result<SnapshotResult, SessionError> {
        self.ensure_running()?;
        let start = Instant::now();
        let deadline = start + timeout;
        let timing = self.config.timing.clone();

        self.writer.take_snapshot().await?;
        tokio::time::sleep(timing.settle_delay).await;

        let mut deferred = Vec::new();
        let mut attempts = 0;
        let result = loop {
            let now = Instant::now();
            let exhausted = attempts >= timing.max_snapshot_retries || now >= deadline;
            let popped = if exhausted {
                self.events.try_pop()
            } else {
                let slice = timing.snapshot_retry_timeout.min(deadline - now);
                self.events.pop(slice).await
            };

            match popped {
                Some(Event::Snapshot { .. }) if self.stale_snapshots > 0 => {
                    self.stale_snapshots -= 1;
                    debug!(
                        "Skipping late snapshot answer ({} still outstanding)",
                        self.stale_snapshots
                    );
                }
                Some(Event::Snapshot { text, raw_seq }) => {
                    break Ok(SnapshotResult::new(text, raw_seq));
                }
                Some(event) if event.is_ambient() => {
                    trace!("Snapshot consumed ambient {} event", event.name());
                }
                Some(event) => {
                    debug!("Snapshot deferring {} event", event.name());
                    deferred.push(event);
                }
                None if exhausted => {
                    // Our answer may still arrive; the next request must not take it
                    self.stale_snapshots += 1;
                    break Err(SessionError::SnapshotTimeout {
                        attempts,
                        elapsed: start.elapsed(),
                    });
                }
                None => {
                    attempts += 1;
                    debug!("No snapshot yet (attempt {})", attempts);
                }
            }
        };

        self.events.put_back_all(deferred);
        result
    }

    /// Account for a snapshot event seen outside [`Session::request_snapshot`].
    ///
    /// Only abandoned requests leave answers on the channel, so such an
    /// event is always one of them.
    pub(crate) fn note_stray_snapshot(&mut self) {
        self.stale_snapshots = self.stale_snapshots.saturating_sub(1);
    }
}
