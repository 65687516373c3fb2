//! Waiting for terminal content to appear or disappear.

use htty_protocol::Event;
use regex::Regex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, Instrument};

use crate::error::SessionError;
use crate::session::{compile, Session};

impl Session {
    /// Wait for `pattern` to appear, using the configured expect timeout.
    pub async fn expect(&mut self, pattern: &str) -> Result<(), SessionError> {
        let timeout = self.config.timing.expect_timeout;
        self.expect_within(pattern, timeout).await
    }

    /// Wait up to `timeout` for `pattern` to match the screen or new output.
    pub async fn expect_within(
        &mut self,
        pattern: &str,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        let regex = compile(pattern)?;
        let span = self.span.clone();
        async move {
            let mut deferred = Vec::new();
            let result = self.wait_for_match(&regex, timeout, &mut deferred).await;
            self.events.put_back_all(deferred);
            match &result {
                Ok(()) => debug!("Pattern '{}' found", pattern),
                Err(e) => debug!("Pattern wait failed: {}", e),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn wait_for_match(
        &mut self,
        regex: &Regex,
        timeout: Duration,
        deferred: &mut Vec<Event>,
    ) -> Result<(), SessionError> {
        self.ensure_running()?;
        let deadline = Instant::now() + timeout;
        let timing = self.config.timing.clone();

        if self.screen_matches(regex, deadline).await? {
            return Ok(());
        }

        let mut examined = 0usize;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(SessionError::PatternTimeout {
                    pattern: regex.as_str().to_string(),
                    timeout,
                });
            }

            let Some(event) = self.events.pop(timing.expect_poll_slice.min(deadline - now)).await
            else {
                continue;
            };
            examined += 1;

            match event {
                Event::Output { seq } => {
                    if regex.is_match(&seq) {
                        return Ok(());
                    }
                }
                Event::Snapshot { text, .. } => {
                    self.note_stray_snapshot();
                    if regex.is_match(&text) {
                        return Ok(());
                    }
                }
                Event::ExitCode { .. } => {
                    // The final screen is complete now; check it, and keep
                    // the event for whoever handles exit
                    deferred.push(event);
                    if self.screen_matches(regex, deadline).await? {
                        return Ok(());
                    }
                    continue;
                }
                Event::Debug { .. } | Event::Unknown { .. } => {
                    deferred.push(event);
                }
                other => trace!("Expect consumed ambient {} event", other.name()),
            }

            let periodic = timing.expect_snapshot_every > 0
                && examined % timing.expect_snapshot_every == 0;
            if periodic && self.screen_matches(regex, deadline).await? {
                return Ok(());
            }
        }
    }

    /// Snapshot and match. A snapshot that times out inside the deadline
    /// counts as no match; the deadline still governs the overall wait.
    async fn screen_matches(
        &mut self,
        regex: &Regex,
        deadline: Instant,
    ) -> Result<bool, SessionError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(false);
        }
        let snapshot_timeout = self.config.timing.snapshot_timeout.min(remaining);
        match self.request_snapshot(snapshot_timeout).await {
            Ok(snapshot) => Ok(regex.is_match(&snapshot.text)),
            Err(SessionError::SnapshotTimeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Wait for `pattern` to disappear, using the configured expect timeout.
    pub async fn expect_absent(&mut self, pattern: &str) -> Result<(), SessionError> {
        let timeout = self.config.timing.expect_timeout;
        self.expect_absent_within(pattern, timeout).await
    }

    /// Wait up to `timeout` for a snapshot in which `pattern` does not match.
    pub async fn expect_absent_within(
        &mut self,
        pattern: &str,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        let regex = compile(pattern)?;
        let span = self.span.clone();
        async move {
            let mut deferred = Vec::new();
            let result = self.wait_for_absence(&regex, timeout, &mut deferred).await;
            self.events.put_back_all(deferred);
            result
        }
        .instrument(span)
        .await
    }

    async fn wait_for_absence(
        &mut self,
        regex: &Regex,
        timeout: Duration,
        deferred: &mut Vec<Event>,
    ) -> Result<(), SessionError> {
        self.ensure_running()?;
        let deadline = Instant::now() + timeout;
        let slice = self.config.timing.expect_poll_slice;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SessionError::PatternStillPresent {
                    pattern: regex.as_str().to_string(),
                    timeout,
                });
            }
            let snapshot_timeout = self.config.timing.snapshot_timeout.min(remaining);
            match self.request_snapshot(snapshot_timeout).await {
                Ok(snapshot) if !regex.is_match(&snapshot.text) => {
                    debug!("Pattern '{}' absent", regex.as_str());
                    return Ok(());
                }
                Ok(_) | Err(SessionError::SnapshotTimeout { .. }) => {}
                Err(e) => return Err(e),
            }

            tokio::time::sleep(slice.min(deadline.saturating_duration_since(Instant::now())))
                .await;
            while let Some(event) = self.events.try_pop() {
                match event {
                    Event::ExitCode { .. } | Event::Debug { .. } | Event::Unknown { .. } => {
                        deferred.push(event);
                    }
                    Event::Snapshot { .. } => self.note_stray_snapshot(),
                    other => trace!("Expect-absent drained {} event", other.name()),
                }
            }
        }
    }
}
