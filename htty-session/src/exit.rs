//! Shutting a session down.
//!
//! Two paths lead to a reaped controller. The graceful one asks the
//! controller to exit and waits. The forced one signals the subprocess,
//! then the controller, escalating to SIGKILL where a signal is ignored.
//! Both end with the controller's exit code, signal deaths reported as `-N`.

use std::process::ExitStatus;
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};

use crate::error::SessionError;
use crate::process::exit_code_from_status;
use crate::session::Session;

impl Session {
    /// Exit the session, bounded by the configured exit timeout.
    ///
    /// Idempotent: once the controller has been reaped, later calls return
    /// the same code immediately.
    pub async fn exit(&mut self) -> Result<i32, SessionError> {
        let timeout = self.config.timing.exit_timeout;
        self.exit_within(timeout).await
    }

    pub async fn exit_within(&mut self, timeout: Duration) -> Result<i32, SessionError> {
        let span = self.span.clone();
        async move {
            if let Some(code) = self.reaped_exit_code() {
                return Ok(code);
            }

            let grace = self.config.timing.exit_grace_window;
            let subprocess_done = self.state.subprocess_exited()
                || self
                    .state
                    .wait_until(|s| s.subprocess_exited(), grace)
                    .await;

            if subprocess_done {
                debug!("Subprocess has exited, shutting down controller gracefully");
                self.graceful_exit(timeout).await
            } else {
                debug!("Subprocess still running after {:?}, forcing shutdown", grace);
                self.forced_exit(timeout).await
            }
        }
        .instrument(span)
        .await
    }

    /// Kill the subprocess and the controller without asking first.
    ///
    /// Idempotent like [`Session::exit`].
    pub async fn terminate(&mut self) -> Result<i32, SessionError> {
        let span = self.span.clone();
        let timeout = self.config.timing.exit_timeout;
        async move {
            if let Some(code) = self.reaped_exit_code() {
                return Ok(code);
            }
            self.forced_exit(timeout).await
        }
        .instrument(span)
        .await
    }

    /// The controller's code if it is already gone, reaping it if needed.
    fn reaped_exit_code(&mut self) -> Option<i32> {
        if let Some(code) = self.controller_exit_code {
            return Some(code);
        }
        match self.controller.try_wait() {
            Ok(Some(status)) => self.record_controller_exit(status).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("Could not query controller status: {}", e);
                None
            }
        }
    }

    fn record_controller_exit(&mut self, status: ExitStatus) -> Result<i32, SessionError> {
        let code = exit_code_from_status(status).ok_or(SessionError::ExitCodeIndeterminate {
            controller_pid: self.controller_pid,
        })?;
        info!("Controller exited with code {}", code);
        self.controller_exit_code = Some(code);
        Ok(code)
    }

    async fn graceful_exit(&mut self, timeout: Duration) -> Result<i32, SessionError> {
        if let Err(e) = self.writer.exit_command().await {
            // The controller may already be on its way out
            debug!("Exit command not delivered: {}", e);
        }

        match tokio::time::timeout(timeout, self.controller.wait()).await {
            Ok(Ok(status)) => self.record_controller_exit(status),
            Ok(Err(e)) => {
                warn!("Error waiting for controller: {}, forcing shutdown", e);
                self.forced_exit(timeout).await
            }
            Err(_) => {
                warn!(
                    "Controller did not exit within {:?} of exit command, forcing shutdown",
                    timeout
                );
                self.forced_exit(timeout).await
            }
        }
    }

    async fn forced_exit(&mut self, timeout: Duration) -> Result<i32, SessionError> {
        #[cfg(unix)]
        self.terminate_subprocess().await;

        #[cfg(unix)]
        if let Some(pid) = self.controller_pid {
            debug!("Sending SIGTERM to controller {}", pid);
            crate::process::send_signal(pid, crate::process::Signal::Term);
            match tokio::time::timeout(timeout, self.controller.wait()).await {
                Ok(Ok(status)) => {
                    self.writer.close().await;
                    return self.record_controller_exit(status);
                }
                Ok(Err(e)) => warn!("Error waiting for controller {}: {}", pid, e),
                Err(_) => warn!(
                    "Controller {} survived SIGTERM for {:?}, sending SIGKILL",
                    pid, timeout
                ),
            }
        }

        if let Err(e) = self.controller.start_kill() {
            warn!("Failed to kill controller: {}", e);
        }
        let waited = tokio::time::timeout(timeout, self.controller.wait()).await;
        self.writer.close().await;
        match waited {
            Ok(Ok(status)) => self.record_controller_exit(status),
            Ok(Err(e)) => {
                warn!("Error waiting for killed controller: {}", e);
                Err(SessionError::ExitCodeIndeterminate {
                    controller_pid: self.controller_pid,
                })
            }
            Err(_) => Err(SessionError::ExitCodeIndeterminate {
                controller_pid: self.controller_pid,
            }),
        }
    }

    /// SIGTERM the subprocess, escalating to SIGKILL if it outlives the wait bound.
    #[cfg(unix)]
    async fn terminate_subprocess(&self) {
        use crate::process::{is_alive, send_signal, Signal};

        let Some(pid) = self.state.subprocess_pid() else {
            return;
        };
        if self.state.subprocess_exited() || !is_alive(pid) {
            return;
        }

        let bound = self.config.timing.subprocess_wait_timeout;
        info!("Terminating subprocess {}", pid);
        send_signal(pid, Signal::Term);
        if self.wait_subprocess_death(pid, bound).await {
            return;
        }

        warn!(
            "Subprocess {} survived SIGTERM for {:?}, sending SIGKILL",
            pid, bound
        );
        send_signal(pid, Signal::Kill);
        if !self.wait_subprocess_death(pid, bound).await {
            warn!("Subprocess {} still present after SIGKILL", pid);
        }
    }

    #[cfg(unix)]
    async fn wait_subprocess_death(&self, pid: u32, bound: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + bound;
        let interval = self.config.timing.poll_interval;
        loop {
            if self.state.subprocess_exited() || !crate::process::is_alive(pid) {
                return true;
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.state
                .wait_until(|s| s.subprocess_exited(), interval.min(remaining))
                .await;
        }
    }
}
