//! Core session management

use futures_util::future::BoxFuture;
use regex::Regex;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, ChildStdin, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument, Span};
use uuid::Uuid;

use crate::binary;
use crate::channel::EventChannel;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::ledger::LedgerEntry;
use crate::process::exit_code_from_status;
use crate::reader;
use crate::state::SharedState;
use crate::writer::CommandWriter;

/// One program running under the ht controller.
///
/// The controller is spawned with piped stdio. Two background tasks drain
/// its stdout and stderr for as long as it runs; stdout lines are decoded
/// into events, recorded in shared state, and queued for whichever
/// operation is currently waiting.
///
/// Operations take `&mut self`, so at most one of them is in flight at a
/// time. Every wait is bounded by the session's [`Timing`](crate::Timing).
///
/// Dropping a session kills the controller. Call [`Session::exit`] (or use
/// [`with_session`]) to shut down cleanly and learn the exit code.
#[derive(Debug)]
pub struct Session {
    pub(crate) id: Uuid,
    pub(crate) config: SessionConfig,
    pub(crate) controller: Child,
    pub(crate) controller_pid: Option<u32>,
    pub(crate) writer: CommandWriter<ChildStdin>,
    pub(crate) events: EventChannel,
    pub(crate) state: Arc<SharedState>,
    /// Set once the controller has been reaped
    pub(crate) controller_exit_code: Option<i32>,
    /// Snapshot requests given up on whose answers have not arrived yet
    pub(crate) stale_snapshots: usize,
    pub(crate) span: Span,
}

impl Session {
    /// Spawn the controller for `config.command` with a fresh session span.
    pub async fn spawn(config: SessionConfig) -> Result<Self, SessionError> {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("htty_session", id = %id);
        Self::start(id, config, span).await
    }

    /// Spawn inside a caller-supplied span.
    ///
    /// Reader tasks and every operation on the session log under `span`.
    pub async fn spawn_in_span(config: SessionConfig, span: Span) -> Result<Self, SessionError> {
        Self::start(Uuid::new_v4(), config, span).await
    }

    async fn start(id: Uuid, config: SessionConfig, span: Span) -> Result<Self, SessionError> {
        let session = Self::spawn_controller(id, config, span.clone())
            .instrument(span.clone())
            .await?;
        session.await_startup().instrument(span).await;
        Ok(session)
    }

    async fn spawn_controller(
        id: Uuid,
        config: SessionConfig,
        span: Span,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let ht_path = binary::resolve(config.ht_path.as_deref())?;
        let args = config.controller_args();
        info!("Spawning controller: {} {}", ht_path.display(), args.join(" "));

        let mut cmd = Command::new(&ht_path);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_directory {
            cmd.current_dir(dir);
        }

        let mut controller = cmd.spawn().map_err(SessionError::SpawnFailed)?;
        let controller_pid = controller.id();

        let stdin = controller.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = controller
            .stdout
            .take()
            .ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = controller
            .stderr
            .take()
            .ok_or_else(|| missing_pipe("stderr"))?;

        let state = Arc::new(SharedState::new(config.rows, config.cols));
        let events = EventChannel::new();
        reader::spawn_stdout_reader(stdout, events.sender(), Arc::clone(&state), span.clone());
        reader::spawn_stderr_reader(stderr, span.clone());

        debug!("Controller started with pid {:?}", controller_pid);

        Ok(Self {
            id,
            config,
            controller,
            controller_pid,
            writer: CommandWriter::new(stdin),
            events,
            state,
            controller_exit_code: None,
            stale_snapshots: 0,
            span,
        })
    }

    /// Wait for the subprocess pid, without consuming any queued events.
    async fn await_startup(&self) {
        let timing = &self.config.timing;
        let started = self
            .state
            .wait_until(
                |s| s.subprocess_pid().is_some() || s.subprocess_exited(),
                timing.startup_timeout,
            )
            .await;
        if !started {
            warn!(
                "Subprocess pid not reported within {:?}, continuing anyway",
                timing.startup_timeout
            );
        }
        tokio::time::sleep(timing.settle_delay).await;
    }

    /// Get the session ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the session config
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The tracing span this session logs under
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Pid of the ht controller process
    pub fn controller_pid(&self) -> Option<u32> {
        self.controller_pid
    }

    /// The controller's exit code, once [`Session::exit`] or
    /// [`Session::terminate`] has reaped it
    pub fn exit_code(&self) -> Option<i32> {
        self.controller_exit_code
    }

    /// Pid of the program running in the terminal, as reported by the controller
    pub fn subprocess_pid(&self) -> Option<u32> {
        self.state.subprocess_pid()
    }

    pub fn subprocess_exit_code(&self) -> Option<i32> {
        self.state.subprocess_exit_code()
    }

    pub fn subprocess_exited(&self) -> bool {
        self.state.subprocess_exited()
    }

    pub fn subprocess_completed(&self) -> bool {
        self.state.subprocess_completed()
    }

    /// Current terminal size as (rows, cols)
    pub fn size(&self) -> (u16, u16) {
        self.state.size()
    }

    /// Every `output` event received so far
    pub fn output(&self) -> Vec<LedgerEntry> {
        self.state.ledger().entries()
    }

    /// All output received so far, concatenated
    pub fn output_text(&self) -> String {
        self.state.ledger().text()
    }

    /// Has `pattern` ever appeared in the raw output?
    pub fn output_matches(&self, pattern: &str) -> Result<bool, SessionError> {
        let regex = compile(pattern)?;
        Ok(self.state.ledger().contains_match(&regex))
    }

    /// Fail with `ProcessNotRunning` if the controller has exited.
    pub(crate) fn ensure_running(&mut self) -> Result<(), SessionError> {
        if let Some(code) = self.controller_exit_code {
            return Err(SessionError::ProcessNotRunning {
                exit_code: Some(code),
            });
        }
        match self.controller.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => {
                let code = exit_code_from_status(status);
                debug!("Controller already exited with {:?}", code);
                self.controller_exit_code = code;
                Err(SessionError::ProcessNotRunning { exit_code: code })
            }
            Err(e) => {
                warn!("Could not query controller status: {}", e);
                Err(SessionError::ProcessNotRunning { exit_code: None })
            }
        }
    }

    /// Send keys, then pause for the terminal to catch up.
    ///
    /// Strings go to the controller as given, so `"end"` types three
    /// letters. Pass [`Press`](crate::Press) values for special keys.
    /// Sending after the subprocess has exited is allowed; the controller
    /// simply ignores the input.
    pub async fn send_keys<I, K>(&mut self, keys: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let span = self.span.clone();
        async move {
            self.ensure_running()?;
            debug!("Sending {} key(s)", keys.len());
            self.writer.send_keys(keys).await?;
            tokio::time::sleep(self.config.timing.settle_delay).await;
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Wait for the subprocess to finish, returning its exit code if reported.
    pub async fn wait_for_subprocess(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<i32>, SessionError> {
        let deadline = Instant::now() + timeout;
        let slice = self.config.timing.poll_interval;
        loop {
            if self.state.subprocess_exited() || self.state.subprocess_completed() {
                return Ok(self.state.subprocess_exit_code());
            }
            if self.subprocess_gone() {
                debug!("Subprocess no longer alive, exit code not yet reported");
                // Give the in-flight exitCode event a moment to land
                self.state
                    .wait_until(|s| s.subprocess_exited(), slice)
                    .await;
                return Ok(self.state.subprocess_exit_code());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SessionError::SubprocessWaitTimeout { timeout });
            }
            self.state
                .wait_until(
                    |s| s.subprocess_exited() || s.subprocess_completed(),
                    slice.min(deadline - now),
                )
                .await;
        }
    }

    #[cfg(unix)]
    fn subprocess_gone(&self) -> bool {
        self.state
            .subprocess_pid()
            .is_some_and(|pid| !crate::process::is_alive(pid))
    }

    #[cfg(not(unix))]
    fn subprocess_gone(&self) -> bool {
        false
    }
}

pub(crate) fn compile(pattern: &str) -> Result<Regex, SessionError> {
    Regex::new(pattern).map_err(|source| SessionError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

fn missing_pipe(name: &str) -> SessionError {
    SessionError::SpawnFailed(std::io::Error::other(format!(
        "controller {} was not captured",
        name
    )))
}

/// Spawn a session, run `body` with it, and always exit afterwards.
///
/// The session is exited on both the success and error paths. An error
/// from `body` takes precedence over an error from exiting.
///
/// ```ignore
/// let text = with_session(SessionConfig::new(["vim"]), |s| {
///     Box::pin(async move {
///         s.send_keys(["ihello", "Escape"]).await?;
///         Ok(s.snapshot().await?.text)
///     })
/// })
/// .await?;
/// ```
pub async fn with_session<T, F>(config: SessionConfig, body: F) -> Result<T, SessionError>
where
    F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T, SessionError>>,
{
    let mut session = Session::spawn(config).await?;
    let result = body(&mut session).await;
    let exited = session.exit().await;
    match (result, exited) {
        (Err(e), Err(exit_err)) => {
            warn!("Error exiting session after failure: {}", exit_err);
            Err(e)
        }
        (Err(e), Ok(_)) => Err(e),
        (Ok(_), Err(exit_err)) => Err(exit_err),
        (Ok(value), Ok(_)) => Ok(value),
    }
}
