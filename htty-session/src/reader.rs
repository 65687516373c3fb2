//! Background tasks draining the controller's stdout and stderr.

use htty_protocol::Event;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn, Instrument, Span};

use crate::channel::EventSender;
use crate::state::SharedState;

/// Spawn the stdout reader: decode each line, record it, and forward it.
///
/// Runs until the controller closes stdout. Undecodable lines are logged
/// and dropped; nothing stops the loop short of end-of-stream.
pub(crate) fn spawn_stdout_reader<R>(
    stdout: R,
    events: EventSender,
    state: Arc<SharedState>,
    span: Span,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(
        async move {
            debug!("Stdout reader started");
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::with_capacity(4096);
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        handle_line(line.trim(), &events, &state);
                    }
                    Err(e) => {
                        warn!("Error reading controller stdout: {}", e);
                        break;
                    }
                }
            }
            debug!("Controller stdout closed, stdout reader exiting");
        }
        .instrument(span),
    )
}

fn handle_line(line: &str, events: &EventSender, state: &SharedState) {
    if line.is_empty() {
        return;
    }
    match Event::from_line(line) {
        Ok(event) => {
            trace!("Controller event: {:?}", event);
            match &event {
                Event::Pid { pid } => debug!("Subprocess pid: {}", pid),
                Event::ExitCode { code } => debug!("Subprocess exited with code {}", code),
                Event::CommandCompleted => debug!("Subprocess command completed"),
                Event::Debug { payload } => debug!("Controller debug: {}", payload),
                _ => {}
            }
            state.record(&event);
            events.push(event);
        }
        Err(e) => {
            warn!("Dropping undecodable controller stdout: {} (error: {})", line, e);
        }
    }
}

/// Spawn the stderr reader. Lines are diagnostics only and never touch session state.
///
/// Keeping this pipe drained stops a chatty controller from blocking on a full buffer.
pub(crate) fn spawn_stderr_reader<R>(stderr: R, span: Span) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(
        async move {
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::with_capacity(1024);
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim();
                        if !line.is_empty() {
                            debug!("Controller stderr: {}", line);
                        }
                    }
                    Err(e) => {
                        warn!("Error reading controller stderr: {}", e);
                        break;
                    }
                }
            }
            debug!("Controller stderr closed, stderr reader exiting");
        }
        .instrument(span),
    )
}
