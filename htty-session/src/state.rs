//! Derived session state, written only by the stdout reader.

use htty_protocol::Event;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use crate::ledger::OutputLedger;

/// State the stdout reader derives from events as they are decoded.
///
/// Pid and exit code are write-once; the flags only go false -> true.
#[derive(Debug)]
pub struct SharedState {
    subprocess_pid: OnceLock<u32>,
    subprocess_exit_code: OnceLock<i32>,
    subprocess_exited: AtomicBool,
    subprocess_completed: AtomicBool,
    rows: AtomicU16,
    cols: AtomicU16,
    ledger: OutputLedger,
    changed: Notify,
}

impl SharedState {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            subprocess_pid: OnceLock::new(),
            subprocess_exit_code: OnceLock::new(),
            subprocess_exited: AtomicBool::new(false),
            subprocess_completed: AtomicBool::new(false),
            rows: AtomicU16::new(rows),
            cols: AtomicU16::new(cols),
            ledger: OutputLedger::new(),
            changed: Notify::new(),
        }
    }

    /// Apply the bookkeeping side effects of one decoded event.
    pub fn record(&self, event: &Event) {
        match event {
            Event::Output { seq } => {
                self.ledger.append(seq.clone());
            }
            Event::Pid { pid } => {
                if self.subprocess_pid.set(*pid).is_err() {
                    debug!("Ignoring repeated pid event ({})", pid);
                }
            }
            Event::ExitCode { code } => {
                let _ = self.subprocess_exit_code.set(*code);
                self.subprocess_exited.store(true, Ordering::SeqCst);
            }
            Event::CommandCompleted => {
                self.subprocess_completed.store(true, Ordering::SeqCst);
            }
            Event::Resize { rows, cols } => {
                self.rows.store(*rows, Ordering::SeqCst);
                self.cols.store(*cols, Ordering::SeqCst);
            }
            Event::Init | Event::Snapshot { .. } | Event::Debug { .. } | Event::Unknown { .. } => {
                return;
            }
        }
        self.changed.notify_waiters();
    }

    pub fn subprocess_pid(&self) -> Option<u32> {
        self.subprocess_pid.get().copied()
    }

    pub fn subprocess_exit_code(&self) -> Option<i32> {
        self.subprocess_exit_code.get().copied()
    }

    pub fn subprocess_exited(&self) -> bool {
        self.subprocess_exited.load(Ordering::SeqCst)
    }

    pub fn subprocess_completed(&self) -> bool {
        self.subprocess_completed.load(Ordering::SeqCst)
    }

    /// Current terminal size as (rows, cols)
    pub fn size(&self) -> (u16, u16) {
        (
            self.rows.load(Ordering::SeqCst),
            self.cols.load(Ordering::SeqCst),
        )
    }

    pub fn ledger(&self) -> &OutputLedger {
        &self.ledger
    }

    /// Wait until `ready` holds or `timeout` elapses. Returns the final value of `ready`.
    pub async fn wait_until(&self, ready: impl Fn(&Self) -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking, so a change between the
            // check and the await still wakes us.
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if ready(self) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return ready(self);
            }
        }
    }
}
