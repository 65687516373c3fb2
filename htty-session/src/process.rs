//! Signal helpers for forced termination.

use std::process::ExitStatus;

/// Convert a wait status to an exit code. Death by signal N becomes `-N`.
pub fn exit_code_from_status(status: ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.code().or_else(|| status.signal().map(|sig| -sig))
    }
    #[cfg(not(unix))]
    {
        status.code()
    }
}

#[cfg(unix)]
pub use unix::{is_alive, send_signal, Signal};

#[cfg(unix)]
mod unix {
    use tracing::debug;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Signal {
        Term,
        Kill,
    }

    impl Signal {
        fn raw(self) -> libc::c_int {
            match self {
                Signal::Term => libc::SIGTERM,
                Signal::Kill => libc::SIGKILL,
            }
        }
    }

    /// Send `signal` to `pid`. Returns false if the process does not exist
    /// or cannot be signalled.
    pub fn send_signal(pid: u32, signal: Signal) -> bool {
        let Ok(raw_pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        // SAFETY: kill has no memory-safety preconditions
        let result = unsafe { libc::kill(raw_pid, signal.raw()) };
        if result != 0 {
            debug!(
                "kill({}, {:?}) failed: {}",
                pid,
                signal,
                std::io::Error::last_os_error()
            );
        }
        result == 0
    }

    /// Probe with signal 0. A zombie still counts as alive until reaped.
    pub fn is_alive(pid: u32) -> bool {
        let Ok(raw_pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        // SAFETY: signal 0 performs only the permission and existence check
        unsafe { libc::kill(raw_pid, 0) == 0 }
    }
}
