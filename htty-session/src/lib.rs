//! htty Session Library
//!
//! Drives terminal programs through the `ht` controller, which runs a
//! command in a pseudoterminal and speaks JSON lines on its stdio.
//!
//! # Overview
//!
//! The library provides:
//! - `Session` - one program under the controller, with keys, snapshots,
//!   pattern waits and shutdown
//! - `SessionConfig` / `Timing` - command, terminal size and wait bounds
//! - `with_session` - a scoped session that is always exited
//! - `render::ansi_to_html` - snapshot markup
//!
//! # Example
//!
//! ```ignore
//! use htty_session::{Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new(["vim", "notes.txt"]).with_size(20, 50);
//!     let mut session = Session::spawn(config).await?;
//!
//!     session.expect("notes.txt").await?;
//!     session.send_keys(["ihello", "Escape"]).await?;
//!
//!     let snapshot = session.snapshot().await?;
//!     for line in snapshot.trimmed_lines() {
//!         println!("{}", line);
//!     }
//!
//!     session.send_keys([":q!", "Enter"]).await?;
//!     let code = session.exit().await?;
//!     println!("controller exited with {}", code);
//!     Ok(())
//! }
//! ```

mod binary;
mod channel;
mod config;
mod error;
mod exit;
mod expect;
mod ledger;
mod process;
mod reader;
pub mod render;
mod session;
mod snapshot;
mod state;
mod writer;

pub use binary::{find_ht_binary, HT_BIN_ENV};
pub use config::{SessionConfig, Timing, DEFAULT_COLS, DEFAULT_ROWS};
pub use error::SessionError;
pub use ledger::LedgerEntry;
pub use session::{with_session, Session};
pub use snapshot::SnapshotResult;

// Re-export the wire types callers need
pub use htty_protocol::{key_to_wire, Press, Subscription};
