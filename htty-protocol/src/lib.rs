//! Wire types for talking to the `ht` terminal controller.
//!
//! The controller reads commands from its stdin and writes events to its
//! stdout, one JSON object per line:
//! - [`Command`] - what we send (`sendKeys`, `takeSnapshot`, `exit`)
//! - [`Event`] - what comes back, decoded once into a typed value
//! - [`Subscription`] - which events the controller is asked to emit
//! - [`Press`] - symbolic names for special keys

pub mod command;
pub mod event;
pub mod keys;
pub mod subscription;

// Controller flags and framing, used by command encoding and controller arguments
pub mod protocol;

pub use command::Command;
pub use event::{DecodeError, Event};
pub use keys::{key_to_wire, Press};
pub use subscription::{Subscription, DEFAULT_SUBSCRIPTIONS};
