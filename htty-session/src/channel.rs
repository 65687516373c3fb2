//! FIFO transport of decoded events from the stdout reader to the active operation.

use htty_protocol::Event;
use std::time::Duration;
use tokio::sync::mpsc;

/// Producer half, owned by the stdout reader.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSender {
    /// Append at the tail. Never blocks; an event sent after the session is gone is dropped.
    pub fn push(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event channel closed, dropping event");
        }
    }
}

/// Unbounded event queue with a single consumer at a time.
///
/// Consumers may hand back events they looked at but do not want with
/// [`EventChannel::put_back`]. Put-back events re-enter at the tail, so they
/// lose their position relative to events that arrived meanwhile. This is
/// only sound while one operation at a time drains the channel.
#[derive(Debug)]
pub struct EventChannel {
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl EventChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// A producer handle for the reader task.
    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Remove the head, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` if nothing arrived in time.
    pub async fn pop(&mut self, timeout: Duration) -> Option<Event> {
        // We hold a sender ourselves, so recv() only ever yields Some
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Remove the head if one is already queued.
    pub fn try_pop(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Re-insert an event at the tail for the next consumer.
    pub fn put_back(&self, event: Event) {
        // Cannot fail: the receiver lives in self
        let _ = self.tx.send(event);
    }

    /// Re-insert several held-aside events, preserving their relative order.
    pub fn put_back_all(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.put_back(event);
        }
    }
}
