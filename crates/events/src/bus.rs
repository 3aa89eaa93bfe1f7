//! Sequenced broadcast of session progress events
//!
//! The bus stamps every envelope with the next sequence number and sends it
//! while holding the same lock, so receivers always observe strictly
//! increasing sequences even when several sessions publish concurrently.

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::types::{Event, EventEnvelope};

const DEFAULT_CAPACITY: usize = 1024;

/// Publishing never blocks. Slow subscribers lag and lose the oldest events
/// rather than holding up a session.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    /// Last sequence handed out. Guards the send as well.
    last_sequence: Arc<Mutex<u64>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            last_sequence: Arc::new(Mutex::new(0)),
        }
    }

    /// Wrap `event` in an envelope, stamp it and broadcast it.
    ///
    /// Returns the sequence number given to the event. Sequences start at 1
    /// and advance even when nobody is subscribed.
    pub fn publish(&self, event: Event) -> u64 {
        let mut last = self
            .last_sequence
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last += 1;
        let sequence = *last;
        // No receivers is fine: the event is simply dropped.
        let _ = self
            .sender
            .send(EventEnvelope::new(event).with_sequence(sequence));
        sequence
    }

    /// Events published before this call are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn last_sequence(&self) -> u64 {
        *self
            .last_sequence
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("last_sequence", &self.last_sequence())
            .finish()
    }
}
