//! # Payload-less notifications.
//!
//! An [`Event`] carries no data: its meaning is implied by the generator, dispatcher
//! and handler that move it. It only records ordering metadata for diagnostics.
//!
//! ## Ordering guarantees
//! Each event has a process-wide sequence number (`seq`) that increases monotonically.
//! Events counted by a suspended dispatcher lose their individuality: on resume the
//! dispatcher mints fresh events, one per counted notification.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Opaque notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
}

impl Event {
    /// Creates an event with the current timestamp and the next sequence number.
    pub fn new() -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
        }
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new();
        let b = Event::new();
        assert!(b.seq > a.seq);
    }
}
