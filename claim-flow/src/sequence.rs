use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Proof that a request was issued for `slot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub slot: String,
    pub sequence: u64,
}

/// Discards responses that arrive after a newer request for the same slot.
///
/// There is no cancellation: a stale call still runs to completion, its
/// result is simply ignored.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    counter: AtomicU64,
    latest: DashMap<String, u64>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, slot: impl Into<String>) -> RequestTicket {
        let slot = slot.into();
        let sequence = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.latest.insert(slot.clone(), sequence);
        RequestTicket { slot, sequence }
    }

    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        let current = self
            .latest
            .get(&ticket.slot)
            .is_some_and(|latest| *latest == ticket.sequence);
        if !current {
            debug!(slot = %ticket.slot, sequence = ticket.sequence, "Discarding stale response");
        }
        current
    }
}
