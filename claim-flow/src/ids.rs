use std::sync::atomic::{AtomicU32, Ordering};

pub const CLAIM_PREFIX: &str = "CLM-";
pub const TOW_PREFIX: &str = "TOW-";

/// Hands out claim and tow ids. One allocator per desk, so tests never share
/// counters.
#[derive(Debug)]
pub struct IdAllocator {
    next_claim: AtomicU32,
    next_tow: AtomicU32,
}

impl IdAllocator {
    pub fn new(first_claim: u32, first_tow: u32) -> Self {
        Self {
            next_claim: AtomicU32::new(first_claim),
            next_tow: AtomicU32::new(first_tow),
        }
    }

    pub fn next_claim_id(&self) -> String {
        let n = self.next_claim.fetch_add(1, Ordering::SeqCst);
        format!("{CLAIM_PREFIX}{n}")
    }

    pub fn next_tow_id(&self) -> String {
        let n = self.next_tow.fetch_add(1, Ordering::SeqCst);
        format!("{TOW_PREFIX}{n}")
    }

    /// Moves the counters past an id that already exists.
    pub fn observe(&self, existing_id: &str) {
        let (counter, digits) = if let Some(rest) = existing_id.strip_prefix(CLAIM_PREFIX) {
            (&self.next_claim, rest)
        } else if let Some(rest) = existing_id.strip_prefix(TOW_PREFIX) {
            (&self.next_tow, rest)
        } else {
            return;
        };
        if let Ok(n) = digits.parse::<u32>() {
            counter.fetch_max(n.saturating_add(1), Ordering::SeqCst);
        }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(1001, 5001)
    }
}
