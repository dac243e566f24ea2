//! View command layer.
//!
//! One module per view. Commands take the shared [`crate::AppState`] plus a
//! JSON payload and return `Result<serde_json::Value, String>`, the seam a
//! shell binds its invoke bridge to. Each view owns an explicit state struct
//! mutated only through these handlers.

use std::sync::atomic::{AtomicU64, Ordering};

pub mod branches;
pub mod cashier;
pub mod discounts;
pub mod reports;
pub mod settings;
pub mod users;

/// Ticket dispenser for superseding in-flight fetches.
///
/// The UI does not cancel a request when the user changes the query mid
/// flight; instead every fetch takes a ticket and a completion is applied
/// only while its ticket is still the most recent one, so a slow earlier
/// response can never overwrite a later one.
#[derive(Debug, Default)]
pub struct FetchGuard {
    seq: AtomicU64,
}

impl FetchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new fetch, invalidating every outstanding ticket.
    pub fn begin(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether `ticket` is still the most recent fetch.
    pub fn is_current(&self, ticket: u64) -> bool {
        self.seq.load(Ordering::SeqCst) == ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_tickets_invalidate_earlier_ones() {
        let guard = FetchGuard::new();
        let first = guard.begin();
        assert!(guard.is_current(first));

        let second = guard.begin();
        assert!(!guard.is_current(first));
        assert!(guard.is_current(second));
    }
}
