//! # Time Source
//!
//! The engine has no scheduler. Expiry, due dates and defaults are derived
//! from stored timestamps whenever a loan is touched, so the only thing a
//! component needs is "what time is it now". That question is answered by
//! a [`Clock`] handed in at construction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::identity::Timestamp;

/// A source of the current Unix time in seconds.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// Shared clock handle passed into registries and ledgers.
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // Pre-1970 clocks are clamped to zero.
        Utc::now().timestamp().max(0) as Timestamp
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can keep one clone
/// and advance time under a registry holding another.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock pinned at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Moves the clock to an absolute instant.
    pub fn set(&self, at: Timestamp) {
        self.now.store(at, Ordering::SeqCst);
    }

    /// Moves the clock forward by `secs` and returns the new instant.
    pub fn advance(&self, secs: u64) -> Timestamp {
        self.now.fetch_add(secs, Ordering::SeqCst) + secs
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let handle: SharedClock = Arc::new(clock.clone());
        assert_eq!(handle.now(), 1_000);

        assert_eq!(clock.advance(60), 1_060);
        assert_eq!(handle.now(), 1_060);

        clock.set(5);
        assert_eq!(handle.now(), 5);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
