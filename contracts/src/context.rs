//! Handles to the collaborators every ledger needs.
//!
//! The registry holds one [`LedgerContext`] and hands a clone to each ledger
//! it binds. Cloning copies handles, not state: all ledgers of a deployment
//! read the same fee authority and verifier, move value through the same
//! token ledger, and append to the same event log.

use peerpool_protocol::{
    EventLog, SharedClock, SharedFeeAuthority, SharedTokenLedger, SharedVerifier,
};

/// Shared collaborators of the registry and its ledgers.
#[derive(Clone)]
pub struct LedgerContext {
    /// Membership verifier; ledgers read it, the registry writes it.
    pub verifier: SharedVerifier,
    /// Fee authority consulted on every settlement.
    pub fees: SharedFeeAuthority,
    /// Token ledger all settlements run against.
    pub tokens: SharedTokenLedger,
    /// Time source for every lazily derived transition.
    pub clock: SharedClock,
    /// Sink for protocol events.
    pub events: EventLog,
}

impl LedgerContext {
    /// Bundles the handles.
    pub fn new(
        verifier: SharedVerifier,
        fees: SharedFeeAuthority,
        tokens: SharedTokenLedger,
        clock: SharedClock,
        events: EventLog,
    ) -> Self {
        Self {
            verifier,
            fees,
            tokens,
            clock,
            events,
        }
    }
}
