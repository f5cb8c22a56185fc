//! # Protocol Events
//!
//! Observable record of every committed state change. Events are appended
//! to an [`EventLog`] shared by the registry and all of its ledgers, and
//! mirrored to `tracing` at `info` level.
//!
//! Failed operations emit nothing, with one exception: a lazy expiry or
//! default flip is committed even though the triggering call fails, and its
//! event is emitted with it.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::identity::{Address, LoanId, PoolId};

/// An event produced by the lending engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "PascalCase")]
pub enum LendingEvent {
    /// A pool was created and its ledger bound.
    PoolCreated {
        pool_id: PoolId,
        ledger_address: Address,
    },
    /// A borrower opened a loan request.
    LoanRequested {
        pool_id: PoolId,
        loan_id: LoanId,
        payment_cycle_amount: u64,
    },
    /// A lender funded a pending loan.
    LoanAccepted { pool_id: PoolId, loan_id: LoanId },
    /// An installment was paid without closing the loan.
    InstallmentPaid {
        pool_id: PoolId,
        loan_id: LoanId,
        amount: u64,
    },
    /// The outstanding balance reached zero.
    LoanRepaidInFull { pool_id: PoolId, loan_id: LoanId },
    /// The loan was found past its default window.
    LoanDefaulted { pool_id: PoolId, loan_id: LoanId },
    /// Acceptance was attempted after the request lapsed.
    LoanExpired { pool_id: PoolId, loan_id: LoanId },
}

impl fmt::Display for LendingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LendingEvent::PoolCreated {
                pool_id,
                ledger_address,
            } => write!(f, "PoolCreated(pool={pool_id}, ledger={ledger_address})"),
            LendingEvent::LoanRequested {
                pool_id,
                loan_id,
                payment_cycle_amount,
            } => write!(
                f,
                "LoanRequested(pool={pool_id}, loan={loan_id}, cycle_amount={payment_cycle_amount})"
            ),
            LendingEvent::LoanAccepted { pool_id, loan_id } => {
                write!(f, "LoanAccepted(pool={pool_id}, loan={loan_id})")
            }
            LendingEvent::InstallmentPaid {
                pool_id,
                loan_id,
                amount,
            } => write!(
                f,
                "InstallmentPaid(pool={pool_id}, loan={loan_id}, amount={amount})"
            ),
            LendingEvent::LoanRepaidInFull { pool_id, loan_id } => {
                write!(f, "LoanRepaidInFull(pool={pool_id}, loan={loan_id})")
            }
            LendingEvent::LoanDefaulted { pool_id, loan_id } => {
                write!(f, "LoanDefaulted(pool={pool_id}, loan={loan_id})")
            }
            LendingEvent::LoanExpired { pool_id, loan_id } => {
                write!(f, "LoanExpired(pool={pool_id}, loan={loan_id})")
            }
        }
    }
}

/// Append-only event sink. Clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<LendingEvent>>>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event.
    pub fn emit(&self, event: LendingEvent) {
        info!(%event, "event");
        self.events.lock().push(event);
    }

    /// Copy of every event recorded so far.
    pub fn snapshot(&self) -> Vec<LendingEvent> {
        self.events.lock().clone()
    }

    /// Removes and returns every recorded event.
    pub fn drain(&self) -> Vec<LendingEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// The most recent event, if any.
    pub fn last(&self) -> Option<LendingEvent> {
        self.events.lock().last().cloned()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_log() {
        let log = EventLog::new();
        let other = log.clone();
        other.emit(LendingEvent::LoanAccepted {
            pool_id: 1,
            loan_id: 0,
        });
        assert_eq!(log.len(), 1);
        assert_eq!(
            log.last(),
            Some(LendingEvent::LoanAccepted {
                pool_id: 1,
                loan_id: 0
            })
        );
    }

    #[test]
    fn drain_empties_the_log() {
        let log = EventLog::new();
        log.emit(LendingEvent::LoanExpired {
            pool_id: 1,
            loan_id: 3,
        });
        assert_eq!(log.drain().len(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = LendingEvent::InstallmentPaid {
            pool_id: 2,
            loan_id: 4,
            amount: 333,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "InstallmentPaid");
        assert_eq!(json["amount"], 333);
        assert_eq!(
            event.to_string(),
            "InstallmentPaid(pool=2, loan=4, amount=333)"
        );
    }
}
