//! # Membership Verifier (Attestation Service)
//!
//! Records, per pool, which identities are attested lenders or borrowers
//! and until when. The service is the only writer of this state; the pool
//! registry is its single authorized writer and loan ledgers only read.
//!
//! Verification is evaluated at read time: an entry counts as verified only
//! while `now < expiration`, so a stale attestation stops working the moment
//! it lapses without anyone having to remove it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::identity::{Address, PoolId, Timestamp};

/// Errors from the attestation service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttestationError {
    /// Only the service's authority may write attestations.
    #[error("unauthorized: {caller} may not write attestations")]
    Unauthorized {
        /// Identity that attempted the write.
        caller: Address,
    },

    /// The attestation would already be expired.
    #[error("invalid expiration {expiration}: must be after {now}")]
    InvalidExpiration {
        /// Requested expiration.
        expiration: Timestamp,
        /// Time of the request.
        now: Timestamp,
    },

    /// The empty identity cannot be attested.
    #[error("cannot attest the empty identity")]
    EmptyIdentity,
}

/// The capacity in which an identity participates in a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Funds loans.
    Lender,
    /// Requests loans.
    Borrower,
}

impl Role {
    /// Single-byte tag used in storage keys.
    pub fn tag(self) -> u8 {
        match self {
            Role::Lender => 0,
            Role::Borrower => 1,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Lender => write!(f, "lender"),
            Role::Borrower => write!(f, "borrower"),
        }
    }
}

/// A stored attestation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipEntry {
    /// Instant at which the attestation stops counting.
    pub expiration: Timestamp,
    /// Instant the attestation was written.
    pub attested_at: Timestamp,
}

/// Result of a verification query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// `true` while an entry exists and has not expired.
    pub is_verified: bool,
    /// Stored expiration, or `0` when there is no entry.
    pub expiration: Timestamp,
}

/// The membership interface the registry and ledgers consume.
pub trait MembershipVerifier: Send + Sync {
    /// Whether `identity` holds `role` in `pool_id` at `now`.
    fn is_verified(&self, pool_id: PoolId, role: Role, identity: &Address, now: Timestamp)
        -> Verification;

    /// Writes or replaces an attestation.
    fn set_verification(
        &mut self,
        caller: &Address,
        pool_id: PoolId,
        role: Role,
        identity: &Address,
        expiration: Timestamp,
        now: Timestamp,
    ) -> Result<(), AttestationError>;

    /// Removes an attestation. Returns whether one existed.
    fn revoke(
        &mut self,
        caller: &Address,
        pool_id: PoolId,
        role: Role,
        identity: &Address,
    ) -> Result<bool, AttestationError>;
}

/// Shared handle to the membership verifier.
pub type SharedVerifier = Arc<RwLock<dyn MembershipVerifier>>;

/// Storage key of an attestation.
pub type MembershipKey = (PoolId, Role, Address);

/// In-memory attestation service with a single authorized writer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttestationRegistry {
    authority: Address,
    entries: BTreeMap<MembershipKey, MembershipEntry>,
}

impl AttestationRegistry {
    /// Creates an empty service that accepts writes only from `authority`.
    pub fn new(authority: Address) -> Self {
        Self {
            authority,
            entries: BTreeMap::new(),
        }
    }

    /// Rebuilds a service from persisted entries.
    pub fn from_entries(
        authority: Address,
        entries: impl IntoIterator<Item = (MembershipKey, MembershipEntry)>,
    ) -> Self {
        Self {
            authority,
            entries: entries.into_iter().collect(),
        }
    }

    /// The identity allowed to write.
    pub fn authority(&self) -> &Address {
        &self.authority
    }

    /// Every stored entry, expired ones included, in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&MembershipKey, &MembershipEntry)> {
        self.entries.iter()
    }

    /// The raw entry for a key, if any.
    pub fn entry(&self, pool_id: PoolId, role: Role, identity: &Address) -> Option<&MembershipEntry> {
        self.entries.get(&(pool_id, role, identity.clone()))
    }

    fn ensure_authority(&self, caller: &Address) -> Result<(), AttestationError> {
        if caller != &self.authority {
            return Err(AttestationError::Unauthorized {
                caller: caller.clone(),
            });
        }
        Ok(())
    }
}

impl MembershipVerifier for AttestationRegistry {
    fn is_verified(
        &self,
        pool_id: PoolId,
        role: Role,
        identity: &Address,
        now: Timestamp,
    ) -> Verification {
        match self.entry(pool_id, role, identity) {
            Some(entry) => Verification {
                is_verified: now < entry.expiration,
                expiration: entry.expiration,
            },
            None => Verification {
                is_verified: false,
                expiration: 0,
            },
        }
    }

    fn set_verification(
        &mut self,
        caller: &Address,
        pool_id: PoolId,
        role: Role,
        identity: &Address,
        expiration: Timestamp,
        now: Timestamp,
    ) -> Result<(), AttestationError> {
        self.ensure_authority(caller)?;
        if identity.is_empty() {
            return Err(AttestationError::EmptyIdentity);
        }
        if expiration <= now {
            return Err(AttestationError::InvalidExpiration { expiration, now });
        }
        debug!(pool_id, %role, identity = %identity, expiration, "attestation written");
        self.entries.insert(
            (pool_id, role, identity.clone()),
            MembershipEntry {
                expiration,
                attested_at: now,
            },
        );
        Ok(())
    }

    fn revoke(
        &mut self,
        caller: &Address,
        pool_id: PoolId,
        role: Role,
        identity: &Address,
    ) -> Result<bool, AttestationError> {
        self.ensure_authority(caller)?;
        let existed = self
            .entries
            .remove(&(pool_id, role, identity.clone()))
            .is_some();
        debug!(pool_id, %role, identity = %identity, existed, "attestation revoked");
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (AttestationRegistry, Address) {
        let authority = Address::new("registry");
        (AttestationRegistry::new(authority.clone()), authority)
    }

    #[test]
    fn unknown_identity_is_unverified() {
        let (svc, _) = registry();
        let v = svc.is_verified(1, Role::Lender, &Address::new("alice"), 100);
        assert_eq!(
            v,
            Verification {
                is_verified: false,
                expiration: 0
            }
        );
    }

    #[test]
    fn verification_lapses_at_expiration() {
        let (mut svc, auth) = registry();
        let alice = Address::new("alice");
        svc.set_verification(&auth, 1, Role::Lender, &alice, 200, 100)
            .unwrap();

        assert!(svc.is_verified(1, Role::Lender, &alice, 199).is_verified);
        assert!(!svc.is_verified(1, Role::Lender, &alice, 200).is_verified);
        assert_eq!(svc.is_verified(1, Role::Lender, &alice, 200).expiration, 200);
    }

    #[test]
    fn roles_and_pools_are_independent() {
        let (mut svc, auth) = registry();
        let alice = Address::new("alice");
        svc.set_verification(&auth, 1, Role::Lender, &alice, 200, 100)
            .unwrap();
        assert!(!svc.is_verified(1, Role::Borrower, &alice, 150).is_verified);
        assert!(!svc.is_verified(2, Role::Lender, &alice, 150).is_verified);
    }

    #[test]
    fn only_authority_writes() {
        let (mut svc, _) = registry();
        let mallory = Address::new("mallory");
        let err = svc
            .set_verification(&mallory, 1, Role::Borrower, &mallory, 200, 100)
            .unwrap_err();
        assert!(matches!(err, AttestationError::Unauthorized { .. }));
        assert!(matches!(
            svc.revoke(&mallory, 1, Role::Borrower, &mallory),
            Err(AttestationError::Unauthorized { .. })
        ));
    }

    #[test]
    fn past_expiration_rejected() {
        let (mut svc, auth) = registry();
        let err = svc
            .set_verification(&auth, 1, Role::Lender, &Address::new("a"), 100, 100)
            .unwrap_err();
        assert_eq!(
            err,
            AttestationError::InvalidExpiration {
                expiration: 100,
                now: 100
            }
        );
    }

    #[test]
    fn revoke_removes_entry() {
        let (mut svc, auth) = registry();
        let bob = Address::new("bob");
        svc.set_verification(&auth, 3, Role::Borrower, &bob, 500, 0)
            .unwrap();
        assert!(svc.revoke(&auth, 3, Role::Borrower, &bob).unwrap());
        assert!(!svc.revoke(&auth, 3, Role::Borrower, &bob).unwrap());
        assert!(!svc.is_verified(3, Role::Borrower, &bob, 1).is_verified);
    }

    #[test]
    fn entries_round_trip_through_from_entries() {
        let (mut svc, auth) = registry();
        svc.set_verification(&auth, 1, Role::Lender, &Address::new("a"), 10, 0)
            .unwrap();
        let saved: Vec<_> = svc.entries().map(|(k, v)| (k.clone(), *v)).collect();
        let restored = AttestationRegistry::from_entries(auth, saved);
        assert!(restored.is_verified(1, Role::Lender, &Address::new("a"), 5).is_verified);
    }
}
