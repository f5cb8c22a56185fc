//! Opaque participant identities and deterministic ledger addresses.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::PoolId;
use crate::config::{LEDGER_ADDRESS_BYTES, LEDGER_ADDRESS_DOMAIN};

/// An opaque identity: an account, a token, or a contract instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Wraps a raw identity string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty identity, which is never a valid
    /// participant.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Address {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Derives the address of the loan ledger bound to `pool_id` by `registry`.
///
/// `0x` followed by the hex of the first [`LEDGER_ADDRESS_BYTES`] of
/// `BLAKE3(domain || registry || pool_id_be)`. Deterministic, so a restored
/// deployment rebinds every pool to the same ledger address.
pub fn derive_ledger_address(registry: &Address, pool_id: PoolId) -> Address {
    let mut hasher = blake3::Hasher::new();
    hasher.update(LEDGER_ADDRESS_DOMAIN);
    hasher.update(registry.as_str().as_bytes());
    hasher.update(&pool_id.to_be_bytes());
    let digest = hasher.finalize();
    Address(format!(
        "0x{}",
        hex::encode(&digest.as_bytes()[..LEDGER_ADDRESS_BYTES])
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_address_is_deterministic() {
        let registry = Address::new("registry");
        assert_eq!(
            derive_ledger_address(&registry, 1),
            derive_ledger_address(&registry, 1)
        );
    }

    #[test]
    fn ledger_address_differs_per_pool_and_registry() {
        let a = Address::new("registry-a");
        let b = Address::new("registry-b");
        assert_ne!(derive_ledger_address(&a, 1), derive_ledger_address(&a, 2));
        assert_ne!(derive_ledger_address(&a, 1), derive_ledger_address(&b, 1));
    }

    #[test]
    fn ledger_address_shape() {
        let addr = derive_ledger_address(&Address::new("r"), 7);
        assert!(addr.as_str().starts_with("0x"));
        assert_eq!(addr.as_str().len(), 2 + LEDGER_ADDRESS_BYTES * 2);
    }

    #[test]
    fn empty_address_detected() {
        assert!(Address::new("").is_empty());
        assert!(!Address::from("alice").is_empty());
    }
}
