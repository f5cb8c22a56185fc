//! # Fee Authority
//!
//! Holds the single protocol-wide fee rate and the identity that receives
//! protocol fees. Loan ledgers consult it on every settlement and never
//! write to it; only the configuration's owner can change the rate or the
//! recipient.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{DEFAULT_PROTOCOL_FEE_BPS, MAX_FEE_BPS};
use crate::identity::Address;

/// Errors from fee administration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeeError {
    /// Only the owner may change fee settings.
    #[error("unauthorized: {caller} is not the fee owner")]
    Unauthorized {
        /// Identity that attempted the change.
        caller: Address,
    },

    /// Fee rate above [`MAX_FEE_BPS`].
    #[error("fee rate {0} bps exceeds maximum of {max} bps", max = MAX_FEE_BPS)]
    RateTooHigh(u32),

    /// The empty identity cannot receive fees.
    #[error("fee recipient must not be empty")]
    EmptyRecipient,
}

/// Read side of the fee authority, as seen by loan ledgers.
pub trait FeeAuthority: Send + Sync {
    /// Protocol fee in basis points of the principal.
    fn protocol_fee_bps(&self) -> u32;

    /// Identity credited with protocol fees.
    fn fee_recipient(&self) -> Address;
}

/// Shared handle to the fee authority.
pub type SharedFeeAuthority = Arc<RwLock<dyn FeeAuthority>>;

/// Owner-administered fee configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    owner: Address,
    recipient: Address,
    protocol_fee_bps: u32,
}

impl FeeConfig {
    /// Creates a configuration owned by `owner` that pays fees to `owner`
    /// at [`DEFAULT_PROTOCOL_FEE_BPS`].
    pub fn new(owner: Address) -> Self {
        Self {
            recipient: owner.clone(),
            owner,
            protocol_fee_bps: DEFAULT_PROTOCOL_FEE_BPS,
        }
    }

    /// The identity allowed to change fee settings.
    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Sets the protocol fee rate.
    ///
    /// # Errors
    ///
    /// [`FeeError::Unauthorized`] unless `caller` is the owner,
    /// [`FeeError::RateTooHigh`] above [`MAX_FEE_BPS`].
    pub fn set_protocol_fee(&mut self, caller: &Address, bps: u32) -> Result<(), FeeError> {
        self.ensure_owner(caller)?;
        if bps > MAX_FEE_BPS {
            return Err(FeeError::RateTooHigh(bps));
        }
        let previous = self.protocol_fee_bps;
        self.protocol_fee_bps = bps;
        info!(previous, current = bps, "protocol fee updated");
        Ok(())
    }

    /// Redirects protocol fees to `recipient`.
    pub fn set_fee_recipient(&mut self, caller: &Address, recipient: Address) -> Result<(), FeeError> {
        self.ensure_owner(caller)?;
        if recipient.is_empty() {
            return Err(FeeError::EmptyRecipient);
        }
        info!(recipient = %recipient, "fee recipient updated");
        self.recipient = recipient;
        Ok(())
    }

    fn ensure_owner(&self, caller: &Address) -> Result<(), FeeError> {
        if caller != &self.owner {
            return Err(FeeError::Unauthorized {
                caller: caller.clone(),
            });
        }
        Ok(())
    }
}

impl FeeAuthority for FeeConfig {
    fn protocol_fee_bps(&self) -> u32 {
        self.protocol_fee_bps
    }

    fn fee_recipient(&self) -> Address {
        self.recipient.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_uses_defaults() {
        let fees = FeeConfig::new(Address::new("treasury"));
        assert_eq!(fees.protocol_fee_bps(), DEFAULT_PROTOCOL_FEE_BPS);
        assert_eq!(fees.fee_recipient(), Address::new("treasury"));
    }

    #[test]
    fn owner_sets_fee() {
        let owner = Address::new("treasury");
        let mut fees = FeeConfig::new(owner.clone());
        fees.set_protocol_fee(&owner, 200).unwrap();
        assert_eq!(fees.protocol_fee_bps(), 200);
    }

    #[test]
    fn stranger_cannot_set_fee() {
        let mut fees = FeeConfig::new(Address::new("treasury"));
        let err = fees.set_protocol_fee(&Address::new("mallory"), 0).unwrap_err();
        assert!(matches!(err, FeeError::Unauthorized { .. }));
        assert_eq!(fees.protocol_fee_bps(), DEFAULT_PROTOCOL_FEE_BPS);
    }

    #[test]
    fn fee_above_maximum_rejected() {
        let owner = Address::new("treasury");
        let mut fees = FeeConfig::new(owner.clone());
        assert_eq!(
            fees.set_protocol_fee(&owner, MAX_FEE_BPS + 1),
            Err(FeeError::RateTooHigh(MAX_FEE_BPS + 1))
        );
    }

    #[test]
    fn recipient_can_be_redirected() {
        let owner = Address::new("treasury");
        let mut fees = FeeConfig::new(owner.clone());
        fees.set_fee_recipient(&owner, Address::new("vault")).unwrap();
        assert_eq!(fees.fee_recipient(), Address::new("vault"));
        assert_eq!(
            fees.set_fee_recipient(&owner, Address::new("")),
            Err(FeeError::EmptyRecipient)
        );
    }
}
