//! # Token Module: Fungible Value Transfer
//!
//! Every loan moves value in exactly one fungible token, named by its
//! [`Address`]. The engine consumes tokens through the narrow
//! [`TokenLedger`] interface: balances, allowances, `transfer_from`, and an
//! atomic multi-leg [`settle`](TokenLedger::settle).
//!
//! ```text
//! mod.rs  : the TokenLedger interface, transfer legs, errors
//! bank.rs : TokenBank, an in-memory multi-token implementation
//! ```
//!
//! ## Atomicity
//!
//! A transfer either moves the whole amount or nothing. A settlement is a
//! list of legs executed as one unit: if any leg fails, no leg is applied
//! and every balance and allowance is exactly what it was before the call.

pub mod bank;

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Address;

pub use bank::{TokenBank, TokenInfo};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while moving tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The token has never been registered.
    #[error("unknown token: {0}")]
    UnknownToken(Address),

    /// A token with this address already exists.
    #[error("token already registered: {0}")]
    DuplicateToken(Address),

    /// Only the issuer may mint.
    #[error("unauthorized mint of {token} by {caller}")]
    UnauthorizedMint {
        /// Token being minted.
        token: Address,
        /// Identity that attempted the mint.
        caller: Address,
    },

    /// The sending account holds less than the amount.
    #[error("insufficient balance of {token} for {account}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Token being moved.
        token: Address,
        /// Account being debited.
        account: Address,
        /// Its balance.
        available: u64,
        /// The amount that was requested.
        requested: u64,
    },

    /// The spender has not been approved for the amount.
    #[error("insufficient allowance of {token} from {owner} to {spender}: available {available}, requested {requested}")]
    InsufficientAllowance {
        /// Token being moved.
        token: Address,
        /// Account whose funds are being pulled.
        owner: Address,
        /// Identity doing the pulling.
        spender: Address,
        /// Remaining approved amount.
        available: u64,
        /// The amount that was requested.
        requested: u64,
    },

    /// The account is frozen; nothing moves in or out of it.
    #[error("account frozen: {0}")]
    AccountFrozen(Address),

    /// Crediting would overflow the account balance or the token supply.
    #[error("balance overflow of {token} for {account}")]
    Overflow {
        /// Token being credited.
        token: Address,
        /// Account being credited.
        account: Address,
    },
}

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// One movement inside a settlement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLeg {
    /// Account debited.
    pub from: Address,
    /// Account credited.
    pub to: Address,
    /// Amount moved. Zero-amount legs are skipped.
    pub amount: u64,
}

impl TransferLeg {
    /// Convenience constructor.
    pub fn new(from: &Address, to: &Address, amount: u64) -> Self {
        Self {
            from: from.clone(),
            to: to.clone(),
            amount,
        }
    }
}

/// The value-transfer interface the lending engine consumes.
pub trait TokenLedger: Send + Sync {
    /// Balance of `owner` in `token`.
    fn balance_of(&self, token: &Address, owner: &Address) -> u64;

    /// Amount `spender` may still pull from `owner`.
    fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> u64;

    /// Sets the amount `spender` may pull from `owner`, replacing any
    /// previous approval.
    fn approve(
        &mut self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: u64,
    ) -> Result<(), TokenError>;

    /// Executes every leg or none of them.
    ///
    /// A leg whose `from` is `spender` moves the spender's own funds; any
    /// other leg consumes allowance granted by `from` to `spender`.
    fn settle(
        &mut self,
        token: &Address,
        spender: &Address,
        legs: &[TransferLeg],
    ) -> Result<(), TokenError>;

    /// Pulls `amount` from `from` to `to` using `spender`'s allowance.
    fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenError> {
        self.settle(token, spender, &[TransferLeg::new(from, to, amount)])
    }

    /// Moves `amount` of the sender's own funds.
    fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenError> {
        self.settle(token, from, &[TransferLeg::new(from, to, amount)])
    }
}

/// Shared handle to the token ledger used by every pool.
pub type SharedTokenLedger = Arc<RwLock<dyn TokenLedger>>;
