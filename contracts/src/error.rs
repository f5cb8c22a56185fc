//! Error taxonomy of the lending engine.
//!
//! Every failure names the category and the pool or loan it concerns. None
//! of them are retried by the engine; a failed operation leaves balances
//! exactly as they were. The only state a failed call may leave behind is a
//! lazy `Expired` or `Defaulted` flip, reported as [`LendingError::LoanExpired`]
//! and [`LendingError::LoanInDefault`].

use thiserror::Error;

use peerpool_protocol::{Address, AttestationError, LoanId, PoolId, Timestamp, TokenError};

use crate::loan_ledger::LoanState;

/// Errors returned by the pool registry and loan ledgers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LendingError {
    /// The caller lacks the role the operation requires.
    #[error("unauthorized: {caller} is not the owner of pool {pool_id}")]
    Unauthorized {
        /// Identity that made the call.
        caller: Address,
        /// Pool whose owner was required.
        pool_id: PoolId,
    },

    /// Lender attestation missing or expired.
    #[error("{identity} is not a verified lender in pool {pool_id}")]
    NotVerifiedLender {
        /// Pool checked.
        pool_id: PoolId,
        /// Identity checked.
        identity: Address,
    },

    /// Borrower attestation missing or expired.
    #[error("{identity} is not a verified borrower in pool {pool_id}")]
    NotVerifiedBorrower {
        /// Pool checked.
        pool_id: PoolId,
        /// Identity checked.
        identity: Address,
    },

    /// Malformed pool parameters.
    #[error("invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    /// A membership expiration that is not in the future.
    #[error("invalid expiration {expiration}: must be after {now}")]
    InvalidExpiration {
        /// Requested expiration.
        expiration: Timestamp,
        /// Time of the call.
        now: Timestamp,
    },

    /// The loan is not in a state that allows this operation.
    #[error("loan {loan_id} in pool {pool_id} is not active (state: {state})")]
    LoanNotActive {
        /// Pool owning the loan.
        pool_id: PoolId,
        /// The loan.
        loan_id: LoanId,
        /// Its state at the time of the call.
        state: LoanState,
    },

    /// Acceptance was attempted after the request lapsed. The loan is now
    /// `Expired`.
    #[error("loan {loan_id} in pool {pool_id} expired before acceptance")]
    LoanExpired {
        /// Pool owning the loan.
        pool_id: PoolId,
        /// The loan.
        loan_id: LoanId,
    },

    /// Repayment was attempted past the default window. The loan is now
    /// `Defaulted`.
    #[error("loan {loan_id} in pool {pool_id} is in default")]
    LoanInDefault {
        /// Pool owning the loan.
        pool_id: PoolId,
        /// The loan.
        loan_id: LoanId,
    },

    /// Nothing is left to repay.
    #[error("loan {loan_id} in pool {pool_id} is already repaid")]
    AlreadyRepaid {
        /// Pool owning the loan.
        pool_id: PoolId,
        /// The loan.
        loan_id: LoanId,
    },

    /// A token transfer in the settlement failed; nothing moved.
    #[error("transfer failed for loan {loan_id} in pool {pool_id}: {source}")]
    TransferFailed {
        /// Pool owning the loan.
        pool_id: PoolId,
        /// The loan.
        loan_id: LoanId,
        /// The token ledger's reason.
        #[source]
        source: TokenError,
    },

    /// No pool with this id.
    #[error("pool {0} not found")]
    PoolNotFound(PoolId),

    /// No loan with this id in the pool.
    #[error("loan {loan_id} not found in pool {pool_id}")]
    LoanNotFound {
        /// Pool searched.
        pool_id: PoolId,
        /// Loan requested.
        loan_id: LoanId,
    },

    /// A request named a pool other than the ledger's own.
    #[error("ledger of pool {expected} cannot serve pool {got}")]
    PoolMismatch {
        /// The ledger's pool.
        expected: PoolId,
        /// The pool named in the request.
        got: PoolId,
    },

    /// Loan request parameters rejected.
    #[error("invalid loan request in pool {pool_id}: {reason}")]
    InvalidLoanRequest {
        /// Pool the request was made in.
        pool_id: PoolId,
        /// What was wrong.
        reason: String,
    },

    /// An amount or timestamp computation overflowed.
    #[error("arithmetic overflow while {0}")]
    ArithmeticOverflow(&'static str),

    /// The membership verifier refused a write.
    #[error("attestation error: {0}")]
    Attestation(#[from] AttestationError),
}

/// Convenience alias used throughout the crate.
pub type LendingResult<T> = Result<T, LendingError>;
