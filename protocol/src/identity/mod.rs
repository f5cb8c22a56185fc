//! # Identity Module
//!
//! Participants in peerpool are opaque identities: a pool owner, a lender,
//! a borrower, the fee recipient, a token, a loan ledger. The protocol never
//! interprets them beyond equality, so they are modelled as a string newtype
//! rather than key material.
//!
//! Pools and loans are referenced by plain sequential integers. Nothing in
//! the engine holds a pointer to another entity; a loan names its pool by
//! [`PoolId`], a pool names its ledger by [`Address`].

pub mod address;

pub use address::{derive_ledger_address, Address};

/// Identifier of a pool, assigned by the registry starting at 1.
pub type PoolId = u64;

/// Identifier of a loan, assigned per ledger starting at 0.
pub type LoanId = u64;

/// Unix timestamp in whole seconds.
pub type Timestamp = u64;
