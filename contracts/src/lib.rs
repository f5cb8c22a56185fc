//! # peerpool Lending Engine
//!
//! Pooled peer-to-peer lending. Pool owners whitelist lenders and
//! borrowers; borrowers request loans; lenders fund them; borrowers repay
//! in fixed installments.
//!
//! - **Pool Registry**: creates pools, freezes their configuration, binds
//!   one loan ledger per pool, and delegates membership to the attestation
//!   service.
//! - **Loan Ledger**: owns one pool's loans, runs the loan state machine
//!   and the repayment schedule, and settles every transfer atomically.
//! - **Deployment**: wires the registry to concrete collaborators and
//!   persists the whole thing.
//!
//! ## Design Principles
//!
//! 1. All monetary operations use checked arithmetic. Overflow is an
//!    error, never a wrap.
//! 2. State transitions are explicit: enum variants, not boolean flags.
//! 3. Time-driven transitions are derived lazily from stored timestamps;
//!    nothing runs in the background.
//! 4. Collaborators are injected handles, never globals.

pub mod context;
pub mod deployment;
pub mod error;
pub mod loan_ledger;
pub mod pool_registry;

pub use context::LedgerContext;
pub use deployment::{Deployment, DeploymentInfo};
pub use error::{LendingError, LendingResult};
pub use loan_ledger::{derive_effective_state, Loan, LoanLedger, LoanState};
pub use pool_registry::{Pool, PoolConfig, PoolRegistry};
