// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # peerpool Protocol: Shared Primitives
//!
//! Everything the lending engine consumes but does not own. Pools and loan
//! ledgers live in `peerpool-contracts`; this crate supplies the world they
//! run in.
//!
//! ## Architecture
//!
//! - **identity**: Opaque participant identities and sequential ids.
//! - **clock**: Injected time source. There is no scheduler anywhere.
//! - **math**: Checked basis-point and schedule arithmetic.
//! - **token**: The value-transfer interface and an in-memory token bank.
//! - **fees**: The Fee Authority: protocol fee rate and recipient.
//! - **attestation**: The Membership Verifier: who may lend or borrow where.
//! - **events**: Protocol events and the shared event log.
//! - **storage**: sled-backed persistence.
//! - **config**: Protocol constants.
//!
//! ## Design Philosophy
//!
//! 1. Integers only. Amounts are `u64` base units, rates are basis points,
//!    time is Unix seconds.
//! 2. Checked arithmetic on every money path.
//! 3. Collaborators are traits behind shared handles, so the engine can be
//!    driven against substitutable fakes.

pub mod attestation;
pub mod clock;
pub mod config;
pub mod events;
pub mod fees;
pub mod identity;
pub mod math;
pub mod storage;
pub mod token;

pub use attestation::{
    AttestationError, AttestationRegistry, MembershipEntry, MembershipVerifier, Role,
    SharedVerifier, Verification,
};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use events::{EventLog, LendingEvent};
pub use fees::{FeeAuthority, FeeConfig, FeeError, SharedFeeAuthority};
pub use identity::{Address, LoanId, PoolId, Timestamp};
pub use token::{SharedTokenLedger, TokenBank, TokenError, TokenLedger, TransferLeg};
