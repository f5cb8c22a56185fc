//! # Protocol Configuration & Constants
//!
//! Every magic number in peerpool lives here. Fee rates and interest rates
//! are basis points throughout; durations and timestamps are whole seconds.
//!
//! Changing any of these after pools hold live loans changes the meaning of
//! stored records, so treat them as part of the persisted format.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The protocol version string, reported by the CLI and stored alongside a
/// persisted deployment.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Rates
// ---------------------------------------------------------------------------

/// Basis-point denominator. 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Upper bound for any single fee rate. A fee equal to the whole principal
/// is allowed, a fee above it is not.
pub const MAX_FEE_BPS: u32 = 10_000;

/// Protocol fee a fresh fee authority starts with: 2.00%.
pub const DEFAULT_PROTOCOL_FEE_BPS: u32 = 200;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// One day in seconds.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// The year used to prorate annual interest rates: 365 days, no leap
/// adjustment.
pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;

// ---------------------------------------------------------------------------
// Addressing
// ---------------------------------------------------------------------------

/// Domain separator mixed into ledger address derivation so a ledger
/// address can never collide with a digest computed for another purpose.
pub const LEDGER_ADDRESS_DOMAIN: &[u8] = b"peerpool/loan-ledger/v1";

/// Number of digest bytes kept for a derived ledger address (hex-encoded
/// that is 40 characters).
pub const LEDGER_ADDRESS_BYTES: usize = 20;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// sled tree holding pool configuration records.
pub const TREE_POOLS: &str = "pools";

/// sled tree holding loan records of every ledger.
pub const TREE_LOANS: &str = "loans";

/// sled tree holding membership entries of every pool.
pub const TREE_MEMBERSHIPS: &str = "memberships";

/// sled tree for singleton records (fee config, token bank, counters).
pub const TREE_METADATA: &str = "metadata";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_is_365_days() {
        assert_eq!(SECONDS_PER_YEAR, 31_536_000);
    }

    #[test]
    fn default_fee_within_bounds() {
        assert!(DEFAULT_PROTOCOL_FEE_BPS <= MAX_FEE_BPS);
        assert_eq!(MAX_FEE_BPS as u64, BPS_DENOMINATOR);
    }
}
