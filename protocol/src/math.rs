//! # Lending Arithmetic
//!
//! Integer-only helpers for fees and repayment schedules. Every function is
//! checked: a result that does not fit in `u64` comes back as `None`, and
//! callers turn that into their own overflow error. Products are formed in
//! `u128` before dividing so intermediate values never wrap.
//!
//! ## Schedule
//!
//! A loan of `principal` at `rate_bps` per year for `duration` seconds owes
//!
//! ```text
//! total = principal + principal * rate_bps * duration / (SECONDS_PER_YEAR * 10_000)
//! ```
//!
//! repaid in `n = ceil(duration / cycle)` installments of `total / n`, with
//! the remainder of that division folded into the last installment. The
//! installments therefore always sum to `total` exactly.

use serde::{Deserialize, Serialize};

use crate::config::{BPS_DENOMINATOR, SECONDS_PER_YEAR};

/// `amount * bps / 10_000`, rounded down.
pub fn percent_bps(amount: u64, bps: u32) -> Option<u64> {
    let scaled = (amount as u128).checked_mul(bps as u128)? / BPS_DENOMINATOR as u128;
    u64::try_from(scaled).ok()
}

/// Interest owed on `principal` at an annual `rate_bps` over `duration`
/// seconds, rounded down.
pub fn prorated_interest(principal: u64, rate_bps: u32, duration: u64) -> Option<u64> {
    let numerator = (principal as u128)
        .checked_mul(rate_bps as u128)?
        .checked_mul(duration as u128)?;
    let denominator = SECONDS_PER_YEAR as u128 * BPS_DENOMINATOR as u128;
    u64::try_from(numerator / denominator).ok()
}

/// Principal plus prorated interest.
pub fn total_repayable(principal: u64, rate_bps: u32, duration: u64) -> Option<u64> {
    principal.checked_add(prorated_interest(principal, rate_bps, duration)?)
}

/// Number of payment cycles needed to cover `duration`: `ceil(duration / cycle)`.
/// `None` when `cycle` is zero.
pub fn cycle_count(duration: u64, cycle: u64) -> Option<u64> {
    if cycle == 0 {
        return None;
    }
    Some(duration.div_ceil(cycle))
}

/// The repayment plan fixed when a loan is requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Principal plus interest.
    pub total_repayable: u64,
    /// Number of installments.
    pub cycles: u64,
    /// Regular installment: `total_repayable / cycles`.
    pub cycle_amount: u64,
}

impl Schedule {
    /// Builds the schedule for a loan. `None` on a zero cycle length, a zero
    /// duration, or arithmetic overflow.
    pub fn compute(principal: u64, rate_bps: u32, duration: u64, cycle: u64) -> Option<Self> {
        let cycles = cycle_count(duration, cycle)?;
        if cycles == 0 {
            return None;
        }
        let total_repayable = total_repayable(principal, rate_bps, duration)?;
        Some(Self {
            total_repayable,
            cycles,
            cycle_amount: total_repayable / cycles,
        })
    }

    /// Whatever integer division left over, collected in the final cycle.
    pub fn remainder(&self) -> u64 {
        self.total_repayable - self.cycle_amount * self.cycles
    }

    /// Amount due for the installment at zero-based `index`, or `None` past
    /// the end of the schedule.
    pub fn installment(&self, index: u64) -> Option<u64> {
        if index >= self.cycles {
            return None;
        }
        if index + 1 == self.cycles {
            Some(self.cycle_amount + self.remainder())
        } else {
            Some(self.cycle_amount)
        }
    }

    /// All installments in order.
    pub fn installments(&self) -> Vec<u64> {
        (0..self.cycles).filter_map(|i| self.installment(i)).collect()
    }
}
