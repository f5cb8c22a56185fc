//! # Loan Ledger
//!
//! One ledger per pool. It owns every loan record of that pool, runs the
//! loan state machine, computes the repayment schedule, and performs the
//! token settlements for acceptance and repayment.
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐  accept_loan (in time)   ┌──────────┐  balance reaches zero  ┌────────┐
//!   │ Pending │ ───────────────────────► │ Accepted │ ─────────────────────► │ Repaid │
//!   └────┬────┘                          └────┬─────┘                        └────────┘
//!        │ accept_loan after                  │ touched at or after
//!        │ requested_expiration               │ next_due_date + default window
//!   ┌────▼────┐                          ┌────▼──────┐
//!   │ Expired │                          │ Defaulted │
//!   └─────────┘                          └───────────┘
//! ```
//!
//! `Repaid`, `Expired` and `Defaulted` are terminal. Nothing re-enters
//! `Pending` or `Accepted`.
//!
//! ## Lazy Transitions
//!
//! There is no scheduler. Expiry and default are derived from stored
//! timestamps by [`derive_effective_state`] whenever a loan is touched. A
//! mutating call that finds an unapplied `Expired`/`Defaulted` transition
//! commits it and then fails; a view reports what it finds without writing
//! anything.
//!
//! ## Settlement
//!
//! Acceptance pulls the principal from the lender into the ledger and fans
//! it out to the fee recipient, the pool owner and the borrower's receiver
//! as one all-or-nothing settlement. Repayments pull from whoever calls
//! straight to the lender; anyone may repay on a borrower's behalf.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use peerpool_protocol::math::{percent_bps, Schedule};
use peerpool_protocol::{Address, LendingEvent, LoanId, PoolId, Role, Timestamp, TransferLeg};

use crate::context::LedgerContext;
use crate::error::{LendingError, LendingResult};
use crate::pool_registry::Pool;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Lifecycle state of a loan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanState {
    /// Requested, waiting for a lender.
    Pending,
    /// Funded; installments are due.
    Accepted,
    /// Fully repaid.
    Repaid,
    /// Not accepted before its request lapsed.
    Expired,
    /// An installment stayed unpaid past the default window.
    Defaulted,
}

impl LoanState {
    /// Returns `true` for states no transition leaves.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoanState::Repaid | LoanState::Expired | LoanState::Defaulted
        )
    }
}

impl fmt::Display for LoanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanState::Pending => write!(f, "Pending"),
            LoanState::Accepted => write!(f, "Accepted"),
            LoanState::Repaid => write!(f, "Repaid"),
            LoanState::Expired => write!(f, "Expired"),
            LoanState::Defaulted => write!(f, "Defaulted"),
        }
    }
}

/// A loan record. Never deleted; terminal loans stay queryable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    /// Sequential id within the ledger, starting at 0.
    pub loan_id: LoanId,
    /// Pool the loan belongs to.
    pub pool_id: PoolId,
    /// Token every transfer of this loan moves.
    pub token: Address,
    /// Funder, set on acceptance.
    pub lender: Option<Address>,
    /// Attested identity that requested the loan.
    pub borrower: Address,
    /// Account the payout is sent to.
    pub receiver: Address,
    /// Amount lent.
    pub principal: u64,
    /// Annual interest rate in basis points.
    pub interest_rate_bps: u32,
    /// Requested loan term in seconds.
    pub max_duration: u64,
    /// When the request was made.
    pub requested_at: Timestamp,
    /// Last instant at which the loan may still be accepted.
    pub requested_expiration: Timestamp,
    /// Repayment plan fixed at request time.
    pub schedule: Schedule,
    /// Current state as last committed.
    pub state: LoanState,
    /// When the loan was accepted.
    pub accepted_at: Option<Timestamp>,
    /// When the next installment is due. Set on acceptance.
    pub next_due_date: Option<Timestamp>,
    /// Sum of all repayments.
    pub amount_repaid: u64,
    /// Installments paid so far.
    pub installments_paid: u64,
    /// When the most recent repayment landed.
    pub last_payment_at: Option<Timestamp>,
}

impl Loan {
    /// Regular per-cycle installment.
    pub fn payment_cycle_amount(&self) -> u64 {
        self.schedule.cycle_amount
    }

    /// Principal plus interest.
    pub fn total_repayable(&self) -> u64 {
        self.schedule.total_repayable
    }

    /// What is still owed.
    pub fn outstanding_balance(&self) -> u64 {
        self.schedule.total_repayable.saturating_sub(self.amount_repaid)
    }

    /// Amount the next installment call would collect.
    ///
    /// The regular installment capped at the outstanding balance, except in
    /// the final cycle, which collects everything left so the schedule
    /// closes exactly.
    pub fn installment_due(&self) -> u64 {
        let outstanding = self.outstanding_balance();
        if self.installments_paid + 1 >= self.schedule.cycles {
            outstanding
        } else {
            self.schedule.cycle_amount.min(outstanding)
        }
    }
}

/// The state `loan` is really in at `now`, given the pool's default window.
///
/// Applies the two time-driven transitions the stored state may not reflect
/// yet: a pending loan past its acceptance deadline is `Expired`, and an
/// accepted loan at or past `next_due_date + loan_default_duration` is
/// `Defaulted`. Pure; the caller decides whether to commit the result.
pub fn derive_effective_state(loan: &Loan, loan_default_duration: u64, now: Timestamp) -> LoanState {
    match loan.state {
        LoanState::Pending if now > loan.requested_expiration => LoanState::Expired,
        LoanState::Accepted => match loan.next_due_date {
            Some(due) if now >= due.saturating_add(loan_default_duration) => LoanState::Defaulted,
            _ => LoanState::Accepted,
        },
        state => state,
    }
}

// ---------------------------------------------------------------------------
// LoanLedger
// ---------------------------------------------------------------------------

/// The per-pool loan book.
pub struct LoanLedger {
    address: Address,
    pool: Pool,
    loans: Vec<Loan>,
    ctx: LedgerContext,
}

impl LoanLedger {
    /// Creates an empty ledger for `pool`, reachable at `pool.ledger_address`.
    pub fn new(pool: Pool, ctx: LedgerContext) -> Self {
        Self::with_loans(pool, Vec::new(), ctx)
    }

    /// Rebuilds a ledger from persisted loans. Loans must be in id order
    /// starting at 0.
    pub(crate) fn with_loans(pool: Pool, loans: Vec<Loan>, ctx: LedgerContext) -> Self {
        Self {
            address: pool.ledger_address.clone(),
            pool,
            loans,
            ctx,
        }
    }

    /// The ledger's own identity: the spender lenders and payers approve.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The pool this ledger serves.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Every loan, in id order.
    pub fn loans(&self) -> &[Loan] {
        &self.loans
    }

    /// Looks up one loan.
    pub fn loan(&self, loan_id: LoanId) -> LendingResult<&Loan> {
        self.loans
            .get(self.index(loan_id)?)
            .ok_or(LendingError::LoanNotFound {
                pool_id: self.pool.pool_id,
                loan_id,
            })
    }

    /// The id the next request will receive.
    pub fn next_loan_id(&self) -> LoanId {
        self.loans.len() as LoanId
    }

    fn index(&self, loan_id: LoanId) -> LendingResult<usize> {
        let not_found = LendingError::LoanNotFound {
            pool_id: self.pool.pool_id,
            loan_id,
        };
        let idx = usize::try_from(loan_id).map_err(|_| not_found.clone())?;
        if idx < self.loans.len() {
            Ok(idx)
        } else {
            Err(not_found)
        }
    }

    fn require_verified(&self, role: Role, identity: &Address, now: Timestamp) -> LendingResult<()> {
        let pool_id = self.pool.pool_id;
        let verification = self
            .ctx
            .verifier
            .read()
            .is_verified(pool_id, role, identity, now);
        debug!(pool_id, %role, identity = %identity, verified = verification.is_verified, "membership checked");
        if verification.is_verified {
            return Ok(());
        }
        let identity = identity.clone();
        Err(match role {
            Role::Lender => LendingError::NotVerifiedLender { pool_id, identity },
            Role::Borrower => LendingError::NotVerifiedBorrower { pool_id, identity },
        })
    }

    fn invalid_request(&self, reason: impl Into<String>) -> LendingError {
        LendingError::InvalidLoanRequest {
            pool_id: self.pool.pool_id,
            reason: reason.into(),
        }
    }

    /// Commits a lazily derived terminal state and reports it as the error
    /// the triggering call fails with.
    fn commit_lapse(&mut self, idx: usize, state: LoanState) -> LendingError {
        let pool_id = self.pool.pool_id;
        let loan = &mut self.loans[idx];
        let loan_id = loan.loan_id;
        loan.state = state;
        match state {
            LoanState::Expired => {
                warn!(pool_id, loan_id, "loan expired before acceptance");
                self.ctx
                    .events
                    .emit(LendingEvent::LoanExpired { pool_id, loan_id });
                LendingError::LoanExpired { pool_id, loan_id }
            }
            _ => {
                warn!(pool_id, loan_id, "loan defaulted");
                self.ctx
                    .events
                    .emit(LendingEvent::LoanDefaulted { pool_id, loan_id });
                LendingError::LoanInDefault { pool_id, loan_id }
            }
        }
    }

    // -- Request ------------------------------------------------------------

    /// Opens a loan request in `Pending` state and returns its id.
    ///
    /// `caller` is the borrower and must hold a live borrower attestation if
    /// the pool requires one. `receiver` is where the payout goes.
    ///
    /// # Errors
    ///
    /// - [`LendingError::PoolMismatch`] if `pool_id` is not this ledger's pool.
    /// - [`LendingError::NotVerifiedBorrower`] if the attestation check fails.
    /// - [`LendingError::InvalidLoanRequest`] for a zero principal, a zero
    ///   or too long duration, an empty token or receiver, or a schedule
    ///   whose per-cycle amount rounds to zero.
    /// - [`LendingError::ArithmeticOverflow`] if the schedule does not fit.
    #[allow(clippy::too_many_arguments)]
    pub fn loan_request(
        &mut self,
        caller: &Address,
        token: &Address,
        pool_id: PoolId,
        principal: u64,
        requested_duration: u64,
        interest_rate_bps: u32,
        receiver: &Address,
    ) -> LendingResult<LoanId> {
        if pool_id != self.pool.pool_id {
            return Err(LendingError::PoolMismatch {
                expected: self.pool.pool_id,
                got: pool_id,
            });
        }
        let now = self.ctx.clock.now();
        let config = &self.pool.config;

        if config.require_borrower_attestation {
            self.require_verified(Role::Borrower, caller, now)?;
        }
        if principal == 0 {
            return Err(self.invalid_request("principal must be positive"));
        }
        if requested_duration == 0 {
            return Err(self.invalid_request("duration must be positive"));
        }
        if let Some(max) = config.max_loan_duration {
            if requested_duration > max {
                return Err(self.invalid_request(format!(
                    "duration {requested_duration}s exceeds pool maximum {max}s"
                )));
            }
        }
        if token.is_empty() || receiver.is_empty() {
            return Err(self.invalid_request("token and receiver must be set"));
        }

        let schedule = Schedule::compute(
            principal,
            interest_rate_bps,
            requested_duration,
            config.payment_cycle_duration,
        )
        .ok_or(LendingError::ArithmeticOverflow("computing repayment schedule"))?;
        if schedule.cycle_amount == 0 {
            return Err(self.invalid_request(format!(
                "total repayable {} cannot be split across {} cycles",
                schedule.total_repayable, schedule.cycles
            )));
        }
        let requested_expiration = now
            .checked_add(config.loan_expiration_duration)
            .ok_or(LendingError::ArithmeticOverflow("computing request expiration"))?;

        let loan_id = self.next_loan_id();
        self.loans.push(Loan {
            loan_id,
            pool_id,
            token: token.clone(),
            lender: None,
            borrower: caller.clone(),
            receiver: receiver.clone(),
            principal,
            interest_rate_bps,
            max_duration: requested_duration,
            requested_at: now,
            requested_expiration,
            schedule,
            state: LoanState::Pending,
            accepted_at: None,
            next_due_date: None,
            amount_repaid: 0,
            installments_paid: 0,
            last_payment_at: None,
        });

        info!(
            pool_id,
            loan_id,
            borrower = %caller,
            principal,
            total_repayable = schedule.total_repayable,
            cycles = schedule.cycles,
            "loan requested"
        );
        self.ctx.events.emit(LendingEvent::LoanRequested {
            pool_id,
            loan_id,
            payment_cycle_amount: schedule.cycle_amount,
        });
        Ok(loan_id)
    }

    // -- Acceptance ---------------------------------------------------------

    /// Funds a pending loan.
    ///
    /// Pulls the principal from `caller` (who must have approved this
    /// ledger), pays the protocol fee to the fee recipient and the
    /// marketplace fee to the pool owner, and sends the rest to the loan's
    /// receiver, all as one settlement.
    ///
    /// # Errors
    ///
    /// - [`LendingError::LoanNotActive`] unless the loan is `Pending`.
    /// - [`LendingError::NotVerifiedLender`] if the attestation check fails.
    /// - [`LendingError::LoanExpired`] past the acceptance deadline; the loan
    ///   is left `Expired`.
    /// - [`LendingError::InvalidConfiguration`] if the combined fees exceed
    ///   the principal.
    /// - [`LendingError::TransferFailed`] if any transfer fails; nothing moves.
    pub fn accept_loan(&mut self, caller: &Address, loan_id: LoanId) -> LendingResult<()> {
        let idx = self.index(loan_id)?;
        let now = self.ctx.clock.now();
        let pool_id = self.pool.pool_id;

        let loan = &self.loans[idx];
        if loan.state != LoanState::Pending {
            return Err(LendingError::LoanNotActive {
                pool_id,
                loan_id,
                state: loan.state,
            });
        }
        if self.pool.config.require_lender_attestation {
            self.require_verified(Role::Lender, caller, now)?;
        }
        let effective = derive_effective_state(loan, self.pool.config.loan_default_duration, now);
        if effective == LoanState::Expired {
            return Err(self.commit_lapse(idx, effective));
        }

        let (fee_bps, fee_recipient) = {
            let fees = self.ctx.fees.read();
            (fees.protocol_fee_bps(), fees.fee_recipient())
        };
        let principal = loan.principal;
        let protocol_fee = percent_bps(principal, fee_bps)
            .ok_or(LendingError::ArithmeticOverflow("computing protocol fee"))?;
        let marketplace_fee = percent_bps(principal, self.pool.config.marketplace_fee_bps)
            .ok_or(LendingError::ArithmeticOverflow("computing marketplace fee"))?;
        let payout = principal
            .checked_sub(protocol_fee)
            .and_then(|rest| rest.checked_sub(marketplace_fee))
            .ok_or_else(|| {
                LendingError::InvalidConfiguration(format!(
                    "fees {protocol_fee} + {marketplace_fee} exceed principal {principal}"
                ))
            })?;

        let legs = [
            TransferLeg::new(caller, &self.address, principal),
            TransferLeg::new(&self.address, &fee_recipient, protocol_fee),
            TransferLeg::new(&self.address, &self.pool.owner, marketplace_fee),
            TransferLeg::new(&self.address, &loan.receiver, payout),
        ];
        self.ctx
            .tokens
            .write()
            .settle(&loan.token, &self.address, &legs)
            .map_err(|source| LendingError::TransferFailed {
                pool_id,
                loan_id,
                source,
            })?;

        let cycle = self.pool.config.payment_cycle_duration;
        let loan = &mut self.loans[idx];
        loan.state = LoanState::Accepted;
        loan.lender = Some(caller.clone());
        loan.accepted_at = Some(now);
        loan.next_due_date = Some(now.saturating_add(cycle));
        loan.amount_repaid = 0;

        info!(
            pool_id,
            loan_id,
            lender = %caller,
            protocol_fee,
            marketplace_fee,
            payout,
            "loan accepted"
        );
        self.ctx
            .events
            .emit(LendingEvent::LoanAccepted { pool_id, loan_id });
        Ok(())
    }

    // -- Repayment ----------------------------------------------------------

    /// Checks that the loan at `idx` can take a repayment now, committing a
    /// pending default if there is one.
    fn ensure_repayable(&mut self, idx: usize, now: Timestamp) -> LendingResult<()> {
        let pool_id = self.pool.pool_id;
        let loan = &self.loans[idx];
        if loan.state != LoanState::Accepted {
            return Err(LendingError::LoanNotActive {
                pool_id,
                loan_id: loan.loan_id,
                state: loan.state,
            });
        }
        let effective = derive_effective_state(loan, self.pool.config.loan_default_duration, now);
        if effective == LoanState::Defaulted {
            return Err(self.commit_lapse(idx, effective));
        }
        Ok(())
    }

    /// Pulls `amount` from `payer` to the loan's lender.
    fn collect(&self, idx: usize, payer: &Address, amount: u64) -> LendingResult<()> {
        let loan = &self.loans[idx];
        let lender = loan
            .lender
            .as_ref()
            .ok_or(LendingError::LoanNotActive {
                pool_id: self.pool.pool_id,
                loan_id: loan.loan_id,
                state: loan.state,
            })?;
        self.ctx
            .tokens
            .write()
            .settle(&loan.token, &self.address, &[TransferLeg::new(payer, lender, amount)])
            .map_err(|source| LendingError::TransferFailed {
                pool_id: self.pool.pool_id,
                loan_id: loan.loan_id,
                source,
            })
    }

    /// Pays the installment currently due and returns the amount paid.
    ///
    /// Anyone may pay; `caller` must have approved this ledger for the
    /// amount. Reaching a zero balance closes the loan as `Repaid`, any
    /// other payment pushes the due date out by one cycle.
    ///
    /// # Errors
    ///
    /// - [`LendingError::LoanNotActive`] unless the loan is `Accepted`.
    /// - [`LendingError::LoanInDefault`] past the default window; the loan is
    ///   left `Defaulted`.
    /// - [`LendingError::TransferFailed`] if the payment cannot be pulled.
    pub fn repay_your_loan(&mut self, caller: &Address, loan_id: LoanId) -> LendingResult<u64> {
        let idx = self.index(loan_id)?;
        let now = self.ctx.clock.now();
        self.ensure_repayable(idx, now)?;

        let amount_due = self.loans[idx].installment_due();
        self.collect(idx, caller, amount_due)?;

        let pool_id = self.pool.pool_id;
        let cycle = self.pool.config.payment_cycle_duration;
        let loan = &mut self.loans[idx];
        loan.amount_repaid = loan
            .amount_repaid
            .checked_add(amount_due)
            .ok_or(LendingError::ArithmeticOverflow("recording repayment"))?;
        loan.installments_paid += 1;
        loan.last_payment_at = Some(now);

        if loan.amount_repaid >= loan.total_repayable() {
            loan.state = LoanState::Repaid;
            info!(pool_id, loan_id, payer = %caller, amount = amount_due, "loan repaid in full");
            self.ctx
                .events
                .emit(LendingEvent::LoanRepaidInFull { pool_id, loan_id });
        } else {
            loan.next_due_date = loan.next_due_date.map(|due| due.saturating_add(cycle));
            info!(
                pool_id,
                loan_id,
                payer = %caller,
                amount = amount_due,
                outstanding = loan.outstanding_balance(),
                "installment paid"
            );
            self.ctx.events.emit(LendingEvent::InstallmentPaid {
                pool_id,
                loan_id,
                amount: amount_due,
            });
        }
        Ok(amount_due)
    }

    /// Pays off everything still owed in one transfer and returns the amount.
    ///
    /// # Errors
    ///
    /// - [`LendingError::AlreadyRepaid`] if the loan is `Repaid` or nothing
    ///   is outstanding.
    /// - [`LendingError::LoanNotActive`] for any other non-`Accepted` loan.
    /// - [`LendingError::LoanInDefault`] past the default window.
    /// - [`LendingError::TransferFailed`] if the payment cannot be pulled.
    pub fn repay_full_loan(&mut self, caller: &Address, loan_id: LoanId) -> LendingResult<u64> {
        let idx = self.index(loan_id)?;
        let now = self.ctx.clock.now();
        let pool_id = self.pool.pool_id;

        if self.loans[idx].state == LoanState::Repaid {
            return Err(LendingError::AlreadyRepaid { pool_id, loan_id });
        }
        self.ensure_repayable(idx, now)?;

        let full_repay_amount = self.loans[idx].outstanding_balance();
        if full_repay_amount == 0 {
            return Err(LendingError::AlreadyRepaid { pool_id, loan_id });
        }
        self.collect(idx, caller, full_repay_amount)?;

        let loan = &mut self.loans[idx];
        loan.amount_repaid = loan.total_repayable();
        loan.state = LoanState::Repaid;
        loan.last_payment_at = Some(now);

        info!(pool_id, loan_id, payer = %caller, amount = full_repay_amount, "loan repaid in full");
        self.ctx
            .events
            .emit(LendingEvent::LoanRepaidInFull { pool_id, loan_id });
        Ok(full_repay_amount)
    }

    // -- Views --------------------------------------------------------------

    /// The loan's state as of now, including unapplied expiry or default.
    pub fn effective_state(&self, loan_id: LoanId) -> LendingResult<LoanState> {
        let loan = self.loan(loan_id)?;
        Ok(derive_effective_state(
            loan,
            self.pool.config.loan_default_duration,
            self.ctx.clock.now(),
        ))
    }

    /// The stored next due date; `None` before acceptance.
    pub fn calculate_next_due_date(&self, loan_id: LoanId) -> LendingResult<Option<Timestamp>> {
        Ok(self.loan(loan_id)?.next_due_date)
    }

    /// `true` for a pending loan past its acceptance deadline.
    pub fn is_loan_expired(&self, loan_id: LoanId) -> LendingResult<bool> {
        let loan = self.loan(loan_id)?;
        Ok(loan.state == LoanState::Pending && self.ctx.clock.now() > loan.requested_expiration)
    }

    /// `true` for an accepted loan whose current installment is overdue.
    pub fn is_payment_late(&self, loan_id: LoanId) -> LendingResult<bool> {
        let loan = self.loan(loan_id)?;
        let now = self.ctx.clock.now();
        Ok(loan.state == LoanState::Accepted && loan.next_due_date.is_some_and(|due| now > due))
    }

    /// `true` if the loan is, or would be on its next touch, `Defaulted`.
    pub fn is_loan_defaulted(&self, loan_id: LoanId) -> LendingResult<bool> {
        Ok(self.effective_state(loan_id)? == LoanState::Defaulted)
    }

    /// What the next installment call would collect.
    pub fn view_installment_amount(&self, loan_id: LoanId) -> LendingResult<u64> {
        Ok(self.loan(loan_id)?.installment_due())
    }

    /// What a full repayment would collect; `0` once repaid.
    pub fn view_full_repay_amount(&self, loan_id: LoanId) -> LendingResult<u64> {
        Ok(self.loan(loan_id)?.outstanding_balance())
    }
}

impl fmt::Debug for LoanLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoanLedger")
            .field("address", &self.address)
            .field("pool_id", &self.pool.pool_id)
            .field("loans", &self.loans.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_loan(state: LoanState) -> Loan {
        Loan {
            loan_id: 0,
            pool_id: 1,
            token: Address::new("USD"),
            lender: None,
            borrower: Address::new("bob"),
            receiver: Address::new("bob"),
            principal: 1_000,
            interest_rate_bps: 0,
            max_duration: 90,
            requested_at: 0,
            requested_expiration: 10,
            schedule: Schedule::compute(1_000, 0, 90, 30).unwrap(),
            state,
            accepted_at: None,
            next_due_date: None,
            amount_repaid: 0,
            installments_paid: 0,
            last_payment_at: None,
        }
    }

    #[test]
    fn pending_expires_strictly_after_deadline() {
        let loan = sample_loan(LoanState::Pending);
        assert_eq!(derive_effective_state(&loan, 100, 10), LoanState::Pending);
        assert_eq!(derive_effective_state(&loan, 100, 11), LoanState::Expired);
    }

    #[test]
    fn accepted_defaults_at_window_boundary() {
        let mut loan = sample_loan(LoanState::Accepted);
        loan.next_due_date = Some(30);
        assert_eq!(derive_effective_state(&loan, 100, 129), LoanState::Accepted);
        assert_eq!(derive_effective_state(&loan, 100, 130), LoanState::Defaulted);
    }

    #[test]
    fn terminal_states_are_stable() {
        for state in [LoanState::Repaid, LoanState::Expired, LoanState::Defaulted] {
            let loan = sample_loan(state);
            assert!(state.is_terminal());
            assert_eq!(derive_effective_state(&loan, 0, u64::MAX), state);
        }
        assert!(!LoanState::Pending.is_terminal());
        assert!(!LoanState::Accepted.is_terminal());
    }

    #[test]
    fn installment_due_collects_remainder_in_final_cycle() {
        let mut loan = sample_loan(LoanState::Accepted);
        assert_eq!(loan.installment_due(), 333);
        loan.installments_paid = 1;
        loan.amount_repaid = 333;
        assert_eq!(loan.installment_due(), 333);
        loan.installments_paid = 2;
        loan.amount_repaid = 666;
        assert_eq!(loan.installment_due(), 334);
        loan.installments_paid = 3;
        loan.amount_repaid = 1_000;
        assert_eq!(loan.installment_due(), 0);
    }

    #[test]
    fn loan_state_display() {
        assert_eq!(LoanState::Defaulted.to_string(), "Defaulted");
    }
}
