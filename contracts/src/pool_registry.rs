//! # Pool Registry
//!
//! Creates pools, freezes their configuration, binds one [`LoanLedger`] per
//! pool, and fronts membership management for pool owners.
//!
//! Pools and ledgers live in two append-only tables indexed by pool id.
//! Pool ids start at 1 and are never reused. A pool's ledger address is
//! derived from the registry address and the pool id, so it is fixed the
//! moment the pool exists and can never be rebound.
//!
//! Membership writes are forwarded to the shared verifier with the registry
//! as the writing identity; only the pool owner may trigger them.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use peerpool_protocol::config::MAX_FEE_BPS;
use peerpool_protocol::identity::derive_ledger_address;
use peerpool_protocol::{Address, LendingEvent, PoolId, Role, Timestamp, Verification};

use crate::context::LedgerContext;
use crate::error::{LendingError, LendingResult};
use crate::loan_ledger::{Loan, LoanLedger};

/// Parameters a pool is created with. Immutable once the pool exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Pointer to off-chain pool documentation.
    pub metadata_uri: String,
    /// Interval between installments, in seconds.
    pub payment_cycle_duration: u64,
    /// Grace period after a missed due date before default, in seconds.
    pub loan_default_duration: u64,
    /// How long a request may wait for a lender, in seconds.
    pub loan_expiration_duration: u64,
    /// Advertised annual rate in basis points. Informational.
    pub apr_bps: u32,
    /// Share of each principal paid to the pool owner, in basis points.
    pub marketplace_fee_bps: u32,
    /// Longest loan term a borrower may request, if limited.
    pub max_loan_duration: Option<u64>,
    /// Lenders must hold a live attestation to accept loans.
    pub require_lender_attestation: bool,
    /// Borrowers must hold a live attestation to request loans.
    pub require_borrower_attestation: bool,
}

impl PoolConfig {
    /// Checks the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// [`LendingError::InvalidConfiguration`] if the metadata URI is empty,
    /// any duration is zero, the default window is shorter than one cycle,
    /// or the marketplace fee exceeds 100%.
    pub fn validate(&self) -> LendingResult<()> {
        let invalid = |msg: String| Err(LendingError::InvalidConfiguration(msg));
        if self.metadata_uri.trim().is_empty() {
            return invalid("metadata URI is empty".into());
        }
        if self.payment_cycle_duration == 0
            || self.loan_default_duration == 0
            || self.loan_expiration_duration == 0
        {
            return invalid("durations must be positive".into());
        }
        if self.loan_default_duration < self.payment_cycle_duration {
            return invalid(format!(
                "default window {}s is shorter than payment cycle {}s",
                self.loan_default_duration, self.payment_cycle_duration
            ));
        }
        if self.max_loan_duration == Some(0) {
            return invalid("maximum loan duration must be positive".into());
        }
        if self.marketplace_fee_bps > MAX_FEE_BPS {
            return invalid(format!(
                "marketplace fee {} bps exceeds {} bps",
                self.marketplace_fee_bps, MAX_FEE_BPS
            ));
        }
        Ok(())
    }
}

/// A lending pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// Registry-assigned id, starting at 1.
    pub pool_id: PoolId,
    /// Identity allowed to manage membership and receiving marketplace fees.
    pub owner: Address,
    /// Address of the bound loan ledger.
    pub ledger_address: Address,
    /// Frozen pool parameters.
    pub config: PoolConfig,
    /// When the pool was created.
    pub created_at: Timestamp,
}

/// Owner of every pool and its loan ledger.
pub struct PoolRegistry {
    address: Address,
    pools: Vec<Pool>,
    ledgers: Vec<LoanLedger>,
    ctx: LedgerContext,
}

impl PoolRegistry {
    /// Creates an empty registry reachable at `address`.
    ///
    /// The verifier in `ctx` must accept writes from `address`.
    pub fn new(address: Address, ctx: LedgerContext) -> Self {
        Self {
            address,
            pools: Vec::new(),
            ledgers: Vec::new(),
            ctx,
        }
    }

    /// Rebuilds a registry from persisted pools and their loans.
    ///
    /// Pools must come in id order starting at 1 and each pool's loans in id
    /// order starting at 0. Callers check this when reading from storage.
    pub(crate) fn restore(
        address: Address,
        ctx: LedgerContext,
        pools: impl IntoIterator<Item = (Pool, Vec<Loan>)>,
    ) -> Self {
        let mut registry = Self::new(address, ctx);
        for (pool, loans) in pools {
            let ledger = LoanLedger::with_loans(pool.clone(), loans, registry.ctx.clone());
            registry.pools.push(pool);
            registry.ledgers.push(ledger);
        }
        debug!(pools = registry.pools.len(), "registry restored");
        registry
    }

    /// The registry's own identity.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The shared collaborators handed to every ledger.
    pub fn context(&self) -> &LedgerContext {
        &self.ctx
    }

    /// The id the next pool will receive.
    pub fn next_pool_id(&self) -> PoolId {
        self.pools.len() as PoolId + 1
    }

    fn index(&self, pool_id: PoolId) -> LendingResult<usize> {
        pool_id
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .filter(|&i| i < self.pools.len())
            .ok_or(LendingError::PoolNotFound(pool_id))
    }

    /// Creates a pool owned by `owner`, binds its ledger, and returns its id.
    ///
    /// # Errors
    ///
    /// [`LendingError::InvalidConfiguration`] if `config` fails
    /// [`PoolConfig::validate`] or `owner` is empty.
    pub fn create_pool(&mut self, owner: &Address, config: PoolConfig) -> LendingResult<PoolId> {
        config.validate()?;
        if owner.is_empty() {
            return Err(LendingError::InvalidConfiguration("owner is empty".into()));
        }

        let pool_id = self.next_pool_id();
        let ledger_address = derive_ledger_address(&self.address, pool_id);
        let pool = Pool {
            pool_id,
            owner: owner.clone(),
            ledger_address: ledger_address.clone(),
            config,
            created_at: self.ctx.clock.now(),
        };
        self.ledgers
            .push(LoanLedger::new(pool.clone(), self.ctx.clone()));
        self.pools.push(pool);

        info!(pool_id, owner = %owner, ledger = %ledger_address, "pool created");
        self.ctx.events.emit(LendingEvent::PoolCreated {
            pool_id,
            ledger_address,
        });
        Ok(pool_id)
    }

    /// Looks up a pool.
    pub fn pool(&self, pool_id: PoolId) -> LendingResult<&Pool> {
        Ok(&self.pools[self.index(pool_id)?])
    }

    /// Every pool, in id order.
    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    /// The address of the ledger bound to `pool_id`.
    pub fn ledger_address(&self, pool_id: PoolId) -> LendingResult<&Address> {
        Ok(&self.pool(pool_id)?.ledger_address)
    }

    /// The ledger bound to `pool_id`.
    pub fn ledger(&self, pool_id: PoolId) -> LendingResult<&LoanLedger> {
        Ok(&self.ledgers[self.index(pool_id)?])
    }

    /// Mutable access to the ledger bound to `pool_id`.
    pub fn ledger_mut(&mut self, pool_id: PoolId) -> LendingResult<&mut LoanLedger> {
        let idx = self.index(pool_id)?;
        Ok(&mut self.ledgers[idx])
    }

    /// Every ledger, in pool-id order.
    pub fn ledgers(&self) -> &[LoanLedger] {
        &self.ledgers
    }

    // -- Membership ---------------------------------------------------------

    fn ensure_owner(&self, caller: &Address, pool_id: PoolId) -> LendingResult<()> {
        if &self.pool(pool_id)?.owner != caller {
            return Err(LendingError::Unauthorized {
                caller: caller.clone(),
                pool_id,
            });
        }
        Ok(())
    }

    fn attest(
        &self,
        caller: &Address,
        pool_id: PoolId,
        role: Role,
        identity: &Address,
        expiration: Timestamp,
    ) -> LendingResult<()> {
        self.ensure_owner(caller, pool_id)?;
        let now = self.ctx.clock.now();
        if expiration <= now {
            return Err(LendingError::InvalidExpiration { expiration, now });
        }
        self.ctx.verifier.write().set_verification(
            &self.address,
            pool_id,
            role,
            identity,
            expiration,
            now,
        )?;
        info!(pool_id, %role, identity = %identity, expiration, "member attested");
        Ok(())
    }

    fn revoke(
        &self,
        caller: &Address,
        pool_id: PoolId,
        role: Role,
        identity: &Address,
    ) -> LendingResult<bool> {
        self.ensure_owner(caller, pool_id)?;
        let existed = self
            .ctx
            .verifier
            .write()
            .revoke(&self.address, pool_id, role, identity)?;
        info!(pool_id, %role, identity = %identity, existed, "member revoked");
        Ok(existed)
    }

    /// Attests `identity` as a lender of `pool_id` until `expiration`.
    ///
    /// # Errors
    ///
    /// - [`LendingError::PoolNotFound`] for an unknown pool.
    /// - [`LendingError::Unauthorized`] unless `caller` owns the pool.
    /// - [`LendingError::InvalidExpiration`] if `expiration` is not in the future.
    pub fn add_lender(
        &mut self,
        caller: &Address,
        pool_id: PoolId,
        identity: &Address,
        expiration: Timestamp,
    ) -> LendingResult<()> {
        self.attest(caller, pool_id, Role::Lender, identity, expiration)
    }

    /// Attests `identity` as a borrower of `pool_id` until `expiration`.
    ///
    /// Fails like [`PoolRegistry::add_lender`].
    pub fn add_borrower(
        &mut self,
        caller: &Address,
        pool_id: PoolId,
        identity: &Address,
        expiration: Timestamp,
    ) -> LendingResult<()> {
        self.attest(caller, pool_id, Role::Borrower, identity, expiration)
    }

    /// Removes a lender attestation. Returns whether one existed.
    pub fn remove_lender(
        &mut self,
        caller: &Address,
        pool_id: PoolId,
        identity: &Address,
    ) -> LendingResult<bool> {
        self.revoke(caller, pool_id, Role::Lender, identity)
    }

    /// Removes a borrower attestation. Returns whether one existed.
    pub fn remove_borrower(
        &mut self,
        caller: &Address,
        pool_id: PoolId,
        identity: &Address,
    ) -> LendingResult<bool> {
        self.revoke(caller, pool_id, Role::Borrower, identity)
    }

    fn verification(&self, pool_id: PoolId, role: Role, identity: &Address) -> LendingResult<Verification> {
        self.index(pool_id)?;
        let now = self.ctx.clock.now();
        Ok(self.ctx.verifier.read().is_verified(pool_id, role, identity, now))
    }

    /// Lender attestation status of `identity` in `pool_id` as of now.
    pub fn lender_verification(&self, pool_id: PoolId, identity: &Address) -> LendingResult<Verification> {
        self.verification(pool_id, Role::Lender, identity)
    }

    /// Borrower attestation status of `identity` in `pool_id` as of now.
    pub fn borrower_verification(&self, pool_id: PoolId, identity: &Address) -> LendingResult<Verification> {
        self.verification(pool_id, Role::Borrower, identity)
    }
}

impl std::fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("address", &self.address)
            .field("pools", &self.pools.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PoolConfig {
        PoolConfig {
            metadata_uri: "ipfs://pool".into(),
            payment_cycle_duration: 30,
            loan_default_duration: 180,
            loan_expiration_duration: 1,
            apr_bps: 0,
            marketplace_fee_bps: 0,
            max_loan_duration: None,
            require_lender_attestation: true,
            require_borrower_attestation: true,
        }
    }

    #[test]
    fn validate_accepts_sane_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_configs() {
        let mut c = config();
        c.metadata_uri = " ".into();
        assert!(matches!(c.validate(), Err(LendingError::InvalidConfiguration(_))));

        let mut c = config();
        c.loan_expiration_duration = 0;
        assert!(c.validate().is_err());

        let mut c = config();
        c.loan_default_duration = 29;
        assert!(c.validate().is_err());

        let mut c = config();
        c.marketplace_fee_bps = MAX_FEE_BPS + 1;
        assert!(c.validate().is_err());

        let mut c = config();
        c.max_loan_duration = Some(0);
        assert!(c.validate().is_err());
    }

    #[test]
    fn default_window_equal_to_cycle_is_allowed() {
        let mut c = config();
        c.loan_default_duration = c.payment_cycle_duration;
        assert!(c.validate().is_ok());
    }
}
