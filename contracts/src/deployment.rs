//! # Deployment
//!
//! A complete lending deployment: the fee configuration, the attestation
//! service, the token bank, the event log and the pool registry with all
//! of its ledgers, wired to one clock.
//!
//! The collaborators are held here as concrete types so they can be
//! administered and persisted, and handed to the registry as trait-object
//! handles pointing at the same state.
//!
//! ## Persistence
//!
//! [`Deployment::save`] stages everything into one [`WriteSet`] and commits
//! it atomically, so balances and loan states on disk never disagree;
//! [`Deployment::load`] rebuilds it. Pools and loans go to their own trees,
//! memberships to the membership tree, and the singletons to metadata:
//!
//! | Metadata key  | Value            |
//! |---------------|------------------|
//! | `deployment`  | `DeploymentInfo` |
//! | `fee_config`  | `FeeConfig`      |
//! | `token_bank`  | `TokenBank`      |

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use peerpool_protocol::config::PROTOCOL_VERSION;
use peerpool_protocol::storage::{DbError, DbResult, PoolDB, WriteSet};
use peerpool_protocol::{
    Address, AttestationRegistry, EventLog, FeeConfig, SharedClock, SharedFeeAuthority,
    SharedTokenLedger, SharedVerifier, TokenBank,
};

use crate::context::LedgerContext;
use crate::loan_ledger::Loan;
use crate::pool_registry::{Pool, PoolRegistry};

const META_DEPLOYMENT: &str = "deployment";
const META_FEE_CONFIG: &str = "fee_config";
const META_TOKEN_BANK: &str = "token_bank";

/// Identity record of a persisted deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentInfo {
    /// Address of the pool registry; also the attestation authority.
    pub registry_address: Address,
    /// Protocol version that wrote the database.
    pub version: String,
}

/// Everything a running lending deployment consists of.
pub struct Deployment {
    fees: Arc<RwLock<FeeConfig>>,
    attestations: Arc<RwLock<AttestationRegistry>>,
    bank: Arc<RwLock<TokenBank>>,
    clock: SharedClock,
    events: EventLog,
    registry: PoolRegistry,
}

impl Deployment {
    /// A fresh deployment with no pools, no tokens and no attestations.
    ///
    /// The registry at `registry_address` is made the attestation
    /// authority; `fee_owner` administers fees and initially receives them.
    pub fn new(registry_address: Address, fee_owner: Address, clock: SharedClock) -> Self {
        Self::assemble(
            registry_address.clone(),
            FeeConfig::new(fee_owner),
            AttestationRegistry::new(registry_address),
            TokenBank::new(),
            clock,
            Vec::new(),
        )
    }

    fn assemble(
        registry_address: Address,
        fees: FeeConfig,
        attestations: AttestationRegistry,
        bank: TokenBank,
        clock: SharedClock,
        pools: Vec<(Pool, Vec<Loan>)>,
    ) -> Self {
        let fees = Arc::new(RwLock::new(fees));
        let attestations = Arc::new(RwLock::new(attestations));
        let bank = Arc::new(RwLock::new(bank));
        let events = EventLog::new();

        let verifier: SharedVerifier = attestations.clone();
        let fee_authority: SharedFeeAuthority = fees.clone();
        let tokens: SharedTokenLedger = bank.clone();
        let ctx = LedgerContext::new(verifier, fee_authority, tokens, clock.clone(), events.clone());

        let registry = PoolRegistry::restore(registry_address, ctx, pools);

        Self {
            fees,
            attestations,
            bank,
            clock,
            events,
            registry,
        }
    }

    /// The pool registry.
    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    /// Mutable access to the pool registry and, through it, every ledger.
    pub fn registry_mut(&mut self) -> &mut PoolRegistry {
        &mut self.registry
    }

    /// The fee configuration.
    pub fn fees(&self) -> &Arc<RwLock<FeeConfig>> {
        &self.fees
    }

    /// The attestation service.
    pub fn attestations(&self) -> &Arc<RwLock<AttestationRegistry>> {
        &self.attestations
    }

    /// The token bank.
    pub fn bank(&self) -> &Arc<RwLock<TokenBank>> {
        &self.bank
    }

    /// The clock every component reads.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// The shared event log.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Writes the whole deployment to `db` in one transaction and flushes it.
    pub fn save(&self, db: &PoolDB) -> DbResult<()> {
        let info = DeploymentInfo {
            registry_address: self.registry.address().clone(),
            version: PROTOCOL_VERSION.to_string(),
        };
        let mut writes = WriteSet::new();
        writes.put_meta(META_DEPLOYMENT, &info)?;
        writes.put_meta(META_FEE_CONFIG, &*self.fees.read())?;
        writes.put_meta(META_TOKEN_BANK, &*self.bank.read())?;

        for (pool, ledger) in self.registry.pools().iter().zip(self.registry.ledgers()) {
            writes.put_pool(pool.pool_id, pool)?;
            for loan in ledger.loans() {
                writes.put_loan(pool.pool_id, loan.loan_id, loan)?;
            }
        }
        writes.replace_memberships(self.attestations.read().entries())?;

        db.commit(&writes)?;
        db.flush()?;

        info!(
            registry = %info.registry_address,
            pools = self.registry.pools().len(),
            records = writes.len(),
            "deployment saved"
        );
        Ok(())
    }

    /// Rebuilds a deployment from `db`, or returns `None` if nothing was
    /// ever saved there.
    ///
    /// # Errors
    ///
    /// [`DbError::MissingRecord`] if the deployment record exists but a
    /// singleton it depends on does not, or if pool or loan ids have a gap,
    /// plus any storage error.
    pub fn load(db: &PoolDB, clock: SharedClock) -> DbResult<Option<Self>> {
        let Some(info) = db.get_meta::<DeploymentInfo>(META_DEPLOYMENT)? else {
            return Ok(None);
        };
        let fees: FeeConfig = db
            .get_meta(META_FEE_CONFIG)?
            .ok_or_else(|| DbError::MissingRecord(META_FEE_CONFIG.into()))?;
        let bank: TokenBank = db
            .get_meta(META_TOKEN_BANK)?
            .ok_or_else(|| DbError::MissingRecord(META_TOKEN_BANK.into()))?;

        let attestations =
            AttestationRegistry::from_entries(info.registry_address.clone(), db.memberships()?);

        let mut pools = Vec::new();
        for (expected, (pool_id, pool)) in (1..).zip(db.pools::<Pool>()?) {
            if pool_id != expected {
                return Err(DbError::MissingRecord(format!("pool {expected}")));
            }
            let loans: Vec<Loan> = db.loans_for_pool(pool_id)?;
            // Ledgers address loans by position.
            for (position, loan) in (0..).zip(&loans) {
                if loan.loan_id != position {
                    return Err(DbError::MissingRecord(format!(
                        "loan {position} in pool {pool_id}"
                    )));
                }
            }
            debug!(pool_id, loans = loans.len(), "pool loaded");
            pools.push((pool, loans));
        }

        info!(
            registry = %info.registry_address,
            version = %info.version,
            pools = pools.len(),
            "deployment loaded"
        );
        Ok(Some(Self::assemble(
            info.registry_address,
            fees,
            attestations,
            bank,
            clock,
            pools,
        )))
    }
}

impl std::fmt::Debug for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployment")
            .field("registry", &self.registry)
            .field("events", &self.events.len())
            .finish()
    }
}
