//! # PoolDB: Persistent Storage Engine
//!
//! The persistence layer for a peerpool deployment, built on sled's
//! embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree          | Key                                  | Value                     |
//! |---------------|--------------------------------------|---------------------------|
//! | `pools`       | `pool_id` (8B BE)                    | `bincode(pool record)`    |
//! | `loans`       | `pool_id` (8B BE) ‖ `loan_id` (8B BE)| `bincode(loan record)`    |
//! | `memberships` | `pool_id` (8B BE) ‖ role ‖ identity  | `bincode(MembershipEntry)`|
//! | `metadata`    | key (UTF-8)                          | `bincode(value)`          |
//!
//! Integer keys are big-endian so sled's lexicographic order matches numeric
//! order: a prefix scan over one pool's loans yields them by loan id.
//!
//! Records are stored for the lifetime of the deployment. Terminal loans are
//! never deleted.
//!
//! ## Commits
//!
//! A [`WriteSet`] stages encoded records for every tree and
//! [`PoolDB::commit`] applies them in one sled transaction: either every
//! staged record lands or none does.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::TransactionError;
use sled::{Batch, Db, Transactional, Tree};

use crate::attestation::{MembershipEntry, MembershipKey, Role};
use crate::config::{TREE_LOANS, TREE_MEMBERSHIPS, TREE_METADATA, TREE_POOLS};
use crate::identity::{Address, LoanId, PoolId};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt key in tree {tree}")]
    CorruptKey { tree: &'static str },

    #[error("missing record: {0}")]
    MissingRecord(String),
}

pub type DbResult<T> = Result<T, DbError>;

fn encode<T: Serialize>(value: &T) -> DbResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

fn loan_key(pool_id: PoolId, loan_id: LoanId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&pool_id.to_be_bytes());
    key[8..].copy_from_slice(&loan_id.to_be_bytes());
    key
}

fn membership_key(pool_id: PoolId, role: Role, identity: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(9 + identity.as_str().len());
    key.extend_from_slice(&pool_id.to_be_bytes());
    key.push(role.tag());
    key.extend_from_slice(identity.as_str().as_bytes());
    key
}

fn parse_membership_key(key: &[u8]) -> Option<MembershipKey> {
    if key.len() < 9 {
        return None;
    }
    let pool_id = PoolId::from_be_bytes(key[..8].try_into().ok()?);
    let role = match key[8] {
        0 => Role::Lender,
        1 => Role::Borrower,
        _ => return None,
    };
    let identity = std::str::from_utf8(&key[9..]).ok()?;
    Some((pool_id, role, Address::new(identity)))
}

// ---------------------------------------------------------------------------
// WriteSet
// ---------------------------------------------------------------------------

type Entry = (Vec<u8>, Vec<u8>);

/// Records staged for one atomic [`PoolDB::commit`].
///
/// Values are encoded while staging, so a record that fails to serialize is
/// reported before the database is touched.
#[derive(Debug, Default)]
pub struct WriteSet {
    pools: Vec<Entry>,
    loans: Vec<Entry>,
    memberships: Option<Vec<Entry>>,
    metadata: Vec<Entry>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a pool record.
    pub fn put_pool<T: Serialize>(&mut self, pool_id: PoolId, pool: &T) -> DbResult<()> {
        self.pools.push((pool_id.to_be_bytes().to_vec(), encode(pool)?));
        Ok(())
    }

    /// Stages a loan record.
    pub fn put_loan<T: Serialize>(&mut self, pool_id: PoolId, loan_id: LoanId, loan: &T) -> DbResult<()> {
        self.loans.push((loan_key(pool_id, loan_id).to_vec(), encode(loan)?));
        Ok(())
    }

    /// Stages a singleton value under `key`.
    pub fn put_meta<T: Serialize>(&mut self, key: &str, value: &T) -> DbResult<()> {
        self.metadata.push((key.as_bytes().to_vec(), encode(value)?));
        Ok(())
    }

    /// Stages a full replacement of the membership table.
    pub fn replace_memberships<'a, I>(&mut self, entries: I) -> DbResult<()>
    where
        I: IntoIterator<Item = (&'a MembershipKey, &'a MembershipEntry)>,
    {
        let mut staged = Vec::new();
        for ((pool_id, role, identity), entry) in entries {
            staged.push((membership_key(*pool_id, *role, identity), encode(entry)?));
        }
        self.memberships = Some(staged);
        Ok(())
    }

    /// Number of staged records.
    pub fn len(&self) -> usize {
        self.pools.len()
            + self.loans.len()
            + self.metadata.len()
            + self.memberships.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// PoolDB
// ---------------------------------------------------------------------------

/// Persistent storage for pools, loans, memberships, and deployment
/// metadata.
///
/// Values are opaque to the database: any serde type can be stored, and the
/// caller decides the record shape.
#[derive(Debug, Clone)]
pub struct PoolDB {
    db: Db,
    pools: Tree,
    loans: Tree,
    memberships: Tree,
    metadata: Tree,
}

impl PoolDB {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let pools = db.open_tree(TREE_POOLS)?;
        let loans = db.open_tree(TREE_LOANS)?;
        let memberships = db.open_tree(TREE_MEMBERSHIPS)?;
        let metadata = db.open_tree(TREE_METADATA)?;

        Ok(Self {
            db,
            pools,
            loans,
            memberships,
            metadata,
        })
    }

    // -- Pools --------------------------------------------------------------

    /// Stores (or overwrites) a pool record.
    pub fn put_pool<T: Serialize>(&self, pool_id: PoolId, pool: &T) -> DbResult<()> {
        self.pools.insert(pool_id.to_be_bytes(), encode(pool)?)?;
        Ok(())
    }

    /// Loads a pool record.
    pub fn get_pool<T: DeserializeOwned>(&self, pool_id: PoolId) -> DbResult<Option<T>> {
        match self.pools.get(pool_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every pool record in pool-id order.
    pub fn pools<T: DeserializeOwned>(&self) -> DbResult<Vec<(PoolId, T)>> {
        let mut out = Vec::new();
        for item in self.pools.iter() {
            let (key, value) = item?;
            let id_bytes = <[u8; 8]>::try_from(&key[..])
                .map_err(|_| DbError::CorruptKey { tree: TREE_POOLS })?;
            out.push((PoolId::from_be_bytes(id_bytes), decode(&value)?));
        }
        Ok(out)
    }

    // -- Loans --------------------------------------------------------------

    /// Stores (or overwrites) a loan record.
    pub fn put_loan<T: Serialize>(&self, pool_id: PoolId, loan_id: LoanId, loan: &T) -> DbResult<()> {
        self.loans.insert(loan_key(pool_id, loan_id), encode(loan)?)?;
        Ok(())
    }

    /// Stores many loan records of one pool in a single batch.
    pub fn put_loans<'a, T, I>(&self, pool_id: PoolId, loans: I) -> DbResult<()>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = (LoanId, &'a T)>,
    {
        let mut batch = Batch::default();
        for (loan_id, loan) in loans {
            batch.insert(loan_key(pool_id, loan_id).to_vec(), encode(loan)?);
        }
        self.loans.apply_batch(batch)?;
        Ok(())
    }

    /// Loads a loan record.
    pub fn get_loan<T: DeserializeOwned>(&self, pool_id: PoolId, loan_id: LoanId) -> DbResult<Option<T>> {
        match self.loans.get(loan_key(pool_id, loan_id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every loan record of `pool_id` in loan-id order.
    pub fn loans_for_pool<T: DeserializeOwned>(&self, pool_id: PoolId) -> DbResult<Vec<T>> {
        let mut out = Vec::new();
        for item in self.loans.scan_prefix(pool_id.to_be_bytes()) {
            let (_, value) = item?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    // -- Memberships --------------------------------------------------------

    /// Replaces the whole membership table with `entries`.
    ///
    /// Revocations delete entries, so the table is rewritten rather than
    /// merged.
    pub fn replace_memberships<'a, I>(&self, entries: I) -> DbResult<()>
    where
        I: IntoIterator<Item = (&'a MembershipKey, &'a MembershipEntry)>,
    {
        let mut batch = Batch::default();
        for item in self.memberships.iter() {
            let (key, _) = item?;
            batch.remove(key);
        }
        for ((pool_id, role, identity), entry) in entries {
            batch.insert(membership_key(*pool_id, *role, identity), encode(entry)?);
        }
        self.memberships.apply_batch(batch)?;
        Ok(())
    }

    /// Every stored membership entry.
    pub fn memberships(&self) -> DbResult<Vec<(MembershipKey, MembershipEntry)>> {
        let mut out = Vec::new();
        for item in self.memberships.iter() {
            let (key, value) = item?;
            let parsed = parse_membership_key(&key).ok_or(DbError::CorruptKey {
                tree: TREE_MEMBERSHIPS,
            })?;
            out.push((parsed, decode(&value)?));
        }
        Ok(out)
    }

    // -- Metadata -----------------------------------------------------------

    /// Stores a singleton value under `key`.
    pub fn put_meta<T: Serialize>(&self, key: &str, value: &T) -> DbResult<()> {
        self.metadata.insert(key.as_bytes(), encode(value)?)?;
        Ok(())
    }

    /// Loads a singleton value.
    pub fn get_meta<T: DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        match self.metadata.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // -- Commits ------------------------------------------------------------

    /// Applies every record staged in `writes` in a single transaction
    /// across all four trees.
    pub fn commit(&self, writes: &WriteSet) -> DbResult<()> {
        // Transactions cannot iterate, so stale membership keys are
        // collected up front.
        let stale_memberships = match &writes.memberships {
            Some(_) => self
                .memberships
                .iter()
                .keys()
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let result: Result<(), TransactionError<DbError>> =
            (&self.pools, &self.loans, &self.memberships, &self.metadata).transaction(
                |(pools, loans, memberships, metadata)| {
                    for (key, value) in &writes.pools {
                        pools.insert(key.as_slice(), value.as_slice())?;
                    }
                    for (key, value) in &writes.loans {
                        loans.insert(key.as_slice(), value.as_slice())?;
                    }
                    if let Some(staged) = &writes.memberships {
                        for key in &stale_memberships {
                            memberships.remove(&key[..])?;
                        }
                        for (key, value) in staged {
                            memberships.insert(key.as_slice(), value.as_slice())?;
                        }
                    }
                    for (key, value) in &writes.metadata {
                        metadata.insert(key.as_slice(), value.as_slice())?;
                    }
                    Ok(())
                },
            );

        result.map_err(|e| match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => DbError::Sled(e),
        })
    }

    /// Forces everything written so far to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loans_scan_in_id_order_per_pool() {
        let db = PoolDB::open_temporary().unwrap();
        db.put_loan(1, 2, &"b".to_string()).unwrap();
        db.put_loan(1, 0, &"a".to_string()).unwrap();
        db.put_loan(2, 0, &"other".to_string()).unwrap();
        db.put_loan(1, 256, &"c".to_string()).unwrap();

        let loans: Vec<String> = db.loans_for_pool(1).unwrap();
        assert_eq!(loans, vec!["a", "b", "c"]);
        assert_eq!(db.get_loan::<String>(2, 0).unwrap().as_deref(), Some("other"));
        assert_eq!(db.get_loan::<String>(3, 0).unwrap(), None);
    }

    #[test]
    fn membership_keys_round_trip() {
        let key = membership_key(7, Role::Borrower, &Address::new("bob"));
        assert_eq!(
            parse_membership_key(&key),
            Some((7, Role::Borrower, Address::new("bob")))
        );
        assert_eq!(parse_membership_key(&key[..5]), None);
    }

    #[test]
    fn replace_memberships_drops_revoked_entries() {
        let db = PoolDB::open_temporary().unwrap();
        let entry = MembershipEntry {
            expiration: 100,
            attested_at: 1,
        };
        let a: MembershipKey = (1, Role::Lender, Address::new("a"));
        let b: MembershipKey = (1, Role::Borrower, Address::new("b"));
        db.replace_memberships([(&a, &entry), (&b, &entry)]).unwrap();
        assert_eq!(db.memberships().unwrap().len(), 2);

        db.replace_memberships([(&b, &entry)]).unwrap();
        assert_eq!(db.memberships().unwrap(), vec![(b, entry)]);
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refused"))
        }
    }

    #[test]
    fn commit_applies_every_tree_together() {
        let db = PoolDB::open_temporary().unwrap();
        let entry = MembershipEntry {
            expiration: 100,
            attested_at: 1,
        };
        let stale: MembershipKey = (1, Role::Lender, Address::new("stale"));
        let kept: MembershipKey = (1, Role::Borrower, Address::new("kept"));
        db.replace_memberships([(&stale, &entry)]).unwrap();

        let mut writes = WriteSet::new();
        writes.put_meta("balance", &900u64).unwrap();
        writes.put_pool(1, &"pool".to_string()).unwrap();
        writes.put_loan(1, 0, &"accepted".to_string()).unwrap();
        writes.replace_memberships([(&kept, &entry)]).unwrap();
        assert_eq!(writes.len(), 4);
        db.commit(&writes).unwrap();

        assert_eq!(db.get_meta::<u64>("balance").unwrap(), Some(900));
        assert_eq!(db.get_pool::<String>(1).unwrap().as_deref(), Some("pool"));
        assert_eq!(db.get_loan::<String>(1, 0).unwrap().as_deref(), Some("accepted"));
        assert_eq!(db.memberships().unwrap(), vec![(kept, entry)]);
    }

    #[test]
    fn failed_staging_leaves_database_untouched() {
        let db = PoolDB::open_temporary().unwrap();
        db.put_meta("balance", &1_000u64).unwrap();
        db.put_loan(1, 0, &"pending".to_string()).unwrap();

        let mut writes = WriteSet::new();
        writes.put_meta("balance", &900u64).unwrap();
        assert!(matches!(
            writes.put_loan(1, 0, &Unencodable),
            Err(DbError::Serialization(_))
        ));

        // The caller bails out before committing; nothing was written.
        assert_eq!(db.get_meta::<u64>("balance").unwrap(), Some(1_000));
        assert_eq!(db.get_loan::<String>(1, 0).unwrap().as_deref(), Some("pending"));
    }

    #[test]
    fn pools_and_metadata_round_trip() {
        let db = PoolDB::open_temporary().unwrap();
        db.put_pool(2, &"second".to_string()).unwrap();
        db.put_pool(1, &"first".to_string()).unwrap();
        let pools: Vec<(PoolId, String)> = db.pools().unwrap();
        assert_eq!(pools, vec![(1, "first".into()), (2, "second".into())]);

        db.put_meta("next_pool_id", &3u64).unwrap();
        assert_eq!(db.get_meta::<u64>("next_pool_id").unwrap(), Some(3));
        assert_eq!(db.get_meta::<u64>("missing").unwrap(), None);
    }
}
