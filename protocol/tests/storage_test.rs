//! Persistence integration tests for the peerpool protocol.
//!
//! Each test writes collaborator state to an on-disk database in its own
//! temporary directory, closes it, reopens it, and checks that what comes
//! back behaves exactly like what went in.

use serde::{Deserialize, Serialize};

use peerpool_protocol::identity::derive_ledger_address;
use peerpool_protocol::storage::PoolDB;
use peerpool_protocol::{
    Address, AttestationRegistry, FeeAuthority, FeeConfig, MembershipVerifier, Role, TokenBank,
    TokenLedger,
};

fn addr(s: &str) -> Address {
    Address::new(s)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Record {
    id: u64,
    owner: Address,
    amounts: Vec<u64>,
}

#[test]
fn token_bank_and_fees_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let usd = addr("USD");

    {
        let db = PoolDB::open(dir.path()).unwrap();
        let mut bank = TokenBank::new();
        bank.create_token(usd.clone(), "USD", addr("mint")).unwrap();
        bank.mint(&addr("mint"), &usd, &addr("alice"), 500).unwrap();
        bank.approve(&usd, &addr("alice"), &addr("ledger"), 200).unwrap();

        let mut fees = FeeConfig::new(addr("treasury"));
        fees.set_protocol_fee(&addr("treasury"), 350).unwrap();
        fees.set_fee_recipient(&addr("treasury"), addr("vault")).unwrap();

        db.put_meta("token_bank", &bank).unwrap();
        db.put_meta("fee_config", &fees).unwrap();
        db.flush().unwrap();
    }

    let db = PoolDB::open(dir.path()).unwrap();
    let mut bank: TokenBank = db.get_meta("token_bank").unwrap().unwrap();
    assert_eq!(bank.balance_of(&usd, &addr("alice")), 500);
    assert_eq!(bank.allowance(&usd, &addr("alice"), &addr("ledger")), 200);
    assert_eq!(bank.token_info(&usd).unwrap().total_supply, 500);
    bank.transfer_from(&usd, &addr("ledger"), &addr("alice"), &addr("bob"), 150)
        .unwrap();
    assert_eq!(bank.balance_of(&usd, &addr("bob")), 150);

    let fees: FeeConfig = db.get_meta("fee_config").unwrap().unwrap();
    assert_eq!(fees.protocol_fee_bps(), 350);
    assert_eq!(fees.fee_recipient(), addr("vault"));
}

#[test]
fn memberships_survive_reopen_with_expiry_intact() {
    let dir = tempfile::tempdir().unwrap();
    let authority = addr("registry");

    {
        let db = PoolDB::open(dir.path()).unwrap();
        let mut registry = AttestationRegistry::new(authority.clone());
        registry
            .set_verification(&authority, 1, Role::Lender, &addr("alice"), 1_000, 10)
            .unwrap();
        registry
            .set_verification(&authority, 1, Role::Borrower, &addr("bob"), 2_000, 10)
            .unwrap();
        registry
            .set_verification(&authority, 2, Role::Lender, &addr("bob"), 3_000, 10)
            .unwrap();
        db.replace_memberships(registry.entries()).unwrap();
        db.flush().unwrap();
    }

    let db = PoolDB::open(dir.path()).unwrap();
    let restored = AttestationRegistry::from_entries(authority, db.memberships().unwrap());

    let alice = restored.is_verified(1, Role::Lender, &addr("alice"), 999);
    assert!(alice.is_verified);
    assert_eq!(alice.expiration, 1_000);
    assert!(!restored.is_verified(1, Role::Lender, &addr("alice"), 1_000).is_verified);
    assert!(restored.is_verified(1, Role::Borrower, &addr("bob"), 1_500).is_verified);
    assert!(!restored.is_verified(1, Role::Lender, &addr("bob"), 1_500).is_verified);
    assert!(restored.is_verified(2, Role::Lender, &addr("bob"), 1_500).is_verified);
    assert_eq!(restored.entries().count(), 3);
}

#[test]
fn pool_and_loan_records_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let records: Vec<Record> = (0..5)
        .map(|id| Record {
            id,
            owner: addr("carol"),
            amounts: vec![id * 10; id as usize],
        })
        .collect();

    {
        let db = PoolDB::open(dir.path()).unwrap();
        db.put_pool(1, &records[0]).unwrap();
        db.put_loans(1, records.iter().map(|r| (r.id, r))).unwrap();
        db.put_loan(2, 0, &records[4]).unwrap();
        db.flush().unwrap();
    }

    let db = PoolDB::open(dir.path()).unwrap();
    let pools: Vec<(u64, Record)> = db.pools().unwrap();
    assert_eq!(pools, vec![(1, records[0].clone())]);
    let loans: Vec<Record> = db.loans_for_pool(1).unwrap();
    assert_eq!(loans, records);
    assert_eq!(db.get_loan::<Record>(2, 0).unwrap(), Some(records[4].clone()));
    assert!(db.loans_for_pool::<Record>(3).unwrap().is_empty());
}

#[test]
fn ledger_addresses_are_stable_and_distinct() {
    let registry = addr("registry");
    let first = derive_ledger_address(&registry, 1);
    assert_eq!(first, derive_ledger_address(&registry, 1));
    assert_ne!(first, derive_ledger_address(&registry, 2));
    assert_ne!(first, derive_ledger_address(&addr("other-registry"), 1));
    assert!(first.as_str().starts_with("0x"));
}
