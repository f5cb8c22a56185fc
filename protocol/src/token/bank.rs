//! # Token Bank
//!
//! An in-memory ledger for any number of fungible tokens. Each token has an
//! issuer who alone may mint, per-account balances, and per-(owner, spender)
//! allowances.
//!
//! Settlements are staged in an overlay of touched balances and allowances
//! and only written back once every leg has succeeded, so a failure halfway
//! through a settlement leaves no trace.
//!
//! Accounts can be frozen. Nothing moves into or out of a frozen account,
//! which makes it the natural way to force a specific leg of a settlement to
//! fail.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{TokenError, TokenLedger, TransferLeg};
use crate::identity::Address;

/// Registration record for a token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// The token's address.
    pub token: Address,
    /// Ticker symbol, display only.
    pub symbol: String,
    /// Identity allowed to mint.
    pub issuer: Address,
    /// Sum of all balances.
    pub total_supply: u64,
}

/// Multi-token in-memory ledger implementing [`TokenLedger`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TokenBank {
    /// Registered tokens keyed by address.
    tokens: HashMap<Address, TokenInfo>,
    /// `token -> (account -> balance)`.
    balances: HashMap<Address, HashMap<Address, u64>>,
    /// `token -> (owner -> (spender -> allowance))`.
    allowances: HashMap<Address, HashMap<Address, HashMap<Address, u64>>>,
    /// Accounts that can neither send nor receive.
    frozen: HashSet<Address>,
}

impl TokenBank {
    /// Creates an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token with zero supply.
    ///
    /// # Errors
    ///
    /// [`TokenError::DuplicateToken`] if the address is taken.
    pub fn create_token(
        &mut self,
        token: Address,
        symbol: impl Into<String>,
        issuer: Address,
    ) -> Result<(), TokenError> {
        if self.tokens.contains_key(&token) {
            return Err(TokenError::DuplicateToken(token));
        }
        let info = TokenInfo {
            token: token.clone(),
            symbol: symbol.into(),
            issuer,
            total_supply: 0,
        };
        self.tokens.insert(token.clone(), info);
        self.balances.insert(token.clone(), HashMap::new());
        self.allowances.insert(token, HashMap::new());
        Ok(())
    }

    /// Creates `amount` new units of `token` in `to`'s account.
    ///
    /// # Errors
    ///
    /// [`TokenError::UnauthorizedMint`] unless `caller` is the issuer,
    /// [`TokenError::Overflow`] if supply or balance would exceed `u64::MAX`.
    pub fn mint(
        &mut self,
        caller: &Address,
        token: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenError> {
        let info = self
            .tokens
            .get_mut(token)
            .ok_or_else(|| TokenError::UnknownToken(token.clone()))?;
        if &info.issuer != caller {
            return Err(TokenError::UnauthorizedMint {
                token: token.clone(),
                caller: caller.clone(),
            });
        }
        let overflow = || TokenError::Overflow {
            token: token.clone(),
            account: to.clone(),
        };
        let new_supply = info.total_supply.checked_add(amount).ok_or_else(overflow)?;
        let balances = self.balances.entry(token.clone()).or_default();
        let current = balances.get(to).copied().unwrap_or(0);
        let new_balance = current.checked_add(amount).ok_or_else(overflow)?;

        balances.insert(to.clone(), new_balance);
        info.total_supply = new_supply;
        Ok(())
    }

    /// Registration record of `token`.
    pub fn token_info(&self, token: &Address) -> Option<&TokenInfo> {
        self.tokens.get(token)
    }

    /// Blocks every transfer into or out of `account`.
    pub fn freeze(&mut self, account: &Address) {
        self.frozen.insert(account.clone());
    }

    /// Lifts a freeze.
    pub fn unfreeze(&mut self, account: &Address) {
        self.frozen.remove(account);
    }

    /// Returns `true` if `account` is frozen.
    pub fn is_frozen(&self, account: &Address) -> bool {
        self.frozen.contains(account)
    }

    fn ensure_known(&self, token: &Address) -> Result<(), TokenError> {
        if self.tokens.contains_key(token) {
            Ok(())
        } else {
            Err(TokenError::UnknownToken(token.clone()))
        }
    }
}

/// Balances and allowances touched by an in-flight settlement.
struct Staged<'a> {
    bank: &'a TokenBank,
    token: &'a Address,
    balances: HashMap<Address, u64>,
    allowances: HashMap<Address, u64>,
}

impl<'a> Staged<'a> {
    fn balance(&self, account: &Address) -> u64 {
        self.balances
            .get(account)
            .copied()
            .unwrap_or_else(|| self.bank.balance_of(self.token, account))
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.allowances
            .get(owner)
            .copied()
            .unwrap_or_else(|| self.bank.allowance(self.token, owner, spender))
    }

    fn apply(&mut self, spender: &Address, leg: &TransferLeg) -> Result<(), TokenError> {
        if leg.amount == 0 {
            return Ok(());
        }
        for account in [&leg.from, &leg.to] {
            if self.bank.is_frozen(account) {
                return Err(TokenError::AccountFrozen(account.clone()));
            }
        }

        if &leg.from != spender {
            let allowed = self.allowance(&leg.from, spender);
            if allowed < leg.amount {
                return Err(TokenError::InsufficientAllowance {
                    token: self.token.clone(),
                    owner: leg.from.clone(),
                    spender: spender.clone(),
                    available: allowed,
                    requested: leg.amount,
                });
            }
            self.allowances
                .insert(leg.from.clone(), allowed - leg.amount);
        }

        let available = self.balance(&leg.from);
        if available < leg.amount {
            return Err(TokenError::InsufficientBalance {
                token: self.token.clone(),
                account: leg.from.clone(),
                available,
                requested: leg.amount,
            });
        }
        self.balances
            .insert(leg.from.clone(), available - leg.amount);

        let credited = self
            .balance(&leg.to)
            .checked_add(leg.amount)
            .ok_or_else(|| TokenError::Overflow {
                token: self.token.clone(),
                account: leg.to.clone(),
            })?;
        self.balances.insert(leg.to.clone(), credited);
        Ok(())
    }
}

impl TokenLedger for TokenBank {
    fn balance_of(&self, token: &Address, owner: &Address) -> u64 {
        self.balances
            .get(token)
            .and_then(|accounts| accounts.get(owner))
            .copied()
            .unwrap_or(0)
    }

    fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> u64 {
        self.allowances
            .get(token)
            .and_then(|owners| owners.get(owner))
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(
        &mut self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: u64,
    ) -> Result<(), TokenError> {
        self.ensure_known(token)?;
        self.allowances
            .entry(token.clone())
            .or_default()
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), amount);
        Ok(())
    }

    fn settle(
        &mut self,
        token: &Address,
        spender: &Address,
        legs: &[TransferLeg],
    ) -> Result<(), TokenError> {
        self.ensure_known(token)?;

        let mut staged = Staged {
            bank: self,
            token,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        };
        for leg in legs {
            staged.apply(spender, leg)?;
        }
        let Staged {
            balances,
            allowances,
            ..
        } = staged;

        let token_balances = self.balances.entry(token.clone()).or_default();
        for (account, amount) in balances {
            token_balances.insert(account, amount);
        }
        let token_allowances = self.allowances.entry(token.clone()).or_default();
        for (owner, amount) in allowances {
            token_allowances
                .entry(owner)
                .or_default()
                .insert(spender.clone(), amount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s)
    }

    fn bank_with_funds() -> (TokenBank, Address) {
        let usd = addr("USD");
        let mut bank = TokenBank::new();
        bank.create_token(usd.clone(), "USD", addr("issuer")).unwrap();
        bank.mint(&addr("issuer"), &usd, &addr("alice"), 1_000).unwrap();
        (bank, usd)
    }

    #[test]
    fn mint_credits_and_tracks_supply() {
        let (bank, usd) = bank_with_funds();
        assert_eq!(bank.balance_of(&usd, &addr("alice")), 1_000);
        assert_eq!(bank.token_info(&usd).unwrap().total_supply, 1_000);
    }

    #[test]
    fn only_issuer_mints() {
        let (mut bank, usd) = bank_with_funds();
        let err = bank.mint(&addr("alice"), &usd, &addr("alice"), 1).unwrap_err();
        assert!(matches!(err, TokenError::UnauthorizedMint { .. }));
    }

    #[test]
    fn duplicate_token_rejected() {
        let (mut bank, usd) = bank_with_funds();
        let err = bank.create_token(usd, "USD", addr("other")).unwrap_err();
        assert!(matches!(err, TokenError::DuplicateToken(_)));
    }

    #[test]
    fn transfer_moves_own_funds() {
        let (mut bank, usd) = bank_with_funds();
        bank.transfer(&usd, &addr("alice"), &addr("bob"), 400).unwrap();
        assert_eq!(bank.balance_of(&usd, &addr("alice")), 600);
        assert_eq!(bank.balance_of(&usd, &addr("bob")), 400);
    }

    #[test]
    fn transfer_from_consumes_allowance() {
        let (mut bank, usd) = bank_with_funds();
        bank.approve(&usd, &addr("alice"), &addr("pool"), 300).unwrap();
        bank.transfer_from(&usd, &addr("pool"), &addr("alice"), &addr("bob"), 200)
            .unwrap();
        assert_eq!(bank.allowance(&usd, &addr("alice"), &addr("pool")), 100);
        assert_eq!(bank.balance_of(&usd, &addr("bob")), 200);

        let err = bank
            .transfer_from(&usd, &addr("pool"), &addr("alice"), &addr("bob"), 101)
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientAllowance { available: 100, .. }));
    }

    #[test]
    fn insufficient_balance_rejected() {
        let (mut bank, usd) = bank_with_funds();
        let err = bank
            .transfer(&usd, &addr("alice"), &addr("bob"), 1_001)
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientBalance { available: 1_000, .. }));
        assert_eq!(bank.balance_of(&usd, &addr("alice")), 1_000);
    }

    #[test]
    fn failed_leg_rolls_back_whole_settlement() {
        let (mut bank, usd) = bank_with_funds();
        bank.approve(&usd, &addr("alice"), &addr("pool"), 1_000).unwrap();
        bank.freeze(&addr("carol"));

        let legs = [
            TransferLeg::new(&addr("alice"), &addr("pool"), 1_000),
            TransferLeg::new(&addr("pool"), &addr("fees"), 20),
            TransferLeg::new(&addr("pool"), &addr("carol"), 980),
        ];
        let err = bank.settle(&usd, &addr("pool"), &legs).unwrap_err();
        assert_eq!(err, TokenError::AccountFrozen(addr("carol")));

        assert_eq!(bank.balance_of(&usd, &addr("alice")), 1_000);
        assert_eq!(bank.balance_of(&usd, &addr("pool")), 0);
        assert_eq!(bank.balance_of(&usd, &addr("fees")), 0);
        assert_eq!(bank.allowance(&usd, &addr("alice"), &addr("pool")), 1_000);
    }

    #[test]
    fn settlement_routes_through_intermediary() {
        let (mut bank, usd) = bank_with_funds();
        bank.approve(&usd, &addr("alice"), &addr("pool"), 1_000).unwrap();
        let legs = [
            TransferLeg::new(&addr("alice"), &addr("pool"), 1_000),
            TransferLeg::new(&addr("pool"), &addr("fees"), 20),
            TransferLeg::new(&addr("pool"), &addr("bob"), 980),
        ];
        bank.settle(&usd, &addr("pool"), &legs).unwrap();
        assert_eq!(bank.balance_of(&usd, &addr("pool")), 0);
        assert_eq!(bank.balance_of(&usd, &addr("fees")), 20);
        assert_eq!(bank.balance_of(&usd, &addr("bob")), 980);
        assert_eq!(bank.allowance(&usd, &addr("alice"), &addr("pool")), 0);
    }

    #[test]
    fn unknown_token_rejected() {
        let (mut bank, _) = bank_with_funds();
        let err = bank
            .approve(&addr("EUR"), &addr("alice"), &addr("pool"), 1)
            .unwrap_err();
        assert_eq!(err, TokenError::UnknownToken(addr("EUR")));
    }
}
