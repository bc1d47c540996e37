// SPDX-License-Identifier: AGPL-3.0-only
//! # Fungible Token Ledger
//!
//! ERC-20 equivalent token used by the exchange as its asset abstraction.
//!
//! ## Features
//! - Fixed supply minted to the deployer (mock-token semantics)
//! - Transfer, Approve, TransferFrom
//! - Mint / Burn for fixtures and supply adjustments
//! - All amounts in atomic units (`u128`), no floating-point
//!
//! The exchange never touches a [`Token`] directly. It goes through the
//! [`FungibleAsset`] trait, resolved by address through an [`AssetBank`].

use dxp_core::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod registry;

pub use registry::{TokenInfo, TokenRegistry};

/// Max symbol length (ticker)
pub const MAX_SYMBOL_LEN: usize = 11;
/// Max name length
pub const MAX_NAME_LEN: usize = 64;
/// Max decimals supported by the unit helpers
pub const MAX_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("insufficient balance: {owner} has {have}, needs {need}")]
    InsufficientBalance {
        owner: Address,
        have: u128,
        need: u128,
    },
    #[error("insufficient allowance: {spender} may spend {have} of {owner}, needs {need}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        have: u128,
        need: u128,
    },
    #[error("zero address not allowed")]
    ZeroAddress,
    #[error("arithmetic overflow")]
    Overflow,
    #[error("unknown token {0}")]
    UnknownToken(Address),
    #[error("token already deployed at {0}")]
    AlreadyDeployed(Address),
    #[error("invalid token metadata: {0}")]
    InvalidMetadata(String),
}

/// Balance ledger interface the exchange consumes.
pub trait FungibleAsset {
    fn address(&self) -> &Address;

    fn symbol(&self) -> &str;

    fn balance_of(&self, owner: &Address) -> u128;

    fn allowance(&self, owner: &Address, spender: &Address) -> u128;

    /// Set (not add to) the amount `spender` may move out of `owner`.
    fn approve(&mut self, owner: &Address, spender: &Address, amount: u128)
        -> Result<(), TokenError>;

    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError>;

    /// Move `amount` from `owner` to `to` on behalf of `spender`, consuming
    /// allowance.
    fn transfer_from(
        &mut self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError>;
}

/// Resolves asset addresses to ledgers.
pub trait AssetBank {
    fn asset(&self, address: &Address) -> Option<&dyn FungibleAsset>;

    fn asset_mut(&mut self, address: &Address) -> Option<&mut dyn FungibleAsset>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: u128,
    pub owner: Address,
    balances: BTreeMap<Address, u128>,
    /// owner -> spender -> amount
    allowances: BTreeMap<Address, BTreeMap<Address, u128>>,
}

impl Token {
    /// Deploy a token and mint `initial_supply` to `owner`.
    pub fn deploy(
        address: Address,
        name: &str,
        symbol: &str,
        decimals: u8,
        initial_supply: u128,
        owner: Address,
    ) -> Result<Self, TokenError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(TokenError::InvalidMetadata(format!(
                "name must be 1-{} chars",
                MAX_NAME_LEN
            )));
        }
        if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LEN {
            return Err(TokenError::InvalidMetadata(format!(
                "symbol must be 1-{} chars",
                MAX_SYMBOL_LEN
            )));
        }
        if decimals > MAX_DECIMALS {
            return Err(TokenError::InvalidMetadata(format!(
                "decimals must be 0-{}",
                MAX_DECIMALS
            )));
        }
        if address.is_zero() || owner.is_zero() {
            return Err(TokenError::ZeroAddress);
        }

        let mut token = Token {
            address,
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
            total_supply: 0,
            owner: owner.clone(),
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        };
        if initial_supply > 0 {
            token.mint(&owner, initial_supply)?;
        }
        log::debug!(
            "deployed {} ({}) at {} with supply {}",
            token.name,
            token.symbol,
            token.address,
            initial_supply
        );
        Ok(token)
    }

    pub fn mint(&mut self, to: &Address, amount: u128) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        self.total_supply = supply;
        self.set_balance(to, balance);
        Ok(())
    }

    pub fn burn(&mut self, from: &Address, amount: u128) -> Result<(), TokenError> {
        let have = self.balance_of(from);
        if have < amount {
            return Err(TokenError::InsufficientBalance {
                owner: from.clone(),
                have,
                need: amount,
            });
        }
        self.set_balance(from, have - amount);
        self.total_supply -= amount;
        Ok(())
    }

    /// Number of accounts with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Sum of all balances. Equals `total_supply` at all times.
    pub fn balance_sum(&self) -> u128 {
        self.balances.values().fold(0u128, |acc, b| acc.saturating_add(*b))
    }

    fn set_balance(&mut self, owner: &Address, amount: u128) {
        if amount == 0 {
            self.balances.remove(owner);
        } else {
            self.balances.insert(owner.clone(), amount);
        }
    }

    fn set_allowance(&mut self, owner: &Address, spender: &Address, amount: u128) {
        if amount == 0 {
            if let Some(inner) = self.allowances.get_mut(owner) {
                inner.remove(spender);
                if inner.is_empty() {
                    self.allowances.remove(owner);
                }
            }
        } else {
            self.allowances
                .entry(owner.clone())
                .or_default()
                .insert(spender.clone(), amount);
        }
    }
}

impl FungibleAsset for Token {
    fn address(&self) -> &Address {
        &self.address
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|inner| inner.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(
        &mut self,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        if owner.is_zero() || spender.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        self.set_allowance(owner, spender, amount);
        log::debug!(
            "{}: {} approved {} for {}",
            self.symbol,
            owner,
            spender,
            amount
        );
        Ok(())
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let have = self.balance_of(from);
        if have < amount {
            return Err(TokenError::InsufficientBalance {
                owner: from.clone(),
                have,
                need: amount,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        self.set_balance(from, have - amount);
        self.set_balance(to, credited);
        log::debug!("{}: {} -> {} {}", self.symbol, from, to, amount);
        Ok(())
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        let allowed = self.allowance(owner, spender);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                owner: owner.clone(),
                spender: spender.clone(),
                have: allowed,
                need: amount,
            });
        }
        self.transfer(owner, to, amount)?;
        // u128::MAX is an infinite approval and is never consumed.
        if allowed != u128::MAX {
            self.set_allowance(owner, spender, allowed - amount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxp_core::WAD;

    fn addr(label: &str) -> Address {
        Address::derive(label.as_bytes())
    }

    fn token() -> Token {
        Token::deploy(addr("tt1"), "Token1", "TT1", 18, 1000 * WAD, addr("owner")).unwrap()
    }

    #[test]
    fn test_deploy_mints_to_owner() {
        let t = token();
        assert_eq!(t.total_supply, 1000 * WAD);
        assert_eq!(t.balance_of(&addr("owner")), 1000 * WAD);
        assert_eq!(t.balance_of(&addr("addr1")), 0);
        assert_eq!(t.holder_count(), 1);
    }

    #[test]
    fn test_deploy_validates_metadata() {
        let long = "X".repeat(MAX_SYMBOL_LEN + 1);
        assert!(matches!(
            Token::deploy(addr("t"), "T", &long, 18, 0, addr("o")),
            Err(TokenError::InvalidMetadata(_))
        ));
        assert!(matches!(
            Token::deploy(addr("t"), "", "T", 18, 0, addr("o")),
            Err(TokenError::InvalidMetadata(_))
        ));
        assert!(matches!(
            Token::deploy(addr("t"), "T", "T", 19, 0, addr("o")),
            Err(TokenError::InvalidMetadata(_))
        ));
        assert_eq!(
            Token::deploy(Address::zero(), "T", "T", 18, 0, addr("o")),
            Err(TokenError::ZeroAddress)
        );
    }

    #[test]
    fn test_transfer_moves_balance() {
        let mut t = token();
        t.transfer(&addr("owner"), &addr("addr1"), 100 * WAD).unwrap();
        assert_eq!(t.balance_of(&addr("owner")), 900 * WAD);
        assert_eq!(t.balance_of(&addr("addr1")), 100 * WAD);
        assert_eq!(t.balance_sum(), t.total_supply);
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut t = token();
        let err = t.transfer(&addr("addr1"), &addr("owner"), 1).unwrap_err();
        assert!(matches!(err, TokenError::InsufficientBalance { have: 0, need: 1, .. }));
    }

    #[test]
    fn test_transfer_to_zero_rejected() {
        let mut t = token();
        assert_eq!(
            t.transfer(&addr("owner"), &Address::zero(), 1),
            Err(TokenError::ZeroAddress)
        );
    }

    #[test]
    fn test_self_transfer_is_noop() {
        let mut t = token();
        t.transfer(&addr("owner"), &addr("owner"), 10 * WAD).unwrap();
        assert_eq!(t.balance_of(&addr("owner")), 1000 * WAD);
    }

    #[test]
    fn test_approve_overwrites() {
        let mut t = token();
        t.approve(&addr("owner"), &addr("dex"), 10).unwrap();
        t.approve(&addr("owner"), &addr("dex"), 3).unwrap();
        assert_eq!(t.allowance(&addr("owner"), &addr("dex")), 3);
        t.approve(&addr("owner"), &addr("dex"), 0).unwrap();
        assert_eq!(t.allowance(&addr("owner"), &addr("dex")), 0);
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let mut t = token();
        t.approve(&addr("owner"), &addr("dex"), 10 * WAD).unwrap();
        t.transfer_from(&addr("dex"), &addr("owner"), &addr("dex"), 4 * WAD)
            .unwrap();
        assert_eq!(t.allowance(&addr("owner"), &addr("dex")), 6 * WAD);
        assert_eq!(t.balance_of(&addr("dex")), 4 * WAD);
    }

    #[test]
    fn test_transfer_from_without_allowance() {
        let mut t = token();
        let err = t
            .transfer_from(&addr("dex"), &addr("owner"), &addr("dex"), 1)
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientAllowance { have: 0, .. }));
        assert_eq!(t.balance_of(&addr("owner")), 1000 * WAD);
    }

    #[test]
    fn test_transfer_from_keeps_allowance_on_balance_failure() {
        let mut t = token();
        t.approve(&addr("addr1"), &addr("dex"), 5).unwrap();
        assert!(t
            .transfer_from(&addr("dex"), &addr("addr1"), &addr("dex"), 5)
            .is_err());
        assert_eq!(t.allowance(&addr("addr1"), &addr("dex")), 5);
    }

    #[test]
    fn test_infinite_approval() {
        let mut t = token();
        t.approve(&addr("owner"), &addr("dex"), u128::MAX).unwrap();
        t.transfer_from(&addr("dex"), &addr("owner"), &addr("addr1"), WAD)
            .unwrap();
        assert_eq!(t.allowance(&addr("owner"), &addr("dex")), u128::MAX);
    }

    #[test]
    fn test_mint_and_burn() {
        let mut t = token();
        t.mint(&addr("addr1"), 5).unwrap();
        assert_eq!(t.total_supply, 1000 * WAD + 5);
        t.burn(&addr("addr1"), 5).unwrap();
        assert_eq!(t.total_supply, 1000 * WAD);
        assert_eq!(t.balance_of(&addr("addr1")), 0);
        assert!(t.burn(&addr("addr1"), 1).is_err());
    }

    #[test]
    fn test_mint_overflow() {
        let mut t = token();
        assert_eq!(t.mint(&addr("addr1"), u128::MAX), Err(TokenError::Overflow));
        assert_eq!(t.total_supply, 1000 * WAD);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut t = token();
        t.approve(&addr("owner"), &addr("dex"), 7).unwrap();
        let json = serde_json::to_string(&t).unwrap();
        let back: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
