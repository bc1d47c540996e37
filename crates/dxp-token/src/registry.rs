// SPDX-License-Identifier: AGPL-3.0-only
//! # Token Registry
//!
//! Holds every deployed [`Token`] keyed by address and resolves them for the
//! exchange through [`AssetBank`]. Also serves read-only summaries
//! ([`TokenInfo`]) for the CLI and tests.
//!
//! ```rust,ignore
//! let mut registry = TokenRegistry::new();
//! registry.insert(token)?;
//! let info = registry.info(&address);
//! let weth = registry.by_symbol("WETH");
//! ```

use crate::{AssetBank, FungibleAsset, Token, TokenError};
use dxp_core::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary of a deployed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Token address
    pub address: Address,
    /// Human-readable name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Decimal places (0-18)
    pub decimals: u8,
    /// Current total supply in atomic units
    pub total_supply: u128,
    /// Deployer
    pub owner: Address,
    /// Accounts with a non-zero balance
    pub holders: usize,
}

impl From<&Token> for TokenInfo {
    fn from(t: &Token) -> Self {
        TokenInfo {
            address: t.address.clone(),
            name: t.name.clone(),
            symbol: t.symbol.clone(),
            decimals: t.decimals,
            total_supply: t.total_supply,
            owner: t.owner.clone(),
            holders: t.holder_count(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRegistry {
    tokens: BTreeMap<Address, Token>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly deployed token. Addresses are never reused.
    pub fn insert(&mut self, token: Token) -> Result<(), TokenError> {
        if self.tokens.contains_key(&token.address) {
            return Err(TokenError::AlreadyDeployed(token.address.clone()));
        }
        self.tokens.insert(token.address.clone(), token);
        Ok(())
    }

    pub fn get(&self, address: &Address) -> Option<&Token> {
        self.tokens.get(address)
    }

    pub fn get_mut(&mut self, address: &Address) -> Option<&mut Token> {
        self.tokens.get_mut(address)
    }

    /// Look up a token by ticker. Symbols are not unique on-chain; the first
    /// match in address order wins.
    pub fn by_symbol(&self, symbol: &str) -> Option<&Token> {
        self.tokens.values().find(|t| t.symbol == symbol)
    }

    /// Address of the token with this ticker, or the parsed address if the
    /// input is already one.
    pub fn resolve(&self, symbol_or_address: &str) -> Result<Address, TokenError> {
        if let Ok(addr) = Address::parse(symbol_or_address) {
            return if self.tokens.contains_key(&addr) {
                Ok(addr)
            } else {
                Err(TokenError::UnknownToken(addr))
            };
        }
        self.by_symbol(symbol_or_address)
            .map(|t| t.address.clone())
            .ok_or_else(|| {
                TokenError::InvalidMetadata(format!("no token with symbol {}", symbol_or_address))
            })
    }

    pub fn info(&self, address: &Address) -> Option<TokenInfo> {
        self.tokens.get(address).map(TokenInfo::from)
    }

    /// All tokens in address order.
    pub fn list(&self) -> Vec<TokenInfo> {
        self.tokens.values().map(TokenInfo::from).collect()
    }

    /// Balance of `holder`; unknown tokens are an error rather than zero.
    pub fn balance_of(&self, token: &Address, holder: &Address) -> Result<u128, TokenError> {
        self.tokens
            .get(token)
            .map(|t| t.balance_of(holder))
            .ok_or_else(|| TokenError::UnknownToken(token.clone()))
    }

    pub fn allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
    ) -> Result<u128, TokenError> {
        self.tokens
            .get(token)
            .map(|t| t.allowance(owner, spender))
            .ok_or_else(|| TokenError::UnknownToken(token.clone()))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl AssetBank for TokenRegistry {
    fn asset(&self, address: &Address) -> Option<&dyn FungibleAsset> {
        self.tokens.get(address).map(|t| t as &dyn FungibleAsset)
    }

    fn asset_mut(&mut self, address: &Address) -> Option<&mut dyn FungibleAsset> {
        self.tokens
            .get_mut(address)
            .map(|t| t as &mut dyn FungibleAsset)
    }
}

// ─────────────────────────────────────────────────────────────
// TESTS
// ─────────────────────────────────────────────────────────────
