// SPDX-License-Identifier: AGPL-3.0-only
//! Per-transaction view of the devnet handed to [`Devnet::transact`].
//!
//! [`Devnet::transact`]: crate::Devnet::transact

use crate::DevnetError;
use dxp_core::Address;
use dxp_exchange::{DexEvent, DexPlatform, LiquidityReceipt, SwapQuote, SwapRoute};
use dxp_token::{AssetBank, TokenRegistry};
use serde::Serialize;

/// Result of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt<T> {
    /// Block the transaction was included in
    pub block: u64,
    pub sender: Address,
    pub output: T,
    /// Exchange events, in emission order
    pub events: Vec<DexEvent>,
}

impl<T> Receipt<T> {
    /// Values of every `Log` event with `category`.
    pub fn logs(&self, category: &str) -> Vec<u128> {
        self.events.iter().filter_map(|e| e.log_value(category)).collect()
    }
}

/// Everything one transaction may touch, acting as `sender`.
pub struct TxContext<'a> {
    pub(crate) sender: Address,
    pub(crate) block: u64,
    pub(crate) tokens: &'a mut TokenRegistry,
    pub(crate) exchange: &'a mut DexPlatform,
}

impl<'a> TxContext<'a> {
    pub fn sender(&self) -> &Address {
        &self.sender
    }

    /// Block this transaction will land in.
    pub fn block(&self) -> u64 {
        self.block
    }

    pub fn exchange_address(&self) -> Address {
        self.exchange.address().clone()
    }

    pub fn balance_of(&self, token: &Address, holder: &Address) -> Result<u128, DevnetError> {
        Ok(self.tokens.balance_of(token, holder)?)
    }

    pub fn approve(&mut self, token: &Address, spender: &Address, amount: u128) -> Result<(), DevnetError> {
        let asset = self
            .tokens
            .asset_mut(token)
            .ok_or_else(|| DevnetError::UnknownToken(token.to_string()))?;
        asset.approve(&self.sender, spender, amount)?;
        Ok(())
    }

    /// Approve the exchange to pull `amount` of `token` from the sender.
    pub fn approve_exchange(&mut self, token: &Address, amount: u128) -> Result<(), DevnetError> {
        let spender = self.exchange_address();
        self.approve(token, &spender, amount)
    }

    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> Result<u128, DevnetError> {
        Ok(self.tokens.allowance(token, owner, spender)?)
    }

    /// Raise the exchange's allowance on `token` to `amount` if it is lower.
    /// Returns the previous allowance when it was raised, for
    /// [`restore_exchange_allowance`](Self::restore_exchange_allowance).
    pub fn cover_exchange_allowance(&mut self, token: &Address, amount: u128) -> Result<Option<u128>, DevnetError> {
        let exchange = self.exchange_address();
        let current = self.allowance(token, &self.sender, &exchange)?;
        if current >= amount {
            return Ok(None);
        }
        self.approve(token, &exchange, amount)?;
        Ok(Some(current))
    }

    /// Put back an allowance replaced by
    /// [`cover_exchange_allowance`](Self::cover_exchange_allowance).
    pub fn restore_exchange_allowance(&mut self, token: &Address, previous: Option<u128>) -> Result<(), DevnetError> {
        match previous {
            Some(amount) => self.approve_exchange(token, amount),
            None => Ok(()),
        }
    }

    pub fn transfer(&mut self, token: &Address, to: &Address, amount: u128) -> Result<(), DevnetError> {
        let asset = self
            .tokens
            .asset_mut(token)
            .ok_or_else(|| DevnetError::UnknownToken(token.to_string()))?;
        asset.transfer(&self.sender, to, amount)?;
        Ok(())
    }

    pub fn swap_single_hop(&mut self, amount_in: u128, amount_out_min: u128) -> Result<SwapQuote, DevnetError> {
        Ok(self.exchange.swap_single_hop_exact_amount_in(
            self.tokens,
            amount_in,
            amount_out_min,
            &self.sender,
        )?)
    }

    pub fn swap_multi_hop(&mut self, amount_in: u128, amount_out_min: u128) -> Result<SwapQuote, DevnetError> {
        Ok(self.exchange.swap_multi_hop_exact_amount_in(
            self.tokens,
            amount_in,
            amount_out_min,
            &self.sender,
        )?)
    }

    /// Swap along any route, not only the two the platform was deployed with.
    pub fn swap(
        &mut self,
        route: &SwapRoute,
        amount_in: u128,
        amount_out_min: u128,
    ) -> Result<SwapQuote, DevnetError> {
        Ok(self
            .exchange
            .ledger_mut()
            .swap_exact_in(self.tokens, route, amount_in, amount_out_min, &self.sender)?)
    }

    pub fn add_liquidity(
        &mut self,
        token_a: &Address,
        token_b: &Address,
        amount_a: u128,
        amount_b: u128,
        min_shares: u128,
    ) -> Result<LiquidityReceipt, DevnetError> {
        Ok(self.exchange.add_liquidity(
            self.tokens,
            token_a,
            token_b,
            amount_a,
            amount_b,
            min_shares,
            &self.sender,
        )?)
    }

    pub fn remove_liquidity(&mut self, token_a: &Address, token_b: &Address) -> Result<LiquidityReceipt, DevnetError> {
        Ok(self
            .exchange
            .remove_liquidity(self.tokens, token_a, token_b, &self.sender)?)
    }

    pub fn remove_liquidity_shares(
        &mut self,
        token_a: &Address,
        token_b: &Address,
        shares: u128,
        min_a: u128,
        min_b: u128,
    ) -> Result<LiquidityReceipt, DevnetError> {
        Ok(self.exchange.ledger_mut().remove_liquidity_shares(
            self.tokens,
            token_a,
            token_b,
            shares,
            min_a,
            min_b,
            &self.sender,
        )?)
    }

    /// Let `agent` redeem up to `shares` of the sender's position in the pair.
    pub fn approve_shares(
        &mut self,
        agent: &Address,
        token_a: &Address,
        token_b: &Address,
        shares: u128,
    ) -> Result<(), DevnetError> {
        Ok(self
            .exchange
            .ledger_mut()
            .approve_shares(&self.sender, agent, token_a, token_b, shares)?)
    }

    /// Redeem `owner`'s shares under an approval granted to the sender.
    pub fn remove_liquidity_from(
        &mut self,
        owner: &Address,
        token_a: &Address,
        token_b: &Address,
        shares: u128,
        min_a: u128,
        min_b: u128,
    ) -> Result<LiquidityReceipt, DevnetError> {
        Ok(self.exchange.ledger_mut().remove_liquidity_from(
            self.tokens,
            token_a,
            token_b,
            shares,
            min_a,
            min_b,
            owner,
            &self.sender,
        )?)
    }
}
