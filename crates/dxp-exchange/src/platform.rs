// SPDX-License-Identifier: AGPL-3.0-only
//! # DEX Platform
//!
//! The deployable surface: one [`ExchangeLedger`] plus two routes fixed at
//! deployment time (a single-hop route and a two-hop route). Callers swap
//! along those routes and manage liquidity with their own asset pair.
//!
//! ```text
//! single_hop:  WETH ──▶ TT1
//! multi_hop:   TT1  ──▶ WETH ──▶ TT2
//! ```

use crate::ledger::{ExchangeConfig, ExchangeLedger, LiquidityReceipt, SwapQuote};
use crate::route::SwapRoute;
use crate::DexError;
use dxp_core::Address;
use dxp_token::AssetBank;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformRoutes {
    pub single_hop: SwapRoute,
    pub multi_hop: SwapRoute,
}

impl PlatformRoutes {
    pub fn new(single_hop: SwapRoute, multi_hop: SwapRoute) -> Result<Self, DexError> {
        if single_hop.hop_count() != 1 {
            return Err(DexError::InvalidRoute(format!(
                "single-hop route {} has {} hops",
                single_hop,
                single_hop.hop_count()
            )));
        }
        if multi_hop.hop_count() != 2 {
            return Err(DexError::InvalidRoute(format!(
                "multi-hop route {} has {} hops",
                multi_hop,
                multi_hop.hop_count()
            )));
        }
        Ok(PlatformRoutes {
            single_hop,
            multi_hop,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DexPlatform {
    ledger: ExchangeLedger,
    routes: PlatformRoutes,
}

impl DexPlatform {
    pub fn new(
        address: Address,
        config: ExchangeConfig,
        routes: PlatformRoutes,
    ) -> Result<Self, DexError> {
        let ledger = ExchangeLedger::new(address, config)?;
        log::info!(
            "exchange deployed at {} (fee {} bps), routes [{}] and [{}]",
            ledger.address(),
            ledger.config().fee_bps,
            routes.single_hop,
            routes.multi_hop
        );
        Ok(DexPlatform { ledger, routes })
    }

    pub fn address(&self) -> &Address {
        self.ledger.address()
    }

    pub fn routes(&self) -> &PlatformRoutes {
        &self.routes
    }

    pub fn ledger(&self) -> &ExchangeLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut ExchangeLedger {
        &mut self.ledger
    }

    pub fn swap_single_hop_exact_amount_in(
        &mut self,
        bank: &mut dyn AssetBank,
        amount_in: u128,
        amount_out_min: u128,
        trader: &Address,
    ) -> Result<SwapQuote, DexError> {
        self.ledger
            .swap_exact_in(bank, &self.routes.single_hop, amount_in, amount_out_min, trader)
    }

    pub fn swap_multi_hop_exact_amount_in(
        &mut self,
        bank: &mut dyn AssetBank,
        amount_in: u128,
        amount_out_min: u128,
        trader: &Address,
    ) -> Result<SwapQuote, DexError> {
        self.ledger
            .swap_exact_in(bank, &self.routes.multi_hop, amount_in, amount_out_min, trader)
    }

    /// Deposit into `token_a`/`token_b`, failing with `SlippageExceeded` if
    /// fewer than `min_shares` would be minted.
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity(
        &mut self,
        bank: &mut dyn AssetBank,
        token_a: &Address,
        token_b: &Address,
        amount_a: u128,
        amount_b: u128,
        min_shares: u128,
        provider: &Address,
    ) -> Result<LiquidityReceipt, DexError> {
        self.ledger
            .add_liquidity(bank, token_a, token_b, amount_a, amount_b, min_shares, provider)
    }

    pub fn remove_liquidity(
        &mut self,
        bank: &mut dyn AssetBank,
        token_a: &Address,
        token_b: &Address,
        provider: &Address,
    ) -> Result<LiquidityReceipt, DexError> {
        self.ledger.remove_liquidity(bank, token_a, token_b, provider)
    }

    pub fn quote_single_hop(&self, amount_in: u128) -> Result<SwapQuote, DexError> {
        self.ledger.quote_exact_in(&self.routes.single_hop, amount_in)
    }

    pub fn quote_multi_hop(&self, amount_in: u128) -> Result<SwapQuote, DexError> {
        self.ledger.quote_exact_in(&self.routes.multi_hop, amount_in)
    }
}
