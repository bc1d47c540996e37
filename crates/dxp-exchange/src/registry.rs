// SPDX-License-Identifier: AGPL-3.0-only
//! # Pool Registry
//!
//! Read-only views over an [`ExchangeLedger`] for the CLI, the devnet and
//! tests: pool listings, single-pool lookups and position valuation.

use crate::ledger::ExchangeLedger;
use crate::math;
use crate::pair::{PairKey, TradingPair};
use dxp_core::{Address, BPS_DENOMINATOR};
use serde::Serialize;

/// Pool info extracted from ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolInfo {
    /// Exchange hosting this pool
    pub exchange: Address,
    /// Pair key (`asset0:asset1`)
    pub pair: PairKey,
    pub asset0: Address,
    pub asset1: Address,
    /// Reserve of asset0 (atomic units)
    pub reserve0: u128,
    /// Reserve of asset1 (atomic units)
    pub reserve1: u128,
    /// Total liquidity shares outstanding
    pub total_shares: u128,
    /// Fee in basis points (30 = 0.3%)
    pub fee_bps: u128,
    /// asset1 per asset0, scaled by [`math::PRICE_PRECISION`]
    pub price0_scaled: u128,
    /// asset0 per asset1, scaled by [`math::PRICE_PRECISION`]
    pub price1_scaled: u128,
    /// Number of providers holding shares
    pub providers: usize,
    pub swap_count: u64,
}

/// A provider's stake in one pool, valued at current reserves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionInfo {
    pub owner: Address,
    pub pair: PairKey,
    pub shares: u128,
    /// Redeemable asset0 at current reserves
    pub amount0: u128,
    /// Redeemable asset1 at current reserves
    pub amount1: u128,
    /// Share of the pool in basis points
    pub share_bps: u128,
}

fn pool_info_from_pair(ledger: &ExchangeLedger, pair: &TradingPair) -> PoolInfo {
    PoolInfo {
        exchange: ledger.address().clone(),
        pair: pair.key.clone(),
        asset0: pair.key.asset0().clone(),
        asset1: pair.key.asset1().clone(),
        reserve0: pair.reserve0,
        reserve1: pair.reserve1,
        total_shares: pair.total_shares,
        fee_bps: ledger.config().fee_bps,
        price0_scaled: math::spot_price_scaled(pair.reserve0, pair.reserve1),
        price1_scaled: math::spot_price_scaled(pair.reserve1, pair.reserve0),
        providers: ledger.positions(&pair.key).len(),
        swap_count: pair.swap_count,
    }
}

/// All pools in key order, drained ones included.
pub fn list_pools(ledger: &ExchangeLedger) -> Vec<PoolInfo> {
    ledger
        .pairs()
        .map(|p| pool_info_from_pair(ledger, p))
        .collect()
}

pub fn pool_info(ledger: &ExchangeLedger, a: &Address, b: &Address) -> Option<PoolInfo> {
    ledger.pair(a, b).map(|p| pool_info_from_pair(ledger, p))
}

/// Value `owner`'s position in the `a`/`b` pool. `None` when the pool does
/// not exist; a zero position is reported with zero amounts.
pub fn position_info(
    ledger: &ExchangeLedger,
    owner: &Address,
    a: &Address,
    b: &Address,
) -> Option<PositionInfo> {
    let pair = ledger.pair(a, b)?;
    let shares = ledger.position_by_key(&pair.key, owner);
    let (amount0, amount1, share_bps) = if pair.total_shares == 0 || shares == 0 {
        (0, 0, 0)
    } else {
        (
            math::mul_div(shares, pair.reserve0, pair.total_shares).unwrap_or(0),
            math::mul_div(shares, pair.reserve1, pair.total_shares).unwrap_or(0),
            math::mul_div(shares, BPS_DENOMINATOR, pair.total_shares).unwrap_or(0),
        )
    };
    Some(PositionInfo {
        owner: owner.clone(),
        pair: pair.key.clone(),
        shares,
        amount0,
        amount1,
        share_bps,
    })
}

/// Every position `owner` holds across all pools.
pub fn positions_of(ledger: &ExchangeLedger, owner: &Address) -> Vec<PositionInfo> {
    ledger
        .pairs()
        .filter(|p| ledger.position_by_key(&p.key, owner) > 0)
        .filter_map(|p| position_info(ledger, owner, p.key.asset0(), p.key.asset1()))
        .collect()
}

// ─────────────────────────────────────────────────────────────
// TESTS
// ─────────────────────────────────────────────────────────────
