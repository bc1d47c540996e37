// SPDX-License-Identifier: AGPL-3.0-only
//! # Exchange Ledger
//!
//! Holds reserves per trading pair, prices swaps and keeps liquidity share
//! accounting. Every operation follows the same order:
//!
//! 1. **Checks**: validate input, price the whole call on scratch copies,
//!    verify the caller's allowance and balance.
//! 2. **Effects**: write reserves and shares.
//! 3. **Interactions**: pull assets in, push assets out.
//!
//! If an interaction fails the ledger restores the records it touched and
//! returns what it already pulled, so a failed call leaves no trace. Nested
//! entry while a call is in flight is rejected with [`DexError::Reentrant`].
//!
//! The ledger owns an address; the assets it holds sit in that address's
//! balance on each token.

use crate::event::{DexEvent, LIQUIDITY_CATEGORY};
use crate::math;
use crate::pair::{PairKey, TradingPair};
use crate::route::SwapRoute;
use crate::DexError;
use dxp_core::{Address, DEFAULT_FEE_BPS, MAX_FEE_BPS};
use dxp_token::AssetBank;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Swap fee in basis points (30 = 0.3%)
    pub fee_bps: u128,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            fee_bps: DEFAULT_FEE_BPS,
        }
    }
}

impl ExchangeConfig {
    pub fn validate(&self) -> Result<(), DexError> {
        if self.fee_bps > MAX_FEE_BPS {
            return Err(DexError::FeeTooHigh(self.fee_bps));
        }
        Ok(())
    }
}

/// Pricing of one hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopQuote {
    pub pair: PairKey,
    pub asset_in: Address,
    pub asset_out: Address,
    pub amount_in: u128,
    pub amount_out: u128,
    pub fee: u128,
    pub reserve_in: u128,
    pub reserve_out: u128,
    pub price_impact_bps: u128,
}

/// Pricing of a whole route, or the result of an executed swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub route: SwapRoute,
    pub amount_in: u128,
    pub amount_out: u128,
    pub hops: Vec<HopQuote>,
}

impl SwapQuote {
    /// Fees kept by each pair along the route, each in that hop's input asset.
    pub fn fees(&self) -> Vec<(Address, u128)> {
        self.hops.iter().map(|h| (h.asset_in.clone(), h.fee)).collect()
    }
}

/// Outcome of a liquidity change, amounts in the caller's asset order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityReceipt {
    pub pair: PairKey,
    pub asset_a: Address,
    pub asset_b: Address,
    pub amount_a: u128,
    pub amount_b: u128,
    pub shares: u128,
    /// Provider's share balance after the call.
    pub position: u128,
}

/// Undo log for one call.
#[derive(Default)]
struct Journal {
    pairs: Vec<(PairKey, Option<TradingPair>)>,
    positions: Vec<(PairKey, Address, u128)>,
    /// Assets already pulled from a caller: (asset, from, amount).
    pulled: Vec<(Address, Address, u128)>,
    /// Assets already pushed to a caller: (asset, to, amount).
    pushed: Vec<(Address, Address, u128)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeLedger {
    address: Address,
    config: ExchangeConfig,
    pairs: BTreeMap<PairKey, TradingPair>,
    /// pair -> owner -> shares
    positions: BTreeMap<PairKey, BTreeMap<Address, u128>>,
    /// pair -> owner -> agent -> shares the agent may redeem
    #[serde(default)]
    share_allowances: BTreeMap<PairKey, BTreeMap<Address, BTreeMap<Address, u128>>>,
    #[serde(skip)]
    events: Vec<DexEvent>,
    #[serde(skip)]
    entered: bool,
}

impl ExchangeLedger {
    pub fn new(address: Address, config: ExchangeConfig) -> Result<Self, DexError> {
        config.validate()?;
        Ok(ExchangeLedger {
            address,
            config,
            pairs: BTreeMap::new(),
            positions: BTreeMap::new(),
            share_allowances: BTreeMap::new(),
            events: Vec::new(),
            entered: false,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────
    // READ-ONLY
    // ─────────────────────────────────────────────────────────

    pub fn pair(&self, a: &Address, b: &Address) -> Option<&TradingPair> {
        PairKey::new(a, b).ok().and_then(|k| self.pairs.get(&k))
    }

    pub fn pairs(&self) -> impl Iterator<Item = &TradingPair> {
        self.pairs.values()
    }

    pub fn position(&self, owner: &Address, a: &Address, b: &Address) -> u128 {
        PairKey::new(a, b)
            .ok()
            .map(|k| self.position_by_key(&k, owner))
            .unwrap_or(0)
    }

    pub fn position_by_key(&self, key: &PairKey, owner: &Address) -> u128 {
        self.positions
            .get(key)
            .and_then(|p| p.get(owner))
            .copied()
            .unwrap_or(0)
    }

    /// Shares of `owner`'s position in `a`/`b` that `agent` may redeem.
    pub fn share_allowance(&self, owner: &Address, agent: &Address, a: &Address, b: &Address) -> u128 {
        PairKey::new(a, b)
            .ok()
            .and_then(|k| self.share_allowances.get(&k))
            .and_then(|owners| owners.get(owner))
            .and_then(|agents| agents.get(agent))
            .copied()
            .unwrap_or(0)
    }

    /// All non-zero positions in a pair, in owner order.
    pub fn positions(&self, key: &PairKey) -> Vec<(Address, u128)> {
        self.positions
            .get(key)
            .map(|p| p.iter().map(|(o, s)| (o.clone(), *s)).collect())
            .unwrap_or_default()
    }

    /// Price `amount_in` along `route` without changing anything.
    pub fn quote_exact_in(&self, route: &SwapRoute, amount_in: u128) -> Result<SwapQuote, DexError> {
        self.price_route(route, amount_in).map(|(quote, _)| quote)
    }

    /// Hand over buffered events. The host calls this after each committed
    /// call.
    pub fn take_events(&mut self) -> Vec<DexEvent> {
        std::mem::take(&mut self.events)
    }

    // ─────────────────────────────────────────────────────────
    // STATE-CHANGING
    // ─────────────────────────────────────────────────────────

    /// Sell exactly `amount_in` of the route's first asset for at least
    /// `min_out` of its last asset.
    pub fn swap_exact_in(
        &mut self,
        bank: &mut dyn AssetBank,
        route: &SwapRoute,
        amount_in: u128,
        min_out: u128,
        trader: &Address,
    ) -> Result<SwapQuote, DexError> {
        self.enter()?;
        let result = self.swap_inner(bank, route, amount_in, min_out, trader);
        self.exit();
        result
    }

    /// Deposit up to `amount_a`/`amount_b`. Empty pairs are seeded at the
    /// given ratio; otherwise only the amounts matching the current ratio are
    /// taken.
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity(
        &mut self,
        bank: &mut dyn AssetBank,
        asset_a: &Address,
        asset_b: &Address,
        amount_a: u128,
        amount_b: u128,
        min_shares: u128,
        provider: &Address,
    ) -> Result<LiquidityReceipt, DexError> {
        self.enter()?;
        let result = self.add_inner(bank, asset_a, asset_b, amount_a, amount_b, min_shares, provider);
        self.exit();
        result
    }

    /// Burn the provider's whole position.
    pub fn remove_liquidity(
        &mut self,
        bank: &mut dyn AssetBank,
        asset_a: &Address,
        asset_b: &Address,
        provider: &Address,
    ) -> Result<LiquidityReceipt, DexError> {
        let shares = self.position(provider, asset_a, asset_b);
        self.remove_liquidity_shares(bank, asset_a, asset_b, shares, 0, 0, provider)
    }

    /// Burn `shares` of the provider's position, requiring at least
    /// `min_a`/`min_b` back.
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity_shares(
        &mut self,
        bank: &mut dyn AssetBank,
        asset_a: &Address,
        asset_b: &Address,
        shares: u128,
        min_a: u128,
        min_b: u128,
        provider: &Address,
    ) -> Result<LiquidityReceipt, DexError> {
        self.enter()?;
        let result = self.remove_inner(bank, asset_a, asset_b, shares, min_a, min_b, provider, provider);
        self.exit();
        result
    }

    /// Let `agent` redeem up to `shares` of `owner`'s position in `a`/`b`.
    /// Overwrites any earlier approval; `u128::MAX` never runs down.
    pub fn approve_shares(
        &mut self,
        owner: &Address,
        agent: &Address,
        a: &Address,
        b: &Address,
        shares: u128,
    ) -> Result<(), DexError> {
        if self.entered {
            return Err(DexError::Reentrant);
        }
        let key = PairKey::new(a, b)?;
        self.set_share_allowance(&key, owner, agent, shares);
        log::debug!("{} may redeem {} shares of {} in {}", agent, shares, owner, key);
        Ok(())
    }

    /// Burn `shares` of `owner`'s position on their behalf, spending the
    /// share allowance `owner` granted to `agent`. The assets go to `agent`.
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity_from(
        &mut self,
        bank: &mut dyn AssetBank,
        asset_a: &Address,
        asset_b: &Address,
        shares: u128,
        min_a: u128,
        min_b: u128,
        owner: &Address,
        agent: &Address,
    ) -> Result<LiquidityReceipt, DexError> {
        self.enter()?;
        let result = self.redeem_for(bank, asset_a, asset_b, shares, min_a, min_b, owner, agent);
        self.exit();
        result
    }

    // ─────────────────────────────────────────────────────────
    // INTERNALS
    // ─────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn redeem_for(
        &mut self,
        bank: &mut dyn AssetBank,
        asset_a: &Address,
        asset_b: &Address,
        shares: u128,
        min_a: u128,
        min_b: u128,
        owner: &Address,
        agent: &Address,
    ) -> Result<LiquidityReceipt, DexError> {
        if owner == agent {
            return self.remove_inner(bank, asset_a, asset_b, shares, min_a, min_b, owner, agent);
        }
        let key = PairKey::new(asset_a, asset_b)?;
        let allowed = self.share_allowance(owner, agent, asset_a, asset_b);
        if allowed < shares {
            return Err(DexError::InsufficientShareAllowance {
                have: allowed,
                need: shares,
            });
        }
        let receipt = self.remove_inner(bank, asset_a, asset_b, shares, min_a, min_b, owner, agent)?;
        if allowed != u128::MAX {
            self.set_share_allowance(&key, owner, agent, allowed - shares);
        }
        Ok(receipt)
    }

    fn set_share_allowance(&mut self, key: &PairKey, owner: &Address, agent: &Address, shares: u128) {
        if shares == 0 {
            if let Some(owners) = self.share_allowances.get_mut(key) {
                if let Some(agents) = owners.get_mut(owner) {
                    agents.remove(agent);
                    if agents.is_empty() {
                        owners.remove(owner);
                    }
                }
                if owners.is_empty() {
                    self.share_allowances.remove(key);
                }
            }
        } else {
            self.share_allowances
                .entry(key.clone())
                .or_default()
                .entry(owner.clone())
                .or_default()
                .insert(agent.clone(), shares);
        }
    }

    fn enter(&mut self) -> Result<(), DexError> {
        if self.entered {
            log::warn!("re-entrant call into exchange {} rejected", self.address);
            return Err(DexError::Reentrant);
        }
        self.entered = true;
        Ok(())
    }

    fn exit(&mut self) {
        self.entered = false;
    }

    /// Price a route on scratch copies of the pairs it touches, so a route
    /// visiting the same pair twice sees the first hop's effect.
    fn price_route(
        &self,
        route: &SwapRoute,
        amount_in: u128,
    ) -> Result<(SwapQuote, BTreeMap<PairKey, TradingPair>), DexError> {
        if amount_in == 0 {
            return Err(DexError::ZeroAmount);
        }
        let mut scratch: BTreeMap<PairKey, TradingPair> = BTreeMap::new();
        let mut hops = Vec::with_capacity(route.hop_count());
        let mut amount = amount_in;

        for (asset_in, asset_out) in route.hops() {
            let key = PairKey::new(asset_in, asset_out)?;
            if !scratch.contains_key(&key) {
                let pair = self.pairs.get(&key).ok_or_else(|| {
                    DexError::InvalidRoute(format!("no pair for {} -> {}", asset_in, asset_out))
                })?;
                scratch.insert(key.clone(), pair.clone());
            }
            let pair = scratch
                .get_mut(&key)
                .ok_or_else(|| DexError::InvalidRoute(format!("no pair {}", key)))?;

            let (reserve_in, reserve_out) = pair.reserves_for(asset_in)?;
            let (amount_out, fee) =
                math::get_amount_out(amount, reserve_in, reserve_out, self.config.fee_bps)?;
            if amount_out == 0 {
                return Err(DexError::InsufficientLiquidity(format!(
                    "output amount is zero on hop {} -> {}",
                    asset_in, asset_out
                )));
            }
            pair.apply_swap(asset_in, amount, amount_out)?;

            log::debug!(
                "hop {} -> {}: in {} (fee {}) out {} reserves {}/{}",
                asset_in,
                asset_out,
                amount,
                fee,
                amount_out,
                reserve_in,
                reserve_out
            );

            hops.push(HopQuote {
                pair: key,
                asset_in: asset_in.clone(),
                asset_out: asset_out.clone(),
                amount_in: amount,
                amount_out,
                fee,
                reserve_in,
                reserve_out,
                price_impact_bps: math::price_impact_bps(amount, amount_out, reserve_in, reserve_out),
            });
            amount = amount_out;
        }

        Ok((
            SwapQuote {
                route: route.clone(),
                amount_in,
                amount_out: amount,
                hops,
            },
            scratch,
        ))
    }

    fn swap_inner(
        &mut self,
        bank: &mut dyn AssetBank,
        route: &SwapRoute,
        amount_in: u128,
        min_out: u128,
        trader: &Address,
    ) -> Result<SwapQuote, DexError> {
        // ── checks ──
        let (quote, scratch) = self.price_route(route, amount_in)?;
        if quote.amount_out < min_out {
            return Err(DexError::SlippageExceeded {
                amount_out: quote.amount_out,
                min_out,
            });
        }
        self.check_can_pull(bank, route.asset_in(), trader, amount_in)?;
        self.check_holds(bank, route.asset_out(), quote.amount_out)?;

        // ── effects ──
        let mut journal = Journal::default();
        for (key, pair) in scratch {
            journal.pairs.push((key.clone(), self.pairs.get(&key).cloned()));
            self.pairs.insert(key, pair);
        }

        // ── interactions ──
        if let Err(e) = self.pull(bank, &mut journal, route.asset_in(), trader, amount_in) {
            self.rollback(bank, journal);
            return Err(e);
        }
        if let Err(e) = self.push(bank, &mut journal, route.asset_out(), trader, quote.amount_out) {
            self.rollback(bank, journal);
            return Err(e);
        }

        self.events.push(DexEvent::Swap {
            trader: trader.clone(),
            path: route.path().to_vec(),
            amount_in,
            amount_out: quote.amount_out,
            fee_total: quote.hops.iter().map(|h| h.fee).sum(),
        });
        log::info!(
            "swap {} by {}: {} in, {} out",
            route,
            trader,
            amount_in,
            quote.amount_out
        );
        Ok(quote)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_inner(
        &mut self,
        bank: &mut dyn AssetBank,
        asset_a: &Address,
        asset_b: &Address,
        amount_a: u128,
        amount_b: u128,
        min_shares: u128,
        provider: &Address,
    ) -> Result<LiquidityReceipt, DexError> {
        // ── checks ──
        if amount_a == 0 || amount_b == 0 {
            return Err(DexError::ZeroAmount);
        }
        let key = PairKey::new(asset_a, asset_b)?;
        for asset in [asset_a, asset_b] {
            if bank.asset(asset).is_none() {
                return Err(DexError::UnknownAsset(asset.clone()));
            }
        }

        let existing = self.pairs.get(&key).cloned();
        let created = existing.is_none();
        let mut pair = existing.clone().unwrap_or_else(|| TradingPair::new(key.clone()));

        let a_is_0 = asset_a == key.asset0();
        let (offer0, offer1) = if a_is_0 {
            (amount_a, amount_b)
        } else {
            (amount_b, amount_a)
        };

        let (shares, used0, used1) = if pair.is_empty() {
            (math::sqrt_product(offer0, offer1), offer0, offer1)
        } else {
            if pair.reserve0 == 0 || pair.reserve1 == 0 {
                return Err(DexError::InsufficientLiquidity(format!(
                    "pair {} has shares but no reserves",
                    key
                )));
            }
            let shares = math::proportional_shares(
                offer0,
                offer1,
                pair.reserve0,
                pair.reserve1,
                pair.total_shares,
            )?;
            // Round the amounts taken up so minted shares are never
            // under-collateralised.
            let used0 = math::mul_div_ceil(shares, pair.reserve0, pair.total_shares)?;
            let used1 = math::mul_div_ceil(shares, pair.reserve1, pair.total_shares)?;
            (shares, used0.min(offer0), used1.min(offer1))
        };

        if shares == 0 {
            return Err(DexError::InsufficientLiquidity(
                "deposit too small to mint shares".to_string(),
            ));
        }
        if shares < min_shares {
            return Err(DexError::SlippageExceeded {
                amount_out: shares,
                min_out: min_shares,
            });
        }

        let (used_a, used_b) = if a_is_0 { (used0, used1) } else { (used1, used0) };
        self.check_can_pull(bank, asset_a, provider, used_a)?;
        self.check_can_pull(bank, asset_b, provider, used_b)?;

        pair.reserve0 = pair.reserve0.checked_add(used0).ok_or(DexError::Overflow)?;
        pair.reserve1 = pair.reserve1.checked_add(used1).ok_or(DexError::Overflow)?;
        pair.total_shares = pair.total_shares.checked_add(shares).ok_or(DexError::Overflow)?;
        let held = self.position_by_key(&key, provider);
        let position = held.checked_add(shares).ok_or(DexError::Overflow)?;

        // ── effects ──
        let mut journal = Journal::default();
        journal.pairs.push((key.clone(), existing));
        journal.positions.push((key.clone(), provider.clone(), held));
        self.pairs.insert(key.clone(), pair);
        self.set_position(&key, provider, position);

        // ── interactions ──
        for (asset, amount) in [(asset_a, used_a), (asset_b, used_b)] {
            if let Err(e) = self.pull(bank, &mut journal, asset, provider, amount) {
                self.rollback(bank, journal);
                return Err(e);
            }
        }

        if created {
            self.events.push(DexEvent::PairCreated { pair: key.clone() });
        }
        self.events.push(DexEvent::LiquidityAdded {
            provider: provider.clone(),
            pair: key.clone(),
            amount0: used0,
            amount1: used1,
            shares,
        });
        self.events.push(DexEvent::log(LIQUIDITY_CATEGORY, shares));
        log::info!(
            "liquidity added to {} by {}: {} / {} for {} shares",
            key,
            provider,
            used_a,
            used_b,
            shares
        );

        Ok(LiquidityReceipt {
            pair: key,
            asset_a: asset_a.clone(),
            asset_b: asset_b.clone(),
            amount_a: used_a,
            amount_b: used_b,
            shares,
            position,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn remove_inner(
        &mut self,
        bank: &mut dyn AssetBank,
        asset_a: &Address,
        asset_b: &Address,
        shares: u128,
        min_a: u128,
        min_b: u128,
        provider: &Address,
        recipient: &Address,
    ) -> Result<LiquidityReceipt, DexError> {
        // ── checks ──
        let key = PairKey::new(asset_a, asset_b)?;
        let held = self.position_by_key(&key, provider);
        if held == 0 || shares == 0 || shares > held {
            return Err(DexError::InsufficientPosition {
                have: held,
                need: shares.max(1),
            });
        }
        let existing = self
            .pairs
            .get(&key)
            .cloned()
            .ok_or_else(|| DexError::InvalidRoute(format!("no pair {}", key)))?;
        if existing.total_shares == 0 {
            return Err(DexError::InsufficientLiquidity(format!("pair {} is empty", key)));
        }

        let out0 = math::mul_div(shares, existing.reserve0, existing.total_shares)?;
        let out1 = math::mul_div(shares, existing.reserve1, existing.total_shares)?;
        let a_is_0 = asset_a == key.asset0();
        let (out_a, out_b) = if a_is_0 { (out0, out1) } else { (out1, out0) };

        if out_a < min_a {
            return Err(DexError::SlippageExceeded {
                amount_out: out_a,
                min_out: min_a,
            });
        }
        if out_b < min_b {
            return Err(DexError::SlippageExceeded {
                amount_out: out_b,
                min_out: min_b,
            });
        }
        if out0 == 0 && out1 == 0 {
            return Err(DexError::InsufficientLiquidity(
                "withdrawal too small to return any assets".to_string(),
            ));
        }
        self.check_holds(bank, asset_a, out_a)?;
        self.check_holds(bank, asset_b, out_b)?;

        let mut pair = existing.clone();
        pair.reserve0 -= out0;
        pair.reserve1 -= out1;
        pair.total_shares -= shares;
        let position = held - shares;

        // ── effects ──
        let mut journal = Journal::default();
        journal.pairs.push((key.clone(), Some(existing)));
        journal.positions.push((key.clone(), provider.clone(), held));
        self.pairs.insert(key.clone(), pair);
        self.set_position(&key, provider, position);

        // ── interactions ──
        for (asset, amount) in [(asset_a, out_a), (asset_b, out_b)] {
            if let Err(e) = self.push(bank, &mut journal, asset, recipient, amount) {
                self.rollback(bank, journal);
                return Err(e);
            }
        }

        self.events.push(DexEvent::LiquidityRemoved {
            provider: provider.clone(),
            pair: key.clone(),
            amount0: out0,
            amount1: out1,
            shares,
        });
        self.events.push(DexEvent::log(LIQUIDITY_CATEGORY, shares));
        log::info!(
            "liquidity removed from {} by {}: {} shares for {} / {}",
            key,
            provider,
            shares,
            out_a,
            out_b
        );

        Ok(LiquidityReceipt {
            pair: key,
            asset_a: asset_a.clone(),
            asset_b: asset_b.clone(),
            amount_a: out_a,
            amount_b: out_b,
            shares,
            position,
        })
    }

    fn set_position(&mut self, key: &PairKey, owner: &Address, shares: u128) {
        if shares == 0 {
            if let Some(p) = self.positions.get_mut(key) {
                p.remove(owner);
                if p.is_empty() {
                    self.positions.remove(key);
                }
            }
        } else {
            self.positions
                .entry(key.clone())
                .or_default()
                .insert(owner.clone(), shares);
        }
    }

    fn check_can_pull(
        &self,
        bank: &dyn AssetBank,
        asset: &Address,
        from: &Address,
        amount: u128,
    ) -> Result<(), DexError> {
        if amount == 0 {
            return Ok(());
        }
        let token = bank
            .asset(asset)
            .ok_or_else(|| DexError::UnknownAsset(asset.clone()))?;
        let allowed = token.allowance(from, &self.address);
        if allowed < amount {
            return Err(DexError::InsufficientAllowance {
                asset: asset.clone(),
                have: allowed,
                need: amount,
            });
        }
        let balance = token.balance_of(from);
        if balance < amount {
            return Err(DexError::InsufficientBalance {
                asset: asset.clone(),
                have: balance,
                need: amount,
            });
        }
        Ok(())
    }

    /// The exchange must actually hold what its reserves say it can pay.
    fn check_holds(&self, bank: &dyn AssetBank, asset: &Address, amount: u128) -> Result<(), DexError> {
        let token = bank
            .asset(asset)
            .ok_or_else(|| DexError::UnknownAsset(asset.clone()))?;
        let held = token.balance_of(&self.address);
        if held < amount {
            return Err(DexError::InsufficientLiquidity(format!(
                "exchange holds {} of {}, owes {}",
                held, asset, amount
            )));
        }
        Ok(())
    }

    fn pull(
        &self,
        bank: &mut dyn AssetBank,
        journal: &mut Journal,
        asset: &Address,
        from: &Address,
        amount: u128,
    ) -> Result<(), DexError> {
        if amount == 0 {
            return Ok(());
        }
        let token = bank
            .asset_mut(asset)
            .ok_or_else(|| DexError::UnknownAsset(asset.clone()))?;
        token
            .transfer_from(&self.address, from, &self.address, amount)
            .map_err(|e| DexError::from_token(asset, e))?;
        journal.pulled.push((asset.clone(), from.clone(), amount));
        Ok(())
    }

    fn push(
        &self,
        bank: &mut dyn AssetBank,
        journal: &mut Journal,
        asset: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), DexError> {
        if amount == 0 {
            return Ok(());
        }
        let token = bank
            .asset_mut(asset)
            .ok_or_else(|| DexError::UnknownAsset(asset.clone()))?;
        token
            .transfer(&self.address, to, amount)
            .map_err(|e| DexError::from_token(asset, e))?;
        journal.pushed.push((asset.clone(), to.clone(), amount));
        Ok(())
    }

    /// Restore touched records and undo completed asset movements, newest
    /// first.
    fn rollback(&mut self, bank: &mut dyn AssetBank, journal: Journal) {
        for (key, before) in journal.pairs.into_iter().rev() {
            match before {
                Some(pair) => {
                    self.pairs.insert(key, pair);
                }
                None => {
                    self.pairs.remove(&key);
                }
            }
        }
        for (key, owner, shares) in journal.positions.into_iter().rev() {
            self.set_position(&key, &owner, shares);
        }
        for (asset, to, amount) in journal.pushed.into_iter().rev() {
            let undone = bank
                .asset_mut(&asset)
                .map(|t| t.transfer(&to, &self.address, amount).is_ok())
                .unwrap_or(false);
            if !undone {
                log::warn!("rollback could not reclaim {} of {} from {}", amount, asset, to);
            }
        }
        for (asset, from, amount) in journal.pulled.into_iter().rev() {
            let undone = bank
                .asset_mut(&asset)
                .map(|t| t.transfer(&self.address, &from, amount).is_ok())
                .unwrap_or(false);
            if !undone {
                log::warn!("rollback could not refund {} of {} to {}", amount, asset, from);
            }
        }
        log::warn!("exchange call reverted; ledger state restored");
    }
}

// ─────────────────────────────────────────────────────────────
// TESTS
// ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use dxp_core::WAD;
    use dxp_token::{FungibleAsset, Token, TokenError, TokenRegistry};

    fn addr(label: &str) -> Address {
        Address::derive(label.as_bytes())
    }

    struct Fixture {
        bank: TokenRegistry,
        dex: ExchangeLedger,
        tt1: Address,
        tt2: Address,
        weth: Address,
        owner: Address,
        addr1: Address,
    }

    fn fixture() -> Fixture {
        let owner = addr("owner");
        let addr1 = addr("addr1");
        let mut bank = TokenRegistry::new();
        for (label, name, symbol) in [
            ("tt1", "Token1", "TT1"),
            ("tt2", "Token2", "TT2"),
            ("weth", "Wrapped Ether", "WETH"),
        ] {
            let mut t =
                Token::deploy(addr(label), name, symbol, 18, 10_000 * WAD, owner.clone()).unwrap();
            t.transfer(&owner, &addr1, 100 * WAD).unwrap();
            bank.insert(t).unwrap();
        }
        let dex = ExchangeLedger::new(addr("dex"), ExchangeConfig::default()).unwrap();
        Fixture {
            bank,
            dex,
            tt1: addr("tt1"),
            tt2: addr("tt2"),
            weth: addr("weth"),
            owner,
            addr1,
        }
    }

    fn approve(f: &mut Fixture, who: &Address, token: &Address, amount: u128) {
        let dex = f.dex.address().clone();
        f.bank
            .asset_mut(token)
            .unwrap()
            .approve(who, &dex, amount)
            .unwrap();
    }

    fn seed(f: &mut Fixture, a: &Address, b: &Address, amount_a: u128, amount_b: u128) {
        let owner = f.owner.clone();
        approve(f, &owner, a, amount_a);
        approve(f, &owner, b, amount_b);
        f.dex
            .add_liquidity(&mut f.bank, a, b, amount_a, amount_b, 0, &owner)
            .unwrap();
        f.dex.take_events();
    }

    fn balance(f: &Fixture, token: &Address, who: &Address) -> u128 {
        f.bank.balance_of(token, who).unwrap()
    }

    #[test]
    fn test_config_rejects_high_fee() {
        assert_eq!(
            ExchangeLedger::new(addr("dex"), ExchangeConfig { fee_bps: 1_001 }),
            Err(DexError::FeeTooHigh(1_001))
        );
    }

    #[test]
    fn test_add_liquidity_on_empty_pair_mints_sqrt() {
        let mut f = fixture();
        let (a1, tt1, tt2) = (f.addr1.clone(), f.tt1.clone(), f.tt2.clone());
        approve(&mut f, &a1, &tt1, 10 * WAD);
        approve(&mut f, &a1, &tt2, 10 * WAD);
        let r = f
            .dex
            .add_liquidity(&mut f.bank, &tt1, &tt2, 10 * WAD, 10 * WAD, 0, &a1)
            .unwrap();
        assert_eq!(r.shares, 10 * WAD);
        assert_eq!(r.position, 10 * WAD);
        assert_eq!(f.dex.position(&a1, &tt2, &tt1), 10 * WAD);

        let events = f.dex.take_events();
        assert!(events.iter().any(|e| e.log_value(LIQUIDITY_CATEGORY) == Some(10 * WAD)));
        assert!(events.iter().any(|e| matches!(e, DexEvent::PairCreated { .. })));
        assert_eq!(balance(&f, &tt1, f.dex.address()), 10 * WAD);
        assert_eq!(balance(&f, &tt1, &a1), 90 * WAD);
    }

    #[test]
    fn test_add_liquidity_takes_only_ratio_amounts() {
        let mut f = fixture();
        let (tt1, tt2, a1) = (f.tt1.clone(), f.tt2.clone(), f.addr1.clone());
        seed(&mut f, &tt1, &tt2, 100 * WAD, 400 * WAD);
        assert_eq!(f.dex.pair(&tt1, &tt2).unwrap().total_shares, 200 * WAD);
        approve(&mut f, &a1, &tt1, 50 * WAD);
        approve(&mut f, &a1, &tt2, 50 * WAD);
        let r = f
            .dex
            .add_liquidity(&mut f.bank, &tt1, &tt2, 50 * WAD, 50 * WAD, 0, &a1)
            .unwrap();
        // Limited by tt2: 50 of 400 is an eighth of the pool.
        assert_eq!(r.shares, 25 * WAD);
        assert_eq!(r.amount_b, 50 * WAD);
        assert_eq!(r.amount_a, 25 * WAD / 2);
        let pair = f.dex.pair(&tt1, &tt2).unwrap();
        assert_eq!(pair.reserve_of(&tt1), Some(225 * WAD / 2));
        assert_eq!(pair.reserve_of(&tt2), Some(450 * WAD));
        // Excess tt1 never left the provider.
        assert_eq!(balance(&f, &tt1, &a1), 175 * WAD / 2);
    }

    #[test]
    fn test_add_liquidity_min_shares() {
        let mut f = fixture();
        let (tt1, tt2, a1) = (f.tt1.clone(), f.tt2.clone(), f.addr1.clone());
        approve(&mut f, &a1, &tt1, 10 * WAD);
        approve(&mut f, &a1, &tt2, 10 * WAD);
        let err = f
            .dex
            .add_liquidity(&mut f.bank, &tt1, &tt2, 10 * WAD, 10 * WAD, 11 * WAD, &a1)
            .unwrap_err();
        assert!(matches!(err, DexError::SlippageExceeded { .. }));
        assert!(f.dex.pair(&tt1, &tt2).is_none());
    }

    #[test]
    fn test_add_liquidity_validation() {
        let mut f = fixture();
        let (tt1, a1) = (f.tt1.clone(), f.addr1.clone());
        assert_eq!(
            f.dex.add_liquidity(&mut f.bank, &tt1, &tt1, 1, 1, 0, &a1),
            Err(DexError::IdenticalAssets(tt1.clone()))
        );
        assert_eq!(
            f.dex.add_liquidity(&mut f.bank, &tt1, &addr("dai"), 1, 1, 0, &a1),
            Err(DexError::UnknownAsset(addr("dai")))
        );
        assert_eq!(
            f.dex.add_liquidity(&mut f.bank, &tt1, &f.tt2.clone(), 0, 1, 0, &a1),
            Err(DexError::ZeroAmount)
        );
    }

    #[test]
    fn test_add_liquidity_without_allowance() {
        let mut f = fixture();
        let (tt1, tt2, a1) = (f.tt1.clone(), f.tt2.clone(), f.addr1.clone());
        approve(&mut f, &a1, &tt1, 10 * WAD);
        let err = f
            .dex
            .add_liquidity(&mut f.bank, &tt1, &tt2, 10 * WAD, 10 * WAD, 0, &a1)
            .unwrap_err();
        assert_eq!(
            err,
            DexError::InsufficientAllowance {
                asset: tt2.clone(),
                have: 0,
                need: 10 * WAD
            }
        );
        assert_eq!(balance(&f, &tt1, &a1), 100 * WAD);
        assert!(f.dex.take_events().is_empty());
    }

    #[test]
    fn test_single_hop_swap_reference_scenario() {
        let mut f = fixture();
        let (weth, tt1, a1) = (f.weth.clone(), f.tt1.clone(), f.addr1.clone());
        seed(&mut f, &weth, &tt1, 1000 * WAD, 1000 * WAD);
        let route = SwapRoute::single(weth.clone(), tt1.clone()).unwrap();

        approve(&mut f, &a1, &weth, 10 * WAD);
        // 9.9 is above the ≈9.87 the pool can give.
        let err = f
            .dex
            .swap_exact_in(&mut f.bank, &route, 10 * WAD, 9_900 * WAD / 1000, &a1)
            .unwrap_err();
        assert!(matches!(err, DexError::SlippageExceeded { .. }));
        assert_eq!(balance(&f, &weth, &a1), 100 * WAD);

        let k_before = f.dex.pair(&weth, &tt1).unwrap().k();
        let q = f
            .dex
            .swap_exact_in(&mut f.bank, &route, 10 * WAD, 9_870 * WAD / 1000, &a1)
            .unwrap();
        assert!(q.amount_out > 9_870 * WAD / 1000 && q.amount_out < 9_872 * WAD / 1000);
        assert_eq!(balance(&f, &tt1, &a1), 100 * WAD + q.amount_out);
        assert_eq!(balance(&f, &weth, &a1), 90 * WAD);
        let pair = f.dex.pair(&weth, &tt1).unwrap();
        assert!(pair.k() >= k_before);
        assert_eq!(pair.reserve_of(&weth), Some(1010 * WAD));
        assert_eq!(pair.swap_count, 1);

        let events = f.dex.take_events();
        assert!(matches!(&events[..], [DexEvent::Swap { amount_in, .. }] if *amount_in == 10 * WAD));
    }

    #[test]
    fn test_multi_hop_swap_is_worse_than_single() {
        let mut f = fixture();
        let (weth, tt1, tt2, a1) = (f.weth.clone(), f.tt1.clone(), f.tt2.clone(), f.addr1.clone());
        seed(&mut f, &tt1, &weth, 1000 * WAD, 1000 * WAD);
        seed(&mut f, &weth, &tt2, 1000 * WAD, 1000 * WAD);

        let single = SwapRoute::single(tt1.clone(), weth.clone()).unwrap();
        let single_out = f.dex.quote_exact_in(&single, 10 * WAD).unwrap().amount_out;

        let route = SwapRoute::via(tt1.clone(), weth.clone(), tt2.clone()).unwrap();
        approve(&mut f, &a1, &tt1, 10 * WAD);
        let q = f
            .dex
            .swap_exact_in(&mut f.bank, &route, 10 * WAD, 8 * WAD, &a1)
            .unwrap();
        assert_eq!(q.hops.len(), 2);
        assert_eq!(q.hops[0].amount_out, q.hops[1].amount_in);
        assert!(q.amount_out > 8 * WAD);
        assert!(q.amount_out < single_out);
        assert_eq!(balance(&f, &tt2, &a1), 100 * WAD + q.amount_out);
        // The intermediate asset never reaches the trader.
        assert_eq!(balance(&f, &weth, &a1), 100 * WAD);
    }

    #[test]
    fn test_swap_missing_pair_is_invalid_route() {
        let mut f = fixture();
        let (weth, tt1, tt2, a1) = (f.weth.clone(), f.tt1.clone(), f.tt2.clone(), f.addr1.clone());
        seed(&mut f, &tt1, &weth, 1000 * WAD, 1000 * WAD);
        let route = SwapRoute::via(tt1.clone(), weth.clone(), tt2.clone()).unwrap();
        approve(&mut f, &a1, &tt1, 10 * WAD);
        let before = f.dex.clone();
        assert!(matches!(
            f.dex.swap_exact_in(&mut f.bank, &route, 10 * WAD, 0, &a1),
            Err(DexError::InvalidRoute(_))
        ));
        assert_eq!(f.dex, before);
    }

    #[test]
    fn test_swap_zero_amount() {
        let mut f = fixture();
        let (weth, tt1, a1) = (f.weth.clone(), f.tt1.clone(), f.addr1.clone());
        seed(&mut f, &weth, &tt1, 1000 * WAD, 1000 * WAD);
        let route = SwapRoute::single(weth, tt1).unwrap();
        assert_eq!(
            f.dex.swap_exact_in(&mut f.bank, &route, 0, 0, &a1),
            Err(DexError::ZeroAmount)
        );
    }

    #[test]
    fn test_swap_requires_allowance() {
        let mut f = fixture();
        let (weth, tt1, a1) = (f.weth.clone(), f.tt1.clone(), f.addr1.clone());
        seed(&mut f, &weth, &tt1, 1000 * WAD, 1000 * WAD);
        let route = SwapRoute::single(weth.clone(), tt1.clone()).unwrap();
        approve(&mut f, &a1, &weth, 5 * WAD);
        let err = f
            .dex
            .swap_exact_in(&mut f.bank, &route, 10 * WAD, 0, &a1)
            .unwrap_err();
        assert_eq!(
            err,
            DexError::InsufficientAllowance {
                asset: weth.clone(),
                have: 5 * WAD,
                need: 10 * WAD
            }
        );
        assert_eq!(f.dex.pair(&weth, &tt1).unwrap().reserve_of(&weth), Some(1000 * WAD));
    }

    #[test]
    fn test_swap_requires_balance() {
        let mut f = fixture();
        let (weth, tt1, a1) = (f.weth.clone(), f.tt1.clone(), f.addr1.clone());
        seed(&mut f, &weth, &tt1, 1000 * WAD, 1000 * WAD);
        let route = SwapRoute::single(weth.clone(), tt1).unwrap();
        approve(&mut f, &a1, &weth, 500 * WAD);
        assert!(matches!(
            f.dex.swap_exact_in(&mut f.bank, &route, 500 * WAD, 0, &a1),
            Err(DexError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn test_swap_on_drained_pair() {
        let mut f = fixture();
        let (weth, tt1, owner, a1) = (f.weth.clone(), f.tt1.clone(), f.owner.clone(), f.addr1.clone());
        seed(&mut f, &weth, &tt1, 1000 * WAD, 1000 * WAD);
        f.dex.remove_liquidity(&mut f.bank, &weth, &tt1, &owner).unwrap();
        // The record survives with zero reserves.
        let pair = f.dex.pair(&weth, &tt1).unwrap();
        assert!(pair.is_empty());
        assert_eq!(pair.reserve0, 0);

        let route = SwapRoute::single(weth.clone(), tt1.clone()).unwrap();
        approve(&mut f, &a1, &weth, WAD);
        assert!(matches!(
            f.dex.swap_exact_in(&mut f.bank, &route, WAD, 0, &a1),
            Err(DexError::InsufficientLiquidity(_))
        ));

        // Re-seeding an emptied pair mints from scratch again.
        seed(&mut f, &weth, &tt1, 4 * WAD, WAD);
        assert_eq!(f.dex.pair(&weth, &tt1).unwrap().total_shares, 2 * WAD);
    }

    #[test]
    fn test_remove_liquidity_returns_deposit() {
        let mut f = fixture();
        let (tt1, tt2, a1) = (f.tt1.clone(), f.tt2.clone(), f.addr1.clone());
        approve(&mut f, &a1, &tt1, 10 * WAD);
        approve(&mut f, &a1, &tt2, 10 * WAD);
        f.dex
            .add_liquidity(&mut f.bank, &tt1, &tt2, 10 * WAD, 10 * WAD, 0, &a1)
            .unwrap();
        let r = f.dex.remove_liquidity(&mut f.bank, &tt2, &tt1, &a1).unwrap();
        assert_eq!(r.amount_a, 10 * WAD);
        assert_eq!(r.amount_b, 10 * WAD);
        assert_eq!(r.position, 0);
        assert_eq!(balance(&f, &tt1, &a1), 100 * WAD);
        assert_eq!(balance(&f, &tt2, &a1), 100 * WAD);
        assert!(f.dex.positions(&r.pair).is_empty());
        let events = f.dex.take_events();
        assert!(events.iter().any(|e| matches!(e, DexEvent::LiquidityRemoved { .. })));
        assert!(events.iter().any(|e| e.log_value(LIQUIDITY_CATEGORY).is_some()));
    }

    #[test]
    fn test_remove_liquidity_without_position() {
        let mut f = fixture();
        let (tt1, tt2, a1) = (f.tt1.clone(), f.tt2.clone(), f.addr1.clone());
        // No pair at all.
        assert_eq!(
            f.dex.remove_liquidity(&mut f.bank, &tt1, &tt2, &a1),
            Err(DexError::InsufficientPosition { have: 0, need: 1 })
        );
        // Pair exists, caller holds nothing.
        seed(&mut f, &tt1, &tt2, 100 * WAD, 100 * WAD);
        let before = f.dex.pair(&tt1, &tt2).cloned();
        assert!(matches!(
            f.dex.remove_liquidity(&mut f.bank, &tt1, &tt2, &a1),
            Err(DexError::InsufficientPosition { have: 0, .. })
        ));
        assert_eq!(f.dex.pair(&tt1, &tt2).cloned(), before);
    }

    #[test]
    fn test_approved_agent_redeems_owner_position() {
        let mut f = fixture();
        let (tt1, tt2, owner, a1) = (f.tt1.clone(), f.tt2.clone(), f.owner.clone(), f.addr1.clone());
        seed(&mut f, &tt1, &tt2, 100 * WAD, 100 * WAD);

        // Holding nothing, the agent cannot redeem as itself.
        assert!(matches!(
            f.dex.remove_liquidity_shares(&mut f.bank, &tt1, &tt2, 10 * WAD, 0, 0, &a1),
            Err(DexError::InsufficientPosition { have: 0, .. })
        ));
        // Nor on the owner's behalf before approval.
        assert_eq!(
            f.dex.remove_liquidity_from(&mut f.bank, &tt1, &tt2, 10 * WAD, 0, 0, &owner, &a1),
            Err(DexError::InsufficientShareAllowance { have: 0, need: 10 * WAD })
        );

        f.dex.approve_shares(&owner, &a1, &tt2, &tt1, 50 * WAD).unwrap();
        assert_eq!(f.dex.share_allowance(&owner, &a1, &tt1, &tt2), 50 * WAD);
        let r = f
            .dex
            .remove_liquidity_from(&mut f.bank, &tt1, &tt2, 40 * WAD, 0, 0, &owner, &a1)
            .unwrap();
        assert_eq!(r.amount_a, 40 * WAD);
        assert_eq!(r.position, 60 * WAD);
        assert_eq!(f.dex.position(&owner, &tt1, &tt2), 60 * WAD);
        assert_eq!(f.dex.position(&a1, &tt1, &tt2), 0);
        assert_eq!(f.dex.share_allowance(&owner, &a1, &tt1, &tt2), 10 * WAD);
        // Proceeds go to the agent.
        assert_eq!(balance(&f, &tt1, &a1), 140 * WAD);
        assert_eq!(balance(&f, &tt2, &a1), 140 * WAD);

        // The rest of the approval is not enough for another 40.
        assert_eq!(
            f.dex.remove_liquidity_from(&mut f.bank, &tt1, &tt2, 40 * WAD, 0, 0, &owner, &a1),
            Err(DexError::InsufficientShareAllowance { have: 10 * WAD, need: 40 * WAD })
        );
    }

    #[test]
    fn test_share_allowance_survives_failed_redeem() {
        let mut f = fixture();
        let (tt1, tt2, owner, a1) = (f.tt1.clone(), f.tt2.clone(), f.owner.clone(), f.addr1.clone());
        seed(&mut f, &tt1, &tt2, 100 * WAD, 100 * WAD);
        f.dex.approve_shares(&owner, &a1, &tt1, &tt2, u128::MAX).unwrap();

        assert!(matches!(
            f.dex.remove_liquidity_from(&mut f.bank, &tt1, &tt2, 10 * WAD, 11 * WAD, 0, &owner, &a1),
            Err(DexError::SlippageExceeded { .. })
        ));
        assert_eq!(f.dex.position(&owner, &tt1, &tt2), 100 * WAD);

        // Unlimited approvals are not spent down.
        f.dex
            .remove_liquidity_from(&mut f.bank, &tt1, &tt2, 10 * WAD, 0, 0, &owner, &a1)
            .unwrap();
        assert_eq!(f.dex.share_allowance(&owner, &a1, &tt1, &tt2), u128::MAX);

        // Approving zero revokes.
        f.dex.approve_shares(&owner, &a1, &tt1, &tt2, 0).unwrap();
        assert_eq!(f.dex.share_allowance(&owner, &a1, &tt1, &tt2), 0);
        assert_eq!(f.dex.approve_shares(&owner, &a1, &tt1, &tt1, 1), Err(DexError::IdenticalAssets(tt1.clone())));
    }

    #[test]
    fn test_partial_remove_and_min_amounts() {
        let mut f = fixture();
        let (tt1, tt2, owner) = (f.tt1.clone(), f.tt2.clone(), f.owner.clone());
        seed(&mut f, &tt1, &tt2, 100 * WAD, 400 * WAD);
        let shares = f.dex.position(&owner, &tt1, &tt2);
        assert_eq!(shares, 200 * WAD);

        assert!(matches!(
            f.dex.remove_liquidity_shares(&mut f.bank, &tt1, &tt2, 50 * WAD, 26 * WAD, 0, &owner),
            Err(DexError::SlippageExceeded { .. })
        ));
        assert!(matches!(
            f.dex.remove_liquidity_shares(&mut f.bank, &tt1, &tt2, 201 * WAD, 0, 0, &owner),
            Err(DexError::InsufficientPosition { .. })
        ));

        let r = f
            .dex
            .remove_liquidity_shares(&mut f.bank, &tt1, &tt2, 50 * WAD, 25 * WAD, 100 * WAD, &owner)
            .unwrap();
        assert_eq!((r.amount_a, r.amount_b), (25 * WAD, 100 * WAD));
        assert_eq!(r.position, 150 * WAD);
        assert_eq!(f.dex.pair(&tt1, &tt2).unwrap().total_shares, 150 * WAD);
    }

    #[test]
    fn test_fees_accrue_to_providers() {
        let mut f = fixture();
        let (weth, tt1, owner, a1) = (f.weth.clone(), f.tt1.clone(), f.owner.clone(), f.addr1.clone());
        seed(&mut f, &weth, &tt1, 1000 * WAD, 1000 * WAD);
        let route_in = SwapRoute::single(weth.clone(), tt1.clone()).unwrap();
        let route_back = SwapRoute::single(tt1.clone(), weth.clone()).unwrap();
        approve(&mut f, &a1, &weth, u128::MAX);
        approve(&mut f, &a1, &tt1, u128::MAX);
        for _ in 0..5 {
            let q = f.dex.swap_exact_in(&mut f.bank, &route_in, 10 * WAD, 0, &a1).unwrap();
            f.dex.swap_exact_in(&mut f.bank, &route_back, q.amount_out, 0, &a1).unwrap();
        }
        let r = f.dex.remove_liquidity(&mut f.bank, &weth, &tt1, &owner).unwrap();
        assert!(r.amount_a + r.amount_b > 2000 * WAD);
    }

    #[test]
    fn test_reentrant_entry_rejected() {
        let mut f = fixture();
        let (weth, tt1, a1) = (f.weth.clone(), f.tt1.clone(), f.addr1.clone());
        seed(&mut f, &weth, &tt1, 1000 * WAD, 1000 * WAD);
        let route = SwapRoute::single(weth, tt1).unwrap();
        f.dex.entered = true;
        assert_eq!(
            f.dex.swap_exact_in(&mut f.bank, &route, WAD, 0, &a1),
            Err(DexError::Reentrant)
        );
        f.dex.exit();
        approve(&mut f, &a1, route.asset_in(), WAD);
        assert!(f.dex.swap_exact_in(&mut f.bank, &route, WAD, 0, &a1).is_ok());
    }

    /// Bank whose output token refuses every outgoing transfer, to force a
    /// failure after the input has already been pulled.
    struct FrozenOut {
        inner: TokenRegistry,
        frozen: Address,
        frozen_token: FrozenToken,
    }

    struct FrozenToken(Token);

    impl FungibleAsset for FrozenToken {
        fn address(&self) -> &Address {
            self.0.address()
        }
        fn symbol(&self) -> &str {
            self.0.symbol()
        }
        fn balance_of(&self, owner: &Address) -> u128 {
            self.0.balance_of(owner)
        }
        fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
            self.0.allowance(owner, spender)
        }
        fn approve(&mut self, o: &Address, s: &Address, amount: u128) -> Result<(), TokenError> {
            self.0.approve(o, s, amount)
        }
        fn transfer(&mut self, _: &Address, _: &Address, _: u128) -> Result<(), TokenError> {
            Err(TokenError::InvalidMetadata("frozen".into()))
        }
        fn transfer_from(
            &mut self,
            s: &Address,
            o: &Address,
            t: &Address,
            amount: u128,
        ) -> Result<(), TokenError> {
            self.0.transfer_from(s, o, t, amount)
        }
    }

    impl AssetBank for FrozenOut {
        fn asset(&self, address: &Address) -> Option<&dyn FungibleAsset> {
            if address == &self.frozen {
                Some(&self.frozen_token as &dyn FungibleAsset)
            } else {
                self.inner.asset(address)
            }
        }
        fn asset_mut(&mut self, address: &Address) -> Option<&mut dyn FungibleAsset> {
            if address == &self.frozen {
                Some(&mut self.frozen_token as &mut dyn FungibleAsset)
            } else {
                self.inner.asset_mut(address)
            }
        }
    }

    #[test]
    fn test_failed_push_rolls_back_everything() {
        let mut f = fixture();
        let (weth, tt1, a1) = (f.weth.clone(), f.tt1.clone(), f.addr1.clone());
        seed(&mut f, &weth, &tt1, 1000 * WAD, 1000 * WAD);
        approve(&mut f, &a1, &weth, 10 * WAD);

        let frozen_token = FrozenToken(f.bank.get(&tt1).unwrap().clone());
        let mut bank = FrozenOut {
            inner: f.bank.clone(),
            frozen: tt1.clone(),
            frozen_token,
        };
        let before = f.dex.clone();
        let route = SwapRoute::single(weth.clone(), tt1.clone()).unwrap();
        let err = f
            .dex
            .swap_exact_in(&mut bank, &route, 10 * WAD, 0, &a1)
            .unwrap_err();
        assert!(matches!(err, DexError::Asset(_)));
        assert_eq!(f.dex, before);
        // The pulled input went back to the trader.
        assert_eq!(bank.inner.balance_of(&weth, &a1).unwrap(), 100 * WAD);
        assert_eq!(bank.inner.balance_of(&weth, f.dex.address()).unwrap(), 1000 * WAD);
        assert!(f.dex.take_events().is_empty());
    }

    #[test]
    fn test_json_roundtrip_drops_transient_state() {
        let mut f = fixture();
        let (tt1, tt2) = (f.tt1.clone(), f.tt2.clone());
        seed(&mut f, &tt1, &tt2, 10 * WAD, 10 * WAD);
        let json = serde_json::to_string(&f.dex).unwrap();
        let back: ExchangeLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f.dex);
    }
}
