// SPDX-License-Identifier: AGPL-3.0-only
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DEX PLATFORM - EXCHANGE LEDGER
//
// Constant product AMM (x·y=k) over fungible assets.
// - Per-pair reserves keyed by the sorted asset pair
// - Single-hop and two-hop exact-input swaps with slippage bound
// - Liquidity shares minted/burned proportionally to reserves
// - 0.3% default fee (30 bps) kept in the pool for liquidity providers
// - All integer math, 256-bit intermediates, no floating-point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use dxp_core::Address;
use dxp_token::TokenError;
use thiserror::Error;

pub mod event;
pub mod ledger;
pub mod math;
pub mod pair;
pub mod platform;
pub mod registry;
pub mod route;

pub use event::{DexEvent, LIQUIDITY_CATEGORY};
pub use ledger::{ExchangeConfig, ExchangeLedger, HopQuote, LiquidityReceipt, SwapQuote};
pub use pair::{PairKey, TradingPair};
pub use platform::{DexPlatform, PlatformRoutes};
pub use registry::{PoolInfo, PositionInfo};
pub use route::{SwapRoute, MAX_HOPS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DexError {
    #[error("insufficient allowance for {asset}: approved {have}, needs {need}")]
    InsufficientAllowance {
        asset: Address,
        have: u128,
        need: u128,
    },
    #[error("insufficient balance of {asset}: has {have}, needs {need}")]
    InsufficientBalance {
        asset: Address,
        have: u128,
        need: u128,
    },
    #[error("slippage exceeded: output {amount_out} < minimum {min_out}")]
    SlippageExceeded { amount_out: u128, min_out: u128 },
    #[error("insufficient liquidity: {0}")]
    InsufficientLiquidity(String),
    #[error("insufficient position: holds {have} shares, needs {need}")]
    InsufficientPosition { have: u128, need: u128 },
    #[error("insufficient share allowance: may redeem {have} shares, needs {need}")]
    InsufficientShareAllowance { have: u128, need: u128 },
    #[error("invalid route: {0}")]
    InvalidRoute(String),
    #[error("pair needs two distinct assets, got {0} twice")]
    IdenticalAssets(Address),
    #[error("unknown asset {0}")]
    UnknownAsset(Address),
    #[error("amount must be > 0")]
    ZeroAmount,
    #[error("fee too high: {0} bps (max 1000 bps = 10%)")]
    FeeTooHigh(u128),
    #[error("arithmetic overflow")]
    Overflow,
    #[error("re-entrant call rejected")]
    Reentrant,
    #[error("asset transfer failed: {0}")]
    Asset(#[from] TokenError),
}

impl DexError {
    /// Translate a token failure during a pull or push into the exchange's
    /// own taxonomy.
    pub(crate) fn from_token(asset: &Address, err: TokenError) -> Self {
        match err {
            TokenError::InsufficientAllowance { have, need, .. } => DexError::InsufficientAllowance {
                asset: asset.clone(),
                have,
                need,
            },
            TokenError::InsufficientBalance { have, need, .. } => DexError::InsufficientBalance {
                asset: asset.clone(),
                have,
                need,
            },
            TokenError::UnknownToken(a) => DexError::UnknownAsset(a),
            other => DexError::Asset(other),
        }
    }
}
