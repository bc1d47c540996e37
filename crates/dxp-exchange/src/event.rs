// SPDX-License-Identifier: AGPL-3.0-only
//! Events emitted by the exchange ledger.
//!
//! The ledger buffers events while a call runs; the hosting environment
//! drains them into the transaction receipt once the call commits.

use crate::pair::PairKey;
use dxp_core::Address;
use serde::{Deserialize, Serialize};

/// `Log` category emitted on every liquidity change.
pub const LIQUIDITY_CATEGORY: &str = "Liquidity";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DexEvent {
    /// Generic `Log(category, value)`.
    Log { category: String, value: u128 },
    PairCreated {
        pair: PairKey,
    },
    Swap {
        trader: Address,
        path: Vec<Address>,
        amount_in: u128,
        amount_out: u128,
        fee_total: u128,
    },
    LiquidityAdded {
        provider: Address,
        pair: PairKey,
        amount0: u128,
        amount1: u128,
        shares: u128,
    },
    LiquidityRemoved {
        provider: Address,
        pair: PairKey,
        amount0: u128,
        amount1: u128,
        shares: u128,
    },
}

impl DexEvent {
    pub fn log(category: &str, value: u128) -> Self {
        DexEvent::Log {
            category: category.to_string(),
            value,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DexEvent::Log { .. } => "Log",
            DexEvent::PairCreated { .. } => "PairCreated",
            DexEvent::Swap { .. } => "Swap",
            DexEvent::LiquidityAdded { .. } => "LiquidityAdded",
            DexEvent::LiquidityRemoved { .. } => "LiquidityRemoved",
        }
    }

    /// Value of a `Log` event with the given category.
    pub fn log_value(&self, category: &str) -> Option<u128> {
        match self {
            DexEvent::Log { category: c, value } if c == category => Some(*value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_value_matches_category() {
        let e = DexEvent::log(LIQUIDITY_CATEGORY, 10);
        assert_eq!(e.log_value("Liquidity"), Some(10));
        assert_eq!(e.log_value("Swap"), None);
        assert_eq!(e.name(), "Log");
    }

    #[test]
    fn test_json_roundtrip() {
        let e = DexEvent::log(LIQUIDITY_CATEGORY, 10);
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"Log":{"category":"Liquidity","value":10}}"#);
        assert_eq!(serde_json::from_str::<DexEvent>(&json).unwrap(), e);
    }
}
