// SPDX-License-Identifier: AGPL-3.0-only
//! Trading pairs and their stable keys.

use crate::math;
use crate::DexError;
use dxp_core::Address;
use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unordered asset pair, stored sorted so `(A, B)` and `(B, A)` address the
/// same record. Serialized as `"{asset0}:{asset1}"` so it can key JSON maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PairKey {
    asset0: Address,
    asset1: Address,
}

impl PairKey {
    pub fn new(a: &Address, b: &Address) -> Result<Self, DexError> {
        if a == b {
            return Err(DexError::IdenticalAssets(a.clone()));
        }
        let (asset0, asset1) = if a < b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        Ok(PairKey { asset0, asset1 })
    }

    pub fn asset0(&self) -> &Address {
        &self.asset0
    }

    pub fn asset1(&self) -> &Address {
        &self.asset1
    }

    pub fn contains(&self, asset: &Address) -> bool {
        &self.asset0 == asset || &self.asset1 == asset
    }

    /// The counter-asset of `asset`, if `asset` is in this pair.
    pub fn other(&self, asset: &Address) -> Option<&Address> {
        if &self.asset0 == asset {
            Some(&self.asset1)
        } else if &self.asset1 == asset {
            Some(&self.asset0)
        } else {
            None
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.asset0, self.asset1)
    }
}

impl From<PairKey> for String {
    fn from(key: PairKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for PairKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (a, b) = value
            .split_once(':')
            .ok_or_else(|| format!("pair key {:?} missing ':'", value))?;
        let a = Address::parse(a).map_err(|e| e.to_string())?;
        let b = Address::parse(b).map_err(|e| e.to_string())?;
        PairKey::new(&a, &b).map_err(|e| e.to_string())
    }
}

/// Reserve state of one pair.
///
/// Created on first liquidity and never removed: a fully drained pair keeps
/// its record with zero reserves and zero shares and is re-seeded like a new
/// one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPair {
    pub key: PairKey,
    pub reserve0: u128,
    pub reserve1: u128,
    pub total_shares: u128,
    pub swap_count: u64,
}

impl TradingPair {
    pub fn new(key: PairKey) -> Self {
        TradingPair {
            key,
            reserve0: 0,
            reserve1: 0,
            total_shares: 0,
            swap_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_shares == 0
    }

    pub fn reserve_of(&self, asset: &Address) -> Option<u128> {
        if asset == self.key.asset0() {
            Some(self.reserve0)
        } else if asset == self.key.asset1() {
            Some(self.reserve1)
        } else {
            None
        }
    }

    /// `(reserve_in, reserve_out)` for a trade selling `asset_in`.
    pub fn reserves_for(&self, asset_in: &Address) -> Result<(u128, u128), DexError> {
        if asset_in == self.key.asset0() {
            Ok((self.reserve0, self.reserve1))
        } else if asset_in == self.key.asset1() {
            Ok((self.reserve1, self.reserve0))
        } else {
            Err(DexError::InvalidRoute(format!(
                "asset {} is not in pair {}",
                asset_in, self.key
            )))
        }
    }

    /// Book a swap: `amount_in` (fee included) enters, `amount_out` leaves.
    pub fn apply_swap(
        &mut self,
        asset_in: &Address,
        amount_in: u128,
        amount_out: u128,
    ) -> Result<(), DexError> {
        let (reserve_in, reserve_out) = self.reserves_for(asset_in)?;
        if amount_out >= reserve_out {
            return Err(DexError::InsufficientLiquidity(format!(
                "output {} would drain reserve {}",
                amount_out, reserve_out
            )));
        }
        let new_in = reserve_in.checked_add(amount_in).ok_or(DexError::Overflow)?;
        let new_out = reserve_out - amount_out;
        if asset_in == self.key.asset0() {
            self.reserve0 = new_in;
            self.reserve1 = new_out;
        } else {
            self.reserve1 = new_in;
            self.reserve0 = new_out;
        }
        self.swap_count += 1;
        Ok(())
    }

    /// `reserve0 * reserve1`
    pub fn k(&self) -> U256 {
        math::product(self.reserve0, self.reserve1)
    }
}
