// SPDX-License-Identifier: AGPL-3.0-only
//! Swap routes.

use crate::DexError;
use dxp_core::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest route accepted (asset → intermediate → asset).
pub const MAX_HOPS: usize = 2;

/// Ordered asset path of one or two hops. Ephemeral: built per swap call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Address>", into = "Vec<Address>")]
pub struct SwapRoute {
    path: Vec<Address>,
}

impl SwapRoute {
    pub fn new(path: Vec<Address>) -> Result<Self, DexError> {
        if path.len() < 2 {
            return Err(DexError::InvalidRoute(
                "route needs at least two assets".to_string(),
            ));
        }
        if path.len() > MAX_HOPS + 1 {
            return Err(DexError::InvalidRoute(format!(
                "route has {} hops (max {})",
                path.len() - 1,
                MAX_HOPS
            )));
        }
        if let Some(w) = path.windows(2).find(|w| w[0] == w[1]) {
            return Err(DexError::InvalidRoute(format!(
                "hop from {} to itself",
                w[0]
            )));
        }
        Ok(SwapRoute { path })
    }

    pub fn single(asset_in: Address, asset_out: Address) -> Result<Self, DexError> {
        Self::new(vec![asset_in, asset_out])
    }

    pub fn via(asset_in: Address, intermediate: Address, asset_out: Address) -> Result<Self, DexError> {
        Self::new(vec![asset_in, intermediate, asset_out])
    }

    pub fn path(&self) -> &[Address] {
        &self.path
    }

    pub fn asset_in(&self) -> &Address {
        &self.path[0]
    }

    pub fn asset_out(&self) -> &Address {
        &self.path[self.path.len() - 1]
    }

    pub fn hop_count(&self) -> usize {
        self.path.len() - 1
    }

    /// `(asset_in, asset_out)` for each hop, in order.
    pub fn hops(&self) -> impl Iterator<Item = (&Address, &Address)> {
        self.path.windows(2).map(|w| (&w[0], &w[1]))
    }
}

impl TryFrom<Vec<Address>> for SwapRoute {
    type Error = DexError;

    fn try_from(path: Vec<Address>) -> Result<Self, Self::Error> {
        SwapRoute::new(path)
    }
}

impl From<SwapRoute> for Vec<Address> {
    fn from(route: SwapRoute) -> Self {
        route.path
    }
}

impl fmt::Display for SwapRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.path.iter().map(|a| a.as_str()).collect();
        f.write_str(&parts.join(" -> "))
    }
}
