// SPDX-License-Identifier: AGPL-3.0-only
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DEX PLATFORM - CORE PRIMITIVES
//
// Shared building blocks for every crate in the workspace.
// - 20-byte hex addresses (EVM layout) and Keccak-256 address derivation
// - 18-decimal token unit conversion (no floating-point)
// - Harness configuration (networks, deployment fixture)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use thiserror::Error;

pub mod config;
pub mod units;

pub use units::{format_ether, format_units, parse_ether, parse_units, UnitsError, DECIMALS, WAD};

/// Length of an address in bytes (EVM layout).
pub const ADDRESS_BYTES: usize = 20;

/// Basis point denominator
pub const BPS_DENOMINATOR: u128 = 10_000;
/// Default swap fee: 30 bps = 0.3%
pub const DEFAULT_FEE_BPS: u128 = 30;
/// Max fee: 1000 bps = 10%
pub const MAX_FEE_BPS: u128 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),
    #[error("address must be {expected} hex characters, got {got}")]
    BadLength { expected: usize, got: usize },
    #[error("address contains non-hex characters: {0}")]
    NotHex(String),
}

/// Account or contract identity.
///
/// Always stored lowercase with a `0x` prefix so that the derived `Ord` is
/// stable; pair keys and map iteration depend on it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse a `0x`-prefixed 40 hex character address.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| AddressError::MissingPrefix(s.to_string()))?;
        if body.len() != ADDRESS_BYTES * 2 {
            return Err(AddressError::BadLength {
                expected: ADDRESS_BYTES * 2,
                got: body.len(),
            });
        }
        if hex::decode(body).is_err() {
            return Err(AddressError::NotHex(s.to_string()));
        }
        Ok(Address(format!("0x{}", body.to_ascii_lowercase())))
    }

    /// The all-zero address. Never owns anything.
    pub fn zero() -> Self {
        Address(format!("0x{}", "0".repeat(ADDRESS_BYTES * 2)))
    }

    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }

    /// Derive an address from arbitrary seed bytes: the last 20 bytes of
    /// `keccak256(seed)`.
    pub fn derive(seed: &[u8]) -> Self {
        let digest = Keccak256::digest(seed);
        Address(format!(
            "0x{}",
            hex::encode(&digest[digest.len() - ADDRESS_BYTES..])
        ))
    }

    /// Deterministic contract address for the `nonce`-th deployment made by
    /// `deployer`.
    pub fn contract(deployer: &Address, nonce: u64) -> Self {
        let mut seed = Vec::with_capacity(ADDRESS_BYTES * 2 + 2 + 8);
        seed.extend_from_slice(deployer.0.as_bytes());
        seed.extend_from_slice(&nonce.to_be_bytes());
        Self::derive(&seed)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for terminal output (`0x1234…abcd`).
    pub fn short(&self) -> String {
        format!("{}…{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}
