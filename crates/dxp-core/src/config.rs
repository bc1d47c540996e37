// SPDX-License-Identifier: AGPL-3.0-only
//! Harness configuration.
//!
//! One TOML file describes the toolchain version, the networks the harness
//! may target and the deployment fixture (tokens, funding, seeded pools,
//! swap routes). `PROVIDER_URL` and `PRIVATE_KEY` from the environment
//! override the selected network, so credentials never need to live in the
//! file.
//!
//! ```toml
//! compiler_version = "0.8.24"
//! default_network = "devnet"
//!
//! [networks.polygonAmoy]
//! url = "https://rpc-amoy.polygon.technology"
//! accounts = []
//!
//! [deployment]
//! initial_supply = "1000"
//! fund_amount = "100"
//! fee_bps = 30
//! ```

use crate::units::{parse_ether, UnitsError};
use crate::{Address, MAX_FEE_BPS};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the built-in in-process network. It never needs a `[networks]` entry.
pub const DEVNET: &str = "devnet";

/// Environment variable overriding the selected network's RPC URL.
pub const ENV_PROVIDER_URL: &str = "PROVIDER_URL";
/// Environment variable overriding the selected network's first account.
pub const ENV_PRIVATE_KEY: &str = "PRIVATE_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid amount in config: {0}")]
    Units(#[from] UnitsError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub compiler_version: String,
    #[serde(default = "default_network")]
    pub default_network: String,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
    #[serde(default)]
    pub deployment: DeploymentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub url: String,
    /// Signing credentials. Only their Keccak-256 identity is used by the
    /// harness; nothing is ever signed with them.
    #[serde(default)]
    pub accounts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Whole tokens minted to the deployer per token.
    pub initial_supply: String,
    /// Whole tokens of each token transferred to the funded account.
    pub fund_amount: String,
    pub fee_bps: u32,
    pub tokens: Vec<TokenSpec>,
    pub seed_pools: Vec<SeedPool>,
    pub routes: RouteSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSpec {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPool {
    pub token_a: String,
    pub token_b: String,
    pub amount_a: String,
    pub amount_b: String,
}

/// Token symbols of the two fixed routes the platform exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSpec {
    pub single_hop: Vec<String>,
    pub multi_hop: Vec<String>,
}

fn default_network() -> String {
    DEVNET.to_string()
}

impl Default for RouteSpec {
    fn default() -> Self {
        Self {
            single_hop: vec!["WETH".into(), "TT1".into()],
            multi_hop: vec!["TT1".into(), "WETH".into(), "TT2".into()],
        }
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            tokens: vec![
                TokenSpec {
                    name: "Token1".into(),
                    symbol: "TT1".into(),
                },
                TokenSpec {
                    name: "Token2".into(),
                    symbol: "TT2".into(),
                },
                TokenSpec {
                    name: "Wrapped Ether".into(),
                    symbol: "WETH".into(),
                },
            ],
            initial_supply: "1000".into(),
            fund_amount: "100".into(),
            fee_bps: crate::DEFAULT_FEE_BPS as u32,
            seed_pools: Vec::new(),
            routes: RouteSpec::default(),
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            compiler_version: "0.8.24".into(),
            default_network: default_network(),
            networks: BTreeMap::new(),
            deployment: DeploymentConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load harness config from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: HarnessConfig = toml::from_str(&content)?;
        log::debug!("loaded harness config from {}", path.display());
        Ok(config)
    }

    /// Save harness config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Apply `PROVIDER_URL` / `PRIVATE_KEY` from the process environment to
    /// `network`.
    pub fn apply_env(&mut self, network: &str) {
        self.apply_env_from(network, |key| std::env::var(key).ok());
    }

    /// Same as [`apply_env`](Self::apply_env) with an explicit variable
    /// source.
    ///
    /// A network that is not declared yet is created when a provider URL is
    /// supplied. The devnet has no URL and only picks up the credential.
    pub fn apply_env_from<F>(&mut self, network: &str, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(ENV_PROVIDER_URL).filter(|v| !v.is_empty());
        let key = lookup(ENV_PRIVATE_KEY).filter(|v| !v.is_empty());

        if network == DEVNET && url.is_some() {
            log::warn!("{} ignored for the in-process devnet", ENV_PROVIDER_URL);
        }

        if network != DEVNET {
            if let Some(url) = url {
                let entry = self
                    .networks
                    .entry(network.to_string())
                    .or_insert_with(|| NetworkConfig {
                        url: String::new(),
                        accounts: Vec::new(),
                    });
                entry.url = url;
            }
        }

        if let Some(key) = key {
            match self.networks.get_mut(network) {
                Some(net) => {
                    if net.accounts.is_empty() {
                        net.accounts.push(key);
                    } else {
                        net.accounts[0] = key;
                    }
                }
                None if network == DEVNET => {
                    self.networks.insert(
                        DEVNET.to_string(),
                        NetworkConfig {
                            url: String::new(),
                            accounts: vec![key],
                        },
                    );
                }
                None => log::warn!(
                    "{} set but network {} has no URL; ignoring",
                    ENV_PRIVATE_KEY,
                    network
                ),
            }
        }
    }

    /// Signer addresses for `network`, derived from its account credentials.
    pub fn signer_addresses(&self, network: &str) -> Vec<Address> {
        self.networks
            .get(network)
            .map(|n| {
                n.accounts
                    .iter()
                    .map(|cred| Address::derive(cred.as_bytes()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compiler_version.trim().is_empty() {
            return Err(invalid("compiler_version cannot be empty"));
        }

        if self.default_network != DEVNET && !self.networks.contains_key(&self.default_network) {
            return Err(invalid(format!(
                "default_network {} is not declared under [networks]",
                self.default_network
            )));
        }

        for (name, net) in &self.networks {
            if name == DEVNET {
                continue;
            }
            let scheme_ok = ["http://", "https://", "ws://", "wss://"]
                .iter()
                .any(|s| net.url.starts_with(s));
            if !scheme_ok {
                return Err(invalid(format!(
                    "network {} has unsupported url {:?}",
                    name, net.url
                )));
            }
            if net.accounts.iter().any(|a| a.trim().is_empty()) {
                return Err(invalid(format!("network {} has an empty account", name)));
            }
        }

        self.deployment.validate()
    }
}

impl DeploymentConfig {
    pub fn initial_supply_units(&self) -> Result<u128, ConfigError> {
        Ok(parse_ether(&self.initial_supply)?)
    }

    pub fn fund_amount_units(&self) -> Result<u128, ConfigError> {
        Ok(parse_ether(&self.fund_amount)?)
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.tokens.iter().any(|t| t.symbol == symbol)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.is_empty() {
            return Err(invalid("deployment needs at least one token"));
        }
        let mut symbols = BTreeSet::new();
        for token in &self.tokens {
            if token.symbol.is_empty() || token.name.is_empty() {
                return Err(invalid("token name and symbol cannot be empty"));
            }
            if !symbols.insert(token.symbol.as_str()) {
                return Err(invalid(format!("duplicate token symbol {}", token.symbol)));
            }
        }

        let supply = self.initial_supply_units()?;
        let fund = self.fund_amount_units()?;
        if fund > supply {
            return Err(invalid(format!(
                "fund_amount {} exceeds initial_supply {}",
                self.fund_amount, self.initial_supply
            )));
        }

        if u128::from(self.fee_bps) > MAX_FEE_BPS {
            return Err(invalid(format!(
                "fee_bps {} too high (max {})",
                self.fee_bps, MAX_FEE_BPS
            )));
        }

        for pool in &self.seed_pools {
            for symbol in [&pool.token_a, &pool.token_b] {
                if !self.has_symbol(symbol) {
                    return Err(invalid(format!("seed pool references unknown token {}", symbol)));
                }
            }
            if pool.token_a == pool.token_b {
                return Err(invalid(format!(
                    "seed pool {}/{} uses the same token twice",
                    pool.token_a, pool.token_b
                )));
            }
            parse_ether(&pool.amount_a)?;
            parse_ether(&pool.amount_b)?;
        }

        for (label, route) in [
            ("single_hop", &self.routes.single_hop),
            ("multi_hop", &self.routes.multi_hop),
        ] {
            if route.len() < 2 || route.len() > 3 {
                return Err(invalid(format!(
                    "route {} must list 2 or 3 tokens, got {}",
                    label,
                    route.len()
                )));
            }
            if let Some(unknown) = route.iter().find(|s| !self.has_symbol(s)) {
                return Err(invalid(format!(
                    "route {} references unknown token {}",
                    label, unknown
                )));
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
