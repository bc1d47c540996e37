// SPDX-License-Identifier: AGPL-3.0-only
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DEX PLATFORM - DEVNET
//
// In-process chain for exercising the exchange:
// - Labelled signer accounts (owner, addr1, ...) with derived addresses
// - Deterministic contract addresses from (deployer, nonce)
// - Fixture deployment driven by DeploymentConfig
// - Atomic transactions: any error reverts every token and exchange change
// - JSON persistence so the CLI can keep state between invocations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use dxp_core::config::{ConfigError, DeploymentConfig};
use dxp_core::{parse_units, Address, DECIMALS};
use dxp_exchange::{DexError, DexPlatform, ExchangeConfig, PlatformRoutes, SwapRoute};
use dxp_token::{Token, TokenError, TokenRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub mod context;

pub use context::{Receipt, TxContext};

/// Signers every devnet starts with; the first deploys everything.
pub const DEFAULT_ACCOUNTS: [&str; 4] = ["owner", "addr1", "addr2", "addr3"];

#[derive(Debug, Error)]
pub enum DevnetError {
    #[error("unknown account {0}")]
    UnknownAccount(String),
    #[error("unknown token {0}")]
    UnknownToken(String),
    #[error("devnet needs at least two accounts, got {0}")]
    NotEnoughAccounts(usize),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Dex(#[from] DexError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("devnet state i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("devnet state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl DevnetError {
    /// The exchange error behind this failure, if any.
    pub fn as_dex(&self) -> Option<&DexError> {
        match self {
            DevnetError::Dex(e) => Some(e),
            _ => None,
        }
    }
}

/// A named signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub label: String,
    pub address: Address,
}

impl Account {
    /// Devnet signer whose credential is its label.
    pub fn labelled(label: &str) -> Self {
        Account {
            label: label.to_string(),
            address: Address::derive(format!("devnet:{}", label).as_bytes()),
        }
    }
}

/// Token and exchange state captured for a later [`Devnet::revert`].
#[derive(Debug, Clone)]
pub struct Snapshot {
    block: u64,
    nonces: BTreeMap<Address, u64>,
    tokens: TokenRegistry,
    exchange: DexPlatform,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Devnet {
    accounts: Vec<Account>,
    block: u64,
    /// deployer -> contracts deployed so far
    nonces: BTreeMap<Address, u64>,
    tokens: TokenRegistry,
    exchange: DexPlatform,
}

impl Devnet {
    /// Deploy the fixture with the default accounts.
    pub fn deploy(config: &DeploymentConfig) -> Result<Self, DevnetError> {
        let accounts = DEFAULT_ACCOUNTS.iter().map(|l| Account::labelled(l)).collect();
        Self::deploy_with(accounts, config)
    }

    /// Deploy the fixture: every configured token with the full supply to the
    /// first account, the exchange, `fund_amount` of every token to the second
    /// account, then the seed pools from the first account.
    pub fn deploy_with(accounts: Vec<Account>, config: &DeploymentConfig) -> Result<Self, DevnetError> {
        config.validate()?;
        if accounts.len() < 2 {
            return Err(DevnetError::NotEnoughAccounts(accounts.len()));
        }
        let owner = accounts[0].address.clone();
        let funded = accounts[1].address.clone();
        let supply = config.initial_supply_units()?;
        let fund = config.fund_amount_units()?;

        let mut nonces = BTreeMap::new();
        let mut tokens = TokenRegistry::new();
        for spec in &config.tokens {
            let address = next_contract_address(&mut nonces, &owner);
            let token = Token::deploy(
                address,
                &spec.name,
                &spec.symbol,
                DECIMALS as u8,
                supply,
                owner.clone(),
            )?;
            log::info!("{} deployed at {}", spec.symbol, token.address);
            tokens.insert(token)?;
        }

        let routes = PlatformRoutes::new(
            resolve_route(&tokens, &config.routes.single_hop)?,
            resolve_route(&tokens, &config.routes.multi_hop)?,
        )?;
        let exchange_address = next_contract_address(&mut nonces, &owner);
        let exchange = DexPlatform::new(
            exchange_address,
            ExchangeConfig {
                fee_bps: u128::from(config.fee_bps),
            },
            routes,
        )?;

        let mut devnet = Devnet {
            block: nonces.values().sum(),
            accounts,
            nonces,
            tokens,
            exchange,
        };

        let token_addresses: Vec<Address> = devnet.tokens.list().into_iter().map(|t| t.address).collect();
        devnet.transact(&owner, |ctx| {
            for token in &token_addresses {
                ctx.transfer(token, &funded, fund)?;
            }
            Ok(())
        })?;

        for pool in &config.seed_pools {
            let a = devnet.token(&pool.token_a)?;
            let b = devnet.token(&pool.token_b)?;
            let amount_a = parse_units(&pool.amount_a, DECIMALS).map_err(ConfigError::from)?;
            let amount_b = parse_units(&pool.amount_b, DECIMALS).map_err(ConfigError::from)?;
            devnet.transact(&owner, |ctx| {
                ctx.approve_exchange(&a, amount_a)?;
                ctx.approve_exchange(&b, amount_b)?;
                ctx.add_liquidity(&a, &b, amount_a, amount_b, 0)
            })?;
            log::info!(
                "seeded {}/{} pool with {} / {}",
                pool.token_a,
                pool.token_b,
                pool.amount_a,
                pool.amount_b
            );
        }

        Ok(devnet)
    }

    // ─────────────────────────────────────────────────────────
    // QUERIES
    // ─────────────────────────────────────────────────────────

    pub fn block(&self) -> u64 {
        self.block
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Address of the account with `label`, or the parsed address if
    /// `label_or_address` already is one.
    pub fn account(&self, label_or_address: &str) -> Result<Address, DevnetError> {
        if let Some(acct) = self.accounts.iter().find(|a| a.label == label_or_address) {
            return Ok(acct.address.clone());
        }
        Address::parse(label_or_address).map_err(|_| DevnetError::UnknownAccount(label_or_address.to_string()))
    }

    /// Address of the token with this symbol (or address).
    pub fn token(&self, symbol_or_address: &str) -> Result<Address, DevnetError> {
        self.tokens
            .resolve(symbol_or_address)
            .map_err(|_| DevnetError::UnknownToken(symbol_or_address.to_string()))
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn exchange(&self) -> &DexPlatform {
        &self.exchange
    }

    pub fn balance_of(&self, token: &Address, holder: &Address) -> Result<u128, DevnetError> {
        Ok(self.tokens.balance_of(token, holder)?)
    }

    // ─────────────────────────────────────────────────────────
    // TRANSACTIONS
    // ─────────────────────────────────────────────────────────

    /// Run `f` as one transaction from `sender`. On error every token and
    /// exchange change made inside `f` is reverted and no block is produced.
    pub fn transact<T, F>(&mut self, sender: &Address, f: F) -> Result<Receipt<T>, DevnetError>
    where
        F: FnOnce(&mut TxContext<'_>) -> Result<T, DevnetError>,
    {
        let snapshot = self.snapshot();
        let block = self.block + 1;
        let result = {
            let mut ctx = TxContext {
                sender: sender.clone(),
                block,
                tokens: &mut self.tokens,
                exchange: &mut self.exchange,
            };
            f(&mut ctx)
        };

        match result {
            Ok(output) => {
                self.block = block;
                let events = self.exchange.ledger_mut().take_events();
                log::debug!(
                    "block {}: tx from {} committed with {} events",
                    block,
                    sender,
                    events.len()
                );
                Ok(Receipt {
                    block,
                    sender: sender.clone(),
                    output,
                    events,
                })
            }
            Err(e) => {
                log::warn!("tx from {} reverted: {}", sender, e);
                self.revert(snapshot);
                Err(e)
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            block: self.block,
            nonces: self.nonces.clone(),
            tokens: self.tokens.clone(),
            exchange: self.exchange.clone(),
        }
    }

    /// Restore state captured by [`snapshot`](Self::snapshot). Accounts are
    /// not part of a snapshot.
    pub fn revert(&mut self, snapshot: Snapshot) {
        self.block = snapshot.block;
        self.nonces = snapshot.nonces;
        self.tokens = snapshot.tokens;
        self.exchange = snapshot.exchange;
    }

    /// Mint `amount` of `token` straight to `to`, outside any transaction.
    /// Test fixture helper.
    pub fn mint(&mut self, token: &Address, to: &Address, amount: u128) -> Result<(), DevnetError> {
        let t = self
            .tokens
            .get_mut(token)
            .ok_or_else(|| DevnetError::UnknownToken(token.to_string()))?;
        t.mint(to, amount)?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // PERSISTENCE
    // ─────────────────────────────────────────────────────────

    pub fn save(&self, path: &Path) -> Result<(), DevnetError> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        log::debug!("devnet state saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, DevnetError> {
        let data = fs::read_to_string(path)?;
        let devnet: Devnet = serde_json::from_str(&data)?;
        // Serde skips constructors; re-check what `DexPlatform::new` enforces.
        devnet.exchange.ledger().config().validate()?;
        log::debug!(
            "devnet state loaded from {} at block {}",
            path.display(),
            devnet.block
        );
        Ok(devnet)
    }
}

fn next_contract_address(nonces: &mut BTreeMap<Address, u64>, deployer: &Address) -> Address {
    let nonce = nonces.entry(deployer.clone()).or_insert(0);
    let address = Address::contract(deployer, *nonce);
    *nonce = nonce.saturating_add(1);
    address
}

fn resolve_route(tokens: &TokenRegistry, symbols: &[String]) -> Result<SwapRoute, DevnetError> {
    let path = symbols
        .iter()
        .map(|s| {
            tokens
                .resolve(s)
                .map_err(|_| DevnetError::UnknownToken(s.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SwapRoute::new(path)?)
}

/// Sum of balances equals supply for every token. Used by tests after
/// arbitrary transaction sequences.
pub fn supply_conserved(tokens: &TokenRegistry) -> bool {
    tokens.list().iter().all(|info| {
        tokens
            .get(&info.address)
            .map(|t| t.balance_sum() == t.total_supply)
            .unwrap_or(false)
    })
}

// ─────────────────────────────────────────────────────────────
// TESTS
// ─────────────────────────────────────────────────────────────
