// SPDX-License-Identifier: AGPL-3.0-only
use colored::*;
use dxp_core::config::{HarnessConfig, DEVNET};
use dxp_core::{format_ether, parse_ether, Address};
use dxp_devnet::{Account, Devnet, DEFAULT_ACCOUNTS};
use dxp_exchange::{DexEvent, SwapQuote};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "harness.toml";
pub const STATE_FILE: &str = "devnet.json";

/// Where the CLI keeps its files, plus output mode.
pub struct Home {
    dir: PathBuf,
    pub json: bool,
}

impl Home {
    pub fn new(dir: PathBuf, json: bool) -> Self {
        Home { dir, json }
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// harness.toml if present, defaults otherwise; env overrides applied.
    pub fn load_config(&self) -> Result<HarnessConfig, Box<dyn std::error::Error>> {
        let path = self.config_path();
        let mut config = if path.exists() {
            HarnessConfig::load_from_file(&path)?
        } else {
            log::debug!("{} not found, using defaults", path.display());
            HarnessConfig::default()
        };
        let network = config.default_network.clone();
        config.apply_env(&network);
        config.validate()?;
        Ok(config)
    }

    pub fn load_devnet(&self) -> Result<Devnet, Box<dyn std::error::Error>> {
        let path = self.state_path();
        if !path.exists() {
            return Err(format!(
                "No devnet at {} (run `dxp init` first)",
                path.display()
            )
            .into());
        }
        Ok(Devnet::load(&path)?)
    }

    pub fn save_devnet(&self, devnet: &Devnet) -> Result<(), Box<dyn std::error::Error>> {
        devnet.save(&self.state_path())?;
        Ok(())
    }
}

/// Devnet signers: the configured devnet credentials, labelled in order
/// `owner`, `addr1`, ...; the built-in labels when none are configured.
pub fn signer_accounts(config: &HarnessConfig) -> Result<Vec<Account>, Box<dyn std::error::Error>> {
    if config.default_network != DEVNET {
        return Err(format!(
            "network {} is remote; this CLI only drives the in-process devnet",
            config.default_network
        )
        .into());
    }
    let signers = config.signer_addresses(DEVNET);
    if signers.len() < 2 {
        return Ok(DEFAULT_ACCOUNTS.iter().map(|l| Account::labelled(l)).collect());
    }
    Ok(signers
        .into_iter()
        .enumerate()
        .map(|(i, address)| Account {
            label: DEFAULT_ACCOUNTS
                .get(i)
                .map(|l| l.to_string())
                .unwrap_or_else(|| format!("addr{}", i)),
            address,
        })
        .collect())
}

pub fn parse_amount(s: &str) -> Result<u128, Box<dyn std::error::Error>> {
    parse_ether(s).map_err(|e| format!("Invalid amount '{}': {}", s, e).into())
}

/// Symbol for display, falling back to the short address.
pub fn symbol_of(devnet: &Devnet, token: &Address) -> String {
    devnet
        .tokens()
        .get(token)
        .map(|t| t.symbol.clone())
        .unwrap_or_else(|| token.short())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_quote(devnet: &Devnet, quote: &SwapQuote) {
    println!("  Route:        {}", route_symbols(devnet, quote.route.path()).yellow());
    println!("  Amount in:    {}", format_ether(quote.amount_in).white());
    println!("  Amount out:   {}", format_ether(quote.amount_out).green().bold());
    for (i, hop) in quote.hops.iter().enumerate() {
        println!(
            "  Hop {}:        {} {} -> {} {} (fee {}, impact {:.2}%)",
            i + 1,
            format_ether(hop.amount_in),
            symbol_of(devnet, &hop.asset_in),
            format_ether(hop.amount_out),
            symbol_of(devnet, &hop.asset_out),
            format_ether(hop.fee),
            hop.price_impact_bps as f64 / 100.0
        );
    }
}

pub fn print_events(devnet: &Devnet, block: u64, events: &[DexEvent]) {
    println!("  Block:        {}", block.to_string().white());
    for event in events {
        let detail = match event {
            DexEvent::Log { category, value } => format!("{} = {}", category, value),
            DexEvent::PairCreated { pair } => format!(
                "{}/{}",
                symbol_of(devnet, pair.asset0()),
                symbol_of(devnet, pair.asset1())
            ),
            DexEvent::Swap {
                path,
                amount_in,
                amount_out,
                ..
            } => format!(
                "{} via {} -> {}",
                format_ether(*amount_in),
                route_symbols(devnet, path),
                format_ether(*amount_out)
            ),
            DexEvent::LiquidityAdded { shares, .. } | DexEvent::LiquidityRemoved { shares, .. } => {
                format!("{} shares", shares)
            }
        };
        println!("  {} {}", event.name().cyan(), detail.dimmed());
    }
}

pub fn route_symbols(devnet: &Devnet, path: &[Address]) -> String {
    path.iter()
        .map(|a| symbol_of(devnet, a))
        .collect::<Vec<_>>()
        .join(" → ")
}

/// True if a file exists at `path` and `force` was not given.
pub fn refuse_overwrite(path: &Path, force: bool) -> bool {
    path.exists() && !force
}

/// A temp home with a devnet deployed from `config`.
#[cfg(test)]
pub(crate) fn deployed_home(dir: &Path, config: &HarnessConfig) -> Home {
    let home = Home::new(dir.to_path_buf(), true);
    config.save_to_file(&home.config_path()).unwrap();
    crate::commands::config::init_devnet(&home, false).unwrap();
    home
}

#[cfg(test)]
pub(crate) fn set_exchange_allowance(home: &Home, who: &str, symbol: &str, amount: u128) {
    let mut devnet = home.load_devnet().unwrap();
    let account = devnet.account(who).unwrap();
    let token = devnet.token(symbol).unwrap();
    devnet
        .transact(&account, |ctx| ctx.approve_exchange(&token, amount))
        .unwrap();
    home.save_devnet(&devnet).unwrap();
}

#[cfg(test)]
pub(crate) fn exchange_allowance(home: &Home, who: &str, symbol: &str) -> u128 {
    let devnet = home.load_devnet().unwrap();
    let account = devnet.account(who).unwrap();
    let token = devnet.token(symbol).unwrap();
    devnet
        .tokens()
        .allowance(&token, &account, devnet.exchange().address())
        .unwrap()
}
