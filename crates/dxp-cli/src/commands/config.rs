// SPDX-License-Identifier: AGPL-3.0-only
use crate::commands::common::{print_json, refuse_overwrite, signer_accounts, Home};
use crate::{print_info, print_success, ConfigCommands};
use colored::*;
use dxp_core::config::HarnessConfig;
use dxp_devnet::Devnet;

pub fn handle(action: ConfigCommands, home: &Home) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigCommands::Show => show(home),
        ConfigCommands::Init { force } => write_default(home, force),
        ConfigCommands::Validate => {
            home.load_config()?;
            print_success(&format!("{} is valid", home.config_path().display()));
            Ok(())
        }
    }
}

fn show(home: &Home) -> Result<(), Box<dyn std::error::Error>> {
    let config = home.load_config()?;
    if home.json {
        return print_json(&config);
    }
    println!("{}", "Harness Configuration".cyan().bold());
    println!("{}", "─".repeat(50));
    println!("  Compiler:     {}", config.compiler_version);
    println!("  Network:      {}", config.default_network.yellow());
    println!("  Supply:       {} per token", config.deployment.initial_supply);
    println!("  Funding:      {} per token", config.deployment.fund_amount);
    println!("  Fee:          {} bps", config.deployment.fee_bps);
    let symbols: Vec<&str> = config
        .deployment
        .tokens
        .iter()
        .map(|t| t.symbol.as_str())
        .collect();
    println!("  Tokens:       {}", symbols.join(", ").green());
    println!("  Single hop:   {}", config.deployment.routes.single_hop.join(" → "));
    println!("  Multi hop:    {}", config.deployment.routes.multi_hop.join(" → "));
    for pool in &config.deployment.seed_pools {
        println!(
            "  Seed pool:    {}/{} {} / {}",
            pool.token_a, pool.token_b, pool.amount_a, pool.amount_b
        );
    }
    Ok(())
}

fn write_default(home: &Home, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = home.config_path();
    if refuse_overwrite(&path, force) {
        return Err(format!("{} exists (use --force to overwrite)", path.display()).into());
    }
    HarnessConfig::default().save_to_file(&path)?;
    print_success(&format!("Wrote {}", path.display()));
    Ok(())
}

/// `dxp init`: deploy the fixture and persist it.
pub fn init_devnet(home: &Home, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = home.state_path();
    if refuse_overwrite(&path, force) {
        return Err(format!("Devnet already exists at {} (use --force to redeploy)", path.display()).into());
    }
    let config = home.load_config()?;
    let accounts = signer_accounts(&config)?;
    print_info("Deploying tokens and exchange...");
    let devnet = Devnet::deploy_with(accounts, &config.deployment)?;
    home.save_devnet(&devnet)?;

    if home.json {
        return print_json(&devnet.tokens().list());
    }
    for token in devnet.tokens().list() {
        println!(
            "  {:<6} {}",
            token.symbol.green().bold(),
            token.address.to_string().dimmed()
        );
    }
    println!(
        "  {:<6} {}",
        "DEX".yellow().bold(),
        devnet.exchange().address().to_string().dimmed()
    );
    print_success(&format!(
        "Devnet deployed at block {} → {}",
        devnet.block(),
        path.display()
    ));
    Ok(())
}
