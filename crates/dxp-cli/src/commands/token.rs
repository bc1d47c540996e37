// SPDX-License-Identifier: AGPL-3.0-only
use crate::commands::common::{parse_amount, print_json, Home};
use crate::{print_success, TokenCommands};
use colored::*;
use dxp_core::format_ether;
use serde::Serialize;
use std::collections::BTreeMap;

pub fn handle(action: TokenCommands, home: &Home) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TokenCommands::List => list_tokens(home),
        TokenCommands::Balance { token, holder } => balance(home, &token, &holder),
        TokenCommands::Approve {
            from,
            token,
            amount,
            spender,
        } => approve(home, &from, &token, &amount, spender.as_deref()),
        TokenCommands::Transfer {
            from,
            token,
            to,
            amount,
        } => transfer(home, &from, &token, &to, &amount),
    }
}

fn list_tokens(home: &Home) -> Result<(), Box<dyn std::error::Error>> {
    let devnet = home.load_devnet()?;
    let tokens = devnet.tokens().list();
    if home.json {
        return print_json(&tokens);
    }
    println!("{}", format!("Tokens ({})", tokens.len()).cyan().bold());
    println!("{}", "─".repeat(70));
    for t in &tokens {
        println!(
            "  {:<6} {:<16} supply {:>14} | holders {} | {}",
            t.symbol.green().bold(),
            t.name,
            format_ether(t.total_supply),
            t.holders,
            t.address.to_string().dimmed()
        );
    }
    Ok(())
}

fn balance(home: &Home, token: &str, holder: &str) -> Result<(), Box<dyn std::error::Error>> {
    let devnet = home.load_devnet()?;
    let token_addr = devnet.token(token)?;
    let holder_addr = devnet.account(holder)?;
    let amount = devnet.balance_of(&token_addr, &holder_addr)?;
    if home.json {
        return print_json(&serde_json::json!({
            "token": token_addr,
            "holder": holder_addr,
            "balance": amount.to_string(),
        }));
    }
    println!("  {} {} {}", holder.yellow(), format_ether(amount).white().bold(), token.green());
    Ok(())
}

fn approve(
    home: &Home,
    from: &str,
    token: &str,
    amount: &str,
    spender: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut devnet = home.load_devnet()?;
    let sender = devnet.account(from)?;
    let token_addr = devnet.token(token)?;
    let spender_addr = match spender {
        Some(s) => devnet.account(s)?,
        None => devnet.exchange().address().clone(),
    };
    let value = parse_amount(amount)?;
    let receipt = devnet.transact(&sender, |ctx| ctx.approve(&token_addr, &spender_addr, value))?;
    home.save_devnet(&devnet)?;
    print_success(&format!(
        "{} approved {} {} for {} (block {})",
        from,
        amount,
        token,
        spender_addr.short(),
        receipt.block
    ));
    Ok(())
}

fn transfer(
    home: &Home,
    from: &str,
    token: &str,
    to: &str,
    amount: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut devnet = home.load_devnet()?;
    let sender = devnet.account(from)?;
    let recipient = devnet.account(to)?;
    let token_addr = devnet.token(token)?;
    let value = parse_amount(amount)?;
    let receipt = devnet.transact(&sender, |ctx| ctx.transfer(&token_addr, &recipient, value))?;
    home.save_devnet(&devnet)?;
    print_success(&format!(
        "Sent {} {} from {} to {} (block {})",
        amount, token, from, to, receipt.block
    ));
    Ok(())
}

#[derive(Serialize)]
struct AccountRow {
    label: String,
    address: String,
    /// symbol -> balance in whole tokens
    balances: BTreeMap<String, String>,
}

pub fn list_accounts(home: &Home) -> Result<(), Box<dyn std::error::Error>> {
    let devnet = home.load_devnet()?;
    let tokens = devnet.tokens().list();
    let mut rows = Vec::new();
    for acct in devnet.accounts() {
        let mut balances = BTreeMap::new();
        for t in &tokens {
            let amount = devnet.balance_of(&t.address, &acct.address)?;
            balances.insert(t.symbol.clone(), format_ether(amount));
        }
        rows.push(AccountRow {
            label: acct.label.clone(),
            address: acct.address.to_string(),
            balances,
        });
    }
    if home.json {
        return print_json(&rows);
    }
    println!("{}", "Accounts".cyan().bold());
    println!("{}", "─".repeat(70));
    for row in &rows {
        println!("  {:<7} {}", row.label.yellow().bold(), row.address.dimmed());
        for (symbol, amount) in &row.balances {
            println!("          {:>24} {}", amount, symbol.green());
        }
    }
    Ok(())
}
