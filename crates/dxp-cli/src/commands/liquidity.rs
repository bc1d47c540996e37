// SPDX-License-Identifier: AGPL-3.0-only
use crate::commands::common::{parse_amount, print_events, print_json, symbol_of, Home};
use crate::{print_success, LiquidityCommands, PoolCommands};
use colored::*;
use dxp_core::format_ether;
use dxp_exchange::math::PRICE_PRECISION;
use dxp_exchange::registry;

pub fn handle(action: LiquidityCommands, home: &Home) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        LiquidityCommands::Add {
            from,
            token_a,
            token_b,
            amount_a,
            amount_b,
            min_shares,
        } => add(home, &from, &token_a, &token_b, &amount_a, &amount_b, min_shares),
        LiquidityCommands::Remove {
            from,
            owner,
            token_a,
            token_b,
            shares,
            min_a,
            min_b,
        } => remove(home, &from, owner.as_deref(), &token_a, &token_b, shares, &min_a, &min_b),
        LiquidityCommands::Approve {
            from,
            agent,
            token_a,
            token_b,
            shares,
        } => approve(home, &from, &agent, &token_a, &token_b, shares),
    }
}

#[allow(clippy::too_many_arguments)]
fn add(
    home: &Home,
    from: &str,
    token_a: &str,
    token_b: &str,
    amount_a: &str,
    amount_b: &str,
    min_shares: u128,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut devnet = home.load_devnet()?;
    let provider = devnet.account(from)?;
    let a = devnet.token(token_a)?;
    let b = devnet.token(token_b)?;
    let value_a = parse_amount(amount_a)?;
    let value_b = parse_amount(amount_b)?;

    // Existing approvals that already cover the deposit are spent as they
    // stand; temporary top-ups are put back to what the provider had.
    let receipt = devnet.transact(&provider, |ctx| {
        let prev_a = ctx.cover_exchange_allowance(&a, value_a)?;
        let prev_b = ctx.cover_exchange_allowance(&b, value_b)?;
        let added = ctx.add_liquidity(&a, &b, value_a, value_b, min_shares)?;
        ctx.restore_exchange_allowance(&a, prev_a)?;
        ctx.restore_exchange_allowance(&b, prev_b)?;
        Ok(added)
    })?;
    home.save_devnet(&devnet)?;

    if home.json {
        return print_json(&receipt);
    }
    let r = &receipt.output;
    println!(
        "  Deposited:    {} {} + {} {}",
        format_ether(r.amount_a),
        token_a.green(),
        format_ether(r.amount_b),
        token_b.green()
    );
    println!("  Shares:       {}", r.shares.to_string().white().bold());
    println!("  Position:     {}", r.position);
    print_events(&devnet, receipt.block, &receipt.events);
    print_success("Liquidity added");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn remove(
    home: &Home,
    from: &str,
    owner: Option<&str>,
    token_a: &str,
    token_b: &str,
    shares: Option<u128>,
    min_a: &str,
    min_b: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut devnet = home.load_devnet()?;
    let sender = devnet.account(from)?;
    let owner = match owner {
        Some(o) => devnet.account(o)?,
        None => sender.clone(),
    };
    let a = devnet.token(token_a)?;
    let b = devnet.token(token_b)?;
    let min_a = parse_amount(min_a)?;
    let min_b = parse_amount(min_b)?;
    let shares = shares.unwrap_or_else(|| devnet.exchange().ledger().position(&owner, &a, &b));

    let receipt = devnet.transact(&sender, |ctx| {
        if owner == sender {
            ctx.remove_liquidity_shares(&a, &b, shares, min_a, min_b)
        } else {
            ctx.remove_liquidity_from(&owner, &a, &b, shares, min_a, min_b)
        }
    })?;
    home.save_devnet(&devnet)?;

    if home.json {
        return print_json(&receipt);
    }
    let r = &receipt.output;
    println!(
        "  Withdrew:     {} {} + {} {}",
        format_ether(r.amount_a),
        token_a.green(),
        format_ether(r.amount_b),
        token_b.green()
    );
    println!("  Burned:       {} shares", r.shares);
    println!("  Remaining:    {}", r.position);
    print_events(&devnet, receipt.block, &receipt.events);
    print_success("Liquidity removed");
    Ok(())
}

fn approve(
    home: &Home,
    from: &str,
    agent: &str,
    token_a: &str,
    token_b: &str,
    shares: u128,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut devnet = home.load_devnet()?;
    let owner = devnet.account(from)?;
    let agent_addr = devnet.account(agent)?;
    let a = devnet.token(token_a)?;
    let b = devnet.token(token_b)?;

    let receipt = devnet.transact(&owner, |ctx| ctx.approve_shares(&agent_addr, &a, &b, shares))?;
    home.save_devnet(&devnet)?;

    if home.json {
        return print_json(&receipt);
    }
    print_success(&format!(
        "{} may redeem {} {}/{} shares of {}",
        agent, shares, token_a, token_b, from
    ));
    Ok(())
}

pub fn pools(action: PoolCommands, home: &Home) -> Result<(), Box<dyn std::error::Error>> {
    let devnet = home.load_devnet()?;
    let ledger = devnet.exchange().ledger();
    match action {
        PoolCommands::List => {
            let pools = registry::list_pools(ledger);
            if home.json {
                return print_json(&pools);
            }
            println!("{}", format!("DEX Pools ({})", pools.len()).cyan().bold());
            println!("{}", "─".repeat(70));
            for p in &pools {
                println!(
                    "  {} / {} | Reserves: {} / {} | Shares: {} | Swaps: {}",
                    symbol_of(&devnet, &p.asset0).green(),
                    symbol_of(&devnet, &p.asset1).green(),
                    format_ether(p.reserve0).white(),
                    format_ether(p.reserve1).white(),
                    p.total_shares,
                    p.swap_count
                );
            }
            if pools.is_empty() {
                println!("  {}", "No pools found".dimmed());
            }
        }
        PoolCommands::Info { token_a, token_b } => {
            let a = devnet.token(&token_a)?;
            let b = devnet.token(&token_b)?;
            let p = registry::pool_info(ledger, &a, &b)
                .ok_or_else(|| format!("No pool for {}/{}", token_a, token_b))?;
            if home.json {
                return print_json(&p);
            }
            let (s0, s1) = (symbol_of(&devnet, &p.asset0), symbol_of(&devnet, &p.asset1));
            println!("{}", "Pool Info".cyan().bold());
            println!("{}", "─".repeat(50));
            println!("  Pair:         {}/{}", s0.green(), s1.green());
            println!("  Reserve {:<5} {}", s0, format_ether(p.reserve0));
            println!("  Reserve {:<5} {}", s1, format_ether(p.reserve1));
            println!("  Shares:       {}", p.total_shares);
            println!("  Providers:    {}", p.providers);
            println!("  Fee:          {} bps", p.fee_bps);
            println!(
                "  Price:        1 {} = {:.6} {}",
                s0,
                p.price0_scaled as f64 / PRICE_PRECISION as f64,
                s1
            );
        }
        PoolCommands::Position { owner } => {
            let who = devnet.account(&owner)?;
            let positions = registry::positions_of(ledger, &who);
            if home.json {
                return print_json(&positions);
            }
            println!("{}", format!("Positions of {}", owner).cyan().bold());
            println!("{}", "─".repeat(50));
            for pos in &positions {
                println!(
                    "  {}/{} | {} shares ({:.2}%) | {} + {}",
                    symbol_of(&devnet, pos.pair.asset0()).green(),
                    symbol_of(&devnet, pos.pair.asset1()).green(),
                    pos.shares,
                    pos.share_bps as f64 / 100.0,
                    format_ether(pos.amount0),
                    format_ether(pos.amount1)
                );
            }
            if positions.is_empty() {
                println!("  {}", "No positions".dimmed());
            }
        }
    }
    Ok(())
}
