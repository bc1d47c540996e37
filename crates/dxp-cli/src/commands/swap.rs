// SPDX-License-Identifier: AGPL-3.0-only
use crate::commands::common::{parse_amount, print_events, print_json, print_quote, Home};
use crate::{print_info, print_success, QuoteCommands, SwapCommands};
use colored::*;

#[derive(Clone, Copy)]
enum Route {
    Single,
    Multi,
}

pub fn handle(action: SwapCommands, home: &Home) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SwapCommands::Single {
            from,
            amount,
            min_out,
        } => swap(home, Route::Single, &from, &amount, &min_out),
        SwapCommands::Multi {
            from,
            amount,
            min_out,
        } => swap(home, Route::Multi, &from, &amount, &min_out),
    }
}

pub fn quote(action: QuoteCommands, home: &Home) -> Result<(), Box<dyn std::error::Error>> {
    let devnet = home.load_devnet()?;
    let (route, amount) = match action {
        QuoteCommands::Single { amount } => (Route::Single, amount),
        QuoteCommands::Multi { amount } => (Route::Multi, amount),
    };
    let amount_in = parse_amount(&amount)?;
    let quote = match route {
        Route::Single => devnet.exchange().quote_single_hop(amount_in)?,
        Route::Multi => devnet.exchange().quote_multi_hop(amount_in)?,
    };
    if home.json {
        return print_json(&quote);
    }
    println!("{}", "Swap Quote".cyan().bold());
    println!("{}", "─".repeat(50));
    print_quote(&devnet, &quote);
    Ok(())
}

fn swap(
    home: &Home,
    route: Route,
    from: &str,
    amount: &str,
    min_out: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut devnet = home.load_devnet()?;
    let trader = devnet.account(from)?;
    let amount_in = parse_amount(amount)?;
    let amount_out_min = parse_amount(min_out)?;
    let asset_in = match route {
        Route::Single => devnet.exchange().routes().single_hop.asset_in().clone(),
        Route::Multi => devnet.exchange().routes().multi_hop.asset_in().clone(),
    };

    if !home.json {
        print_info(&format!("Swapping {} as {}...", amount, from));
    }
    // An allowance that already covers the swap is spent as it stands; a
    // temporary top-up is put back to what the trader had.
    let receipt = devnet.transact(&trader, |ctx| {
        let previous = ctx.cover_exchange_allowance(&asset_in, amount_in)?;
        let quote = match route {
            Route::Single => ctx.swap_single_hop(amount_in, amount_out_min)?,
            Route::Multi => ctx.swap_multi_hop(amount_in, amount_out_min)?,
        };
        ctx.restore_exchange_allowance(&asset_in, previous)?;
        Ok(quote)
    })?;
    home.save_devnet(&devnet)?;

    if home.json {
        return print_json(&receipt);
    }
    print_quote(&devnet, &receipt.output);
    print_events(&devnet, receipt.block, &receipt.events);
    print_success("Swap executed");
    Ok(())
}
