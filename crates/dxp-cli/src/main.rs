// SPDX-License-Identifier: AGPL-3.0-only
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DEX PLATFORM CLI - Drive the exchange on a persistent devnet
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "dxp")]
#[command(about = "DEX platform CLI - tokens, swaps and liquidity on a local devnet", long_about = None)]
#[command(version)]
struct Cli {
    /// Home directory holding harness.toml and devnet.json (default: ~/.dxp)
    #[arg(long, env = "DXP_HOME")]
    home: Option<PathBuf>,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy tokens and the exchange to a fresh devnet
    Init {
        /// Overwrite an existing devnet
        #[arg(long)]
        force: bool,
    },

    /// Harness configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// List devnet accounts and their balances
    Accounts,

    /// Token operations
    Token {
        #[command(subcommand)]
        action: TokenCommands,
    },

    /// Swap along the platform's routes
    Swap {
        #[command(subcommand)]
        action: SwapCommands,
    },

    /// Price a swap without executing it
    Quote {
        #[command(subcommand)]
        action: QuoteCommands,
    },

    /// Provide or withdraw liquidity
    Liquidity {
        #[command(subcommand)]
        action: LiquidityCommands,
    },

    /// Query pools and positions
    Pool {
        #[command(subcommand)]
        action: PoolCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write the default configuration to harness.toml
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Check the configuration for errors
    Validate,
}

#[derive(Subcommand)]
enum TokenCommands {
    /// List deployed tokens
    List,
    /// Show a holder's balance
    Balance {
        /// Token symbol or address
        token: String,
        /// Account label or address
        holder: String,
    },
    /// Set an allowance (spender defaults to the exchange)
    Approve {
        /// Signing account label
        #[arg(short, long, default_value = "owner")]
        from: String,
        /// Token symbol or address
        #[arg(short, long)]
        token: String,
        /// Amount in whole tokens (e.g. 10.5)
        #[arg(short, long)]
        amount: String,
        /// Spender label or address
        #[arg(long)]
        spender: Option<String>,
    },
    /// Transfer tokens to another account
    Transfer {
        #[arg(short, long, default_value = "owner")]
        from: String,
        #[arg(short, long)]
        token: String,
        /// Recipient label or address
        #[arg(long)]
        to: String,
        #[arg(short, long)]
        amount: String,
    },
}

#[derive(Subcommand)]
enum SwapCommands {
    /// Exact-input swap along the single-hop route
    Single {
        #[arg(short, long, default_value = "owner")]
        from: String,
        /// Input amount in whole tokens
        #[arg(short, long)]
        amount: String,
        /// Minimum acceptable output in whole tokens
        #[arg(long, default_value = "0")]
        min_out: String,
    },
    /// Exact-input swap along the two-hop route
    Multi {
        #[arg(short, long, default_value = "owner")]
        from: String,
        #[arg(short, long)]
        amount: String,
        #[arg(long, default_value = "0")]
        min_out: String,
    },
}

#[derive(Subcommand)]
enum QuoteCommands {
    Single {
        #[arg(short, long)]
        amount: String,
    },
    Multi {
        #[arg(short, long)]
        amount: String,
    },
}

#[derive(Subcommand)]
enum LiquidityCommands {
    /// Deposit both assets of a pair
    Add {
        #[arg(short, long, default_value = "owner")]
        from: String,
        #[arg(long)]
        token_a: String,
        #[arg(long)]
        token_b: String,
        #[arg(long)]
        amount_a: String,
        #[arg(long)]
        amount_b: String,
        /// Minimum shares to mint (atomic units)
        #[arg(long, default_value = "0")]
        min_shares: u128,
    },
    /// Withdraw a position (all of it unless --shares is given)
    Remove {
        #[arg(short, long, default_value = "owner")]
        from: String,
        /// Redeem this account's position under its share approval
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        token_a: String,
        #[arg(long)]
        token_b: String,
        /// Shares to burn (atomic units)
        #[arg(long)]
        shares: Option<u128>,
        #[arg(long, default_value = "0")]
        min_a: String,
        #[arg(long, default_value = "0")]
        min_b: String,
    },
    /// Let another account redeem part of your position
    Approve {
        #[arg(short, long, default_value = "owner")]
        from: String,
        #[arg(long)]
        agent: String,
        #[arg(long)]
        token_a: String,
        #[arg(long)]
        token_b: String,
        /// Shares the agent may redeem (atomic units, 0 revokes)
        #[arg(long)]
        shares: u128,
    },
}

#[derive(Subcommand)]
enum PoolCommands {
    /// List all pools
    List,
    /// Show one pool
    Info { token_a: String, token_b: String },
    /// Show an account's positions
    Position {
        /// Account label or address
        owner: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.json {
        print_banner();
    }

    let home = cli.home.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dxp")
    });
    std::fs::create_dir_all(&home)?;
    let ctx = commands::common::Home::new(home, cli.json);

    match cli.command {
        Commands::Init { force } => commands::config::init_devnet(&ctx, force),
        Commands::Config { action } => commands::config::handle(action, &ctx),
        Commands::Accounts => commands::token::list_accounts(&ctx),
        Commands::Token { action } => commands::token::handle(action, &ctx),
        Commands::Swap { action } => commands::swap::handle(action, &ctx),
        Commands::Quote { action } => commands::swap::quote(action, &ctx),
        Commands::Liquidity { action } => commands::liquidity::handle(action, &ctx),
        Commands::Pool { action } => commands::liquidity::pools(action, &ctx),
    }
}

fn print_banner() {
    println!(
        "{}",
        "╔═══════════════════════════════════════════════╗".cyan()
    );
    println!(
        "{}",
        "║         DEX PLATFORM - DEVNET CLI             ║"
            .cyan()
            .bold()
    );
    println!(
        "{}",
        "║    Constant Product | Single & Multi Hop      ║".cyan()
    );
    println!(
        "{}",
        "╚═══════════════════════════════════════════════╝".cyan()
    );
    println!();
}

fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}

// ─────────────────────────────────────────────────────────────────
// UNIT TESTS
// ─────────────────────────────────────────────────────────────────
