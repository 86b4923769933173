//! Tidewater CLI - catalog sync and cleanup tools.
//!
//! # Usage
//!
//! ```bash
//! # Reconcile the test catalog without writing anything
//! tw-cli sync --env test --dry-run
//!
//! # Reconcile both environments for real
//! tw-cli sync --env all
//!
//! # Collapse duplicate Stripe products in the live catalog
//! tw-cli dedupe --env live
//!
//! # Resolve a variant (or product name) to its Stripe price
//! tw-cli lookup --variant 501 --env test
//! tw-cli lookup --name "Tee - Black / M" --env live
//! ```
//!
//! # Commands
//!
//! - `sync` - run the full catalog reconciliation
//! - `dedupe` - collapse duplicate Stripe products
//! - `lookup` - resolve a variant or name to its active price

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand, ValueEnum};
use tidewater_core::Environment;

mod commands;

#[derive(Parser)]
#[command(name = "tw-cli")]
#[command(author, version, about = "Tidewater CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run catalog reconciliation
    Sync {
        /// Which environment(s) to reconcile
        #[arg(short, long, value_enum, default_value_t = EnvArg::Test)]
        env: EnvArg,

        /// Execute all reads and decisions, but log instead of mutating
        #[arg(long)]
        dry_run: bool,
    },
    /// Collapse duplicate Stripe products
    Dedupe {
        /// Which environment's catalog to clean
        #[arg(short, long, value_enum, default_value_t = EnvArg::Test)]
        env: EnvArg,

        /// Log what would be removed without mutating
        #[arg(long)]
        dry_run: bool,
    },
    /// Resolve a variant or product name to its Stripe price
    Lookup {
        /// Printful sync variant id
        #[arg(short, long)]
        variant: Option<i64>,

        /// Product display name (e.g. "Tee - Black / M")
        #[arg(short, long)]
        name: Option<String>,

        /// Which environment's catalog to consult
        #[arg(short, long, value_enum, default_value_t = EnvArg::Test)]
        env: EnvArg,
    },
}

/// Environment selector accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EnvArg {
    Test,
    Live,
    All,
}

impl EnvArg {
    fn environments(self) -> Vec<Environment> {
        match self {
            Self::Test => vec![Environment::Test],
            Self::Live => vec![Environment::Live],
            Self::All => vec![Environment::Test, Environment::Live],
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Sync { env, dry_run } => {
            commands::sync::run(&env.environments(), dry_run).await?;
        }
        Commands::Dedupe { env, dry_run } => {
            commands::dedupe::run(&env.environments(), dry_run).await?;
        }
        Commands::Lookup { variant, name, env } => {
            let environment = env
                .environments()
                .first()
                .copied()
                .unwrap_or(Environment::Test);
            commands::lookup::run(variant, name.as_deref(), environment).await?;
        }
    }
    Ok(())
}
