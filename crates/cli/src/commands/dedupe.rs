//! Duplicate-product cleanup command.
//!
//! # Usage
//!
//! ```bash
//! tw-cli dedupe --env live --dry-run
//! ```

use tidewater_core::Environment;
use tidewater_server::config::ServerConfig;
use tidewater_sync::dedupe::collapse_duplicates;

use super::CommandError;

/// Collapse duplicate Stripe products in each requested environment.
///
/// # Errors
///
/// Returns the first structural failure from any environment's pass.
pub async fn run(environments: &[Environment], dry_run: bool) -> Result<(), CommandError> {
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;

    for &environment in environments {
        let stripe = super::stripe_client(&config, environment)?;
        let summary = collapse_duplicates(&stripe, dry_run).await?;
        tracing::info!(env = %environment, %summary, "dedupe complete");
    }

    Ok(())
}
