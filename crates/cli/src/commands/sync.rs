//! Catalog reconciliation command.
//!
//! # Usage
//!
//! ```bash
//! tw-cli sync --env test --dry-run
//! tw-cli sync --env all
//! ```

use tidewater_core::Environment;
use tidewater_server::config::ServerConfig;
use tidewater_sync::reconcile::{ReconcileEngine, SyncOptions};

use super::CommandError;

/// Run reconciliation for the requested environments.
///
/// Environments run concurrently; they hold separate credentials and write
/// to separate catalogs, so they share no mutable state.
///
/// # Errors
///
/// Returns the first structural failure from any environment's run.
pub async fn run(environments: &[Environment], dry_run: bool) -> Result<(), CommandError> {
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;

    let mut engines = Vec::new();
    for &environment in environments {
        let engine = ReconcileEngine::new(
            super::printful_client(&config)?,
            super::stripe_client(&config, environment)?,
            super::mapping_client(&config)?,
            SyncOptions {
                currency: config.currency.clone(),
                dry_run,
            },
        );
        engines.push(engine);
    }

    let results = futures::future::join_all(engines.iter().map(ReconcileEngine::run)).await;

    let mut first_error = None;
    for (engine, result) in engines.iter().zip(results) {
        match result {
            Ok(summary) => {
                tracing::info!(env = %engine.environment(), %summary, "sync complete");
            }
            Err(err) => {
                tracing::error!(env = %engine.environment(), error = %err, "sync failed");
                first_error.get_or_insert(err);
            }
        }
    }

    first_error.map_or(Ok(()), |err| Err(CommandError::Sync(err)))
}
