//! CLI command implementations.

pub mod dedupe;
pub mod lookup;
pub mod sync;

use tidewater_core::Environment;
use tidewater_server::config::ServerConfig;
use tidewater_sync::SyncError;
use tidewater_sync::mapping::MappingStore;
use tidewater_sync::printful::PrintfulClient;
use tidewater_sync::stripe::StripeClient;

/// Errors shared by CLI commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] tidewater_server::config::ConfigError),

    /// A sync operation failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The command was invoked with unusable arguments.
    #[error("{0}")]
    Usage(String),
}

/// Build a Printful client from configuration.
pub(crate) fn printful_client(config: &ServerConfig) -> Result<PrintfulClient, SyncError> {
    PrintfulClient::with_base_url(config.printful.api_key.clone(), &config.printful.api_url)
}

/// Build the Stripe client for one environment from configuration.
pub(crate) fn stripe_client(
    config: &ServerConfig,
    environment: Environment,
) -> Result<StripeClient, SyncError> {
    let key = match environment {
        Environment::Test => config.stripe.secret_key_test.clone(),
        Environment::Live => config.stripe.secret_key_live.clone(),
    };
    StripeClient::with_base_url(key, environment, &config.stripe.api_url)
}

/// Build the mapping-store client from configuration.
pub(crate) fn mapping_client(config: &ServerConfig) -> Result<MappingStore, SyncError> {
    MappingStore::new(
        &config.mapping_store.url,
        config.mapping_store.service_key.clone(),
    )
}
