//! Application state shared across handlers.

use std::sync::Arc;

use tidewater_core::Environment;
use tidewater_sync::SyncError;
use tidewater_sync::mapping::MappingStore;
use tidewater_sync::printful::PrintfulClient;
use tidewater_sync::stripe::StripeClient;
use tidewater_sync::webhook::WebhookVerifier;

use crate::config::ServerConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// upstream clients and configuration. One Stripe client exists per
/// environment; handlers pick by [`Environment`], never by raw key.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    printful: PrintfulClient,
    stripe_test: StripeClient,
    stripe_live: StripeClient,
    mapping: MappingStore,
    verifier: WebhookVerifier,
}

impl AppState {
    /// Create application state from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any upstream client cannot be constructed.
    pub fn new(config: ServerConfig) -> Result<Self, SyncError> {
        let printful = PrintfulClient::with_base_url(
            config.printful.api_key.clone(),
            &config.printful.api_url,
        )?;
        let stripe_test = StripeClient::with_base_url(
            config.stripe.secret_key_test.clone(),
            Environment::Test,
            &config.stripe.api_url,
        )?;
        let stripe_live = StripeClient::with_base_url(
            config.stripe.secret_key_live.clone(),
            Environment::Live,
            &config.stripe.api_url,
        )?;
        let mapping = MappingStore::new(
            &config.mapping_store.url,
            config.mapping_store.service_key.clone(),
        )?;
        let verifier = WebhookVerifier::new(
            config.stripe.webhook_secret_live.clone(),
            config.stripe.webhook_secret_test.clone(),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                printful,
                stripe_test,
                stripe_live,
                mapping,
                verifier,
            }),
        })
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the Printful client.
    #[must_use]
    pub fn printful(&self) -> &PrintfulClient {
        &self.inner.printful
    }

    /// Get the Stripe client scoped to an environment.
    #[must_use]
    pub fn stripe(&self, environment: Environment) -> &StripeClient {
        match environment {
            Environment::Test => &self.inner.stripe_test,
            Environment::Live => &self.inner.stripe_live,
        }
    }

    /// Get a reference to the mapping store client.
    #[must_use]
    pub fn mapping(&self) -> &MappingStore {
        &self.inner.mapping
    }

    /// Get a reference to the webhook verifier.
    #[must_use]
    pub fn verifier(&self) -> &WebhookVerifier {
        &self.inner.verifier
    }
}
