//! Integration tests for Tidewater.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tidewater-integration-tests
//! ```
//!
//! Tests are fully self-contained: each spins up the server router on an
//! ephemeral port with all three upstreams (Printful, Stripe, the mapping
//! store) replaced by wiremock servers.

#![cfg_attr(not(test), forbid(unsafe_code))]

use axum::Router;
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use sha2::Sha256;
use tidewater_server::config::ServerConfig;
use tidewater_server::routes;
use tidewater_server::state::AppState;
use wiremock::MockServer;

/// Webhook signing secret wired for the test environment.
pub const WEBHOOK_SECRET_TEST: &str = "whsec_test_a8Rf3nZ6wY1c";
/// Webhook signing secret wired for the live environment.
pub const WEBHOOK_SECRET_LIVE: &str = "whsec_live_k2J9dM4xQ7pL";

/// A running server instance plus its mocked upstreams.
pub struct TestContext {
    pub printful: MockServer,
    pub stripe: MockServer,
    pub mapping: MockServer,
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestContext {
    /// Start the mocked upstreams and serve the app on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics when the server cannot be constructed or bound; tests cannot
    /// proceed without it.
    pub async fn start() -> Self {
        let printful = MockServer::start().await;
        let stripe = MockServer::start().await;
        let mapping = MockServer::start().await;

        let config = ServerConfig::for_upstreams(
            &printful.uri(),
            &stripe.uri(),
            &mapping.uri(),
            SecretString::from("pf-key"),
            SecretString::from("sk_test_key"),
            SecretString::from("sk_live_key"),
            SecretString::from(WEBHOOK_SECRET_TEST),
            SecretString::from(WEBHOOK_SECRET_LIVE),
        );
        let state = AppState::new(config).expect("app state");
        let app = Router::new().merge(routes::routes()).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self {
            printful,
            stripe,
            mapping,
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
        }
    }

    /// URL of a route on the running server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Produce a `Stripe-Signature` header value for a payload, using the
/// current wall clock.
///
/// # Panics
///
/// Panics if the system clock is before the unix epoch.
#[must_use]
pub fn sign_payload(body: &[u8], secret: &str) -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time after epoch")
        .as_secs();

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("valid key length");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(body);
    format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    )
}
