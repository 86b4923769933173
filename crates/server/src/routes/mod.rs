//! HTTP route handlers.

pub mod checkout;
pub mod lookup;
pub mod webhook;

use axum::{Router, routing::post};

use crate::state::AppState;

/// Build the application router (health probes are added in `main`).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/webhook", post(webhook::handle))
        .route("/api/checkout-session", post(checkout::create))
        .route("/api/price-lookup", post(lookup::lookup))
}
