//! Checkout-session creation endpoint.
//!
//! The storefront posts the cart here; we create a Stripe checkout session
//! in the requested environment and hand back its URL. The environment
//! field only selects which Stripe account hosts the session - fulfillment
//! trust never flows through it (that is the webhook signature's job).

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tidewater_core::Environment;
use tidewater_sync::stripe::CheckoutSessionParams;
use tracing::{info, instrument};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// One cart line in the request.
#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    pub price: String,
    pub quantity: u32,
}

/// Request body for `POST /api/checkout-session`.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub line_items: Vec<LineItemRequest>,
    #[serde(default)]
    pub email: Option<String>,
    pub environment: Environment,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
    #[serde(default)]
    pub shipping_countries: Option<Vec<String>>,
}

/// POST /api/checkout-session - create a checkout session, return its URL.
#[instrument(skip(state, request), fields(env = %request.environment, lines = request.line_items.len()))]
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<serde_json::Value>> {
    if request.line_items.is_empty() {
        return Err(AppError::BadRequest("line_items must not be empty".to_string()));
    }
    if request.line_items.iter().any(|item| item.quantity == 0) {
        return Err(AppError::BadRequest("quantity must be positive".to_string()));
    }

    let config = state.config();
    let params = CheckoutSessionParams {
        line_items: request
            .line_items
            .iter()
            .map(|item| (item.price.clone(), item.quantity))
            .collect(),
        customer_email: request.email,
        success_url: request
            .success_url
            .unwrap_or_else(|| format!("{}/thanks", config.base_url)),
        cancel_url: request
            .cancel_url
            .unwrap_or_else(|| format!("{}/cart", config.base_url)),
        shipping_countries: request
            .shipping_countries
            .unwrap_or_else(|| config.shipping_countries.clone()),
    };

    let session = state
        .stripe(request.environment)
        .create_checkout_session(&params)
        .await?;

    info!(session_id = %session.id, "checkout session created");
    Ok(Json(json!({ "url": session.url })))
}
