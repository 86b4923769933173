//! Stripe webhook endpoint.
//!
//! The handler walks the event through its states: signature verification
//! over the raw body bytes (the trust boundary - nothing is parsed before
//! it), event parsing, line-item resolution, and draft-order submission.
//! Early exits: 401 for any signature problem, 400 for malformed payloads,
//! 200 for event types we intentionally skip and for sessions where nothing
//! resolves (the sender must not retry "nothing to do"). Fulfillment
//! failures return 5xx so Stripe re-delivers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::json;
use tidewater_sync::SyncError;
use tidewater_sync::fulfillment::FulfillmentTranslator;
use tidewater_sync::webhook::{SIGNATURE_HEADER, WebhookEvent};
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::state::AppState;

/// POST /webhook - verify and fulfill a checkout event.
#[instrument(skip(state, headers, body))]
pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    // Trust boundary: only the raw bytes and the signature header matter
    // here. A missing or unreadable header is a rejection, not a 400.
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| SyncError::Signature("missing signature header".to_string()))?;

    let environment = state.verifier().verify_now(&body, signature)?;

    let event = WebhookEvent::parse(&body)?;
    if !event.is_checkout_completed() {
        info!(event_type = %event.event_type, "ignoring event type");
        return Ok(Json(json!({ "received": true, "handled": false })));
    }

    let session = &event.data.object;
    info!(session_id = %session.id, env = %environment, "checkout completed");

    // Line items come from the Stripe API for the verified session, using
    // the environment's own key - never from the unauthenticated payload.
    let items = state
        .stripe(environment)
        .list_checkout_line_items(&session.id)
        .await?;

    let translator = FulfillmentTranslator::new(state.printful(), state.mapping());
    let Some(order) = translator.translate(session, &items, environment).await? else {
        // Zero resolvable items: handled, nothing to fulfill.
        return Ok(Json(json!({ "received": true, "fulfilled": false })));
    };

    let order_id = translator.submit(&order).await.map_err(|err| {
        warn!(session_id = %session.id, error = %err, "fulfillment submission failed");
        err
    })?;

    info!(session_id = %session.id, order_id, "draft fulfillment order created");
    Ok(Json(json!({
        "received": true,
        "fulfilled": true,
        "order_id": order_id
    })))
}
