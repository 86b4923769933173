//! Price/variant lookup endpoint.
//!
//! Resolves a sync variant id or a product name to the Stripe price the
//! storefront should put in a cart. The resolution path is the same
//! identity chain the reconciler and the webhook use, so what this endpoint
//! answers is what fulfillment will later agree with.

use axum::extract::State;
use axum::Json;
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use tidewater_core::{Environment, TargetProduct, VariantId, normalize_name};
use tidewater_sync::identity::{ProductIndex, select_keeper};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Request body for `POST /api/price-lookup`.
#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    #[serde(default)]
    pub sync_variant_id: Option<VariantId>,
    #[serde(default)]
    pub product_name: Option<String>,
    /// Which environment's catalog to consult.
    pub mode: Environment,
}

/// POST /api/price-lookup - resolve a variant or name to its active price.
#[instrument(skip(state, request), fields(mode = %request.mode))]
pub async fn lookup(
    State(state): State<AppState>,
    Json(request): Json<LookupRequest>,
) -> Result<Json<serde_json::Value>> {
    let stripe = state.stripe(request.mode);

    let product = match (&request.sync_variant_id, &request.product_name) {
        (Some(variant_id), _) => stripe
            .search_products_by_metadata("sync_variant_id", &variant_id.to_string())
            .await?
            .into_iter()
            .next(),
        (None, Some(name)) => find_by_name(&state, request.mode, name).await?,
        (None, None) => {
            return Err(AppError::BadRequest(
                "provide sync_variant_id or product_name".to_string(),
            ));
        }
    };

    let Some(product) = product else {
        return Err(AppError::NotFound("no matching product".to_string()));
    };

    let prices = stripe.list_prices(&product.id, true).await?;
    let price = request
        .sync_variant_id
        .and_then(|id| prices.iter().find(|p| p.variant_id() == Some(id)))
        .or_else(|| prices.first())
        .ok_or_else(|| AppError::NotFound("product has no active price".to_string()))?;

    Ok(Json(json!({
        "stripe_price_id": price.id,
        "currency": price.currency,
        "amount": price.unit_amount,
        "metadata": price.metadata,
        "product": {
            "id": product.id,
            "name": product.name,
            "images": product.images,
            "metadata": product.metadata,
        }
    })))
}

/// Name-based resolution: normalized-name match over the active catalog,
/// keeper selection when the name is duplicated.
async fn find_by_name(
    state: &AppState,
    environment: Environment,
    name: &str,
) -> Result<Option<TargetProduct>> {
    let stripe = state.stripe(environment);
    let products: Vec<TargetProduct> = stripe.list_products(true).try_collect().await?;

    let index = ProductIndex::build(products);
    let wanted = normalize_name(name);
    let product = match index.group(&wanted) {
        [] => None,
        [only] => Some(only.clone()),
        group => Some(select_keeper(group, None)?.clone()),
    };
    Ok(product)
}
