//! Price/variant lookup command.
//!
//! Answers the same question the storefront's lookup endpoint does, through
//! the same identity chain: which Stripe price does a Printful variant (or
//! product name) resolve to right now?
//!
//! # Usage
//!
//! ```bash
//! tw-cli lookup --variant 501 --env test
//! tw-cli lookup --name "Tee - Black / M" --env live
//! ```

use futures::TryStreamExt;
use tidewater_core::{Environment, TargetProduct, VariantId, normalize_name};
use tidewater_server::config::ServerConfig;
use tidewater_sync::identity::{ProductIndex, select_keeper};
use tidewater_sync::stripe::StripeClient;

use super::CommandError;

/// Resolve a variant id or product name and report its active price.
///
/// # Errors
///
/// Returns `CommandError::Usage` when neither selector is given, and
/// upstream/consistency failures from the catalog lookups.
pub async fn run(
    variant: Option<i64>,
    name: Option<&str>,
    environment: Environment,
) -> Result<(), CommandError> {
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;
    let stripe = super::stripe_client(&config, environment)?;

    let variant_id = variant.map(VariantId::new);
    let product = match (variant_id, name) {
        (Some(id), _) => stripe
            .search_products_by_metadata("sync_variant_id", &id.to_string())
            .await?
            .into_iter()
            .next(),
        (None, Some(name)) => find_by_name(&stripe, name).await?,
        (None, None) => {
            return Err(CommandError::Usage(
                "provide --variant or --name".to_string(),
            ));
        }
    };

    let Some(product) = product else {
        tracing::warn!(env = %environment, "no matching product");
        return Ok(());
    };

    let prices = stripe.list_prices(&product.id, true).await?;
    let price = variant_id
        .and_then(|id| prices.iter().find(|p| p.variant_id() == Some(id)))
        .or_else(|| prices.first());

    match price {
        Some(price) => tracing::info!(
            env = %environment,
            product = %product.id,
            name = %product.name,
            price = %price.id,
            amount = price.unit_amount,
            currency = %price.currency,
            "resolved"
        ),
        None => tracing::warn!(
            env = %environment,
            product = %product.id,
            "product has no active price"
        ),
    }

    Ok(())
}

async fn find_by_name(
    stripe: &StripeClient,
    name: &str,
) -> Result<Option<TargetProduct>, CommandError> {
    let products: Vec<TargetProduct> = stripe.list_products(true).try_collect().await?;
    let index = ProductIndex::build(products);
    let wanted = normalize_name(name);
    Ok(match index.group(&wanted) {
        [] => None,
        [only] => Some(only.clone()),
        group => Some(select_keeper(group, None)?.clone()),
    })
}
