//! Duplicate product collapse.
//!
//! Years of manual catalog edits and partial syncs can leave several Stripe
//! products with the same normalized name. This pass keeps one per group
//! (the identity resolver's keeper rule) and deletes the rest, deactivating
//! their prices first since Stripe refuses to delete a product that still
//! has active prices. Where deletion is impossible the loser is deactivated
//! instead.

use serde::Serialize;
use tidewater_core::TargetProduct;
use tracing::{Instrument, error, info, info_span, warn};

use crate::error::SyncError;
use crate::identity::{ProductIndex, select_keeper};
use crate::stripe::{ProductUpdate, StripeClient};

/// Outcome counts for one collapse pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupeSummary {
    /// Duplicate groups found (normalized name shared by >1 product).
    pub groups: u64,
    /// Losing products deleted outright.
    pub deleted: u64,
    /// Losing products that could not be deleted and were deactivated.
    pub deactivated: u64,
    /// Groups or products skipped due to errors or ambiguity.
    pub errored: u64,
}

impl std::fmt::Display for DedupeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "groups={} deleted={} deactivated={} errored={}",
            self.groups, self.deleted, self.deactivated, self.errored
        )
    }
}

enum LoserOutcome {
    Deleted,
    Deactivated,
}

/// Collapse every duplicate group in the active catalog.
///
/// Ambiguous groups (conflicting variant-id claims) are logged loudly and
/// skipped for manual intervention rather than resolved automatically.
///
/// # Errors
///
/// Returns the first structural [`SyncError`] encountered; per-group
/// failures are counted in the summary.
pub async fn collapse_duplicates(
    stripe: &StripeClient,
    dry_run: bool,
) -> Result<DedupeSummary, SyncError> {
    let span = info_span!("dedupe", env = %stripe.environment(), dry_run);
    collapse_inner(stripe, dry_run).instrument(span).await
}

async fn collapse_inner(
    stripe: &StripeClient,
    dry_run: bool,
) -> Result<DedupeSummary, SyncError> {
    use futures::TryStreamExt;

    let index = {
        let stream = stripe.list_products(true);
        futures::pin_mut!(stream);
        let mut index = ProductIndex::default();
        while let Some(product) = stream.try_next().await? {
            index.insert(product);
        }
        index
    };

    let mut summary = DedupeSummary::default();

    for (name, group) in index.duplicate_groups() {
        summary.groups += 1;

        let keeper = match select_keeper(group, None) {
            Ok(keeper) => keeper,
            Err(SyncError::Consistency(msg)) => {
                error!(group = name, %msg, "ambiguous duplicate group, manual intervention required");
                summary.errored += 1;
                continue;
            }
            Err(err) => return Err(err),
        };
        info!(group = name, keeper = %keeper.id, losers = group.len() - 1, "collapsing");

        for loser in group.iter().filter(|p| p.id != keeper.id) {
            match remove_product(stripe, loser, dry_run).await {
                Ok(LoserOutcome::Deleted) => summary.deleted += 1,
                Ok(LoserOutcome::Deactivated) => summary.deactivated += 1,
                Err(err) if err.is_structural() => return Err(err),
                Err(err) => {
                    warn!(product = %loser.id, error = %err, "failed to remove duplicate");
                    summary.errored += 1;
                }
            }
        }
    }

    info!(%summary, "dedupe finished");
    Ok(summary)
}

/// Remove one losing product: deactivate its active prices, then delete;
/// fall back to deactivating the product when deletion is refused.
async fn remove_product(
    stripe: &StripeClient,
    loser: &TargetProduct,
    dry_run: bool,
) -> Result<LoserOutcome, SyncError> {
    if dry_run {
        info!(product = %loser.id, name = %loser.name, "[dry-run] would deactivate prices and delete");
        return Ok(LoserOutcome::Deleted);
    }

    for price in stripe.list_prices(&loser.id, true).await? {
        stripe.deactivate_price(&price.id).await?;
    }

    match stripe.delete_product(&loser.id).await {
        Ok(()) => Ok(LoserOutcome::Deleted),
        Err(SyncError::Upstream { status, message }) if status != 401 && status != 403 => {
            info!(product = %loser.id, status, %message, "deletion refused, deactivating instead");
            stripe
                .update_product(
                    &loser.id,
                    &ProductUpdate {
                        active: Some(false),
                        ..Default::default()
                    },
                )
                .await?;
            Ok(LoserOutcome::Deactivated)
        }
        Err(err) => Err(err),
    }
}
