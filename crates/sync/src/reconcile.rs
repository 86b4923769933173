//! Full-catalog reconciliation.
//!
//! One engine run converges a single environment's Stripe catalog onto the
//! current Printful catalog. Every step is independently idempotent: a run
//! interrupted half-way leaves a valid (if incomplete) state, and a second
//! run over an unchanged source catalog performs zero writes.
//!
//! Processing is sequential per item; duplicate detection and the
//! one-active-price invariant both depend on the catalog state left by the
//! previous step, so concurrent workers must not be introduced here without
//! per-identity mutual exclusion around the check-then-act sequences.

use std::collections::BTreeMap;

use futures::TryStreamExt;
use serde::Serialize;
use tidewater_core::{
    Environment, MappingRecord, SourceVariant, TargetProduct, canonical_price_metadata,
    canonical_product_metadata, metadata::LEGACY_KEYS, retail_price_to_minor_units,
};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::error::SyncError;
use crate::identity::{self, ProductIndex};
use crate::mapping::MappingStore;
use crate::printful::PrintfulClient;
use crate::printful::types::SyncProductDetail;
use crate::stripe::{NewProduct, ProductUpdate, StripeClient};

/// Stripe allows at most 8 images per product.
const MAX_GALLERY_IMAGES: usize = 8;

/// Engine options. The environment is not here on purpose: it is always
/// taken from the Stripe client's own scope, so a run can never cross-write.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// ISO currency code for created prices (e.g. `cad`).
    pub currency: String,
    /// Execute all reads and decisions, but log instead of mutating.
    pub dry_run: bool,
}

/// Per-run outcome counts. Dry runs produce the same shape so operators can
/// diff expected against actual effect before enabling writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errored: u64,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "created={} updated={} skipped={} errored={}",
            self.created, self.updated, self.skipped, self.errored
        )
    }
}

enum Outcome {
    Created,
    Updated,
    Skipped,
}

/// Drives one environment's catalog convergence.
pub struct ReconcileEngine {
    printful: PrintfulClient,
    stripe: StripeClient,
    mapping: MappingStore,
    options: SyncOptions,
}

impl ReconcileEngine {
    /// Create an engine. The run is scoped to `stripe`'s environment.
    #[must_use]
    pub const fn new(
        printful: PrintfulClient,
        stripe: StripeClient,
        mapping: MappingStore,
        options: SyncOptions,
    ) -> Self {
        Self {
            printful,
            stripe,
            mapping,
            options,
        }
    }

    /// The environment this engine writes to.
    #[must_use]
    pub const fn environment(&self) -> Environment {
        self.stripe.environment()
    }

    /// Run a full reconciliation pass.
    ///
    /// Per-item failures are counted and logged; only structural failures
    /// (auth, config) abort the run.
    ///
    /// # Errors
    ///
    /// Returns the first structural [`SyncError`] encountered.
    pub async fn run(&self) -> Result<RunSummary, SyncError> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "reconcile",
            env = %self.environment(),
            dry_run = self.options.dry_run,
            %run_id,
        );
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<RunSummary, SyncError> {
        let mut summary = RunSummary::default();
        let mut index = self.load_index().await?;

        let products = {
            let stream = self.printful.list_sync_products();
            futures::pin_mut!(stream);
            let mut items = Vec::new();
            while let Some(item) = stream.try_next().await? {
                items.push(item);
            }
            items
        };
        info!(products = products.len(), "source catalog enumerated");

        for summary_row in products {
            if summary_row.is_ignored {
                info!(product = %summary_row.name, "skipping ignored product");
                summary.skipped += 1;
                continue;
            }

            let detail = match self.printful.get_sync_product(summary_row.id).await {
                Ok(detail) => detail,
                Err(err) if err.is_structural() => return Err(err),
                Err(err) => {
                    warn!(product = %summary_row.name, error = %err, "product fetch failed");
                    summary.errored += 1;
                    continue;
                }
            };

            self.sync_product(&mut index, &detail, &mut summary)
                .await?;
        }

        info!(%summary, "reconcile finished");
        Ok(summary)
    }

    async fn sync_product(
        &self,
        index: &mut ProductIndex,
        detail: &SyncProductDetail,
        summary: &mut RunSummary,
    ) -> Result<(), SyncError> {
        let product_name = &detail.sync_product.name;
        let variants: Vec<SourceVariant> = detail
            .sync_variants
            .iter()
            .cloned()
            .map(|wire| wire.into_source_variant(product_name))
            .collect();

        for variant in &variants {
            if let Err(reason) = variant.sync_ready() {
                info!(variant = %variant.id, reason, "skipping variant");
                summary.skipped += 1;
                continue;
            }

            let gallery =
                build_gallery(detail.sync_product.thumbnail_url.as_deref(), variant, &variants);

            match self.sync_variant(index, variant, &gallery).await {
                Ok(Outcome::Created) => summary.created += 1,
                Ok(Outcome::Updated) => summary.updated += 1,
                Ok(Outcome::Skipped) => summary.skipped += 1,
                Err(err) if err.is_structural() => return Err(err),
                Err(err) => {
                    warn!(variant = %variant.id, error = %err, "variant sync failed");
                    summary.errored += 1;
                }
            }
        }
        Ok(())
    }

    async fn sync_variant(
        &self,
        index: &mut ProductIndex,
        variant: &SourceVariant,
        gallery: &[String],
    ) -> Result<Outcome, SyncError> {
        let desired_name = variant.composed_name();
        let desired_metadata = canonical_product_metadata(
            variant.id,
            variant.sku.as_deref(),
            &variant.variant_name,
            variant.color.as_deref(),
            variant.size.as_deref(),
        );
        let unit_amount = retail_price_to_minor_units(&variant.retail_price)
            .map_err(|err| SyncError::Validation(err.to_string()))?;

        let Some(existing) = identity::resolve(&self.stripe, index, variant).await? else {
            if self.options.dry_run {
                info!(
                    variant = %variant.id,
                    name = %desired_name,
                    unit_amount,
                    "[dry-run] would create product, price, and mapping"
                );
                return Ok(Outcome::Created);
            }

            let product = self
                .stripe
                .create_product(&NewProduct {
                    name: desired_name,
                    description: None,
                    images: gallery.to_vec(),
                    metadata: desired_metadata,
                })
                .await?;
            let price = self
                .stripe
                .create_price(
                    &product.id,
                    unit_amount,
                    &self.options.currency,
                    &canonical_price_metadata(variant.id, variant.sku.as_deref()),
                )
                .await?;
            self.upsert_mapping(variant, &price.id).await?;
            info!(variant = %variant.id, product = %product.id, price = %price.id, "created");
            index.insert(product);
            return Ok(Outcome::Created);
        };

        let mut changed = false;

        if product_needs_update(&existing, &desired_name, &desired_metadata) {
            let update = build_product_update(&existing, desired_name.clone(), &desired_metadata);
            if self.options.dry_run {
                info!(product = %existing.id, "[dry-run] would update product");
            } else {
                self.stripe.update_product(&existing.id, &update).await?;
            }
            changed = true;
        }

        let (price_id, price_changed) = self.ensure_price(&existing, variant, unit_amount).await?;
        changed = changed || price_changed;

        if let Some(price_id) = price_id {
            let mapping_current = self
                .mapping
                .get(variant.id, self.environment())
                .await?
                .is_some_and(|record| record.target_price_id == price_id);
            if !mapping_current {
                self.upsert_mapping(variant, &price_id).await?;
                changed = true;
            }
        }

        Ok(if changed {
            Outcome::Updated
        } else {
            Outcome::Skipped
        })
    }

    /// Enforce exactly one active price carrying the variant identity.
    ///
    /// Returns the surviving price id (None during a dry run that would
    /// create one) and whether anything changed.
    async fn ensure_price(
        &self,
        product: &TargetProduct,
        variant: &SourceVariant,
        unit_amount: i64,
    ) -> Result<(Option<String>, bool), SyncError> {
        let active = self.stripe.list_prices(&product.id, true).await?;

        let keeper = active
            .iter()
            .find(|p| p.variant_id() == Some(variant.id))
            .or_else(|| active.first());

        let Some(keeper) = keeper else {
            if self.options.dry_run {
                info!(product = %product.id, unit_amount, "[dry-run] would create price");
                return Ok((None, true));
            }
            let price = self
                .stripe
                .create_price(
                    &product.id,
                    unit_amount,
                    &self.options.currency,
                    &canonical_price_metadata(variant.id, variant.sku.as_deref()),
                )
                .await?;
            return Ok((Some(price.id), true));
        };

        let mut changed = false;

        for extra in active.iter().filter(|p| p.id != keeper.id) {
            if self.options.dry_run {
                info!(price = %extra.id, "[dry-run] would deactivate extra active price");
            } else {
                self.stripe.deactivate_price(&extra.id).await?;
            }
            changed = true;
        }

        // Stripe prices are immutable in amount; drift means a replacement.
        if keeper.unit_amount != Some(unit_amount)
            || !keeper.currency.eq_ignore_ascii_case(&self.options.currency)
        {
            if self.options.dry_run {
                info!(
                    price = %keeper.id,
                    unit_amount,
                    "[dry-run] would replace price at new amount"
                );
                return Ok((None, true));
            }
            let replacement = self
                .stripe
                .create_price(
                    &product.id,
                    unit_amount,
                    &self.options.currency,
                    &canonical_price_metadata(variant.id, variant.sku.as_deref()),
                )
                .await?;
            self.stripe.deactivate_price(&keeper.id).await?;
            return Ok((Some(replacement.id), true));
        }

        if price_metadata_needs_update(&keeper.metadata, variant) {
            let mut metadata = canonical_price_metadata(variant.id, variant.sku.as_deref());
            for key in LEGACY_KEYS {
                if keeper.metadata.contains_key(*key) {
                    metadata.insert((*key).to_string(), String::new());
                }
            }
            if self.options.dry_run {
                info!(price = %keeper.id, "[dry-run] would canonicalize price metadata");
            } else {
                self.stripe
                    .update_price_metadata(&keeper.id, &metadata)
                    .await?;
            }
            changed = true;
        }

        Ok((Some(keeper.id.clone()), changed))
    }

    async fn upsert_mapping(
        &self,
        variant: &SourceVariant,
        price_id: &str,
    ) -> Result<(), SyncError> {
        let record = MappingRecord {
            source_variant_id: variant.id,
            target_price_id: price_id.to_string(),
            image_url: variant.preview_image_url.clone(),
            color: variant.color.clone(),
            size: variant.size.clone(),
            variant_name: Some(variant.variant_name.clone()),
            environment: self.environment(),
        };
        if self.options.dry_run {
            info!(variant = %variant.id, price = %price_id, "[dry-run] would upsert mapping");
            return Ok(());
        }
        self.mapping.upsert(&record).await
    }

    async fn load_index(&self) -> Result<ProductIndex, SyncError> {
        let stream = self.stripe.list_products(true);
        futures::pin_mut!(stream);
        let mut index = ProductIndex::default();
        let mut count = 0usize;
        while let Some(product) = stream.try_next().await? {
            index.insert(product);
            count += 1;
        }
        info!(products = count, "target catalog indexed");
        Ok(index)
    }
}

/// Assemble the image gallery for one variant's product: parent thumbnail
/// first, then this variant's preview, then sibling previews; insertion
/// order, URL-deduplicated, capped at Stripe's image limit.
fn build_gallery(
    thumbnail: Option<&str>,
    variant: &SourceVariant,
    siblings: &[SourceVariant],
) -> Vec<String> {
    let mut gallery: Vec<String> = Vec::new();

    let mut push = |url: Option<&str>| {
        if let Some(url) = url
            && !url.is_empty()
            && gallery.len() < MAX_GALLERY_IMAGES
            && !gallery.iter().any(|existing| existing == url)
        {
            gallery.push(url.to_string());
        }
    };

    push(thumbnail);
    push(variant.preview_image_url.as_deref());
    for sibling in siblings {
        push(sibling.preview_image_url.as_deref());
    }

    gallery
}

/// Whether the current product differs from its computed canonical view.
fn product_needs_update(
    existing: &TargetProduct,
    desired_name: &str,
    desired_metadata: &BTreeMap<String, String>,
) -> bool {
    !existing.active
        || existing.name != desired_name
        || LEGACY_KEYS
            .iter()
            .any(|key| existing.metadata.contains_key(*key))
        || desired_metadata
            .iter()
            .any(|(key, value)| existing.metadata.get(key) != Some(value))
}

/// Build the update that converges a product on its canonical view,
/// including empty-value entries that delete lingering legacy keys.
fn build_product_update(
    existing: &TargetProduct,
    desired_name: String,
    desired_metadata: &BTreeMap<String, String>,
) -> ProductUpdate {
    let mut metadata = desired_metadata.clone();
    for key in LEGACY_KEYS {
        if existing.metadata.contains_key(*key) {
            metadata.insert((*key).to_string(), String::new());
        }
    }
    ProductUpdate {
        name: Some(desired_name),
        metadata: Some(metadata),
        active: Some(true),
        ..Default::default()
    }
}

/// Price metadata needs a write when the canonical pair is absent/stale or
/// any legacy key lingers.
fn price_metadata_needs_update(
    metadata: &BTreeMap<String, String>,
    variant: &SourceVariant,
) -> bool {
    let desired = canonical_price_metadata(variant.id, variant.sku.as_deref());
    LEGACY_KEYS.iter().any(|key| metadata.contains_key(*key))
        || desired
            .iter()
            .any(|(key, value)| metadata.get(key) != Some(value))
}

#[cfg(test)]
mod tests {
    use tidewater_core::{SyncProductId, VariantId};

    use super::*;

    fn variant(id: i64, preview: Option<&str>) -> SourceVariant {
        SourceVariant {
            id: VariantId::new(id),
            sync_product_id: SyncProductId::new(12),
            product_name: "Tee".to_string(),
            variant_name: "Black / M".to_string(),
            sku: None,
            size: Some("M".to_string()),
            color: Some("Black".to_string()),
            retail_price: "25.00".to_string(),
            preview_image_url: preview.map(ToString::to_string),
            available: true,
            is_deleted: false,
            is_ignored: false,
        }
    }

    fn product(name: &str, metadata: &[(&str, &str)], active: bool) -> TargetProduct {
        TargetProduct {
            id: "prod_1".to_string(),
            name: name.to_string(),
            description: None,
            images: vec![],
            metadata: metadata
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            active,
            created: 0,
        }
    }

    #[test]
    fn test_gallery_dedup_and_order() {
        let v1 = variant(501, Some("https://img/one.png"));
        let v2 = variant(502, Some("https://img/two.png"));
        let v3 = variant(503, Some("https://img/one.png"));
        let siblings = vec![v1.clone(), v2, v3];

        let gallery = build_gallery(Some("https://img/thumb.png"), &v1, &siblings);
        assert_eq!(
            gallery,
            vec![
                "https://img/thumb.png".to_string(),
                "https://img/one.png".to_string(),
                "https://img/two.png".to_string(),
            ]
        );
    }

    #[test]
    fn test_gallery_caps_images() {
        let own = variant(500, Some("https://img/own.png"));
        let siblings: Vec<SourceVariant> = (0..20)
            .map(|i| variant(501 + i, Some(&format!("https://img/{i}.png"))))
            .collect();
        let gallery = build_gallery(Some("https://img/thumb.png"), &own, &siblings);
        assert_eq!(gallery.len(), MAX_GALLERY_IMAGES);
    }

    #[test]
    fn test_no_update_when_canonical_view_matches() {
        let v = variant(501, Some("https://img/one.png"));
        let desired = canonical_product_metadata(
            v.id,
            v.sku.as_deref(),
            &v.variant_name,
            v.color.as_deref(),
            v.size.as_deref(),
        );
        let existing = product(
            "Tee - Black / M",
            &[
                ("sync_variant_id", "501"),
                ("sku", "501"),
                ("variant_name", "Black / M"),
                ("color", "Black"),
                ("size", "M"),
            ],
            true,
        );
        assert!(!product_needs_update(&existing, "Tee - Black / M", &desired));
    }

    #[test]
    fn test_update_when_legacy_keys_linger() {
        let v = variant(501, Some("https://img/one.png"));
        let desired = canonical_product_metadata(
            v.id,
            v.sku.as_deref(),
            &v.variant_name,
            v.color.as_deref(),
            v.size.as_deref(),
        );
        let existing = product(
            "Tee - Black / M",
            &[
                ("sync_variant_id", "501"),
                ("sku", "501"),
                ("variant_name", "Black / M"),
                ("color", "Black"),
                ("size", "M"),
                ("printful_variant_id", "501"),
            ],
            true,
        );
        assert!(product_needs_update(&existing, "Tee - Black / M", &desired));

        let update = build_product_update(&existing, "Tee - Black / M".to_string(), &desired);
        let metadata = update.metadata.expect("metadata set");
        // Legacy key is explicitly blanked so Stripe deletes it.
        assert_eq!(
            metadata.get("printful_variant_id").map(String::as_str),
            Some("")
        );
    }

    #[test]
    fn test_update_when_inactive() {
        let v = variant(501, Some("https://img/one.png"));
        let desired = canonical_product_metadata(
            v.id,
            v.sku.as_deref(),
            &v.variant_name,
            v.color.as_deref(),
            v.size.as_deref(),
        );
        let existing = product(
            "Tee - Black / M",
            &[
                ("sync_variant_id", "501"),
                ("sku", "501"),
                ("variant_name", "Black / M"),
                ("color", "Black"),
                ("size", "M"),
            ],
            false,
        );
        assert!(product_needs_update(&existing, "Tee - Black / M", &desired));
    }

    #[test]
    fn test_price_metadata_update_detection() {
        let v = variant(501, None);
        let canonical: BTreeMap<String, String> = [
            ("sync_variant_id".to_string(), "501".to_string()),
            ("sku".to_string(), "501".to_string()),
        ]
        .into_iter()
        .collect();
        assert!(!price_metadata_needs_update(&canonical, &v));

        let mut with_legacy = canonical.clone();
        with_legacy.insert("printful_variant_id".to_string(), "501".to_string());
        assert!(price_metadata_needs_update(&with_legacy, &v));

        let empty = BTreeMap::new();
        assert!(price_metadata_needs_update(&empty, &v));
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            created: 1,
            updated: 2,
            skipped: 3,
            errored: 0,
        };
        assert_eq!(
            summary.to_string(),
            "created=1 updated=2 skipped=3 errored=0"
        );
    }
}
