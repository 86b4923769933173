//! Stripe metadata schema: canonical keys, legacy generations, normalization.
//!
//! Three generations of keys have been written to Stripe product and price
//! metadata over the life of the store:
//!
//! 1. `printful_variant_id` - originally the catalog variant option id,
//!    later reused for the sync variant id; ambiguous.
//! 2. `legacy_printful_variant_id` / `legacy_printful_sync_product_id` -
//!    migration holding area.
//! 3. `sync_variant_id` + `sku` - the current canonical pair.
//!
//! Every read path accepts all three generations through
//! [`resolve_variant_id`]; every write path emits only the canonical pair
//! (plus display fields) and strips deprecated keys via [`canonicalize`].

use std::collections::BTreeMap;

use crate::types::id::VariantId;

/// Canonical metadata key: the Printful sync variant id.
pub const KEY_SYNC_VARIANT_ID: &str = "sync_variant_id";
/// Canonical metadata key: SKU (the variant id string for Printful items).
pub const KEY_SKU: &str = "sku";

/// First-generation key. Ambiguous historically; treated as a sync variant
/// id when it parses as one.
pub const KEY_LEGACY_VARIANT_ID: &str = "printful_variant_id";
/// Second-generation holding key for the variant id.
pub const KEY_LEGACY_HOLDING_VARIANT_ID: &str = "legacy_printful_variant_id";
/// Second-generation holding key for the parent sync product id.
pub const KEY_LEGACY_HOLDING_SYNC_PRODUCT_ID: &str = "legacy_printful_sync_product_id";

/// The canonical key pair written by every mutation.
pub const CANONICAL_KEYS: &[&str] = &[KEY_SYNC_VARIANT_ID, KEY_SKU];

/// Deprecated keys, in the order they are consulted on reads.
pub const LEGACY_KEYS: &[&str] = &[
    KEY_LEGACY_VARIANT_ID,
    KEY_LEGACY_HOLDING_VARIANT_ID,
    KEY_LEGACY_HOLDING_SYNC_PRODUCT_ID,
];

/// Display keys cached alongside the identity pair.
pub const DISPLAY_KEYS: &[&str] = &["variant_name", "color", "size"];

/// Resolve the sync variant id from any metadata generation.
///
/// The canonical key wins; legacy keys are consulted in generation order.
/// Values that do not parse as integers are ignored rather than trusted.
#[must_use]
pub fn resolve_variant_id(metadata: &BTreeMap<String, String>) -> Option<VariantId> {
    [
        KEY_SYNC_VARIANT_ID,
        KEY_LEGACY_VARIANT_ID,
        KEY_LEGACY_HOLDING_VARIANT_ID,
    ]
    .iter()
    .find_map(|key| metadata.get(*key).and_then(|v| v.parse::<VariantId>().ok()))
}

/// Whether the metadata carries any recognized variant-id key, canonical or
/// legacy. Used for duplicate-group keeper selection: a product that knows
/// which variant it represents beats one that does not.
#[must_use]
pub fn has_variant_identity(metadata: &BTreeMap<String, String>) -> bool {
    metadata.contains_key(KEY_SYNC_VARIANT_ID)
        || LEGACY_KEYS.iter().any(|key| metadata.contains_key(*key))
}

/// Normalize metadata to the canonical schema.
///
/// Resolves the variant id through all generations, writes the canonical
/// pair (the SKU defaults to the variant id string when absent), removes
/// every deprecated key, and preserves everything else untouched.
///
/// Pure and idempotent: canonicalizing already-canonical metadata returns
/// it unchanged.
#[must_use]
pub fn canonicalize(metadata: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut out = metadata.clone();

    if let Some(variant_id) = resolve_variant_id(metadata) {
        out.insert(KEY_SYNC_VARIANT_ID.to_string(), variant_id.to_string());
        out.entry(KEY_SKU.to_string())
            .or_insert_with(|| variant_id.to_string());
    }

    for key in LEGACY_KEYS {
        out.remove(*key);
    }

    out
}

/// Build the canonical metadata written to a Stripe product at sync time.
#[must_use]
pub fn canonical_product_metadata(
    variant_id: VariantId,
    sku: Option<&str>,
    variant_name: &str,
    color: Option<&str>,
    size: Option<&str>,
) -> BTreeMap<String, String> {
    let mut metadata = canonical_price_metadata(variant_id, sku);
    metadata.insert("variant_name".to_string(), variant_name.to_string());
    if let Some(color) = color {
        metadata.insert("color".to_string(), color.to_string());
    }
    if let Some(size) = size {
        metadata.insert("size".to_string(), size.to_string());
    }
    metadata
}

/// Build the canonical metadata written to a Stripe price at sync time.
///
/// Prices carry only the identity pair; the webhook resolves fulfillment
/// from exactly these two keys.
#[must_use]
pub fn canonical_price_metadata(
    variant_id: VariantId,
    sku: Option<&str>,
) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert(KEY_SYNC_VARIANT_ID.to_string(), variant_id.to_string());
    metadata.insert(
        KEY_SKU.to_string(),
        sku.map_or_else(|| variant_id.to_string(), ToString::to_string),
    );
    metadata
}
