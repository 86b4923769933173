//! Identity resolution: does a Stripe product already represent a Printful
//! variant?
//!
//! The priority chain (first match wins):
//!
//! 1. server-side metadata search on the canonical `sync_variant_id` key;
//! 2. exact match on the normalized composed name
//!    `"{product_name} - {variant_name}"`;
//! 3. when a normalized name matches several products (a duplicate group),
//!    keeper selection: prefer a product carrying any recognized variant-id
//!    metadata key, else the most recently created.
//!
//! Sync, duplicate cleanup, and webhook/price lookup all resolve through
//! this module; if they disagreed about identity, reconciliation and
//! fulfillment would fight each other.

use std::collections::HashMap;

use tidewater_core::{
    SourceVariant, TargetProduct, VariantId, has_variant_identity,
    metadata::KEY_SYNC_VARIANT_ID, normalize_name,
};
use tracing::instrument;

use crate::error::SyncError;
use crate::stripe::StripeClient;

/// Products grouped by normalized name, built from one full catalog
/// listing. Kept current across creates so later decisions in the same run
/// see earlier writes.
#[derive(Debug, Default)]
pub struct ProductIndex {
    by_name: HashMap<String, Vec<TargetProduct>>,
}

impl ProductIndex {
    /// Build the index from a product listing.
    #[must_use]
    pub fn build(products: impl IntoIterator<Item = TargetProduct>) -> Self {
        let mut index = Self::default();
        for product in products {
            index.insert(product);
        }
        index
    }

    /// Add a product (e.g. one just created) to the index.
    pub fn insert(&mut self, product: TargetProduct) {
        self.by_name
            .entry(normalize_name(&product.name))
            .or_default()
            .push(product);
    }

    /// All products whose normalized name equals `normalized`.
    #[must_use]
    pub fn group(&self, normalized: &str) -> &[TargetProduct] {
        self.by_name.get(normalized).map_or(&[], Vec::as_slice)
    }

    /// Iterate all duplicate groups (normalized name shared by >1 product).
    pub fn duplicate_groups(&self) -> impl Iterator<Item = (&str, &[TargetProduct])> {
        self.by_name
            .iter()
            .filter(|(_, group)| group.len() > 1)
            .map(|(name, group)| (name.as_str(), group.as_slice()))
    }
}

/// Select the keeper of a duplicate group.
///
/// Products carrying a recognized variant-id metadata key (canonical or
/// legacy) outrank those without one; among identified products, a match on
/// `prefer_variant` wins outright, identical claims tie-break on creation
/// time, and conflicting claims with no preference are a consistency
/// violation requiring manual intervention. Unidentified groups fall back
/// to most-recently-created.
///
/// # Errors
///
/// Returns [`SyncError::Consistency`] when several products claim
/// different variants and no preference disambiguates them, and
/// [`SyncError::Validation`] on an empty group.
pub fn select_keeper<'a>(
    group: &'a [TargetProduct],
    prefer_variant: Option<VariantId>,
) -> Result<&'a TargetProduct, SyncError> {
    if group.is_empty() {
        return Err(SyncError::Validation("empty duplicate group".to_string()));
    }

    let identified: Vec<&TargetProduct> = group
        .iter()
        .filter(|p| has_variant_identity(&p.metadata))
        .collect();

    match identified.as_slice() {
        [] => most_recent(group.iter()),
        [only] => Ok(*only),
        many => {
            if let Some(prefer) = prefer_variant
                && let Some(keeper) = many.iter().copied().find(|p| p.variant_id() == Some(prefer))
            {
                return Ok(keeper);
            }

            let mut claims: Vec<Option<VariantId>> =
                many.iter().map(|p| p.variant_id()).collect();
            claims.sort_unstable();
            claims.dedup();
            if claims.len() == 1 {
                return most_recent(many.iter().copied());
            }

            Err(SyncError::Consistency(format!(
                "duplicate group {:?} has {} products claiming different variants",
                group.first().map(|p| p.name.as_str()).unwrap_or_default(),
                many.len(),
            )))
        }
    }
}

fn most_recent<'a>(
    products: impl Iterator<Item = &'a TargetProduct>,
) -> Result<&'a TargetProduct, SyncError> {
    products
        .max_by_key(|p| p.created)
        .ok_or_else(|| SyncError::Validation("empty duplicate group".to_string()))
}

/// Resolve the Stripe product representing a source variant, if one exists.
///
/// Runs the full chain: metadata search against the live API first, then
/// the normalized-name index with keeper selection. `Ok(None)` means the
/// caller should create a product.
///
/// # Errors
///
/// Returns [`SyncError::Upstream`] on search failures and
/// [`SyncError::Consistency`] when a duplicate group is ambiguous.
#[instrument(skip(stripe, index, variant), fields(variant_id = %variant.id))]
pub async fn resolve(
    stripe: &StripeClient,
    index: &ProductIndex,
    variant: &SourceVariant,
) -> Result<Option<TargetProduct>, SyncError> {
    let by_metadata = stripe
        .search_products_by_metadata(KEY_SYNC_VARIANT_ID, &variant.id.to_string())
        .await?;
    if let Some(product) = by_metadata.into_iter().next() {
        return Ok(Some(product));
    }

    let normalized = normalize_name(&variant.composed_name());
    match index.group(&normalized) {
        [] => Ok(None),
        [only] => Ok(Some(only.clone())),
        group => select_keeper(group, Some(variant.id)).map(|p| Some(p.clone())),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn product(id: &str, name: &str, created: i64, variant_id: Option<&str>) -> TargetProduct {
        let mut metadata = BTreeMap::new();
        if let Some(v) = variant_id {
            metadata.insert("sync_variant_id".to_string(), v.to_string());
        }
        TargetProduct {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            images: vec![],
            metadata,
            active: true,
            created,
        }
    }

    #[test]
    fn test_keeper_prefers_identified_product_regardless_of_age() {
        // The identified product is older; it still wins.
        let group = vec![
            product("prod_new", "Tee - Black / M", 200, None),
            product("prod_old", "Tee - Black / M", 100, Some("501")),
        ];
        let keeper = select_keeper(&group, None).expect("keeper");
        assert_eq!(keeper.id, "prod_old");
    }

    #[test]
    fn test_keeper_falls_back_to_most_recent() {
        let group = vec![
            product("prod_a", "Tee - Black / M", 100, None),
            product("prod_b", "Tee - Black / M", 300, None),
            product("prod_c", "Tee - Black / M", 200, None),
        ];
        let keeper = select_keeper(&group, None).expect("keeper");
        assert_eq!(keeper.id, "prod_b");
    }

    #[test]
    fn test_keeper_legacy_key_counts_as_identity() {
        let mut legacy = product("prod_legacy", "Tee - Black / M", 100, None);
        legacy.metadata.insert(
            "printful_variant_id".to_string(),
            "501".to_string(),
        );
        let group = vec![product("prod_bare", "Tee - Black / M", 500, None), legacy];
        let keeper = select_keeper(&group, None).expect("keeper");
        assert_eq!(keeper.id, "prod_legacy");
    }

    #[test]
    fn test_keeper_preference_breaks_conflicting_claims() {
        let group = vec![
            product("prod_a", "Tee - Black / M", 100, Some("501")),
            product("prod_b", "Tee - Black / M", 200, Some("502")),
        ];
        let keeper = select_keeper(&group, Some(VariantId::new(501))).expect("keeper");
        assert_eq!(keeper.id, "prod_a");
    }

    #[test]
    fn test_keeper_conflicting_claims_without_preference_is_ambiguous() {
        let group = vec![
            product("prod_a", "Tee - Black / M", 100, Some("501")),
            product("prod_b", "Tee - Black / M", 200, Some("502")),
        ];
        assert!(matches!(
            select_keeper(&group, None),
            Err(SyncError::Consistency(_))
        ));
    }

    #[test]
    fn test_keeper_identical_claims_tie_break_on_created() {
        let group = vec![
            product("prod_a", "Tee - Black / M", 100, Some("501")),
            product("prod_b", "Tee - Black / M", 200, Some("501")),
        ];
        let keeper = select_keeper(&group, None).expect("keeper");
        assert_eq!(keeper.id, "prod_b");
    }

    #[test]
    fn test_index_groups_by_normalized_name() {
        let index = ProductIndex::build(vec![
            product("prod_a", "Tee - Black / M", 100, None),
            product("prod_b", "  TEE -  Black / M ", 200, None),
            product("prod_c", "Tee - Black / L", 300, None),
        ]);

        assert_eq!(index.group("tee - black / m").len(), 2);
        assert_eq!(index.group("tee - black / l").len(), 1);
        assert_eq!(index.duplicate_groups().count(), 1);
    }
}
