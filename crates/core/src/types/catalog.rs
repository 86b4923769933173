//! Catalog data model shared by the sync engine, server, and CLI.
//!
//! `SourceVariant` is the read-only view of one sellable unit in Printful;
//! `TargetProduct`/`TargetPrice` mirror the Stripe objects the reconciler
//! manages; `MappingRecord` is the externally persisted correlation row;
//! `FulfillmentOrder` is the outbound draft order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::email::Email;
use crate::types::environment::Environment;
use crate::types::id::{SyncProductId, VariantId};
use crate::types::metadata::resolve_variant_id;
use crate::types::naming::composed_name;

/// One sellable unit in the Printful catalog. Read-only to this system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceVariant {
    pub id: VariantId,
    pub sync_product_id: SyncProductId,
    pub product_name: String,
    /// Free text, usually encoding size/color ("Black / M").
    pub variant_name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    /// Decimal string as reported upstream ("25.00").
    pub retail_price: String,
    #[serde(default)]
    pub preview_image_url: Option<String>,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_ignored: bool,
}

const fn default_true() -> bool {
    true
}

impl SourceVariant {
    /// The composed display name: `"{product_name} - {variant_name}"`.
    #[must_use]
    pub fn composed_name(&self) -> String {
        composed_name(&self.product_name, &self.variant_name)
    }

    /// Whether this variant can be synced; `Err` carries the skip reason.
    ///
    /// # Errors
    ///
    /// Returns the reason the variant is not sync-ready. Skips are logged,
    /// never treated as failures.
    pub const fn sync_ready(&self) -> Result<(), &'static str> {
        if self.is_deleted {
            return Err("variant is deleted upstream");
        }
        if self.is_ignored {
            return Err("variant is marked ignored");
        }
        if !self.available {
            return Err("variant is unavailable");
        }
        if self.preview_image_url.is_none() {
            return Err("variant has no preview image");
        }
        Ok(())
    }
}

/// One catalog entry in the Stripe product catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetProduct {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub active: bool,
    /// Unix creation timestamp; used for most-recently-created keeper ties.
    #[serde(default)]
    pub created: i64,
}

impl TargetProduct {
    /// The sync variant id this product claims, from any metadata generation.
    #[must_use]
    pub fn variant_id(&self) -> Option<VariantId> {
        resolve_variant_id(&self.metadata)
    }
}

/// One price point attached to a [`TargetProduct`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetPrice {
    pub id: String,
    /// Owning product id.
    pub product: String,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    pub currency: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub active: bool,
}

impl TargetPrice {
    /// The sync variant id embedded in the price metadata, any generation.
    #[must_use]
    pub fn variant_id(&self) -> Option<VariantId> {
        resolve_variant_id(&self.metadata)
    }
}

/// Externally persisted correlation row, unique on
/// `(source_variant_id, environment)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingRecord {
    pub source_variant_id: VariantId,
    pub target_price_id: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub variant_name: Option<String>,
    pub environment: Environment,
}

/// Shipping recipient for a fulfillment order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    pub address1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    pub country_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

/// One line of a fulfillment order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FulfillmentItem {
    pub sync_variant_id: VariantId,
    pub quantity: u32,
}

/// The outbound draft order sent to the Printful order API.
///
/// Always created with `confirm = false`; this system never auto-confirms
/// spend-incurring fulfillment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FulfillmentOrder {
    /// Correlation id (the checkout session id), visible in the Printful
    /// dashboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub recipient: Recipient,
    pub items: Vec<FulfillmentItem>,
    pub confirm: bool,
}

impl FulfillmentOrder {
    /// Build a draft order. `confirm` is unconditionally false.
    #[must_use]
    pub fn draft(
        recipient: Recipient,
        items: Vec<FulfillmentItem>,
        external_id: Option<String>,
    ) -> Self {
        Self {
            external_id,
            recipient,
            items,
            confirm: false,
        }
    }
}
