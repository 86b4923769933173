//! Wire types for the Printful API.
//!
//! Printful wraps every response in `{code, result}`; list endpoints add a
//! `paging` block. Sync variants carry their display data spread across the
//! variant itself, its catalog-product reference, its files, and its option
//! list - [`SyncVariantWire::into_source_variant`] flattens all of that into
//! the domain [`SourceVariant`].

use serde::Deserialize;
use tidewater_core::{SourceVariant, SyncProductId, VariantId};

/// Standard `{code, result}` envelope.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub result: T,
}

/// Envelope for offset-paginated list endpoints.
#[derive(Debug, Deserialize)]
pub struct PagedResponse<T> {
    pub code: i32,
    pub result: Vec<T>,
    pub paging: Paging,
}

/// Offset pagination block.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Paging {
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

/// One row of `GET /sync/products`.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncProductSummary {
    pub id: SyncProductId,
    pub name: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Number of variants currently synced.
    #[serde(default)]
    pub synced: u32,
    #[serde(default)]
    pub is_ignored: bool,
}

/// `GET /sync/products/{id}` result.
#[derive(Debug, Deserialize)]
pub struct SyncProductDetail {
    pub sync_product: SyncProductSummary,
    pub sync_variants: Vec<SyncVariantWire>,
}

/// One sync variant as returned by the detail endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncVariantWire {
    pub id: VariantId,
    pub sync_product_id: SyncProductId,
    /// Usually `"{product name} - {variant name}"`.
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub retail_price: String,
    #[serde(default = "default_synced")]
    pub synced: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_ignored: bool,
    #[serde(default)]
    pub product: Option<CatalogVariantRef>,
    #[serde(default)]
    pub files: Vec<FileRef>,
    #[serde(default)]
    pub options: Vec<OptionValue>,
}

const fn default_synced() -> bool {
    true
}

/// Reference to the underlying catalog variant.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogVariantRef {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A print/mockup file attached to a variant.
#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    #[serde(rename = "type")]
    pub file_type: String,
    #[serde(default)]
    pub preview_url: Option<String>,
}

/// One configured option on a variant (e.g. size, color).
#[derive(Debug, Clone, Deserialize)]
pub struct OptionValue {
    pub id: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl SyncVariantWire {
    /// Flatten the wire shape into the domain model.
    ///
    /// The variant display name is the wire name with the parent product
    /// name prefix removed; size/color come from the option list when
    /// present, else from splitting a `"Color / Size"` variant name.
    #[must_use]
    pub fn into_source_variant(self, product_name: &str) -> SourceVariant {
        let variant_name = self
            .name
            .strip_prefix(product_name)
            .map_or(self.name.as_str(), |rest| {
                rest.trim_start_matches(|c: char| c == '-' || c.is_whitespace())
            })
            .to_string();

        let preview_image_url = self
            .files
            .iter()
            .find(|f| f.file_type == "preview")
            .and_then(|f| f.preview_url.clone())
            .or_else(|| self.product.as_ref().and_then(|p| p.image.clone()));

        let mut color = self.option_string("color");
        let mut size = self.option_string("size");
        if color.is_none() && size.is_none() {
            if let Some((left, right)) = variant_name.split_once('/') {
                color = Some(left.trim().to_string());
                size = Some(right.trim().to_string());
            }
        }

        SourceVariant {
            id: self.id,
            sync_product_id: self.sync_product_id,
            product_name: product_name.to_string(),
            variant_name,
            sku: self.sku,
            size,
            color,
            retail_price: self.retail_price,
            preview_image_url,
            available: self.synced,
            is_deleted: self.is_deleted,
            is_ignored: self.is_ignored,
        }
    }

    fn option_string(&self, id: &str) -> Option<String> {
        self.options
            .iter()
            .find(|o| o.id.eq_ignore_ascii_case(id))
            .and_then(|o| o.value.as_str().map(ToString::to_string))
    }
}
