//! Core types for Tidewater.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod catalog;
pub mod email;
pub mod environment;
pub mod id;
pub mod metadata;
pub mod naming;
pub mod price;

pub use catalog::{
    FulfillmentItem, FulfillmentOrder, MappingRecord, Recipient, SourceVariant, TargetPrice,
    TargetProduct,
};
pub use email::{Email, EmailError};
pub use environment::Environment;
pub use id::*;
pub use metadata::{
    CANONICAL_KEYS, LEGACY_KEYS, canonical_price_metadata, canonical_product_metadata,
    canonicalize, has_variant_identity, resolve_variant_id,
};
pub use naming::{composed_name, normalize_name};
pub use price::{PriceError, retail_price_to_minor_units};
