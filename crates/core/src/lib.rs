//! Tidewater Core - Shared types library.
//!
//! This crate provides common types used across all Tidewater components:
//! - `sync` - Printful/Stripe catalog reconciliation library
//! - `server` - Webhook, checkout, and lookup HTTP endpoints
//! - `cli` - Command-line tools for running catalog syncs
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - IDs, environments, metadata schema, name normalization,
//!   price conversion, and the catalog data model

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
