//! Printful API client.
//!
//! Read access to the store's sync products and variants, plus draft order
//! creation for fulfillment. All responses arrive in Printful's
//! `{code, result, paging?}` envelope; [`types`] models the wire shapes and
//! converts them into the [`tidewater_core`] catalog model.

mod client;
pub mod types;

pub use client::PrintfulClient;
