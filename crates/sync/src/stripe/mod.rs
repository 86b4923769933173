//! Stripe API client.
//!
//! Product/price CRUD, metadata search, cursor-paginated listing, checkout
//! sessions, and session line items. Every client instance is scoped to
//! exactly one environment's secret key; test and live are never mixed in
//! one client.

mod client;
pub mod types;

pub use client::{CheckoutSessionParams, NewProduct, ProductUpdate, StripeClient};
