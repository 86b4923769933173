//! Wire types for the Stripe API.
//!
//! Products and prices deserialize straight into the core catalog model;
//! the shapes here are the list/search envelopes, checkout sessions, and
//! line items.

use std::collections::BTreeMap;

use serde::Deserialize;

/// `{object: "list", data, has_more}` envelope used by list endpoints.
#[derive(Debug, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

/// Search endpoints return the same shape plus an opaque `next_page`.
#[derive(Debug, Deserialize)]
pub struct SearchResult<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_page: Option<String>,
}

/// Deletion acknowledgement (`DELETE /v1/products/{id}`).
#[derive(Debug, Deserialize)]
pub struct Deleted {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
}

/// A checkout session, as embedded in webhook events or fetched directly.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub livemode: bool,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub shipping_details: Option<ShippingDetails>,
    #[serde(default)]
    pub url: Option<String>,
}

impl CheckoutSession {
    /// Best-available customer email (top-level field, else details).
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.customer_email
            .as_deref()
            .or_else(|| self.customer_details.as_ref().and_then(|d| d.email.as_deref()))
    }

    /// Shipping details, falling back to the billing details block when the
    /// session collected no separate shipping address.
    #[must_use]
    pub fn recipient_details(&self) -> Option<(&str, &Address)> {
        if let Some(shipping) = &self.shipping_details
            && let Some(address) = &shipping.address
        {
            let name = shipping.name.as_deref().unwrap_or("Customer");
            return Some((name, address));
        }
        if let Some(details) = &self.customer_details
            && let Some(address) = &details.address
        {
            let name = details.name.as_deref().unwrap_or("Customer");
            return Some((name, address));
        }
        None
    }
}

/// Customer block on a checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
}

/// Shipping block on a checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct ShippingDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
}

/// Postal address as Stripe represents it.
#[derive(Debug, Clone, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// One purchased line of a checkout session
/// (`GET /v1/checkout/sessions/{id}/line_items` with the price expanded).
#[derive(Debug, Clone, Deserialize)]
pub struct SessionLineItem {
    pub id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub price: LineItemPrice,
}

const fn default_quantity() -> u32 {
    1
}

/// The price attached to a purchased line item.
#[derive(Debug, Clone, Deserialize)]
pub struct LineItemPrice {
    pub id: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_email_prefers_top_level() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "customer_email": "top@example.com",
            "customer_details": {"email": "details@example.com"}
        }))
        .expect("deserializes");
        assert_eq!(session.email(), Some("top@example.com"));
    }

    #[test]
    fn test_recipient_prefers_shipping_block() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "customer_details": {
                "name": "Billing Name",
                "address": {"line1": "2 Bill St", "city": "Toronto", "country": "CA"}
            },
            "shipping_details": {
                "name": "Ship Name",
                "address": {"line1": "1 Water St", "city": "Halifax", "country": "CA"}
            }
        }))
        .expect("deserializes");

        let (name, address) = session.recipient_details().expect("has recipient");
        assert_eq!(name, "Ship Name");
        assert_eq!(address.line1.as_deref(), Some("1 Water St"));
    }

    #[test]
    fn test_recipient_falls_back_to_customer_details() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "customer_details": {
                "name": "Billing Name",
                "address": {"line1": "2 Bill St", "city": "Toronto", "country": "CA"}
            }
        }))
        .expect("deserializes");

        let (name, address) = session.recipient_details().expect("has recipient");
        assert_eq!(name, "Billing Name");
        assert_eq!(address.city.as_deref(), Some("Toronto"));
    }

    #[test]
    fn test_line_item_quantity_defaults_to_one() {
        let item: SessionLineItem = serde_json::from_value(serde_json::json!({
            "id": "li_1",
            "price": {"id": "price_1", "metadata": {"sync_variant_id": "501"}}
        }))
        .expect("deserializes");
        assert_eq!(item.quantity, 1);
    }
}
