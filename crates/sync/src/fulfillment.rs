//! Checkout-to-fulfillment translation.
//!
//! Each purchased line item resolves back to a Printful sync variant:
//! canonical price metadata first, legacy keys next, the mapping store as a
//! last resort. Every resolved variant is re-validated against the live
//! Printful catalog before it is trusted - mappings go stale when variants
//! are deleted upstream. Items that fail to resolve are dropped with a
//! warning; an event where nothing resolves is "nothing to do", not an
//! error, so the sender does not retry it.

use tidewater_core::{
    Email, Environment, FulfillmentItem, FulfillmentOrder, Recipient, resolve_variant_id,
};
use tracing::{info, instrument, warn};

use crate::error::SyncError;
use crate::mapping::MappingStore;
use crate::printful::PrintfulClient;
use crate::stripe::types::{CheckoutSession, SessionLineItem};

/// Turns verified checkout sessions into draft Printful orders.
pub struct FulfillmentTranslator<'a> {
    printful: &'a PrintfulClient,
    mapping: &'a MappingStore,
}

impl<'a> FulfillmentTranslator<'a> {
    /// Create a translator borrowing the shared clients.
    #[must_use]
    pub const fn new(printful: &'a PrintfulClient, mapping: &'a MappingStore) -> Self {
        Self { printful, mapping }
    }

    /// Translate a session's line items into a draft order.
    ///
    /// Returns `Ok(None)` when zero items resolve - the caller must treat
    /// that as handled (200), not failed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when items resolved but the
    /// session carries no usable shipping address, and structural errors
    /// from the catalog lookups.
    #[instrument(skip(self, session, items), fields(session_id = %session.id, lines = items.len()))]
    pub async fn translate(
        &self,
        session: &CheckoutSession,
        items: &[SessionLineItem],
        environment: Environment,
    ) -> Result<Option<FulfillmentOrder>, SyncError> {
        let mut resolved = Vec::new();
        for item in items {
            match self.resolve_item(item, environment).await {
                Ok(fulfillment_item) => resolved.push(fulfillment_item),
                Err(err) if err.is_structural() => return Err(err),
                Err(err) => {
                    warn!(line_item = %item.id, price = %item.price.id, error = %err,
                        "dropping unresolvable line item");
                }
            }
        }

        if resolved.is_empty() {
            info!("no fulfillable line items in session");
            return Ok(None);
        }

        let recipient = build_recipient(session)?;
        Ok(Some(FulfillmentOrder::draft(
            recipient,
            resolved,
            Some(session.id.clone()),
        )))
    }

    /// Submit a draft order to Printful.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] if Printful rejects the order.
    pub async fn submit(&self, order: &FulfillmentOrder) -> Result<i64, SyncError> {
        self.printful.create_order(order).await
    }

    /// Resolve one line item to a live sync variant.
    async fn resolve_item(
        &self,
        item: &SessionLineItem,
        environment: Environment,
    ) -> Result<FulfillmentItem, SyncError> {
        let variant_id = match resolve_variant_id(&item.price.metadata) {
            Some(id) => id,
            None => self
                .mapping
                .find_by_price(&item.price.id, environment)
                .await?
                .map(|record| record.source_variant_id)
                .ok_or_else(|| {
                    SyncError::Validation(format!(
                        "price {} carries no variant identity and has no mapping",
                        item.price.id
                    ))
                })?,
        };

        if !self.printful.variant_exists(variant_id).await? {
            return Err(SyncError::Validation(format!(
                "variant {variant_id} no longer exists upstream"
            )));
        }

        Ok(FulfillmentItem {
            sync_variant_id: variant_id,
            quantity: item.quantity,
        })
    }
}

/// Build the order recipient from the session's shipping details.
///
/// # Errors
///
/// Returns [`SyncError::Validation`] when the session carries no shipping
/// address or the address is missing its street line, city, or country.
pub fn build_recipient(session: &CheckoutSession) -> Result<Recipient, SyncError> {
    let (name, address) = session
        .recipient_details()
        .ok_or_else(|| SyncError::Validation("session has no shipping address".to_string()))?;

    let missing =
        |field: &str| SyncError::Validation(format!("shipping address missing {field}"));

    Ok(Recipient {
        name: name.to_string(),
        email: session.email().and_then(|raw| Email::parse(raw).ok()),
        address1: address
            .line1
            .clone()
            .ok_or_else(|| missing("street line"))?,
        address2: address.line2.clone(),
        city: address.city.clone().ok_or_else(|| missing("city"))?,
        state_code: address.state.clone(),
        country_code: address
            .country
            .clone()
            .ok_or_else(|| missing("country"))?,
        zip: address.postal_code.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(shipping: bool) -> CheckoutSession {
        let mut value = serde_json::json!({
            "id": "cs_test_123",
            "customer_email": "buyer@example.com"
        });
        if shipping {
            value["shipping_details"] = serde_json::json!({
                "name": "A Customer",
                "address": {
                    "line1": "1 Water St",
                    "city": "Halifax",
                    "state": "NS",
                    "postal_code": "B3H 0A1",
                    "country": "CA"
                }
            });
        }
        serde_json::from_value(value).expect("deserializes")
    }

    #[test]
    fn test_build_recipient() {
        let recipient = build_recipient(&session(true)).expect("builds");
        assert_eq!(recipient.name, "A Customer");
        assert_eq!(recipient.address1, "1 Water St");
        assert_eq!(recipient.country_code, "CA");
        assert_eq!(
            recipient.email.as_ref().map(Email::as_str),
            Some("buyer@example.com")
        );
    }

    #[test]
    fn test_build_recipient_requires_address() {
        assert!(matches!(
            build_recipient(&session(false)),
            Err(SyncError::Validation(_))
        ));
    }

    #[test]
    fn test_build_recipient_requires_country() {
        let mut s = session(true);
        if let Some(shipping) = s.shipping_details.as_mut()
            && let Some(address) = shipping.address.as_mut()
        {
            address.country = None;
        }
        assert!(matches!(
            build_recipient(&s),
            Err(SyncError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_email_dropped_not_fatal() {
        let mut s = session(true);
        s.customer_email = Some("not-an-email".to_string());
        let recipient = build_recipient(&s).expect("builds");
        assert!(recipient.email.is_none());
    }
}
