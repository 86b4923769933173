//! Stripe REST API client.
//!
//! Mutations use Stripe's form encoding (bracketed keys for nested fields);
//! setting a metadata key to the empty string deletes it, which is how
//! legacy keys get stripped server-side.

use std::collections::BTreeMap;

use futures::Stream;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tidewater_core::{Environment, TargetPrice, TargetProduct};
use tracing::{debug, instrument};

use super::types::{CheckoutSession, Deleted, List, SearchResult, SessionLineItem};
use crate::error::SyncError;

/// Stripe API base URL.
const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Cursor page size for list endpoints.
const PAGE_SIZE: usize = 100;

/// Request timeout for all Stripe calls.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Fields for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

/// Fields for updating a product. `None` leaves the field untouched;
/// metadata entries with empty values delete those keys.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub images: Option<Vec<String>>,
    pub metadata: Option<BTreeMap<String, String>>,
    pub active: Option<bool>,
}

/// Parameters for creating a checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionParams {
    pub line_items: Vec<(String, u32)>,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub shipping_countries: Vec<String>,
}

/// Stripe API client, scoped to one environment's secret key.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: SecretString,
    environment: Environment,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("base_url", &self.base_url)
            .field("environment", &self.environment)
            .field("secret_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a client against the production Stripe API.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Http`] if the HTTP client cannot be built.
    pub fn new(secret_key: SecretString, environment: Environment) -> Result<Self, SyncError> {
        Self::with_base_url(secret_key, environment, STRIPE_API_BASE)
    }

    /// Create a client against an alternate base URL (used by tests).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Http`] if the HTTP client cannot be built.
    pub fn with_base_url(
        secret_key: SecretString,
        environment: Environment,
        base_url: &str,
    ) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
            environment,
        })
    }

    /// The environment this client's key is scoped to.
    #[must_use]
    pub const fn environment(&self) -> Environment {
        self.environment
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Lazily list products, transparently following cursor pagination
    /// (`starting_after`) until exhausted.
    pub fn list_products(
        &self,
        active_only: bool,
    ) -> impl Stream<Item = Result<TargetProduct, SyncError>> + '_ {
        async_stream::try_stream! {
            let mut starting_after: Option<String> = None;
            loop {
                let mut query = vec![("limit".to_string(), PAGE_SIZE.to_string())];
                if active_only {
                    query.push(("active".to_string(), "true".to_string()));
                }
                if let Some(cursor) = &starting_after {
                    query.push(("starting_after".to_string(), cursor.clone()));
                }

                let page: List<TargetProduct> = self.get("/products", &query).await?;
                let has_more = page.has_more;
                starting_after = page.data.last().map(|p| p.id.clone());
                debug!(fetched = page.data.len(), has_more, "product page");

                for product in page.data {
                    yield product;
                }

                if !has_more {
                    break;
                }
            }
        }
    }

    /// Server-side metadata search:
    /// `metadata['{key}']:'{value}'`, active products only.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] on API errors.
    #[instrument(skip(self))]
    pub async fn search_products_by_metadata(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<TargetProduct>, SyncError> {
        let query = format!("active:'true' AND metadata['{key}']:'{value}'");
        let result: SearchResult<TargetProduct> = self
            .get(
                "/products/search",
                &[("query".to_string(), query)],
            )
            .await?;
        Ok(result.data)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] on API errors.
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: &NewProduct) -> Result<TargetProduct, SyncError> {
        let mut params = vec![("name".to_string(), product.name.clone())];
        if let Some(description) = &product.description {
            params.push(("description".to_string(), description.clone()));
        }
        for (i, url) in product.images.iter().enumerate() {
            params.push((format!("images[{i}]"), url.clone()));
        }
        push_metadata(&mut params, &product.metadata);

        self.post("/products", &params).await
    }

    /// Update a product in place.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] on API errors.
    #[instrument(skip(self, update))]
    pub async fn update_product(
        &self,
        product_id: &str,
        update: &ProductUpdate,
    ) -> Result<TargetProduct, SyncError> {
        let mut params = Vec::new();
        if let Some(name) = &update.name {
            params.push(("name".to_string(), name.clone()));
        }
        if let Some(description) = &update.description {
            params.push(("description".to_string(), description.clone()));
        }
        if let Some(images) = &update.images {
            for (i, url) in images.iter().enumerate() {
                params.push((format!("images[{i}]"), url.clone()));
            }
        }
        if let Some(metadata) = &update.metadata {
            push_metadata(&mut params, metadata);
        }
        if let Some(active) = update.active {
            params.push(("active".to_string(), active.to_string()));
        }

        self.post(&format!("/products/{product_id}"), &params).await
    }

    /// Delete a product outright. Fails upstream while the product still
    /// has prices; deactivate them first.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] if Stripe refuses the deletion.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: &str) -> Result<(), SyncError> {
        let url = format!("{}/products/{product_id}", self.base_url);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;
        let response = check_status(response).await?;
        let _ack: Deleted = response.json().await?;
        Ok(())
    }

    // =========================================================================
    // Prices
    // =========================================================================

    /// List prices of one product. `active_only=false` includes historical
    /// deactivated prices.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] on API errors.
    #[instrument(skip(self))]
    pub async fn list_prices(
        &self,
        product_id: &str,
        active_only: bool,
    ) -> Result<Vec<TargetPrice>, SyncError> {
        let mut prices = Vec::new();
        let mut starting_after: Option<String> = None;
        loop {
            let mut query = vec![
                ("product".to_string(), product_id.to_string()),
                ("limit".to_string(), PAGE_SIZE.to_string()),
            ];
            if active_only {
                query.push(("active".to_string(), "true".to_string()));
            }
            if let Some(cursor) = &starting_after {
                query.push(("starting_after".to_string(), cursor.clone()));
            }

            let page: List<TargetPrice> = self.get("/prices", &query).await?;
            let has_more = page.has_more;
            starting_after = page.data.last().map(|p| p.id.clone());
            prices.extend(page.data);
            if !has_more {
                break;
            }
        }
        Ok(prices)
    }

    /// Create a one-time price on a product.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] on API errors.
    #[instrument(skip(self, metadata))]
    pub async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<TargetPrice, SyncError> {
        let mut params = vec![
            ("product".to_string(), product_id.to_string()),
            ("unit_amount".to_string(), unit_amount.to_string()),
            ("currency".to_string(), currency.to_string()),
        ];
        push_metadata(&mut params, metadata);

        self.post("/prices", &params).await
    }

    /// Replace metadata keys on a price. Empty values delete keys.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] on API errors.
    #[instrument(skip(self, metadata))]
    pub async fn update_price_metadata(
        &self,
        price_id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<TargetPrice, SyncError> {
        let mut params = Vec::new();
        push_metadata(&mut params, metadata);
        self.post(&format!("/prices/{price_id}"), &params).await
    }

    /// Deactivate a price. Stripe has no hard price deletion; this is the
    /// only removal primitive.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] on API errors.
    #[instrument(skip(self))]
    pub async fn deactivate_price(&self, price_id: &str) -> Result<TargetPrice, SyncError> {
        self.post(
            &format!("/prices/{price_id}"),
            &[("active".to_string(), "false".to_string())],
        )
        .await
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Create a payment-mode checkout session.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] on API errors.
    #[instrument(skip(self, params), fields(lines = params.line_items.len()))]
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession, SyncError> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), params.success_url.clone()),
            ("cancel_url".to_string(), params.cancel_url.clone()),
        ];
        for (i, (price, quantity)) in params.line_items.iter().enumerate() {
            form.push((format!("line_items[{i}][price]"), price.clone()));
            form.push((format!("line_items[{i}][quantity]"), quantity.to_string()));
        }
        if let Some(email) = &params.customer_email {
            form.push(("customer_email".to_string(), email.clone()));
        }
        for (i, country) in params.shipping_countries.iter().enumerate() {
            form.push((
                format!("shipping_address_collection[allowed_countries][{i}]"),
                country.clone(),
            ));
        }

        self.post("/checkout/sessions", &form).await
    }

    /// Fetch the purchased line items of a session, with each price's
    /// metadata expanded.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] on API errors.
    #[instrument(skip(self))]
    pub async fn list_checkout_line_items(
        &self,
        session_id: &str,
    ) -> Result<Vec<SessionLineItem>, SyncError> {
        let list: List<SessionLineItem> = self
            .get(
                &format!("/checkout/sessions/{session_id}/line_items"),
                &[
                    ("limit".to_string(), PAGE_SIZE.to_string()),
                    ("expand[]".to_string(), "data.price".to_string()),
                ],
            )
            .await?;
        Ok(list.data)
    }

    // =========================================================================
    // Transport
    // =========================================================================

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, SyncError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(query)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, SyncError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .form(form)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Append `metadata[key]=value` form pairs.
fn push_metadata(params: &mut Vec<(String, String)>, metadata: &BTreeMap<String, String>) {
    for (key, value) in metadata {
        params.push((format!("metadata[{key}]"), value.clone()));
    }
}

/// Map non-2xx responses to [`SyncError::Upstream`] using Stripe's
/// `{error: {message}}` body when present.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    #[derive(serde::Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        error: Option<ErrorDetail>,
    }
    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        #[serde(default)]
        message: Option<String>,
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error.and_then(|e| e.message))
        .unwrap_or(body);

    Err(SyncError::Upstream {
        status: status.as_u16(),
        message,
    })
}
