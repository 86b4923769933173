//! Printful REST API client.

use futures::Stream;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tidewater_core::{FulfillmentOrder, SyncProductId, VariantId};
use tracing::{debug, instrument};

use super::types::{
    ApiResponse, PagedResponse, SyncProductDetail, SyncProductSummary, SyncVariantWire,
};
use crate::error::SyncError;

/// Printful API base URL.
const PRINTFUL_API_BASE: &str = "https://api.printful.com";

/// Page size for sync-product listing.
const PAGE_SIZE: usize = 100;

/// Request timeout for all Printful calls.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Printful API client.
///
/// Read access to sync products/variants and draft order creation. Holds a
/// single bearer token; Printful has no test/live split - environment
/// separation lives entirely on the Stripe side.
#[derive(Clone)]
pub struct PrintfulClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl std::fmt::Debug for PrintfulClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintfulClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl PrintfulClient {
    /// Create a client against the production Printful API.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Http`] if the HTTP client cannot be built.
    pub fn new(api_key: SecretString) -> Result<Self, SyncError> {
        Self::with_base_url(api_key, PRINTFUL_API_BASE)
    }

    /// Create a client against an alternate base URL (used by tests).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Http`] if the HTTP client cannot be built.
    pub fn with_base_url(api_key: SecretString, base_url: &str) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Lazily list all sync products, following offset pagination.
    ///
    /// Each yielded item is one product summary; a page fetch error ends
    /// the stream with that error.
    pub fn list_sync_products(
        &self,
    ) -> impl Stream<Item = Result<SyncProductSummary, SyncError>> + '_ {
        async_stream::try_stream! {
            let mut offset = 0;
            loop {
                let page: PagedResponse<SyncProductSummary> = self
                    .get(&format!(
                        "/sync/products?offset={offset}&limit={PAGE_SIZE}"
                    ))
                    .await?;

                let fetched = page.result.len();
                debug!(offset, fetched, total = page.paging.total, "sync product page");

                for summary in page.result {
                    yield summary;
                }

                offset += fetched;
                if fetched == 0 || offset >= page.paging.total {
                    break;
                }
            }
        }
    }

    /// Fetch one sync product with all of its variants.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] on API errors, including 404.
    #[instrument(skip(self))]
    pub async fn get_sync_product(&self, id: SyncProductId) -> Result<SyncProductDetail, SyncError> {
        let response: ApiResponse<SyncProductDetail> =
            self.get(&format!("/sync/products/{id}")).await?;
        Ok(response.result)
    }

    /// Check whether a sync variant still exists (and is not deleted).
    ///
    /// Used by fulfillment to re-validate resolved line items before
    /// trusting a possibly stale mapping.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] on any failure other than 404;
    /// 404 is `Ok(false)`.
    #[instrument(skip(self))]
    pub async fn variant_exists(&self, id: VariantId) -> Result<bool, SyncError> {
        let url = format!("{}/sync/variant/{id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let response = check_status(response).await?;

        let wire: ApiResponse<SyncVariantWire> = response.json().await?;
        Ok(!wire.result.is_deleted)
    }

    /// Create a draft fulfillment order.
    ///
    /// The order always carries `confirm=false`; confirmation is a separate
    /// human step in the Printful dashboard.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] if Printful rejects the order.
    #[instrument(skip(self, order), fields(external_id = ?order.external_id, items = order.items.len()))]
    pub async fn create_order(&self, order: &FulfillmentOrder) -> Result<i64, SyncError> {
        #[derive(serde::Deserialize)]
        struct CreatedOrder {
            id: i64,
        }

        let url = format!("{}/orders", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(order)
            .send()
            .await?;
        let response = check_status(response).await?;

        let created: ApiResponse<CreatedOrder> = response.json().await?;
        debug!(order_id = created.result.id, "draft order created");
        Ok(created.result.id)
    }

    /// Cheap authenticated call used by the readiness probe.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] if the store is not reachable with
    /// the configured key.
    pub async fn ping(&self) -> Result<(), SyncError> {
        let _: PagedResponse<SyncProductSummary> =
            self.get("/sync/products?offset=0&limit=1").await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Map non-2xx responses to [`SyncError::Upstream`] with the body's error
/// message when one is present.
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
