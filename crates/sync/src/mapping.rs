//! Mapping store client.
//!
//! The variant-mapping table lives in an external service queried through a
//! simple filter-by-equality REST interface (PostgREST conventions:
//! `?column=eq.value` filters, `Prefer: resolution=merge-duplicates` for
//! upserts). Rows are unique on `(source_variant_id, environment)`.

use secrecy::{ExposeSecret, SecretString};
use tidewater_core::{Environment, MappingRecord, VariantId};
use tracing::{debug, instrument};

use crate::error::SyncError;

/// Table path under the mapping-store base URL.
const TABLE: &str = "variant_mappings";

/// Request timeout for mapping-store calls.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

/// Client for the external variant-mapping table.
#[derive(Clone)]
pub struct MappingStore {
    client: reqwest::Client,
    base_url: String,
    service_key: SecretString,
}

impl std::fmt::Debug for MappingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingStore")
            .field("base_url", &self.base_url)
            .field("service_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl MappingStore {
    /// Create a client for the mapping-store endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, service_key: SecretString) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        })
    }

    /// Fetch the record for one `(variant, environment)` pair, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] on API errors.
    #[instrument(skip(self))]
    pub async fn get(
        &self,
        source_variant_id: VariantId,
        environment: Environment,
    ) -> Result<Option<MappingRecord>, SyncError> {
        let rows = self
            .select(&[
                (
                    "source_variant_id",
                    format!("eq.{source_variant_id}"),
                ),
                ("environment", format!("eq.{environment}")),
            ])
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Reverse lookup: which variant does a Stripe price id map to?
    ///
    /// Used by webhook fulfillment when price metadata carries no
    /// recognizable variant id.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] on API errors.
    #[instrument(skip(self))]
    pub async fn find_by_price(
        &self,
        target_price_id: &str,
        environment: Environment,
    ) -> Result<Option<MappingRecord>, SyncError> {
        let rows = self
            .select(&[
                ("target_price_id", format!("eq.{target_price_id}")),
                ("environment", format!("eq.{environment}")),
            ])
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Insert or update the record for the row's
    /// `(source_variant_id, environment)` key.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] on API errors.
    #[instrument(skip(self, record), fields(variant = %record.source_variant_id, env = %record.environment))]
    pub async fn upsert(&self, record: &MappingRecord) -> Result<(), SyncError> {
        let url = format!("{}/{TABLE}", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.service_key.expose_secret())
            .header("Prefer", "resolution=merge-duplicates")
            .json(&[record])
            .send()
            .await?;
        check_status(response).await?;
        debug!("mapping upserted");
        Ok(())
    }

    async fn select(
        &self,
        filters: &[(&str, String)],
    ) -> Result<Vec<MappingRecord>, SyncError> {
        let url = format!("{}/{TABLE}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(filters)
            .bearer_auth(self.service_key.expose_secret())
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(SyncError::Upstream {
        status: status.as_u16(),
        message,
    })
}
