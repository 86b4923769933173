//! Error taxonomy for the sync library.
//!
//! Per-item failures (`Validation`, most `Upstream`) are counted into the
//! run summary and never abort a batch; structural failures (`Config`,
//! authentication-class `Upstream`) abort the run immediately.

use thiserror::Error;

/// Errors surfaced by catalog clients, the reconciler, and the webhook
/// pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or invalid required configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A 4xx/5xx response from an upstream catalog API.
    #[error("upstream error ({status}): {message}")]
    Upstream {
        /// HTTP status code returned upstream.
        status: u16,
        /// Upstream-provided error message, best effort.
        message: String,
    },

    /// HTTP transport failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not parse as the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Webhook trust failure. The request is rejected, never processed.
    #[error("invalid signature: {0}")]
    Signature(String),

    /// Malformed or incomplete source/event data. Skips the single item.
    #[error("validation error: {0}")]
    Validation(String),

    /// An invariant is violated and automatic resolution is ambiguous.
    /// Logged loudly; the item is skipped for manual intervention.
    #[error("consistency violation: {0}")]
    Consistency(String),

    /// Resource not found upstream.
    #[error("not found: {0}")]
    NotFound(String),
}

impl SyncError {
    /// Whether this failure invalidates the whole run rather than one item.
    ///
    /// Authentication/authorization failures from an upstream are
    /// structural: every subsequent call would fail the same way.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Upstream { status, .. } => matches!(status, 401 | 403),
            _ => false,
        }
    }
}
