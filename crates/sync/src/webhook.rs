//! Webhook signature verification and event parsing.
//!
//! Stripe signs every delivery with
//! `Stripe-Signature: t=<unix>,v1=<hex-hmac>` where the MAC is HMAC-SHA256
//! over `"{t}.{raw_body}"`. Verification runs against the raw request bytes
//! before any parsing, compares in constant time, and bounds replays with a
//! timestamp tolerance.
//!
//! The environment of a delivery is derived from which signing secret
//! verifies it (live tried first), never from any field inside the payload:
//! the payload is untrusted until the MAC says otherwise, and a client-
//! supplied mode flag must never pick which secret we trust.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use tidewater_core::Environment;
use tracing::debug;

use crate::error::SyncError;
use crate::stripe::types::CheckoutSession;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Maximum accepted age of a signed timestamp, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// The event type that triggers fulfillment.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

type HmacSha256 = Hmac<Sha256>;

/// Parsed `Stripe-Signature` header.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    /// Signed unix timestamp (`t=`).
    pub timestamp: i64,
    /// All `v1=` signatures present (key-roll periods carry several).
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    /// Parse a `t=...,v1=...` header value.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Signature`] when the timestamp or every
    /// signature element is missing or malformed.
    pub fn parse(header: &str) -> Result<Self, SyncError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for element in header.split(',') {
            match element.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| {
                        SyncError::Signature("invalid timestamp".to_string())
                    })?);
                }
                Some(("v1", value)) => signatures.push(value.to_string()),
                _ => {} // unknown scheme elements (v0) are ignored
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| SyncError::Signature("missing timestamp".to_string()))?;
        if signatures.is_empty() {
            return Err(SyncError::Signature("missing v1 signature".to_string()));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Verifies inbound deliveries against the per-environment secrets.
pub struct WebhookVerifier {
    live_secret: SecretString,
    test_secret: SecretString,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("live_secret", &"[REDACTED]")
            .field("test_secret", &"[REDACTED]")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl WebhookVerifier {
    /// Create a verifier with the default replay tolerance.
    #[must_use]
    pub const fn new(live_secret: SecretString, test_secret: SecretString) -> Self {
        Self {
            live_secret,
            test_secret,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Override the replay tolerance (tests).
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verify a delivery and derive its environment.
    ///
    /// Only the raw body bytes participate in the MAC. `now_unix` is passed
    /// in so verification is deterministic under test.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Signature`] on a malformed header, a stale
    /// timestamp, or a MAC that matches neither secret.
    pub fn verify(
        &self,
        raw_body: &[u8],
        header: &str,
        now_unix: i64,
    ) -> Result<Environment, SyncError> {
        let parsed = SignatureHeader::parse(header)?;

        if (now_unix - parsed.timestamp).abs() > self.tolerance_secs {
            return Err(SyncError::Signature(
                "timestamp outside tolerance".to_string(),
            ));
        }

        for environment in Environment::all() {
            let secret = match environment {
                Environment::Live => &self.live_secret,
                Environment::Test => &self.test_secret,
            };
            let expected = compute_signature(raw_body, parsed.timestamp, secret)?;
            if parsed
                .signatures
                .iter()
                .any(|candidate| constant_time_eq(candidate, &expected))
            {
                debug!(env = %environment, "webhook signature verified");
                return Ok(environment);
            }
        }

        Err(SyncError::Signature("signature mismatch".to_string()))
    }

    /// Verify against the current wall clock.
    ///
    /// # Errors
    ///
    /// See [`Self::verify`].
    pub fn verify_now(&self, raw_body: &[u8], header: &str) -> Result<Environment, SyncError> {
        self.verify(raw_body, header, chrono::Utc::now().timestamp())
    }
}

/// HMAC-SHA256 over `"{timestamp}.{raw_body}"`, hex-encoded.
fn compute_signature(
    raw_body: &[u8],
    timestamp: i64,
    secret: &SecretString,
) -> Result<String, SyncError> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|err| SyncError::Signature(err.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// A parsed webhook event. Only constructed after verification succeeds.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub livemode: bool,
    pub data: EventData,
}

/// The `data` envelope of an event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: CheckoutSession,
}

impl WebhookEvent {
    /// Parse the verified raw body into an event.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] on malformed JSON or a body that
    /// is not an event envelope.
    pub fn parse(raw_body: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(raw_body)
            .map_err(|err| SyncError::Validation(format!("malformed event: {err}")))
    }

    /// Whether this event should trigger fulfillment.
    #[must_use]
    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_COMPLETED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(
            SecretString::from("whsec_live_k2J9dM4xQ7pL"),
            SecretString::from("whsec_test_a8Rf3nZ6wY1c"),
        )
    }

    fn sign(body: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("key length");
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(body);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_header_parse() {
        let header = SignatureHeader::parse("t=1700000000,v1=abc,v1=def,v0=ignored")
            .expect("parses");
        assert_eq!(header.timestamp, 1_700_000_000);
        assert_eq!(header.signatures, vec!["abc", "def"]);
    }

    #[test]
    fn test_header_parse_missing_parts() {
        assert!(SignatureHeader::parse("v1=abc").is_err());
        assert!(SignatureHeader::parse("t=1700000000").is_err());
        assert!(SignatureHeader::parse("garbage").is_err());
        assert!(SignatureHeader::parse("t=notanumber,v1=abc").is_err());
    }

    #[test]
    fn test_verify_live_secret_selects_live() {
        let body = br#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;
        let header = sign(body, "whsec_live_k2J9dM4xQ7pL", now);
        let env = verifier().verify(body, &header, now).expect("verifies");
        assert_eq!(env, Environment::Live);
    }

    #[test]
    fn test_verify_test_secret_selects_test() {
        let body = br#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;
        let header = sign(body, "whsec_test_a8Rf3nZ6wY1c", now);
        let env = verifier().verify(body, &header, now).expect("verifies");
        assert_eq!(env, Environment::Test);
    }

    #[test]
    fn test_tampered_body_rejected() {
        let body = br#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;
        let header = sign(body, "whsec_live_k2J9dM4xQ7pL", now);

        let tampered = br#"{"type":"checkout.session.completed","hacked":true}"#;
        let result = verifier().verify(tampered, &header, now);
        assert!(matches!(result, Err(SyncError::Signature(_))));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = br#"{}"#;
        let now = 1_700_000_000;
        let header = sign(body, "whsec_other_secret_entirely", now);
        assert!(verifier().verify(body, &header, now).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let body = br#"{}"#;
        let now = 1_700_000_000;
        let header = sign(body, "whsec_live_k2J9dM4xQ7pL", now - 600);
        let result = verifier().verify(body, &header, now);
        assert!(matches!(result, Err(SyncError::Signature(_))));
    }

    #[test]
    fn test_timestamp_within_tolerance_accepted() {
        let body = br#"{}"#;
        let now = 1_700_000_000;
        let header = sign(body, "whsec_live_k2J9dM4xQ7pL", now - 120);
        assert!(verifier().verify(body, &header, now).is_ok());
    }

    #[test]
    fn test_payload_mode_flag_does_not_pick_secret() {
        // livemode=true in the payload, but signed with the test secret:
        // the delivery is a test-environment delivery.
        let body = br#"{"type":"checkout.session.completed","livemode":true}"#;
        let now = 1_700_000_000;
        let header = sign(body, "whsec_test_a8Rf3nZ6wY1c", now);
        let env = verifier().verify(body, &header, now).expect("verifies");
        assert_eq!(env, Environment::Test);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("deadbeef", "deadbeef"));
        assert!(!constant_time_eq("deadbeef", "deadbeee"));
        assert!(!constant_time_eq("dead", "deadbeef"));
    }

    #[test]
    fn test_event_parse() {
        let body = br#"{
            "type": "checkout.session.completed",
            "livemode": false,
            "data": {"object": {"id": "cs_test_123", "customer_email": "b@example.com"}}
        }"#;
        let event = WebhookEvent::parse(body).expect("parses");
        assert!(event.is_checkout_completed());
        assert_eq!(event.data.object.id, "cs_test_123");
    }

    #[test]
    fn test_event_parse_malformed() {
        assert!(matches!(
            WebhookEvent::parse(b"not json"),
            Err(SyncError::Validation(_))
        ));
    }
}
