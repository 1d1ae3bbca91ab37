// Deferred-request records
//
// `DeferredRequest` is the persistent unit of work; `OutboundRequest` is
// the caller-facing builder the façade accepts.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use url::Url;
use uuid::Uuid;

use crate::{Priority, PriorityHint};

/// Unique request identity, generated at enqueue time.
pub type RequestId = String;

pub fn fresh_request_id() -> RequestId {
    Uuid::new_v4().to_string()
}

/// Lowercased host component of `url`, if the URL parses and has one.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// A request handed to the batcher by a caller.
///
/// Built fluently; everything except the URL has a sensible default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub priority: PriorityHint,
    /// Per-request deadline override; the configured default applies when
    /// absent.
    pub max_deferral: Option<Duration>,
}

impl OutboundRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
            priority: PriorityHint::Auto,
            max_deferral: None,
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn priority(mut self, priority: PriorityHint) -> Self {
        self.priority = priority;
        self
    }

    pub fn max_deferral(mut self, max_deferral: Duration) -> Self {
        self.max_deferral = Some(max_deferral);
        self
    }
}

/// A request persisted in the durable queue.
///
/// Owned exclusively by the store once saved; the transmitter works on
/// copies during a drain. `domain`, `payload_size`, and expiry are derived
/// on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredRequest {
    pub id: RequestId,
    pub url: String,
    pub method: String,
    /// Recorded verbatim; names are matched case-insensitively at transmit
    /// time by the transport.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub priority: Priority,
    pub enqueued_at: DateTime<Utc>,
    pub max_deferral: Duration,
}

impl DeferredRequest {
    /// Materialize a caller request for persistence.
    pub fn from_outbound(
        request: OutboundRequest,
        priority: Priority,
        default_max_deferral: Duration,
    ) -> Self {
        Self {
            id: fresh_request_id(),
            url: request.url,
            method: request.method,
            headers: request.headers,
            body: request.body,
            priority,
            enqueued_at: Utc::now(),
            max_deferral: request.max_deferral.unwrap_or(default_max_deferral),
        }
    }

    /// Lowercased host of the request URL, if any.
    pub fn domain(&self) -> Option<String> {
        host_of(&self.url)
    }

    /// URL length + header name/value lengths + body length, in bytes.
    pub fn payload_size(&self) -> usize {
        self.url.len()
            + self
                .headers
                .iter()
                .map(|(name, value)| name.len() + value.len())
                .sum::<usize>()
            + self.body.len()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match now.signed_duration_since(self.enqueued_at).to_std() {
            Ok(elapsed) => elapsed > self.max_deferral,
            // Enqueued "in the future" relative to `now`: clock skew, not expiry.
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_at(enqueued_at: DateTime<Utc>, max_deferral: Duration) -> DeferredRequest {
        DeferredRequest {
            id: fresh_request_id(),
            url: "https://metrics.example.com/v1/events".to_string(),
            method: "POST".to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
            priority: Priority::Deferrable,
            enqueued_at,
            max_deferral,
        }
    }

    #[test]
    fn test_host_extraction_lowercases() {
        assert_eq!(
            host_of("https://Analytics.Example.COM/v1/track"),
            Some("analytics.example.com".to_string())
        );
        assert_eq!(host_of("not a url"), None);
        assert_eq!(host_of("file:///tmp/x"), None);
    }

    #[test]
    fn test_payload_size_counts_all_parts() {
        let request = DeferredRequest {
            headers: HashMap::from([("X-Key".to_string(), "abc".to_string())]),
            body: vec![0u8; 10],
            ..request_at(Utc::now(), Duration::from_secs(60))
        };
        // url (38) + header name (5) + header value (3) + body (10)
        assert_eq!(request.payload_size(), request.url.len() + 5 + 3 + 10);
    }

    #[test]
    fn test_expiry_is_strict() {
        let now = Utc::now();
        let aged = request_at(now - chrono::Duration::seconds(1000), Duration::from_secs(100));
        assert!(aged.is_expired(now));

        let fresh = request_at(now - chrono::Duration::seconds(50), Duration::from_secs(100));
        assert!(!fresh.is_expired(now));

        // Future enqueue timestamps never read as expired.
        let skewed = request_at(now + chrono::Duration::seconds(30), Duration::from_secs(1));
        assert!(!skewed.is_expired(now));
    }

    #[test]
    fn test_outbound_builder_defaults() {
        let request = OutboundRequest::new("https://example.com/ping")
            .method("POST")
            .header("Content-Type", "application/json")
            .body(b"{}".to_vec());
        assert_eq!(request.method, "POST");
        assert_eq!(request.priority, PriorityHint::Auto);
        assert!(request.max_deferral.is_none());
        assert_eq!(request.headers.len(), 1);
    }

    #[test]
    fn test_fresh_ids_are_unique() {
        let a = fresh_request_id();
        let b = fresh_request_id();
        assert_ne!(a, b);
    }
}
