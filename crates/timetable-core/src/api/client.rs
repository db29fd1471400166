//! Relay-rotating HTTP client.
//!
//! The timetable server does not send CORS headers, so every request is
//! routed through one of several public relays. Relays are flaky; the
//! client rotates through them with a fixed backoff until one returns a
//! usable body or the attempt budget runs out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, warn};

use super::error::truncate_body;
use super::transport::{HttpTransport, ReqwestTransport};
use super::FetchError;
use crate::config::{Config, RelayConfig, ResponseShape};

// ============================================================================
// Constants
// ============================================================================

/// Bodies shorter than this are relay placeholder pages, not documents.
pub const MIN_BODY_CHARS: usize = 50;

/// Placeholder in a relay template that receives the encoded target.
const URL_PLACEHOLDER: &str = "{url}";

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Relay client.
/// Clone is cheap and clones share the rotation cursor, so a background
/// refresh continues the rotation where the foreground left it.
#[derive(Clone)]
pub struct ProxyClient {
    transport: Arc<dyn HttpTransport>,
    relays: Arc<Vec<RelayConfig>>,
    cursor: Arc<AtomicUsize>,
    timeout: Duration,
    max_retries: usize,
    backoff: Duration,
}

impl ProxyClient {
    /// Create a client over an arbitrary transport
    pub fn new(transport: Arc<dyn HttpTransport>, config: &Config) -> Self {
        Self {
            transport,
            relays: Arc::new(config.relays.clone()),
            cursor: Arc::new(AtomicUsize::new(0)),
            timeout: config.request_timeout(),
            max_retries: config.max_retries.max(1),
            backoff: config.backoff(),
        }
    }

    /// Create a client backed by reqwest
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Ok(Self::new(Arc::new(ReqwestTransport::new()?), config))
    }

    /// Index of the relay the next attempt will use
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Total attempts a single `get` may make
    pub fn attempt_budget(&self) -> usize {
        self.relays.len() * self.max_retries
    }

    /// Embed `target` into a relay endpoint
    pub fn relay_url(relay: &RelayConfig, target: &str) -> String {
        let encoded = utf8_percent_encode(target, COMPONENT).to_string();
        if relay.url.contains(URL_PLACEHOLDER) {
            relay.url.replace(URL_PLACEHOLDER, &encoded)
        } else {
            format!("{}{}", relay.url, encoded)
        }
    }

    /// Fetch `target` through the relays.
    ///
    /// Each failure (network, timeout, non-success status, missing JSON
    /// field, undersized body) moves the cursor to the next relay and
    /// sleeps the backoff interval. Success leaves the cursor in place.
    pub async fn get(&self, target: &str) -> Result<String, FetchError> {
        let budget = self.attempt_budget();
        let mut last_error: Option<FetchError> = None;

        for attempt in 0..budget {
            let index = self.cursor() % self.relays.len();
            let relay = &self.relays[index];

            match self.attempt(relay, target).await {
                Ok(body) => {
                    debug!(relay = index, attempt, url = %relay.url, "Fetched via relay");
                    return Ok(body);
                }
                Err(e) => {
                    warn!(relay = index + 1, attempt, error = %e, "Proxy failed");
                    last_error = Some(e);
                    self.cursor.store((index + 1) % self.relays.len(), Ordering::Relaxed);
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }

        Err(FetchError::AllProxiesExhausted {
            attempts: budget,
            last: Box::new(
                last_error.unwrap_or_else(|| FetchError::Network("no relays configured".to_string())),
            ),
        })
    }

    async fn attempt(&self, relay: &RelayConfig, target: &str) -> Result<String, FetchError> {
        let url = Self::relay_url(relay, target);
        let response = self.transport.get(&url, self.timeout).await?;

        if !response.is_success() {
            debug!(status = response.status, body = %truncate_body(&response.body), "Relay returned error status");
            return Err(FetchError::Status(response.status));
        }

        let body = match relay.shape {
            ResponseShape::Text => response.body,
            ResponseShape::Json => Self::extract_field(relay, &response.body)?,
        };

        let len = body.chars().count();
        if len < MIN_BODY_CHARS {
            return Err(FetchError::EmptyResponse(len));
        }
        Ok(body)
    }

    fn extract_field(relay: &RelayConfig, body: &str) -> Result<String, FetchError> {
        let field = relay.field.as_deref().unwrap_or_default();
        let envelope: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| FetchError::InvalidJson(e.to_string()))?;
        envelope
            .get(field)
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .ok_or_else(|| FetchError::MissingField(field.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{long_body, ScriptedTransport};

    fn relays(n: usize) -> Vec<RelayConfig> {
        (0..n)
            .map(|i| RelayConfig::text(&format!("https://relay{}.test/?", i)))
            .collect()
    }

    fn client(transport: Arc<ScriptedTransport>, relays: Vec<RelayConfig>, retries: usize) -> ProxyClient {
        let config = Config {
            relays,
            max_retries: retries,
            backoff_ms: 0,
            ..Config::default()
        };
        ProxyClient::new(transport, &config)
    }

    #[test]
    fn test_relay_url_encodes_like_encode_uri_component() {
        let relay = RelayConfig::text("https://corsproxy.io/?");
        let url = ProxyClient::relay_url(&relay, "http://h/r.php?a=1&t[]=b c");
        assert_eq!(
            url,
            "https://corsproxy.io/?http%3A%2F%2Fh%2Fr.php%3Fa%3D1%26t%5B%5D%3Db%20c"
        );
    }

    #[test]
    fn test_relay_url_template_placeholder() {
        let relay = RelayConfig::text("https://relay.test/fetch?u={url}&raw=1");
        assert_eq!(
            ProxyClient::relay_url(&relay, "http://x/"),
            "https://relay.test/fetch?u=http%3A%2F%2Fx%2F&raw=1"
        );
    }

    #[tokio::test]
    async fn test_success_on_first_relay() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(&long_body("page"));
        let client = client(transport.clone(), relays(3), 2);

        let body = client.get("http://target/").await.expect("should fetch");
        assert!(body.starts_with("page"));
        assert_eq!(client.cursor(), 0);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_rotation_continues_across_calls() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_err(FetchError::Network("refused".to_string()));
        transport.push_ok(&long_body("first"));
        transport.push_ok(&long_body("second"));
        let client = client(transport.clone(), relays(3), 1);

        client.get("http://target/a").await.expect("first call");
        client.get("http://target/b").await.expect("second call");

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].starts_with("https://relay0.test/"));
        assert!(requests[1].starts_with("https://relay1.test/"));
        // Second call starts where the first left off, not at relay 0
        assert!(requests[2].starts_with("https://relay1.test/"));
    }

    #[tokio::test]
    async fn test_all_relays_exhausted() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..5 {
            transport.push_err(FetchError::Timeout(30));
        }
        transport.push_status(502, "bad gateway");
        let client = client(transport.clone(), relays(3), 2);

        let err = client.get("http://target/").await.expect_err("should fail");
        match err {
            FetchError::AllProxiesExhausted { attempts, last } => {
                assert_eq!(attempts, 6);
                assert!(matches!(*last, FetchError::Status(502)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.requests().len(), 6);
        // Six failures over three relays wrap the cursor back to the start
        assert_eq!(client.cursor(), 0);
    }

    #[tokio::test]
    async fn test_short_body_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok("Error: rate limited");
        transport.push_ok(&long_body("real"));
        let client = client(transport.clone(), relays(2), 1);

        let body = client.get("http://target/").await.expect("second relay should win");
        assert!(body.starts_with("real"));
        assert_eq!(client.cursor(), 1);
    }

    #[tokio::test]
    async fn test_body_length_is_measured_in_characters() {
        let transport = Arc::new(ScriptedTransport::new());
        // 30 characters, 60 bytes: still under the minimum
        transport.push_ok(&"é".repeat(30));
        let client = client(transport, relays(1), 1);

        let err = client.get("http://target/").await.expect_err("undersized body");
        match err {
            FetchError::AllProxiesExhausted { last, .. } => {
                assert!(matches!(*last, FetchError::EmptyResponse(30)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_json_relay_extracts_field() {
        let transport = Arc::new(ScriptedTransport::new());
        let envelope = serde_json::json!({ "contents": long_body("html"), "status": {} });
        transport.push_ok(&envelope.to_string());
        let relays = vec![RelayConfig::json("https://allorigins.test/get?url=", "contents")];
        let client = client(transport, relays, 1);

        let body = client.get("http://target/").await.expect("json relay");
        assert!(body.starts_with("html"));
    }

    #[tokio::test]
    async fn test_json_relay_missing_field_fails() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(r#"{"contents": null, "status": {"http_code": 500}}"#);
        let relays = vec![RelayConfig::json("https://allorigins.test/get?url=", "contents")];
        let client = client(transport, relays, 1);

        let err = client.get("http://target/").await.expect_err("null field");
        match err {
            FetchError::AllProxiesExhausted { last, .. } => {
                assert!(matches!(*last, FetchError::MissingField(ref f) if f == "contents"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_relays_fails_immediately() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client(transport.clone(), Vec::new(), 3);
        let err = client.get("http://target/").await.expect_err("no relays");
        assert!(matches!(err, FetchError::AllProxiesExhausted { attempts: 0, .. }));
        assert!(transport.requests().is_empty());
    }
}
