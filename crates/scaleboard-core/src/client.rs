//! HTTP client for the Headscale REST API.
//!
//! The client is bound to one `(base URL, API key)` pair at a time. Every call
//! takes a snapshot of the binding before it is sent, so a concurrent
//! [`UpstreamClient::update_config`] affects only calls started after it and
//! no request ever carries the old URL with the new key (or vice versa).
//!
//! Calls are never retried. Each one carries a fixed timeout.

use std::time::{Duration, Instant};

use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::crypto::ApiKey;
use crate::error::UpstreamError;

/// Per-call timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Path of the read-only call used as a connectivity probe.
const PROBE_PATH: &str = "/api/v1/user";

/// Longest upstream error message passed on, in characters.
const MAX_ERROR_MESSAGE_CHARS: usize = 512;

/// A successful upstream answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub data: Value,
}

/// Reachability state reported by a connectivity probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Probe details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionData {
    pub status: ConnectionStatus,
    /// Round-trip time such as `"42ms"`, or `"N/A"` when the probe failed.
    pub response_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_count: Option<usize>,
}

/// Outcome of a connectivity probe. Never contains the API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ConnectionData>,
}

impl ConnectionReport {
    /// A failure detected before any network call.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            error: Some(message.clone()),
            message,
            data: None,
        }
    }
}

#[derive(Clone)]
struct Binding {
    base_url: String,
    api_key: ApiKey,
}

/// Check that `input` is an absolute HTTP(S) URL with a host and return it
/// without a trailing slash.
///
/// # Errors
///
/// Returns [`UpstreamError::Validation`] describing what is wrong.
pub fn normalize_base_url(input: &str) -> Result<String, UpstreamError> {
    let trimmed = input.trim();
    let url = Url::parse(trimmed).map_err(|e| UpstreamError::Validation {
        reason: format!("'{trimmed}' is not a valid URL: {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UpstreamError::Validation {
            reason: format!("unsupported scheme '{}', expected http or https", url.scheme()),
        });
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(UpstreamError::Validation {
            reason: format!("'{trimmed}' has no host"),
        });
    }
    Ok(trimmed.trim_end_matches('/').to_owned())
}

/// Thin bearer-auth client for the upstream API.
pub struct UpstreamClient {
    http: reqwest::Client,
    binding: RwLock<Binding>,
    timeout: Duration,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl UpstreamClient {
    /// Create a client bound to `base_url` with the default timeout.
    ///
    /// The URL is not contacted.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Validation`] for a malformed URL and
    /// [`UpstreamError::Unreachable`] if the HTTP stack cannot be set up.
    pub fn new(base_url: &str, api_key: ApiKey) -> Result<Self, UpstreamError> {
        Self::with_timeout(base_url, api_key, REQUEST_TIMEOUT)
    }

    /// Create a client with a custom per-call timeout.
    ///
    /// # Errors
    ///
    /// See [`UpstreamClient::new`].
    pub fn with_timeout(
        base_url: &str,
        api_key: ApiKey,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let base_url = normalize_base_url(base_url)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("scaleboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Unreachable {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            binding: RwLock::new(Binding { base_url, api_key }),
            timeout,
        })
    }

    /// The URL the client is currently bound to.
    pub async fn base_url(&self) -> String {
        self.binding.read().await.base_url.clone()
    }

    /// Rebind the client to a new URL and key.
    ///
    /// Calls already in flight finish with the binding they started with.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Validation`] for a malformed URL; the current
    /// binding is kept in that case.
    pub async fn update_config(&self, base_url: &str, api_key: ApiKey) -> Result<(), UpstreamError> {
        let base_url = normalize_base_url(base_url)?;
        let mut binding = self.binding.write().await;
        *binding = Binding {
            base_url: base_url.clone(),
            api_key,
        };
        drop(binding);
        tracing::info!(url = %base_url, "upstream client reconfigured");
        Ok(())
    }

    /// `GET path?query`.
    ///
    /// # Errors
    ///
    /// See [`UpstreamError`].
    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse, UpstreamError> {
        self.send(Method::GET, path, query, None).await
    }

    /// `POST path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`UpstreamError`].
    pub async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, UpstreamError> {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    /// `PUT path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`UpstreamError`].
    pub async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse, UpstreamError> {
        self.send(Method::PUT, path, &[], Some(body)).await
    }

    /// `DELETE path`.
    ///
    /// # Errors
    ///
    /// See [`UpstreamError`].
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, UpstreamError> {
        self.send(Method::DELETE, path, &[], None).await
    }

    /// Probe the upstream with a cheap read-only call (list users).
    pub async fn test_connection(&self) -> ConnectionReport {
        let started = Instant::now();
        match self.get(PROBE_PATH, &[]).await {
            Ok(response) => ConnectionReport {
                success: true,
                message: "Connection successful".to_owned(),
                error: None,
                data: Some(ConnectionData {
                    status: ConnectionStatus::Connected,
                    response_time: format!("{}ms", started.elapsed().as_millis()),
                    user_count: Some(count_users(&response.data)),
                }),
            },
            Err(e) => ConnectionReport {
                success: false,
                message: "Connection failed".to_owned(),
                error: Some(e.to_string()),
                data: Some(ConnectionData {
                    status: ConnectionStatus::Disconnected,
                    response_time: "N/A".to_owned(),
                    user_count: None,
                }),
            },
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<ApiResponse, UpstreamError> {
        let binding = self.binding.read().await.clone();
        let url = format!("{}{}", binding.base_url, path);

        let mut req = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(binding.api_key.expose());
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        tracing::debug!(method = %method, path = %path, "upstream request");

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                let err = if e.is_timeout() {
                    UpstreamError::Timeout {
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else {
                    UpstreamError::Unreachable {
                        reason: e.without_url().to_string(),
                    }
                };
                tracing::warn!(method = %method, path = %path, error = %err, "upstream request failed");
                return Err(err);
            }
        };

        let status = resp.status();
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) if e.is_timeout() => {
                return Err(UpstreamError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                });
            }
            Err(e) => {
                return Err(UpstreamError::InvalidResponse {
                    status: status.as_u16(),
                    reason: e.without_url().to_string(),
                });
            }
        };

        if status.is_success() {
            tracing::debug!(method = %method, path = %path, status = status.as_u16(), "upstream response");
            let data = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).map_err(|e| UpstreamError::InvalidResponse {
                    status: status.as_u16(),
                    reason: e.to_string(),
                })?
            };
            return Ok(ApiResponse {
                status: status.as_u16(),
                data,
            });
        }

        let message = error_message(&text)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_owned());
        tracing::warn!(method = %method, path = %path, status = status.as_u16(), "upstream rejected request");
        Err(UpstreamError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

/// Pull a human-readable message out of an error body.
///
/// Headscale answers errors with `{"code": .., "message": ".."}`; anything else
/// non-empty (a proxy's HTML page, say) is used as-is. Either way the result
/// is cut to [`MAX_ERROR_MESSAGE_CHARS`].
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(Value::String(message)) = map.get("message").or_else(|| map.get("error")) {
            return Some(truncate(message));
        }
    }
    Some(truncate(body))
}

fn truncate(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_MESSAGE_CHARS) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_owned(),
    }
}

/// Number of users in a list-users answer, either a bare array or
/// `{"users": [..]}`.
fn count_users(data: &Value) -> usize {
    match data {
        Value::Array(users) => users.len(),
        Value::Object(map) => map
            .get("users")
            .and_then(Value::as_array)
            .map_or(0, Vec::len),
        _ => 0,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    /// A local URL nothing listens on.
    fn dead_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}")
    }

    #[test]
    fn base_url_must_be_absolute_http() {
        assert_eq!(
            normalize_base_url("https://vpn.example.com/").unwrap(),
            "https://vpn.example.com"
        );
        assert!(normalize_base_url("http://10.0.0.1:8080").is_ok());
        for bad in ["", "vpn.example.com", "ftp://vpn.example.com", "not a url", "file:///etc"] {
            assert!(
                matches!(normalize_base_url(bad), Err(UpstreamError::Validation { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn get_sends_bearer_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/preauthkey"))
            .and(query_param("user", "alice"))
            .and(header("authorization", "Bearer abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"preAuthKeys": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = UpstreamClient::new(&server.uri(), ApiKey::new("abc123")).unwrap();
        let resp = client
            .get("/api/v1/preauthkey", &[("user", "alice")])
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.data, json!({"preAuthKeys": []}));
    }

    #[tokio::test]
    async fn post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/user"))
            .and(body_json(json!({"name": "alice"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {"id": "1"}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = UpstreamClient::new(&server.uri(), ApiKey::new("k")).unwrap();
        let resp = client.post("/api/v1/user", &json!({"name": "alice"})).await.unwrap();
        assert_eq!(resp.data["user"]["id"], "1");
    }

    #[tokio::test]
    async fn empty_success_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/node/7"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = UpstreamClient::new(&server.uri(), ApiKey::new("k")).unwrap();
        let resp = client.delete("/api/v1/node/7").await.unwrap();
        assert_eq!(resp.data, Value::Null);
    }

    #[tokio::test]
    async fn rejection_keeps_upstream_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/user"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"code": 16, "message": "Unauthorized"})),
            )
            .mount(&server)
            .await;

        let client = UpstreamClient::new(&server.uri(), ApiKey::new("wrong")).unwrap();
        let err = client.get("/api/v1/user", &[]).await.unwrap_err();
        assert!(matches!(
            &err,
            UpstreamError::Rejected { status: 401, message } if message == "Unauthorized"
        ));
        assert_eq!(err.status(), 401);
    }

    #[tokio::test]
    async fn long_html_error_page_is_truncated() {
        let server = MockServer::start().await;
        let page = format!("<html><body>{}</body></html>", "é".repeat(5_000));
        Mock::given(method("GET"))
            .and(path("/api/v1/node"))
            .respond_with(ResponseTemplate::new(502).set_body_string(page.clone()))
            .mount(&server)
            .await;

        let client = UpstreamClient::new(&server.uri(), ApiKey::new("k")).unwrap();
        let err = client.get("/api/v1/node", &[]).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Rejected { status: 502, .. }));
        let message = match err {
            UpstreamError::Rejected { message, .. } => message,
            _ => String::new(),
        };
        assert_eq!(message.chars().count(), MAX_ERROR_MESSAGE_CHARS + 3);
        assert!(message.ends_with("..."));
        assert!(page.starts_with(message.trim_end_matches("...")));
    }

    #[test]
    fn short_error_messages_are_kept_whole() {
        assert_eq!(error_message("bad gateway").as_deref(), Some("bad gateway"));
        assert_eq!(error_message("  "), None);
        let exact = "x".repeat(MAX_ERROR_MESSAGE_CHARS);
        assert_eq!(error_message(&exact), Some(exact));
    }

    #[tokio::test]
    async fn unreachable_host_maps_to_500() {
        let client = UpstreamClient::new(&dead_url(), ApiKey::new("k")).unwrap();
        let err = client.get("/api/v1/user", &[]).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Unreachable { .. }));
        assert_eq!(err.status(), 500);
    }

    #[tokio::test]
    async fn slow_upstream_times_out_with_synthetic_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client =
            UpstreamClient::with_timeout(&server.uri(), ApiKey::new("k"), Duration::from_millis(50))
                .unwrap();
        let err = client.get("/api/v1/user", &[]).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Timeout { .. }));
        assert_eq!(err.status(), crate::error::TIMEOUT_STATUS);
    }

    #[tokio::test]
    async fn errors_never_mention_the_key() {
        let client = UpstreamClient::new(&dead_url(), ApiKey::new("super-secret-key")).unwrap();
        let err = client.get("/api/v1/user", &[]).await.unwrap_err();
        assert!(!err.to_string().contains("super-secret-key"));

        let report = client.test_connection().await;
        assert!(!serde_json::to_string(&report).unwrap().contains("super-secret-key"));
    }

    #[tokio::test]
    async fn test_connection_counts_users() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/user"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"users": [{"name": "a"}, {"name": "b"}]})),
            )
            .mount(&server)
            .await;

        let client = UpstreamClient::new(&server.uri(), ApiKey::new("k")).unwrap();
        let report = client.test_connection().await;
        assert!(report.success);
        assert_eq!(report.message, "Connection successful");
        let data = report.data.unwrap();
        assert_eq!(data.status, ConnectionStatus::Connected);
        assert_eq!(data.user_count, Some(2));
        assert!(data.response_time.ends_with("ms"));
    }

    #[tokio::test]
    async fn test_connection_reports_disconnected() {
        let client = UpstreamClient::new(&dead_url(), ApiKey::new("k")).unwrap();
        let report = client.test_connection().await;
        assert!(!report.success);
        assert_eq!(report.message, "Connection failed");
        assert!(report.error.is_some());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["data"]["status"], "disconnected");
        assert_eq!(json["data"]["responseTime"], "N/A");
    }

    #[tokio::test]
    async fn update_config_rebinds_url_and_key() {
        let old = MockServer::start().await;
        let new = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer new-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&new)
            .await;

        let client = UpstreamClient::new(&old.uri(), ApiKey::new("old-key")).unwrap();
        client.update_config(&new.uri(), ApiKey::new("new-key")).await.unwrap();
        assert_eq!(client.base_url().await, new.uri());

        client.get("/api/v1/user", &[]).await.unwrap();
        assert!(old.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_config_with_bad_url_keeps_binding() {
        let client = UpstreamClient::new("https://vpn.example.com", ApiKey::new("k")).unwrap();
        let result = client.update_config("nope", ApiKey::new("other")).await;
        assert!(matches!(result, Err(UpstreamError::Validation { .. })));
        assert_eq!(client.base_url().await, "https://vpn.example.com");
    }

    #[test]
    fn error_message_prefers_message_field() {
        assert_eq!(error_message(r#"{"message":"boom"}"#).as_deref(), Some("boom"));
        assert_eq!(error_message(r#"{"error":"bad"}"#).as_deref(), Some("bad"));
        assert_eq!(error_message("plain text").as_deref(), Some("plain text"));
        assert_eq!(error_message("  "), None);
    }
}
