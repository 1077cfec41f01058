//! Health check: `/api/health`
//!
//! Probes the live upstream binding. Answers 200 when the upstream responds
//! and 503 otherwise, so container health checks can use it directly. The
//! docker provider serves nothing, so it always reports unhealthy without
//! contacting the upstream.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use scaleboard_core::client::ConnectionReport;
use scaleboard_core::provider::ProviderKind;
use serde::Serialize;

use crate::state::AppState;

/// Build the `/api/health` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(health))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub provider: String,
    pub headscale: UpstreamHealth,
}

#[derive(Debug, Serialize)]
pub struct UpstreamHealth {
    pub connected: bool,
    pub url: String,
    pub message: String,
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let kind = state.providers.kind();
    let report = match kind {
        ProviderKind::Api => state.client.test_connection().await,
        ProviderKind::Local => ConnectionReport::rejected(format!(
            "The {kind} provider is not implemented"
        )),
    };
    let (status_code, status) = if report.success {
        (StatusCode::OK, "healthy")
    } else {
        tracing::warn!(message = %report.message, "health check failed");
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let body = HealthResponse {
        status,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        version: env!("CARGO_PKG_VERSION"),
        provider: kind.to_string(),
        headscale: UpstreamHealth {
            connected: report.success,
            url: state.client.base_url().await,
            message: report.message,
        },
    };
    (status_code, Json(body))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use scaleboard_core::provider::ProviderKind;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    use crate::test_support::{TestApp, body_json};

    #[tokio::test]
    async fn healthy_when_upstream_answers() {
        let app = TestApp::spawn().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"users": []})))
            .mount(&app.upstream)
            .await;

        let response = app.get("/api/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["provider"], "api");
        assert_eq!(json["headscale"]["connected"], true);
        assert_eq!(json["headscale"]["url"], app.upstream.uri());
    }

    #[tokio::test]
    async fn unhealthy_when_upstream_rejects() {
        let app = TestApp::spawn().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/user"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&app.upstream)
            .await;

        let response = app.get("/api/health").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["headscale"]["message"], "Connection failed");
    }

    #[tokio::test]
    async fn docker_provider_is_unhealthy_without_upstream_call() {
        let app = TestApp::with_provider(ProviderKind::Local).await;

        let response = app.get("/api/health").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["provider"], "docker");
        assert_eq!(json["headscale"]["connected"], false);
        assert_eq!(json["headscale"]["message"], "The docker provider is not implemented");
        assert!(app.upstream.received_requests().await.unwrap().is_empty());
    }
}
