//! Headscale API key routes: `/api/apikeys/*`

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use scaleboard_core::duration::is_valid_duration;

use super::{Envelope, created, done, ok, take_items};
use crate::error::AppError;
use crate::state::AppState;
use crate::validate::{require_fields, sanitize_input};

/// Build the `/api/apikeys` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_api_keys).post(create_api_key))
        .route("/expire", post(expire_api_key))
}

/// Shared 400 for malformed relative expirations.
pub(crate) fn invalid_expiration() -> AppError {
    AppError::BadRequest {
        code: "invalid_expiration",
        message: "Expiration must be in format like 48h, 7d, 90d".to_owned(),
    }
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateApiKeyRequest {
    pub expiration: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExpireApiKeyRequest {
    pub prefix: Option<String>,
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn list_api_keys(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<Vec<Value>>>, AppError> {
    let result = state.provider().await.list_api_keys().await?;
    Ok(ok(take_items(result.data, "apiKeys")))
}

async fn create_api_key(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateApiKeyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Value>>), AppError> {
    let Json(body) = body?;
    let expiration = body
        .expiration
        .as_deref()
        .map(sanitize_input)
        .filter(|e| !e.is_empty());

    if expiration.as_deref().is_some_and(|e| !is_valid_duration(e)) {
        return Err(invalid_expiration());
    }

    let result = state
        .provider()
        .await
        .create_api_key(expiration.as_deref())
        .await?;
    tracing::info!(expiration = expiration.as_deref().unwrap_or("none"), "API key created");
    Ok(created("API key created successfully", result.data))
}

async fn expire_api_key(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ExpireApiKeyRequest>, JsonRejection>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let Json(body) = body?;
    require_fields(&[("prefix", body.prefix.as_deref())])?;
    let prefix = sanitize_input(body.prefix.as_deref().unwrap_or_default());

    state.provider().await.expire_api_key(&prefix).await?;
    tracing::info!(prefix = %prefix, "API key expired");
    Ok(done("API key expired successfully"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_json as body_matches, method, path};
    use wiremock::{Mock, ResponseTemplate};

    use crate::test_support::{TestApp, body_json};

    #[tokio::test]
    async fn list_returns_api_keys() {
        let app = TestApp::spawn().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/apikey"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "apiKeys": [{"id": "1", "prefix": "abcdef"}]
            })))
            .mount(&app.upstream)
            .await;

        let json = body_json(app.get("/api/apikeys").await).await;
        assert_eq!(json["data"][0]["prefix"], "abcdef");
    }

    #[tokio::test]
    async fn create_rejects_bad_expiration_locally() {
        let app = TestApp::spawn().await;
        let response = app.post("/api/apikeys", json!({"expiration": "soon"})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_expiration");
        assert!(app.upstream.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_without_expiration_sends_empty_body() {
        let app = TestApp::spawn().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/apikey"))
            .and(body_matches(json!({})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"apiKey": "abc.def"})))
            .expect(1)
            .mount(&app.upstream)
            .await;

        let response = app.post("/api/apikeys", json!({})).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["message"], "API key created successfully");
        assert_eq!(json["data"]["apiKey"], "abc.def");
    }

    #[tokio::test]
    async fn expire_requires_prefix() {
        let app = TestApp::spawn().await;
        let response = app.post("/api/apikeys/expire", json!({"prefix": ""})).await;
        assert_eq!(body_json(response).await["missing"], json!(["prefix"]));

        Mock::given(method("POST"))
            .and(path("/api/v1/apikey/expire"))
            .and(body_matches(json!({"prefix": "abcdef"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&app.upstream)
            .await;
        let response = app.post("/api/apikeys/expire", json!({"prefix": "abcdef"})).await;
        assert_eq!(body_json(response).await["message"], "API key expired successfully");
    }
}
