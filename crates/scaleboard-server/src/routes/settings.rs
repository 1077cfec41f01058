//! Settings routes: `/api/settings/*`
//!
//! The two credential endpoints (`POST /` and `POST /test-connection`) share
//! the strict limiter. The API key is accepted here but never returned; reads
//! expose only a display prefix.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::handler::Handler;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use scaleboard_core::client::{ConnectionReport, normalize_base_url};
use scaleboard_core::crypto::ApiKey;
use scaleboard_core::preferences::{Preferences, PreferencesUpdate};
use scaleboard_core::settings::SettingsView;

use super::{Envelope, done, ok};
use crate::error::AppError;
use crate::rate_limit::{self, RateLimiter};
use crate::state::AppState;
use crate::validate::require_fields;

/// Build the `/api/settings` router.
pub fn router(strict: &Arc<RateLimiter>) -> Router<Arc<AppState>> {
    let limited = middleware::from_fn_with_state(Arc::clone(strict), rate_limit::enforce);

    Router::new()
        .route(
            "/",
            get(get_settings).post(update_settings.layer(limited.clone())),
        )
        .route("/test-connection", post(test_connection.layer(limited)))
        .route("/preferences", put(update_preferences))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

impl CredentialsRequest {
    fn into_parts(self) -> Result<(String, ApiKey), AppError> {
        require_fields(&[("url", self.url.as_deref()), ("apiKey", self.api_key.as_deref())])?;
        let url = self.url.unwrap_or_default().trim().to_owned();
        let api_key = ApiKey::new(self.api_key.unwrap_or_default().trim());
        Ok((url, api_key))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesRequest {
    pub language: Option<String>,
    pub theme: Option<String>,
    /// Absent leaves the logo alone; `null` removes it.
    #[serde(default, deserialize_with = "present")]
    pub custom_logo: Option<Option<String>>,
}

/// Distinguish an explicit `null` from an absent field.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn invalid_url() -> AppError {
    AppError::BadRequest {
        code: "invalid_url",
        message: "Please provide a valid HTTP/HTTPS URL".to_owned(),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Current settings without the API key.
async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<SettingsView>>, AppError> {
    Ok(ok(state.settings.get_settings().await?))
}

/// Probe a candidate URL and key. Nothing is stored.
async fn test_connection(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<ConnectionReport>, AppError> {
    let Json(body) = body?;
    let (url, api_key) = body.into_parts()?;
    if normalize_base_url(&url).is_err() {
        return Err(invalid_url());
    }

    let report = state.settings.test_connection(&url, &api_key).await;
    tracing::info!(url = %url, success = report.success, "connection test performed");
    Ok(Json(report))
}

/// Validate, probe, persist and rebind the live client.
async fn update_settings(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let Json(body) = body?;
    let (url, api_key) = body.into_parts()?;

    state.settings.update_settings(&url, api_key).await?;
    state.providers.reset_provider().await;
    Ok(done("Settings updated and connection successful"))
}

/// Merge language, theme and logo changes.
async fn update_preferences(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PreferencesRequest>, JsonRejection>,
) -> Result<Json<Envelope<Preferences>>, AppError> {
    let Json(body) = body?;
    let update = PreferencesUpdate::parse(
        body.language.as_deref(),
        body.theme.as_deref(),
        body.custom_logo,
    )?;

    let preferences = state.settings.update_preferences(&update).await?;
    tracing::info!(
        language = %preferences.language,
        theme = %preferences.theme,
        has_logo = preferences.custom_logo.is_some(),
        "preferences updated"
    );
    Ok(ok(preferences))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::test_support::{TEST_API_KEY, TestApp, body_json};

    /// A port nothing listens on.
    const DEAD_URL: &str = "http://127.0.0.1:1";

    async fn healthy_upstream(key: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/user"))
            .and(header("authorization", format!("Bearer {key}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [{"name": "alice"}, {"name": "bob"}]
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn get_returns_prefix_and_default_preferences() {
        let app = TestApp::spawn().await;
        let response = app.get("/api/settings").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let data = &json["data"];
        assert_eq!(data["headscaleUrl"], app.upstream.uri());
        assert_eq!(data["lastConnection"], serde_json::Value::Null);
        assert_eq!(
            data["preferences"],
            json!({"language": "fr", "theme": "dark", "customLogo": null})
        );
        let prefix = data["apiKeyPrefix"].as_str().unwrap();
        assert!(!prefix.is_empty() && TEST_API_KEY.starts_with(prefix) && prefix != TEST_API_KEY);
        assert!(!json.to_string().contains(TEST_API_KEY));
    }

    #[tokio::test]
    async fn test_connection_reports_success_with_user_count() {
        let app = TestApp::spawn().await;
        let candidate = healthy_upstream("candidate-key").await;

        let response = app
            .post(
                "/api/settings/test-connection",
                json!({"url": candidate.uri(), "apiKey": "candidate-key"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["status"], "connected");
        assert_eq!(json["data"]["userCount"], 2);
        assert!(json["data"]["responseTime"].as_str().unwrap().ends_with("ms"));
    }

    #[tokio::test]
    async fn test_connection_to_unreachable_url_changes_nothing() {
        let app = TestApp::spawn().await;
        let before = body_json(app.get("/api/settings").await).await;

        let response = app
            .post(
                "/api/settings/test-connection",
                json!({"url": DEAD_URL, "apiKey": "whatever"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Connection failed");
        assert_eq!(json["data"]["status"], "disconnected");

        let after = body_json(app.get("/api/settings").await).await;
        assert_eq!(before, after);
        assert_eq!(app.state.client.base_url().await, app.upstream.uri());
    }

    #[tokio::test]
    async fn test_connection_validates_input() {
        let app = TestApp::spawn().await;
        let response = app
            .post("/api/settings/test-connection", json!({"url": "https://vpn.example.com"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["missing"], json!(["apiKey"]));

        let response = app
            .post(
                "/api/settings/test-connection",
                json!({"url": "ftp://vpn.example.com", "apiKey": "k"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_url");
    }

    #[tokio::test]
    async fn update_persists_then_rebinds_live_client() {
        let app = TestApp::spawn().await;
        let next = healthy_upstream("rotated-key").await;
        Mock::given(method("GET"))
            .and(path("/api/v1/node"))
            .and(header("authorization", "Bearer rotated-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"nodes": []})))
            .expect(1)
            .mount(&next)
            .await;

        let response = app
            .post("/api/settings", json!({"url": next.uri(), "apiKey": "rotated-key"}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"success": true, "message": "Settings updated and connection successful"})
        );

        let settings = body_json(app.get("/api/settings").await).await;
        assert_eq!(settings["data"]["headscaleUrl"], next.uri());
        assert!(settings["data"]["lastConnection"].is_string());

        let response = app.get("/api/nodes").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn failed_probe_is_400_and_keeps_record() {
        let app = TestApp::spawn().await;
        let before = body_json(app.get("/api/settings").await).await;

        let response = app
            .post("/api/settings", json!({"url": DEAD_URL, "apiKey": "new-key"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "connection_failed");
        assert!(json["message"].as_str().unwrap().starts_with("Connection test failed: "));

        assert_eq!(before, body_json(app.get("/api/settings").await).await);
        assert_eq!(app.state.client.base_url().await, app.upstream.uri());
    }

    #[tokio::test]
    async fn credential_endpoints_share_strict_limit() {
        let app = TestApp::spawn().await;
        let bad = json!({"url": DEAD_URL, "apiKey": "k"});

        for uri in ["/api/settings/test-connection", "/api/settings", "/api/settings/test-connection"] {
            let response = app.post(uri, bad.clone()).await;
            assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS, "{uri}");
        }

        let response = app.post("/api/settings", bad).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));
        let json = body_json(response).await;
        assert_eq!(json["error"], "rate_limited");
        assert!(json["message"].as_str().unwrap().contains("3 requests per 1 minute(s)"));

        let response = app.get("/api/settings").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn preferences_merge_and_validate() {
        let app = TestApp::spawn().await;

        for _ in 0..2 {
            let response = app.put("/api/settings/preferences", json!({"theme": "light"})).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                body_json(response).await["data"],
                json!({"language": "fr", "theme": "light", "customLogo": null})
            );
        }

        let logo = "data:image/png;base64,iVBORw0KGgo=";
        let json = body_json(
            app.put("/api/settings/preferences", json!({"language": "en", "customLogo": logo}))
                .await,
        )
        .await;
        assert_eq!(json["data"]["customLogo"], logo);
        assert_eq!(json["data"]["theme"], "light");

        let json = body_json(app.put("/api/settings/preferences", json!({"customLogo": null})).await).await;
        assert_eq!(json["data"]["customLogo"], serde_json::Value::Null);
        assert_eq!(json["data"]["language"], "en");

        let response = app.put("/api/settings/preferences", json!({"theme": "neon"})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = app
            .put("/api/settings/preferences", json!({"customLogo": "http://x/logo.png"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
