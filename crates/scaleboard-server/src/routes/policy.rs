//! ACL policy routes: `/api/policy`

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use super::{Envelope, done_with, ok};
use crate::error::AppError;
use crate::state::AppState;

/// Build the `/api/policy` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_policy).put(set_policy))
}

// ── Request / Response types ─────────────────────────────────────────

/// The policy may arrive as the raw HuJSON text or as a parsed JSON document.
#[derive(Debug, Deserialize)]
pub struct SetPolicyRequest {
    #[serde(default)]
    pub policy: Value,
}

impl SetPolicyRequest {
    fn document(&self) -> Option<String> {
        match &self.policy {
            Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
            Value::Object(_) | Value::Array(_) => Some(self.policy.to_string()),
            _ => None,
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn get_policy(State(state): State<Arc<AppState>>) -> Result<Json<Envelope<Value>>, AppError> {
    let result = state.provider().await.get_policy().await?;
    Ok(ok(result.data))
}

async fn set_policy(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SetPolicyRequest>, JsonRejection>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let Json(body) = body?;
    let document = body.document().ok_or_else(|| AppError::BadRequest {
        code: "missing_policy",
        message: "Policy is required in request body".to_owned(),
    })?;

    let result = state.provider().await.set_policy(&document).await?;
    tracing::warn!(bytes = document.len(), "policy replaced through the API");
    Ok(done_with("Policy updated successfully", result.data))
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
    async fn get_passes_upstream_body_through() {
        let app = TestApp::spawn().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/policy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "policy": "{\"acls\":[]}",
                "updatedAt": "2024-01-01T00:00:00Z"
            })))
            .mount(&app.upstream)
            .await;

        let json = body_json(app.get("/api/policy").await).await;
        assert_eq!(json["data"]["policy"], "{\"acls\":[]}");
    }

    #[tokio::test]
    async fn put_requires_policy() {
        let app = TestApp::spawn().await;
        for body in [json!({}), json!({"policy": ""}), json!({"policy": 3})] {
            let response = app.put("/api/policy", body).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                body_json(response).await["message"],
                "Policy is required in request body"
            );
        }
    }

    #[tokio::test]
    async fn put_serializes_object_policies() {
        let app = TestApp::spawn().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/policy"))
            .and(body_matches(json!({"policy": "{\"acls\":[]}"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"policy": "{\"acls\":[]}"})))
            .expect(1)
            .mount(&app.upstream)
            .await;

        let response = app.put("/api/policy", json!({"policy": {"acls": []}})).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "Policy updated successfully");
    }
}
