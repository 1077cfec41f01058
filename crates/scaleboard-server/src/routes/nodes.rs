//! Node routes: `/api/nodes/*`
//!
//! Listing flattens Headscale's node objects into table rows; mutating routes
//! validate ids and keys before anything reaches the provider.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Envelope, created, done, done_with, ok, take_items};
use crate::error::AppError;
use crate::format::{array_to_string, bool_label, extract_user_name, first_set, format_timestamp, text};
use crate::state::AppState;
use crate::validate::{NODE_KEY_PREFIX, is_valid_node_key, require_fields, require_id, sanitize_input};

/// Prefix Headscale requires on ACL tags.
const TAG_PREFIX: &str = "tag:";

/// Build the `/api/nodes` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_nodes))
        .route("/register", post(register_node))
        .route("/{id}", delete(delete_node))
        .route("/{id}/rename", post(rename_node))
        .route("/{id}/tags", post(set_tags))
}

// ── Request / Response types ─────────────────────────────────────────

/// One row of the nodes table.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct NodeRow {
    pub id: String,
    pub hostname: String,
    pub name: String,
    pub machine_key: String,
    pub node_key: String,
    pub user: String,
    pub ip_addresses: String,
    pub tags: String,
    pub ephemeral: String,
    pub last_seen: String,
    pub expiration: String,
    pub connected: String,
    pub expired: String,
}

impl NodeRow {
    fn from_upstream(node: &Value) -> Self {
        Self {
            id: text(first_set(node, &["id"])),
            hostname: text(first_set(node, &["hostname", "name"])),
            name: text(first_set(node, &["givenName", "name"])),
            machine_key: text(first_set(node, &["machineKey"])),
            node_key: text(first_set(node, &["nodeKey"])),
            user: extract_user_name(first_set(node, &["user"])),
            ip_addresses: array_to_string(first_set(node, &["ipAddresses", "addresses"])),
            tags: array_to_string(first_set(node, &["validTags", "forcedTags", "tags"])),
            ephemeral: bool_label(first_set(node, &["ephemeral"])),
            last_seen: format_timestamp(first_set(node, &["lastSeen", "last_seen"])),
            expiration: format_timestamp(first_set(node, &["expiry", "expiration"])),
            connected: bool_label(first_set(node, &["online", "connected"])),
            expired: bool_label(first_set(node, &["expired"])),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterNodeRequest {
    pub user: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameNodeRequest {
    pub hostname: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetTagsRequest {
    pub tags: Option<Vec<String>>,
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn list_nodes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<Vec<NodeRow>>>, AppError> {
    let result = state.provider().await.list_nodes().await?;
    let rows = take_items(result.data, "nodes")
        .iter()
        .map(NodeRow::from_upstream)
        .collect();
    Ok(ok(rows))
}

async fn register_node(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RegisterNodeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Value>>), AppError> {
    let Json(body) = body?;
    require_fields(&[("user", body.user.as_deref()), ("key", body.key.as_deref())])?;
    let user = sanitize_input(body.user.as_deref().unwrap_or_default());
    let key = sanitize_input(body.key.as_deref().unwrap_or_default());

    if !is_valid_node_key(&key) {
        return Err(AppError::BadRequest {
            code: "invalid_node_key",
            message: format!("Key must start with \"{NODE_KEY_PREFIX}\""),
        });
    }

    let result = state.provider().await.register_node(&user, &key).await?;
    tracing::info!(user = %user, "node registered");
    Ok(created("Node registered successfully", result.data))
}

async fn rename_node(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<RenameNodeRequest>, JsonRejection>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let node_id = require_id(&id, "Node")?;
    let Json(body) = body?;
    require_fields(&[("hostname", body.hostname.as_deref())])?;
    let hostname = sanitize_input(body.hostname.as_deref().unwrap_or_default());

    let result = state.provider().await.rename_node(node_id, &hostname).await?;
    tracing::info!(node_id, hostname = %hostname, "node renamed");
    Ok(done_with("Node renamed successfully", result.data))
}

async fn set_tags(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<SetTagsRequest>, JsonRejection>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let node_id = require_id(&id, "Node")?;
    let Json(body) = body?;
    let tags: Vec<String> = body
        .tags
        .ok_or_else(|| AppError::MissingFields(vec!["tags"]))?
        .iter()
        .map(|t| sanitize_input(t))
        .collect();

    if let Some(bad) = tags
        .iter()
        .find(|t| !t.starts_with(TAG_PREFIX) || t.len() == TAG_PREFIX.len())
    {
        return Err(AppError::BadRequest {
            code: "invalid_tag",
            message: format!("Invalid tag '{bad}': tags must look like \"{TAG_PREFIX}name\""),
        });
    }

    let result = state.provider().await.set_node_tags(node_id, &tags).await?;
    tracing::info!(node_id, ?tags, "node tags updated");
    Ok(done_with("Node tags updated successfully", result.data))
}

async fn delete_node(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let node_id = require_id(&id, "Node")?;
    state.provider().await.delete_node(node_id).await?;
    tracing::info!(node_id, "node deleted");
    Ok(done("Node deleted successfully"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_json as body_matches, method, path};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::test_support::{TestApp, body_json};

    #[test]
    fn rows_are_flattened_for_the_table() {
        let row = NodeRow::from_upstream(&json!({
            "id": "7",
            "machineKey": "mkey:aa",
            "nodeKey": "nodekey:bb",
            "ipAddresses": ["100.64.0.7", "fd7a:115c:a1e0::7"],
            "name": "laptop",
            "givenName": "alice-laptop",
            "user": {"id": "1", "name": "alice"},
            "lastSeen": "2024-05-01T08:00:00Z",
            "expiry": {"seconds": 0},
            "online": true,
            "validTags": ["tag:dev"],
        }));
        assert_eq!(row.id, "7");
        assert_eq!(row.hostname, "laptop");
        assert_eq!(row.name, "alice-laptop");
        assert_eq!(row.user, "alice");
        assert_eq!(row.ip_addresses, "100.64.0.7, fd7a:115c:a1e0::7");
        assert_eq!(row.tags, "tag:dev");
        assert_eq!(row.last_seen, "2024-05-01 08:00:00");
        assert_eq!(row.expiration, "");
        assert_eq!(row.connected, "yes");
        assert_eq!(row.expired, "no");
        assert_eq!(row.ephemeral, "no");
    }

    #[tokio::test]
    async fn list_formats_nodes() {
        let app = TestApp::spawn().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/node"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nodes": [{"id": "1", "name": "web", "user": {"name": "ops"}, "online": false}]
            })))
            .mount(&app.upstream)
            .await;

        let json = body_json(app.get("/api/nodes").await).await;
        assert_eq!(json["data"][0]["hostname"], "web");
        assert_eq!(json["data"][0]["user"], "ops");
        assert_eq!(json["data"][0]["connected"], "no");
    }

    #[tokio::test]
    async fn register_requires_node_key_prefix() {
        let app = TestApp::spawn().await;
        let response = app
            .post("/api/nodes/register", json!({"user": "alice", "key": "mkey:abc"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_node_key");

        let response = app.post("/api/nodes/register", json!({"user": "alice"})).await;
        assert_eq!(body_json(response).await["missing"], json!(["key"]));
    }

    #[tokio::test]
    async fn register_answers_201() {
        let app = TestApp::spawn().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/node/register"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"node": {"id": "9"}})))
            .expect(1)
            .mount(&app.upstream)
            .await;

        let response = app
            .post("/api/nodes/register", json!({"user": "alice", "key": "nodekey:abc"}))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["message"], "Node registered successfully");
    }

    #[tokio::test]
    async fn bad_ids_never_reach_the_upstream() {
        let app = TestApp::spawn().await;
        for uri in ["/api/nodes/0", "/api/nodes/abc", "/api/nodes/01"] {
            let response = app.delete(uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
        let response = app.post("/api/nodes/-3/rename", json!({"hostname": "x"})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(app.upstream.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rename_uses_hostname_field() {
        let app = TestApp::spawn().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/node/4/rename/db-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"node": {"givenName": "db-01"}})))
            .expect(1)
            .mount(&app.upstream)
            .await;

        let response = app.post("/api/nodes/4/rename", json!({"hostname": "db-01"})).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "Node renamed successfully");
    }

    #[tokio::test]
    async fn tags_are_validated_then_forwarded() {
        let app = TestApp::spawn().await;
        let response = app.post("/api/nodes/4/tags", json!({"tags": ["web"]})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_tag");

        Mock::given(method("POST"))
            .and(path("/api/v1/node/4/tags"))
            .and(body_matches(json!({"tags": ["tag:web", "tag:prod"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"node": {}})))
            .expect(1)
            .mount(&app.upstream)
            .await;
        let response = app
            .post("/api/nodes/4/tags", json!({"tags": ["tag:web", " tag:prod "]}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn delete_answers_message_only() {
        let app = TestApp::spawn().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/node/12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&app.upstream)
            .await;

        let json = body_json(app.delete("/api/nodes/12").await).await;
        assert_eq!(json, json!({"success": true, "message": "Node deleted successfully"}));
    }
}
