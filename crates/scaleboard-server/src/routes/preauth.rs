//! Preauth key routes: `/api/preauth/*`

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use scaleboard_core::duration::is_valid_duration;
use scaleboard_core::provider::PreauthKeyOptions;

use super::apikeys::invalid_expiration;
use super::{Envelope, created, done, ok, take_items};
use crate::error::AppError;
use crate::format::{bool_label, extract_user_name, first_set, format_timestamp, text};
use crate::state::AppState;
use crate::validate::{require_fields, sanitize_input};

/// Expiration applied when the request names none.
const DEFAULT_EXPIRATION: &str = "48h";

/// Build the `/api/preauth` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_preauth_keys).post(create_preauth_key))
        .route("/expire", post(expire_preauth_key))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListPreauthQuery {
    pub user: Option<String>,
}

/// One row of the preauth keys table.
#[derive(Debug, Serialize)]
pub struct PreauthKeyRow {
    pub id: String,
    pub user: String,
    pub key: String,
    pub reusable: String,
    pub ephemeral: String,
    pub used: String,
    pub expiration: String,
    pub created: String,
}

impl PreauthKeyRow {
    fn from_upstream(key: &Value) -> Self {
        Self {
            id: text(first_set(key, &["id"])),
            user: extract_user_name(first_set(key, &["user"])),
            key: text(first_set(key, &["key"])),
            reusable: bool_label(first_set(key, &["reusable"])),
            ephemeral: bool_label(first_set(key, &["ephemeral"])),
            used: bool_label(first_set(key, &["used"])),
            expiration: format_timestamp(first_set(key, &["expiration"])),
            created: format_timestamp(first_set(key, &["createdAt", "created"])),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePreauthKeyRequest {
    pub user: Option<String>,
    pub expiration: Option<String>,
    /// `true` or `"true"`; anything else is false.
    #[serde(default)]
    pub reusable: Value,
    #[serde(default)]
    pub ephemeral: Value,
}

#[derive(Debug, Deserialize)]
pub struct ExpirePreauthKeyRequest {
    pub user: Option<String>,
    pub key: Option<String>,
}

fn is_true(flag: &Value) -> bool {
    match flag {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn list_preauth_keys(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListPreauthQuery>, QueryRejection>,
) -> Result<Json<Envelope<Vec<PreauthKeyRow>>>, AppError> {
    let Query(query) = query?;
    let user = query
        .user
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest {
            code: "missing_parameter",
            message: "User parameter is required".to_owned(),
        })?;

    let result = state.provider().await.list_preauth_keys(&user).await?;
    let rows = take_items(result.data, "preAuthKeys")
        .iter()
        .map(PreauthKeyRow::from_upstream)
        .collect();
    Ok(ok(rows))
}

async fn create_preauth_key(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreatePreauthKeyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Value>>), AppError> {
    let Json(body) = body?;
    require_fields(&[("user", body.user.as_deref())])?;
    let user = sanitize_input(body.user.as_deref().unwrap_or_default());

    let expiration = body
        .expiration
        .as_deref()
        .map(sanitize_input)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| DEFAULT_EXPIRATION.to_owned());
    if !is_valid_duration(&expiration) {
        return Err(invalid_expiration());
    }

    let options = PreauthKeyOptions {
        expiration: Some(expiration),
        reusable: is_true(&body.reusable),
        ephemeral: is_true(&body.ephemeral),
    };

    let result = state
        .provider()
        .await
        .create_preauth_key(&user, &options)
        .await?;
    tracing::info!(
        user = %user,
        reusable = options.reusable,
        ephemeral = options.ephemeral,
        "preauth key created"
    );
    Ok(created("Preauth key created successfully", result.data))
}

async fn expire_preauth_key(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ExpirePreauthKeyRequest>, JsonRejection>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let Json(body) = body?;
    require_fields(&[("user", body.user.as_deref()), ("key", body.key.as_deref())])?;
    let user = sanitize_input(body.user.as_deref().unwrap_or_default());
    let key = sanitize_input(body.key.as_deref().unwrap_or_default());

    state.provider().await.expire_preauth_key(&user, &key).await?;
    tracing::info!(user = %user, "preauth key expired");
    Ok(done("Preauth key expired successfully"))
}
