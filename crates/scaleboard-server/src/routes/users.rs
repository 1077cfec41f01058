//! User routes: `/api/users/*`

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use super::{Envelope, created, done, ok, take_items};
use crate::error::AppError;
use crate::state::AppState;
use crate::validate::{require_fields, sanitize_input};

/// Build the `/api/users` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{name}", delete(delete_user))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<Vec<Value>>>, AppError> {
    let result = state.provider().await.list_users().await?;
    Ok(ok(take_items(result.data, "users")))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Value>>), AppError> {
    let Json(body) = body?;
    require_fields(&[("username", body.username.as_deref())])?;
    let username = sanitize_input(body.username.as_deref().unwrap_or_default());

    let result = state.provider().await.create_user(&username).await?;
    tracing::info!(username = %username, "user created");
    Ok(created("User created successfully", result.data))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let username = sanitize_input(&name);
    state.provider().await.delete_user(&username).await?;
    tracing::info!(username = %username, "user deleted");
    Ok(done("User deleted successfully"))
}
