//! HTTP route handlers for the Scaleboard API.
//!
//! Each submodule exposes a `router()` that is nested under `/api` by
//! [`router`]. Successful responses share the [`Envelope`] shape
//! `{success, message?, data?}`; failures go through [`AppError`].

pub mod apikeys;
pub mod health;
pub mod nodes;
pub mod policy;
pub mod preauth;
pub mod routes;
pub mod settings;
pub mod users;

use std::sync::Arc;

use axum::extract::OriginalUri;
use axum::http::{Method, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;

/// Build the `/api` router. `strict` guards the credential endpoints.
pub fn router(strict: &Arc<RateLimiter>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .nest("/users", users::router())
        .nest("/nodes", nodes::router())
        .nest("/apikeys", apikeys::router())
        .nest("/preauth", preauth::router())
        .nest("/routes", routes::router())
        .nest("/policy", policy::router())
        .nest("/settings", settings::router(strict))
        .nest("/health", health::router())
        .fallback(not_found)
}

// ── Response envelope ────────────────────────────────────────────────

/// Success body shared by every resource route.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// `{success: true, data}`
pub fn ok<T>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: None,
        data: Some(data),
    })
}

/// `{success: true, message}`
pub fn done(message: &'static str) -> Json<Envelope<Value>> {
    Json(Envelope {
        success: true,
        message: Some(message),
        data: None,
    })
}

/// `{success: true, message, data}`
pub fn done_with<T>(message: &'static str, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: Some(message),
        data: Some(data),
    })
}

/// 201 with `{success: true, message, data}`.
pub fn created<T>(message: &'static str, data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, done_with(message, data))
}

/// Move the array stored under `key` out of an upstream body.
///
/// Missing keys and non-array values yield an empty list.
pub fn take_items(mut data: Value, key: &str) -> Vec<Value> {
    match data.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

/// API index listing the mounted endpoints.
async fn index() -> Json<Value> {
    Json(json!({
        "message": "Scaleboard API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "users": "/api/users",
            "nodes": "/api/nodes",
            "apikeys": "/api/apikeys",
            "preauth": "/api/preauth",
            "routes": "/api/routes",
            "policy": "/api/policy",
            "settings": "/api/settings",
            "health": "/api/health",
        },
    }))
}

/// JSON 404 for unknown paths.
pub async fn not_found(method: Method, OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(format!("Route {method} {} not found", uri.path()))
}
