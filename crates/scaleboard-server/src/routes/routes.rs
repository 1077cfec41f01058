//! Subnet route routes: `/api/routes/*`
//!
//! Headscale keeps routes on the node objects, so the listing is derived from
//! the node list and only nodes that advertise something are shown.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Envelope, done, done_with, ok, take_items};
use crate::error::AppError;
use crate::format::{array_to_string, first_set, text};
use crate::state::AppState;
use crate::validate::{is_valid_cidr, require_id, sanitize_input};

/// Build the `/api/routes` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_routes))
        .route("/{id}/enable", post(enable_route))
        .route("/{id}/disable", post(disable_route))
}

// ── Request / Response types ─────────────────────────────────────────

/// Routes of one node.
#[derive(Debug, Serialize)]
pub struct RouteRow {
    pub id: String,
    pub hostname: String,
    pub approved: String,
    pub available: String,
    pub serving_primary: String,
}

impl RouteRow {
    /// `None` when the node neither advertises nor serves any route.
    fn from_node(node: &Value) -> Option<Self> {
        let row = Self {
            id: text(first_set(node, &["id"])),
            hostname: text(first_set(node, &["givenName", "hostname", "name"])),
            approved: array_to_string(first_set(node, &["approvedRoutes"])),
            available: array_to_string(first_set(node, &["availableRoutes"])),
            serving_primary: array_to_string(first_set(node, &["subnetRoutes", "primaryRoutes"])),
        };
        let has_routes =
            !(row.approved.is_empty() && row.available.is_empty() && row.serving_primary.is_empty());
        has_routes.then_some(row)
    }
}

#[derive(Debug, Deserialize)]
pub struct EnableRouteRequest {
    pub routes: Option<Vec<String>>,
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn list_routes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<Vec<RouteRow>>>, AppError> {
    let result = state.provider().await.list_routes().await?;
    let rows = take_items(result.data, "nodes")
        .iter()
        .filter_map(RouteRow::from_node)
        .collect();
    Ok(ok(rows))
}

async fn enable_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<EnableRouteRequest>, JsonRejection>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let node_id = require_id(&id, "Route")?;
    let Json(body) = body?;
    let routes: Vec<String> = body
        .routes
        .unwrap_or_default()
        .iter()
        .map(|r| sanitize_input(r))
        .collect();
    if routes.is_empty() {
        return Err(AppError::MissingFields(vec!["routes"]));
    }
    if let Some(bad) = routes.iter().find(|r| !is_valid_cidr(r)) {
        return Err(AppError::BadRequest {
            code: "invalid_route",
            message: format!("'{bad}' is not a valid CIDR prefix"),
        });
    }

    let result = state.provider().await.enable_route(node_id, &routes).await?;
    tracing::info!(node_id, ?routes, "routes enabled");
    Ok(done_with("Route enabled successfully", result.data))
}

async fn disable_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let node_id = require_id(&id, "Route")?;
    state.provider().await.disable_route(node_id).await?;
    tracing::info!(node_id, "routes disabled");
    Ok(done("Route disabled successfully"))
}
