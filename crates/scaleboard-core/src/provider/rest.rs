//! Provider backed by the Headscale v1 REST API.

use std::sync::Arc;

use serde_json::{Value, json};

use super::{PreauthKeyOptions, Provider, ProviderResult};
use crate::client::UpstreamClient;
use crate::duration::duration_to_timestamp;
use crate::error::UpstreamError;

/// Convert a relative expiration into the RFC 3339 timestamp Headscale wants.
fn expiration_timestamp(expiration: &str) -> Result<String, UpstreamError> {
    let timestamp = duration_to_timestamp(expiration).map_err(|e| UpstreamError::Validation {
        reason: e.to_string(),
    })?;
    tracing::debug!(duration = %expiration, timestamp = %timestamp, "converted duration to timestamp");
    Ok(timestamp)
}

fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// REST API implementation of [`Provider`].
#[derive(Debug, Clone)]
pub struct RestApiProvider {
    client: Arc<UpstreamClient>,
}

impl RestApiProvider {
    #[must_use]
    pub fn new(client: Arc<UpstreamClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Provider for RestApiProvider {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn list_users(&self) -> ProviderResult {
        self.client.get("/api/v1/user", &[]).await
    }

    async fn create_user(&self, name: &str) -> ProviderResult {
        tracing::info!(user = %name, "creating user");
        self.client.post("/api/v1/user", &json!({ "name": name })).await
    }

    async fn delete_user(&self, name: &str) -> ProviderResult {
        tracing::info!(user = %name, "deleting user");
        self.client
            .delete(&format!("/api/v1/user/{}", segment(name)))
            .await
    }

    async fn list_nodes(&self) -> ProviderResult {
        self.client.get("/api/v1/node", &[]).await
    }

    async fn register_node(&self, user: &str, key: &str) -> ProviderResult {
        tracing::info!(user = %user, "registering node");
        self.client
            .post("/api/v1/node/register", &json!({ "user": user, "key": key }))
            .await
    }

    async fn rename_node(&self, node_id: u64, name: &str) -> ProviderResult {
        tracing::info!(node_id, name = %name, "renaming node");
        self.client
            .post(
                &format!("/api/v1/node/{node_id}/rename/{}", segment(name)),
                &json!({}),
            )
            .await
    }

    async fn delete_node(&self, node_id: u64) -> ProviderResult {
        tracing::info!(node_id, "deleting node");
        self.client.delete(&format!("/api/v1/node/{node_id}")).await
    }

    async fn set_node_tags(&self, node_id: u64, tags: &[String]) -> ProviderResult {
        tracing::info!(node_id, ?tags, "setting node tags");
        self.client
            .post(&format!("/api/v1/node/{node_id}/tags"), &json!({ "tags": tags }))
            .await
    }

    async fn list_api_keys(&self) -> ProviderResult {
        self.client.get("/api/v1/apikey", &[]).await
    }

    async fn create_api_key(&self, expiration: Option<&str>) -> ProviderResult {
        tracing::info!(expiration = ?expiration, "creating API key");
        let body = match expiration {
            Some(expiration) => json!({ "expiration": expiration_timestamp(expiration)? }),
            None => json!({}),
        };
        self.client.post("/api/v1/apikey", &body).await
    }

    async fn expire_api_key(&self, prefix: &str) -> ProviderResult {
        tracing::info!(prefix = %prefix, "expiring API key");
        self.client
            .post("/api/v1/apikey/expire", &json!({ "prefix": prefix }))
            .await
    }

    async fn list_preauth_keys(&self, user: &str) -> ProviderResult {
        self.client.get("/api/v1/preauthkey", &[("user", user)]).await
    }

    async fn create_preauth_key(&self, user: &str, options: &PreauthKeyOptions) -> ProviderResult {
        tracing::info!(
            user = %user,
            reusable = options.reusable,
            ephemeral = options.ephemeral,
            expiration = ?options.expiration,
            "creating preauth key"
        );
        let mut body = json!({
            "user": user,
            "reusable": options.reusable,
            "ephemeral": options.ephemeral,
        });
        if let Some(expiration) = options.expiration.as_deref() {
            body["expiration"] = Value::String(expiration_timestamp(expiration)?);
        }
        self.client.post("/api/v1/preauthkey", &body).await
    }

    async fn expire_preauth_key(&self, user: &str, key: &str) -> ProviderResult {
        tracing::info!(user = %user, "expiring preauth key");
        self.client
            .post("/api/v1/preauthkey/expire", &json!({ "user": user, "key": key }))
            .await
    }

    // Routes live on nodes in Headscale v1.
    async fn list_routes(&self) -> ProviderResult {
        self.client.get("/api/v1/node", &[]).await
    }

    async fn enable_route(&self, node_id: u64, routes: &[String]) -> ProviderResult {
        tracing::info!(node_id, ?routes, "approving routes");
        self.client
            .post(
                &format!("/api/v1/node/{node_id}/approve_routes"),
                &json!({ "routes": routes }),
            )
            .await
    }

    async fn disable_route(&self, node_id: u64) -> ProviderResult {
        tracing::info!(node_id, "clearing approved routes");
        self.client
            .post(
                &format!("/api/v1/node/{node_id}/approve_routes"),
                &json!({ "routes": [] }),
            )
            .await
    }

    async fn get_policy(&self) -> ProviderResult {
        self.client.get("/api/v1/policy", &[]).await
    }

    async fn set_policy(&self, policy: &str) -> ProviderResult {
        tracing::info!(bytes = policy.len(), "setting policy");
        self.client
            .put("/api/v1/policy", &json!({ "policy": policy }))
            .await
    }
}
