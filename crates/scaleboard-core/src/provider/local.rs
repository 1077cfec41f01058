//! Local control-plane provider.
//!
//! Reserved for driving Headscale through its container instead of the REST
//! API. Not implemented: every operation fails with
//! [`UpstreamError::NotImplemented`] and performs no I/O.

use super::{PreauthKeyOptions, Provider, ProviderResult};
use crate::error::UpstreamError;

const PROVIDER_NAME: &str = "docker";

fn unavailable(operation: &'static str) -> ProviderResult {
    Err(UpstreamError::NotImplemented {
        provider: PROVIDER_NAME,
        operation,
    })
}

/// Stub [`Provider`] that rejects every operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalControlProvider;

impl LocalControlProvider {
    #[must_use]
    pub fn new() -> Self {
        tracing::warn!("local control-plane provider selected; all operations are unavailable");
        Self
    }
}

#[async_trait::async_trait]
impl Provider for LocalControlProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn list_users(&self) -> ProviderResult {
        unavailable("list_users")
    }

    async fn create_user(&self, _name: &str) -> ProviderResult {
        unavailable("create_user")
    }

    async fn delete_user(&self, _name: &str) -> ProviderResult {
        unavailable("delete_user")
    }

    async fn list_nodes(&self) -> ProviderResult {
        unavailable("list_nodes")
    }

    async fn register_node(&self, _user: &str, _key: &str) -> ProviderResult {
        unavailable("register_node")
    }

    async fn rename_node(&self, _node_id: u64, _name: &str) -> ProviderResult {
        unavailable("rename_node")
    }

    async fn delete_node(&self, _node_id: u64) -> ProviderResult {
        unavailable("delete_node")
    }

    async fn set_node_tags(&self, _node_id: u64, _tags: &[String]) -> ProviderResult {
        unavailable("set_node_tags")
    }

    async fn list_api_keys(&self) -> ProviderResult {
        unavailable("list_api_keys")
    }

    async fn create_api_key(&self, _expiration: Option<&str>) -> ProviderResult {
        unavailable("create_api_key")
    }

    async fn expire_api_key(&self, _prefix: &str) -> ProviderResult {
        unavailable("expire_api_key")
    }

    async fn list_preauth_keys(&self, _user: &str) -> ProviderResult {
        unavailable("list_preauth_keys")
    }

    async fn create_preauth_key(&self, _user: &str, _options: &PreauthKeyOptions) -> ProviderResult {
        unavailable("create_preauth_key")
    }

    async fn expire_preauth_key(&self, _user: &str, _key: &str) -> ProviderResult {
        unavailable("expire_preauth_key")
    }

    async fn list_routes(&self) -> ProviderResult {
        unavailable("list_routes")
    }

    async fn enable_route(&self, _node_id: u64, _routes: &[String]) -> ProviderResult {
        unavailable("enable_route")
    }

    async fn disable_route(&self, _node_id: u64) -> ProviderResult {
        unavailable("disable_route")
    }

    async fn get_policy(&self) -> ProviderResult {
        unavailable("get_policy")
    }

    async fn set_policy(&self, _policy: &str) -> ProviderResult {
        unavailable("set_policy")
    }
}
