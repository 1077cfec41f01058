//! Provider abstraction over the Headscale control plane.
//!
//! Every resource route talks to a [`Provider`]. Exactly one implementation is
//! active per process, selected by [`ProviderFactory`]:
//!
//! - [`RestApiProvider`]: calls the Headscale REST API through the shared
//!   [`UpstreamClient`](crate::client::UpstreamClient)
//! - [`LocalControlProvider`]: placeholder for driving a local control plane;
//!   every operation fails with `NotImplemented`

mod factory;
mod local;
mod rest;

pub use factory::{ProviderFactory, ProviderKind};
pub use local::LocalControlProvider;
pub use rest::RestApiProvider;

use crate::client::ApiResponse;
use crate::error::UpstreamError;

/// Result type shared by every provider operation.
pub type ProviderResult = Result<ApiResponse, UpstreamError>;

/// Options for creating a preauth key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreauthKeyOptions {
    /// Relative expiration such as `"48h"`. `None` lets the upstream decide.
    pub expiration: Option<String>,
    pub reusable: bool,
    pub ephemeral: bool,
}

/// Capabilities of a control-plane backend.
///
/// Operations never panic; every failure is an [`UpstreamError`] whose
/// [`status`](UpstreamError::status) is the HTTP status to answer with.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Short identifier reported by the health endpoint.
    fn name(&self) -> &'static str;

    // Users
    async fn list_users(&self) -> ProviderResult;
    async fn create_user(&self, name: &str) -> ProviderResult;
    async fn delete_user(&self, name: &str) -> ProviderResult;

    // Nodes
    async fn list_nodes(&self) -> ProviderResult;
    async fn register_node(&self, user: &str, key: &str) -> ProviderResult;
    async fn rename_node(&self, node_id: u64, name: &str) -> ProviderResult;
    async fn delete_node(&self, node_id: u64) -> ProviderResult;
    async fn set_node_tags(&self, node_id: u64, tags: &[String]) -> ProviderResult;

    // API keys
    async fn list_api_keys(&self) -> ProviderResult;
    async fn create_api_key(&self, expiration: Option<&str>) -> ProviderResult;
    async fn expire_api_key(&self, prefix: &str) -> ProviderResult;

    // Preauth keys
    async fn list_preauth_keys(&self, user: &str) -> ProviderResult;
    async fn create_preauth_key(&self, user: &str, options: &PreauthKeyOptions) -> ProviderResult;
    async fn expire_preauth_key(&self, user: &str, key: &str) -> ProviderResult;

    // Routes
    async fn list_routes(&self) -> ProviderResult;
    async fn enable_route(&self, node_id: u64, routes: &[String]) -> ProviderResult;
    async fn disable_route(&self, node_id: u64) -> ProviderResult;

    // Policy
    async fn get_policy(&self) -> ProviderResult;
    async fn set_policy(&self, policy: &str) -> ProviderResult;
}
