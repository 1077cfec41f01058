//! Selection and caching of the active provider.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{LocalControlProvider, Provider, RestApiProvider};
use crate::client::UpstreamClient;
use crate::error::UnknownProvider;

/// Which provider implementation to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProviderKind {
    /// Headscale REST API.
    #[default]
    Api,
    /// Local control plane (selected with `docker`).
    Local,
}

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "api" => Ok(Self::Api),
            "docker" => Ok(Self::Local),
            _ => Err(UnknownProvider {
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Api => "api",
            Self::Local => "docker",
        })
    }
}

/// Builds the configured provider on first use and hands out the cached
/// instance afterwards.
///
/// Construction performs no network calls.
pub struct ProviderFactory {
    kind: ProviderKind,
    client: Arc<UpstreamClient>,
    cached: RwLock<Option<Arc<dyn Provider>>>,
}

impl fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl ProviderFactory {
    #[must_use]
    pub fn new(kind: ProviderKind, client: Arc<UpstreamClient>) -> Self {
        Self {
            kind,
            client,
            cached: RwLock::new(None),
        }
    }

    /// The configured selector.
    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// The active provider, constructed on the first call.
    pub async fn get_provider(&self) -> Arc<dyn Provider> {
        if let Some(provider) = self.cached.read().await.as_ref() {
            return Arc::clone(provider);
        }

        let mut cached = self.cached.write().await;
        if let Some(provider) = cached.as_ref() {
            return Arc::clone(provider);
        }

        let provider: Arc<dyn Provider> = match self.kind {
            ProviderKind::Api => Arc::new(RestApiProvider::new(Arc::clone(&self.client))),
            ProviderKind::Local => Arc::new(LocalControlProvider::new()),
        };
        tracing::info!(provider = provider.name(), "provider initialized");
        *cached = Some(Arc::clone(&provider));
        provider
    }

    /// Drop the cached provider; the next [`get_provider`](Self::get_provider)
    /// builds a fresh one.
    pub async fn reset_provider(&self) {
        let previous = self.cached.write().await.take();
        if previous.is_some() {
            tracing::debug!(kind = %self.kind, "provider reset");
        }
    }
}
