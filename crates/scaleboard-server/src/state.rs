//! Shared application state for the Scaleboard server.
//!
//! A single [`AppState`] is built at startup by [`AppState::bootstrap`] and
//! shared across all Axum handlers via `Arc`. There are no process-wide
//! singletons: the credential store, the live upstream client, the provider
//! factory and the settings service all hang off this struct.

use std::sync::Arc;

use anyhow::Context;

use scaleboard_core::client::UpstreamClient;
use scaleboard_core::credentials::CredentialStore;
use scaleboard_core::crypto::EncryptionKey;
use scaleboard_core::provider::{Provider, ProviderFactory};
use scaleboard_core::settings::SettingsService;
use scaleboard_storage::StorageBackend;

use crate::config::ServerConfig;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Persisted URL, encrypted key and preferences.
    pub credentials: Arc<CredentialStore>,
    /// The live upstream client every provider call goes through.
    pub client: Arc<UpstreamClient>,
    /// Lazily built active provider.
    pub providers: ProviderFactory,
    /// Validate-then-commit credential rotation.
    pub settings: SettingsService,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Open the credential store and wire up the client, factory and settings
    /// service.
    ///
    /// The live client is rebound to the persisted credentials, so a restart
    /// resumes with the last committed URL and key. If the stored key cannot
    /// be decrypted (for example after the session secret changed) the error
    /// is logged and the boot-time credentials stay in use.
    ///
    /// # Errors
    ///
    /// Fails if the encryption key cannot be derived, the storage location is
    /// unusable, or the boot-time URL is rejected by the client.
    pub async fn bootstrap(
        config: &ServerConfig,
        backend: Arc<dyn StorageBackend>,
    ) -> anyhow::Result<Arc<Self>> {
        let key = EncryptionKey::from_session_secret(&config.session_secret)
            .context("failed to derive credential encryption key")?;

        let credentials = Arc::new(
            CredentialStore::init(
                backend,
                key,
                &config.headscale_url,
                &config.headscale_api_key,
            )
            .await
            .context("failed to initialize credential store")?,
        );

        let client = Arc::new(
            UpstreamClient::new(&config.headscale_url, config.headscale_api_key.clone())
                .context("failed to build upstream client")?,
        );

        let settings = SettingsService::new(Arc::clone(&credentials), Arc::clone(&client));
        match settings.restore_live_binding().await {
            Ok(()) => {
                let url = client.base_url().await;
                tracing::info!(url = %url, "upstream client bound to stored settings");
            }
            Err(e) => tracing::error!(
                error = %e,
                "stored credentials unusable, keeping boot-time credentials"
            ),
        }

        let providers = ProviderFactory::new(config.provider, Arc::clone(&client));

        Ok(Arc::new(Self {
            credentials,
            client,
            providers,
            settings,
        }))
    }

    /// The active provider.
    pub async fn provider(&self) -> Arc<dyn Provider> {
        self.providers.get_provider().await
    }
}
