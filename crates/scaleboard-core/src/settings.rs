//! Settings service: credential rotation with a validate-then-commit discipline.
//!
//! A credential update goes through four steps, in order:
//!
//! 1. local checks (URL shape, non-empty key)
//! 2. a connectivity probe with a throwaway client bound to the candidate pair
//! 3. persistence through the [`CredentialStore`]
//! 4. rebinding of the live [`UpstreamClient`]
//!
//! If any step fails, the steps after it do not run. The whole sequence holds
//! one async mutex, so concurrent updates are serialized and the live client
//! always matches the last committed record.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::client::{ConnectionReport, REQUEST_TIMEOUT, UpstreamClient, normalize_base_url};
use crate::credentials::{CredentialStore, StoredSettings};
use crate::crypto::ApiKey;
use crate::error::{CredentialError, SettingsError};
use crate::preferences::{Preferences, PreferencesUpdate};

/// Settings as returned to the dashboard: the stored record plus a
/// non-secret prefix of the API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    #[serde(flatten)]
    pub settings: StoredSettings,
    pub api_key_prefix: Option<String>,
}

/// Coordinates the credential store and the live upstream client.
pub struct SettingsService {
    store: Arc<CredentialStore>,
    client: Arc<UpstreamClient>,
    probe_timeout: Duration,
    update_lock: Mutex<()>,
}

impl std::fmt::Debug for SettingsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsService")
            .field("probe_timeout", &self.probe_timeout)
            .finish_non_exhaustive()
    }
}

impl SettingsService {
    #[must_use]
    pub fn new(store: Arc<CredentialStore>, client: Arc<UpstreamClient>) -> Self {
        Self::with_probe_timeout(store, client, REQUEST_TIMEOUT)
    }

    /// Use a custom timeout for connectivity probes.
    #[must_use]
    pub fn with_probe_timeout(
        store: Arc<CredentialStore>,
        client: Arc<UpstreamClient>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            store,
            client,
            probe_timeout,
            update_lock: Mutex::new(()),
        }
    }

    /// The stored settings with a display prefix of the key.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Credentials`] if the record cannot be read or
    /// the stored key cannot be decrypted. A record with no key yields
    /// `api_key_prefix: None`.
    pub async fn get_settings(&self) -> Result<SettingsView, SettingsError> {
        let settings = self.store.settings().await?;
        let api_key_prefix = match self.store.decrypted_api_key().await {
            Ok(key) => Some(key.display_prefix()),
            Err(CredentialError::MissingKey) => None,
            Err(e) => return Err(e.into()),
        };
        Ok(SettingsView {
            settings,
            api_key_prefix,
        })
    }

    /// Probe a candidate `(url, key)` pair without touching the stored record
    /// or the live client.
    pub async fn test_connection(&self, url: &str, api_key: &ApiKey) -> ConnectionReport {
        if normalize_base_url(url).is_err() {
            return ConnectionReport::rejected("Invalid URL format");
        }
        if api_key.is_blank() {
            return ConnectionReport::rejected("API key is required");
        }

        let probe = match UpstreamClient::with_timeout(url, api_key.clone(), self.probe_timeout) {
            Ok(client) => client,
            Err(e) => return ConnectionReport::rejected(e.to_string()),
        };
        let report = probe.test_connection().await;
        tracing::info!(url = %url, success = report.success, "connection test");
        report
    }

    /// Validate, probe, persist and rebind, in that order.
    ///
    /// # Errors
    ///
    /// - [`SettingsError::InvalidUrl`] / [`SettingsError::MissingApiKey`] for
    ///   bad input
    /// - [`SettingsError::ConnectionFailed`] if the probe fails
    /// - [`SettingsError::Credentials`] if persistence fails
    ///
    /// In every error case the stored record and the live client are unchanged.
    pub async fn update_settings(&self, url: &str, api_key: ApiKey) -> Result<(), SettingsError> {
        let _guard = self.update_lock.lock().await;

        let url = normalize_base_url(url).map_err(|e| SettingsError::InvalidUrl {
            reason: e.to_string(),
        })?;
        if api_key.is_blank() {
            return Err(SettingsError::MissingApiKey);
        }

        let report = self.test_connection(&url, &api_key).await;
        if !report.success {
            let reason = report.error.unwrap_or(report.message);
            tracing::warn!(url = %url, reason = %reason, "settings update rejected, connection test failed");
            return Err(SettingsError::ConnectionFailed { reason });
        }

        self.store.update_credentials(&url, &api_key).await?;
        self.client
            .update_config(&url, api_key)
            .await
            .map_err(|e| SettingsError::InvalidUrl {
                reason: e.to_string(),
            })?;

        tracing::info!(url = %url, "settings updated and live client rebound");
        Ok(())
    }

    /// Merge a partial preferences update. No probe is involved.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Credentials`] if the record cannot be written.
    pub async fn update_preferences(
        &self,
        update: &PreferencesUpdate,
    ) -> Result<Preferences, SettingsError> {
        Ok(self.store.update_preferences(update).await?)
    }

    /// Bind the live client to the stored URL and key.
    ///
    /// Called at startup so a restart resumes with the last committed
    /// credentials instead of the boot-time ones.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Credentials`] if the key is missing or cannot
    /// be decrypted, and [`SettingsError::InvalidUrl`] if the stored URL is
    /// malformed. The live client is unchanged in both cases.
    pub async fn restore_live_binding(&self) -> Result<(), SettingsError> {
        let _guard = self.update_lock.lock().await;
        let settings = self.store.settings().await?;
        let api_key = self.store.decrypted_api_key().await?;
        self.client
            .update_config(&settings.headscale_url, api_key)
            .await
            .map_err(|e| SettingsError::InvalidUrl {
                reason: e.to_string(),
            })
    }
}
