//! Encrypted credential store.
//!
//! Holds the single persisted settings record: the upstream URL, the API key
//! encrypted with a key derived from the session secret, the time of the last
//! successful connection, a schema version and the dashboard preferences. The
//! record is cached in memory and written through to a [`StorageBackend`] on
//! every mutation.
//!
//! The in-memory copy is only replaced after the backend accepted the new
//! document, so a failed write leaves the store exactly as it was.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use scaleboard_storage::StorageBackend;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::crypto::{self, ApiKey, EncryptionKey};
use crate::error::CredentialError;
use crate::preferences::{Preferences, PreferencesUpdate};

/// Document key of the settings record (`settings.json` on disk).
pub const SETTINGS_DOCUMENT: &str = "settings";

/// Schema version written into new records.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// The persisted document. Field names match the on-disk JSON.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRecord {
    headscale_url: String,
    #[serde(default)]
    api_key_encrypted: Option<String>,
    #[serde(default)]
    last_connection: Option<DateTime<Utc>>,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    preferences: Option<Preferences>,
}

fn default_version() -> String {
    SCHEMA_VERSION.to_owned()
}

/// The settings record as seen by callers: everything except the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSettings {
    pub headscale_url: String,
    pub last_connection: Option<DateTime<Utc>>,
    pub version: String,
    pub preferences: Preferences,
}

/// Encrypted, file-backed credential store.
pub struct CredentialStore {
    backend: Arc<dyn StorageBackend>,
    key: EncryptionKey,
    record: RwLock<CredentialRecord>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Load the persisted record, or create it from the boot-time credentials.
    ///
    /// Idempotent: when a record already exists it is loaded as-is and the
    /// boot-time values are ignored. A new record has no `lastConnection` and
    /// default preferences, and is written immediately.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::StorageInit`] if the backend cannot be read
    /// or written, or if the existing document is not a valid record.
    pub async fn init(
        backend: Arc<dyn StorageBackend>,
        key: EncryptionKey,
        boot_url: &str,
        boot_api_key: &ApiKey,
    ) -> Result<Self, CredentialError> {
        let existing = backend
            .get(SETTINGS_DOCUMENT)
            .await
            .map_err(|e| CredentialError::StorageInit {
                reason: e.to_string(),
            })?;

        let record = if let Some(bytes) = existing {
            let record: CredentialRecord =
                serde_json::from_slice(&bytes).map_err(|e| CredentialError::StorageInit {
                    reason: format!("settings document is not a valid record: {e}"),
                })?;
            tracing::info!(url = %record.headscale_url, "settings loaded from storage");
            record
        } else {
            let api_key_encrypted = if boot_api_key.is_blank() {
                None
            } else {
                Some(crypto::seal_api_key(&key, boot_api_key).map_err(CredentialError::Encryption)?)
            };
            let record = CredentialRecord {
                headscale_url: boot_url.to_owned(),
                api_key_encrypted,
                last_connection: None,
                version: default_version(),
                preferences: Some(Preferences::default()),
            };
            persist(backend.as_ref(), &record)
                .await
                .map_err(|e| CredentialError::StorageInit {
                    reason: e.to_string(),
                })?;
            tracing::info!(url = %record.headscale_url, "default settings created");
            record
        };

        Ok(Self {
            backend,
            key,
            record: RwLock::new(record),
        })
    }

    /// The record without the API key.
    ///
    /// Records written before preferences existed are backfilled with the
    /// defaults, and the backfill is persisted right away.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Storage`] if the backfill cannot be written.
    pub async fn settings(&self) -> Result<StoredSettings, CredentialError> {
        {
            let record = self.record.read().await;
            if let Some(preferences) = &record.preferences {
                return Ok(view(&record, preferences.clone()));
            }
        }

        let mut record = self.record.write().await;
        let preferences = match &record.preferences {
            Some(existing) => existing.clone(),
            None => {
                let mut updated = record.clone();
                updated.preferences = Some(Preferences::default());
                persist(self.backend.as_ref(), &updated).await?;
                *record = updated;
                tracing::info!("preferences backfilled with defaults");
                Preferences::default()
            }
        };
        Ok(view(&record, preferences))
    }

    /// Decrypt the stored API key. For internal use only.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::MissingKey`] if no key is stored and
    /// [`CredentialError::Decryption`] if the stored key cannot be decrypted
    /// with the current session secret.
    pub async fn decrypted_api_key(&self) -> Result<ApiKey, CredentialError> {
        let record = self.record.read().await;
        let sealed = record
            .api_key_encrypted
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(CredentialError::MissingKey)?;
        crypto::open_api_key(&self.key, sealed).map_err(CredentialError::Decryption)
    }

    /// Overwrite the URL and key and stamp `lastConnection` with the current
    /// time. Performs no validation.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Encryption`] or [`CredentialError::Storage`];
    /// in both cases the stored record is unchanged.
    pub async fn update_credentials(
        &self,
        url: &str,
        api_key: &ApiKey,
    ) -> Result<(), CredentialError> {
        let sealed = crypto::seal_api_key(&self.key, api_key).map_err(CredentialError::Encryption)?;

        let mut record = self.record.write().await;
        let mut updated = record.clone();
        updated.headscale_url = url.to_owned();
        updated.api_key_encrypted = Some(sealed);
        updated.last_connection = Some(Utc::now());

        persist(self.backend.as_ref(), &updated).await?;
        *record = updated;
        tracing::info!(url = %url, "credentials updated");
        Ok(())
    }

    /// Merge the provided preference fields and return the result.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Storage`] if the record cannot be written.
    pub async fn update_preferences(
        &self,
        update: &PreferencesUpdate,
    ) -> Result<Preferences, CredentialError> {
        let mut record = self.record.write().await;
        let mut preferences = record.preferences.clone().unwrap_or_default();
        preferences.apply(update);

        let mut updated = record.clone();
        updated.preferences = Some(preferences.clone());
        persist(self.backend.as_ref(), &updated).await?;
        *record = updated;

        tracing::info!(
            language = %preferences.language,
            theme = %preferences.theme,
            has_logo = preferences.custom_logo.is_some(),
            "preferences updated"
        );
        Ok(preferences)
    }
}

fn view(record: &CredentialRecord, preferences: Preferences) -> StoredSettings {
    StoredSettings {
        headscale_url: record.headscale_url.clone(),
        last_connection: record.last_connection,
        version: record.version.clone(),
        preferences,
    }
}

async fn persist(
    backend: &dyn StorageBackend,
    record: &CredentialRecord,
) -> Result<(), CredentialError> {
    let bytes = serde_json::to_vec_pretty(record).map_err(|e| CredentialError::Serialization {
        reason: e.to_string(),
    })?;
    backend.put(SETTINGS_DOCUMENT, &bytes).await?;
    Ok(())
}
