//! Server configuration for Scaleboard.
//!
//! Loads configuration from environment variables (after an optional `.env`
//! file has been applied by the binary). The Headscale URL and API key are
//! required; everything else has a default.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderValue;
use scaleboard_core::client::normalize_base_url;
use scaleboard_core::crypto::ApiKey;
use scaleboard_core::provider::ProviderKind;

/// Session secret shipped as the default. Using it in production logs a warning.
pub const DEFAULT_SESSION_SECRET: &str = "change-me-in-production";

/// Configuration errors. Any of these aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required environment variable: {name}")]
    Missing { name: &'static str },

    /// A variable is set but cannot be used.
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Production enables JSON logs and the default-secret warning.
    pub environment: Environment,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Boot-time upstream URL, used when no settings have been stored yet.
    pub headscale_url: String,
    /// Boot-time upstream API key.
    pub headscale_api_key: ApiKey,
    /// Which provider implementation serves the resource routes.
    pub provider: ProviderKind,
    /// Secret the credential encryption key is derived from.
    pub session_secret: String,
    /// Directory holding `settings.json`.
    pub storage_path: PathBuf,
    /// Optional frontend build served at `/` with SPA fallback.
    pub static_dir: Option<PathBuf>,
    /// Allowed CORS origin; any origin when unset.
    pub cors_origin: Option<HeaderValue>,
    /// General `/api` limit: requests per window per client.
    pub rate_limit_max: u32,
    /// General `/api` limit window.
    pub rate_limit_window: Duration,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("environment", &self.environment)
            .field("log_level", &self.log_level)
            .field("headscale_url", &self.headscale_url)
            .field("provider", &self.provider)
            .field("storage_path", &self.storage_path)
            .field("static_dir", &self.static_dir)
            .field("rate_limit_max", &self.rate_limit_max)
            .field("rate_limit_window", &self.rate_limit_window)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - `HEADSCALE_URL` (or `UPSTREAM_URL`): upstream URL, required
    /// - `HEADSCALE_API_KEY` (or `UPSTREAM_KEY`): upstream API key, required
    /// - `HEADSCALE_PROVIDER`: `api` or `docker` (default: `api`)
    /// - `SESSION_SECRET`: encryption secret (default: `change-me-in-production`)
    /// - `SCALEBOARD_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:3000`)
    /// - `PORT` / `APP_PORT`: port to bind on `0.0.0.0`
    /// - `SCALEBOARD_ENV`: `production` or `development` (default: `production`)
    /// - `SCALEBOARD_LOG_LEVEL`: log filter (default: `info`)
    /// - `SCALEBOARD_STORAGE_PATH`: settings directory (default: `./storage`)
    /// - `SCALEBOARD_STATIC_DIR`: frontend directory (optional)
    /// - `SCALEBOARD_CORS_ORIGIN`: allowed CORS origin (default: any)
    /// - `RATE_LIMIT_MAX`: requests per window (default: `100`)
    /// - `RATE_LIMIT_WINDOW`: window in minutes (default: `15`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for missing required variables or unusable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let headscale_url = var("HEADSCALE_URL")
            .or_else(|| var("UPSTREAM_URL"))
            .ok_or(ConfigError::Missing {
                name: "HEADSCALE_URL",
            })?;
        let headscale_url =
            normalize_base_url(&headscale_url).map_err(|e| ConfigError::Invalid {
                name: "HEADSCALE_URL",
                reason: e.to_string(),
            })?;

        let headscale_api_key = var("HEADSCALE_API_KEY")
            .or_else(|| var("UPSTREAM_KEY"))
            .map(ApiKey::new)
            .ok_or(ConfigError::Missing {
                name: "HEADSCALE_API_KEY",
            })?;

        let provider = var("HEADSCALE_PROVIDER")
            .map(|v| v.parse::<ProviderKind>())
            .transpose()
            .map_err(|e| ConfigError::Invalid {
                name: "HEADSCALE_PROVIDER",
                reason: e.to_string(),
            })?
            .unwrap_or_default();

        // Priority: SCALEBOARD_BIND_ADDR > PORT / APP_PORT > default 127.0.0.1:3000
        let bind_addr = if let Some(addr) = var("SCALEBOARD_BIND_ADDR") {
            addr.parse().map_err(|e| ConfigError::Invalid {
                name: "SCALEBOARD_BIND_ADDR",
                reason: format!("{e}"),
            })?
        } else if let Some(port) = var("PORT").or_else(|| var("APP_PORT")) {
            let port: u16 = port.parse().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: format!("{e}"),
            })?;
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            SocketAddr::from(([127, 0, 0, 1], 3000))
        };

        let environment = match var("SCALEBOARD_ENV")
            .unwrap_or_else(|| "production".to_owned())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            "development" | "dev" => Environment::Development,
            other => {
                return Err(ConfigError::Invalid {
                    name: "SCALEBOARD_ENV",
                    reason: format!("'{other}', expected production or development"),
                });
            }
        };

        let log_level = var("SCALEBOARD_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        let session_secret =
            var("SESSION_SECRET").unwrap_or_else(|| DEFAULT_SESSION_SECRET.to_owned());

        let storage_path = var("SCALEBOARD_STORAGE_PATH")
            .map_or_else(|| PathBuf::from("./storage"), PathBuf::from);

        let static_dir = var("SCALEBOARD_STATIC_DIR").map(PathBuf::from);

        let cors_origin = var("SCALEBOARD_CORS_ORIGIN")
            .filter(|v| v != "*")
            .map(|v| HeaderValue::from_str(&v))
            .transpose()
            .map_err(|e| ConfigError::Invalid {
                name: "SCALEBOARD_CORS_ORIGIN",
                reason: e.to_string(),
            })?;

        let rate_limit_max = parse_positive(var("RATE_LIMIT_MAX"), "RATE_LIMIT_MAX", 100)?;
        let window_minutes = parse_positive(var("RATE_LIMIT_WINDOW"), "RATE_LIMIT_WINDOW", 15)?;
        let rate_limit_window = Duration::from_secs(u64::from(window_minutes) * 60);

        Ok(Self {
            bind_addr,
            environment,
            log_level,
            headscale_url,
            headscale_api_key,
            provider,
            session_secret,
            storage_path,
            static_dir,
            cors_origin,
            rate_limit_max,
            rate_limit_window,
        })
    }

    /// Whether the shipped default session secret is in use.
    #[must_use]
    pub fn uses_default_secret(&self) -> bool {
        self.session_secret == DEFAULT_SESSION_SECRET
    }
}

fn parse_positive(value: Option<String>, name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_owned(),
        }),
        Err(e) => Err(ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}
