//! HTTP error types for the Scaleboard server.
//!
//! Maps domain errors from `scaleboard-core` into HTTP responses. Every error
//! produces a JSON body with `success: false`, a machine-readable `error` code
//! and a human-readable `message`. Upstream failures keep the upstream status.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use scaleboard_core::error::{CredentialError, PreferenceError, SettingsError, UpstreamError};

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Client sent invalid input.
    BadRequest { code: &'static str, message: String },
    /// Required request fields are absent or blank.
    MissingFields(Vec<&'static str>),
    /// A credential update was refused (bad candidate or failed probe).
    SettingsRejected(String),
    /// Unknown route.
    NotFound(String),
    /// The provider or the upstream failed.
    Upstream(UpstreamError),
    /// The stored API key cannot be decrypted.
    Decryption,
    /// The client exceeded a rate limit.
    RateLimited { retry_after_secs: u64, message: String },
    /// Internal server error.
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing: Vec<&'static str>,
}

fn upstream_code(err: &UpstreamError) -> &'static str {
    match err {
        UpstreamError::Validation { .. } => "bad_request",
        UpstreamError::Unreachable { .. } => "upstream_unreachable",
        UpstreamError::Timeout { .. } => "upstream_timeout",
        UpstreamError::Rejected { .. } => "upstream_rejected",
        UpstreamError::InvalidResponse { .. } => "upstream_invalid_response",
        UpstreamError::NotImplemented { .. } => "not_implemented",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let mut missing = Vec::new();

        let (status, error_type, message) = match self {
            Self::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            Self::MissingFields(fields) => {
                let message = format!("Missing required fields: {}", fields.join(", "));
                missing = fields;
                (StatusCode::BAD_REQUEST, "missing_fields", message)
            }
            Self::SettingsRejected(msg) => (StatusCode::BAD_REQUEST, "connection_failed", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::Upstream(err) => {
                let status = StatusCode::from_u16(err.status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, upstream_code(&err), err.to_string())
            }
            Self::Decryption => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "decryption_failed",
                "stored API key could not be decrypted".to_owned(),
            ),
            Self::RateLimited {
                retry_after_secs,
                message,
            } => {
                retry_after = Some(retry_after_secs);
                (StatusCode::TOO_MANY_REQUESTS, "rate_limited", message)
            }
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            success: false,
            error: error_type,
            message,
            missing,
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<UpstreamError> for AppError {
    fn from(err: UpstreamError) -> Self {
        Self::Upstream(err)
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Decryption(ref inner) => {
                tracing::error!(error = %inner, "stored API key could not be decrypted");
                Self::Decryption
            }
            CredentialError::MissingKey => Self::Internal("no API key is stored".to_owned()),
            CredentialError::StorageInit { .. }
            | CredentialError::Encryption(_)
            | CredentialError::Serialization { .. }
            | CredentialError::Storage(_) => {
                tracing::error!(error = %err, "credential store failure");
                Self::Internal("settings storage failure".to_owned())
            }
        }
    }
}

impl From<SettingsError> for AppError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::InvalidUrl { .. } => Self::BadRequest {
                code: "invalid_url",
                message: "Please provide a valid HTTP/HTTPS URL".to_owned(),
            },
            SettingsError::MissingApiKey => Self::MissingFields(vec!["apiKey"]),
            SettingsError::ConnectionFailed { reason } => {
                Self::SettingsRejected(format!("Connection test failed: {reason}"))
            }
            SettingsError::Credentials(inner) => inner.into(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest {
            code: "invalid_body",
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest {
            code: "invalid_query",
            message: rejection.body_text(),
        }
    }
}

impl From<PreferenceError> for AppError {
    fn from(err: PreferenceError) -> Self {
        Self::BadRequest {
            code: err.code(),
            message: err.to_string(),
        }
    }
}
