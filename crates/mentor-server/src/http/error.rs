//! Error responses for the HTTP layer.
//!
//! Every error is rendered as
//! `{"error_code": "...", "message": "...", "timestamp": "..."}`.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use mentor_auth::AuthError;
use serde_json::json;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Stable application error codes.
pub mod codes {
    pub const INVALID_TOKEN: &str = "AUTH_1001";
    pub const UNAUTHORIZED_ACCESS: &str = "AUTH_1003";
    pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_3001";
    pub const INTERNAL_SERVER_ERROR: &str = "SERVER_9001";
    pub const SERVICE_UNAVAILABLE: &str = "SERVER_9002";
}

/// Errors returned by HTTP handlers and extractors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Failure reported by the credential/session layer.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The request carried no bearer credential.
    #[error("Missing bearer credential")]
    MissingCredential,

    /// The requested record does not exist (or has expired).
    #[error("{message}")]
    NotFound {
        /// What was not found.
        message: String,
    },
}

impl ApiError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Returns (HTTP status, error code, client-facing message).
    fn details(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::MissingCredential => (
                StatusCode::UNAUTHORIZED,
                codes::INVALID_TOKEN,
                self.to_string(),
            ),
            Self::NotFound { message } => (
                StatusCode::NOT_FOUND,
                codes::RESOURCE_NOT_FOUND,
                message.clone(),
            ),
            Self::Auth(err) => match err {
                AuthError::CredentialInvalid { .. } | AuthError::CredentialExpired => (
                    StatusCode::UNAUTHORIZED,
                    codes::INVALID_TOKEN,
                    err.to_string(),
                ),
                AuthError::Forbidden { message } => (
                    StatusCode::FORBIDDEN,
                    codes::UNAUTHORIZED_ACCESS,
                    message.clone(),
                ),
                AuthError::StoreUnavailable { .. } => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    codes::SERVICE_UNAVAILABLE,
                    "Session store is temporarily unavailable".to_string(),
                ),
                AuthError::Serialization { .. }
                | AuthError::Configuration { .. }
                | AuthError::Internal { .. } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    codes::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                ),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.details();

        if status.is_server_error() {
            tracing::error!(error = %self, error_code = code, "request failed");
        } else {
            tracing::debug!(error = %self, error_code = code, "request rejected");
        }

        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let body = json!({
            "error_code": code,
            "message": message,
            "timestamp": timestamp,
        });

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let www_auth = build_www_authenticate_header(&message);
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        (status, headers, Json(body)).into_response()
    }
}

/// Builds the WWW-Authenticate header value for a rejected bearer credential.
fn build_www_authenticate_header(description: &str) -> String {
    let escaped: String = description
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .map(|c| if c == '"' { '\'' } else { c })
        .collect();
    format!(r#"Bearer error="invalid_token", error_description="{escaped}""#)
}
