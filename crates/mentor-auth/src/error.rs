//! Credential and session error types.
//!
//! Verification failures (`CredentialInvalid`, `CredentialExpired`) reject
//! the request. Store failures (`StoreUnavailable`) only fail the specific
//! lookup or write they happened in. An absent record is not an error at
//! all: lookups return `Option`.

use std::fmt;

use crate::config::ConfigError;
use crate::store::StoreError;

/// Errors that can occur while verifying credentials or managing session state.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The credential is malformed, badly signed, for another audience,
    /// missing a required claim, or not yet valid.
    #[error("Invalid credential: {message}")]
    CredentialInvalid {
        /// Description of why the credential is invalid.
        message: String,
    },

    /// The credential has expired.
    #[error("Credential expired")]
    CredentialExpired,

    /// The session store could not be reached or did not answer in time.
    #[error("Session store unavailable: {message}")]
    StoreUnavailable {
        /// Description of the store failure.
        message: String,
    },

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// The verifier or store configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// The caller is authenticated but may not act on the requested subject.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of why access is forbidden.
        message: String,
    },

    /// An unexpected internal error occurred (misuse of the store API).
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `CredentialInvalid` error.
    #[must_use]
    pub fn credential_invalid(message: impl Into<String>) -> Self {
        Self::CredentialInvalid {
            message: message.into(),
        }
    }

    /// Creates a new `StoreUnavailable` error.
    #[must_use]
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the credential itself was rejected.
    #[must_use]
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            Self::CredentialInvalid { .. } | Self::CredentialExpired
        )
    }

    /// Returns `true` if the session store failed.
    #[must_use]
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    /// Returns `true` if this is a server-side error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. }
                | Self::Serialization { .. }
                | Self::Configuration { .. }
                | Self::Internal { .. }
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CredentialInvalid { .. } => ErrorCategory::Credential,
            Self::CredentialExpired => ErrorCategory::Credential,
            Self::StoreUnavailable { .. } => ErrorCategory::Infrastructure,
            Self::Serialization { .. } => ErrorCategory::Internal,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Forbidden { .. } => ErrorCategory::Authorization,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable { .. } | StoreError::Timeout { .. } => {
                Self::store_unavailable(err.to_string())
            }
            StoreError::InvalidTtl { .. } => Self::internal(err.to_string()),
        }
    }
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

/// Categories of credential/session errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Credential verification failures.
    Credential,
    /// Permission checks on an authenticated caller.
    Authorization,
    /// Session store failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Encoding and other internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credential => write!(f, "credential"),
            Self::Authorization => write!(f, "authorization"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
