//! Credential verification and session retention configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth.verifier]
//! public_key_path = "/etc/mentor/passport.pub.pem"
//! algorithm = "RS256"
//! expected_audience = "1"
//! clock_skew = "10s"
//!
//! [auth.retention]
//! identity_ttl = "30days"
//! session_ttl = "7days"
//!
//! [auth.store]
//! operation_timeout = "2s"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::token::SigningAlgorithm;

/// Root configuration for the credential/session layer.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Credential verification settings.
    pub verifier: VerifierConfig,

    /// Retention windows for records that outlive the credential.
    pub retention: RetentionConfig,

    /// Session store call settings.
    pub store: StoreConfig,
}

/// Credential verification configuration.
///
/// The public key may be given inline (`public_key_pem`) or as a path
/// (`public_key_path`); the inline value wins when both are set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// PEM-encoded public key of the credential issuer.
    pub public_key_pem: Option<String>,

    /// Path to a PEM-encoded public key file.
    pub public_key_path: Option<PathBuf>,

    /// Signature algorithm the issuer uses.
    /// Supported: "RS256", "RS384", "ES256", "ES384"
    pub algorithm: String,

    /// Required value of the `aud` claim.
    pub expected_audience: String,

    /// Tolerated clock difference between issuer and this service.
    #[serde(with = "humantime_serde")]
    pub clock_skew: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            public_key_pem: None,
            public_key_path: None,
            algorithm: "RS256".to_string(),
            expected_audience: "1".to_string(),
            clock_skew: Duration::from_secs(10),
        }
    }
}

impl VerifierConfig {
    /// Resolves the issuer public key PEM.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no key is configured and
    /// `ConfigError::InvalidValue` if the key file cannot be read.
    pub fn public_key(&self) -> Result<String, ConfigError> {
        if let Some(pem) = self.public_key_pem.as_ref().filter(|p| !p.trim().is_empty()) {
            return Ok(pem.clone());
        }

        match &self.public_key_path {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "cannot read public_key_path '{}': {e}",
                    path.display()
                ))
            }),
            None => Err(ConfigError::Missing(
                "verifier.public_key_pem or verifier.public_key_path".to_string(),
            )),
        }
    }
}

/// Retention windows for records that are not bound to a credential.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Lifetime of the durable identity record and latest-token pointer.
    /// Refreshed on every successful verification for the subject.
    #[serde(with = "humantime_serde")]
    pub identity_ttl: Duration,

    /// Lifetime of the per-subject session data blob.
    #[serde(with = "humantime_serde")]
    pub session_ttl: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            identity_ttl: Duration::from_secs(30 * 24 * 3600), // 30 days
            session_ttl: Duration::from_secs(7 * 24 * 3600),   // 7 days
        }
    }
}

/// Session store call configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Upper bound for a single store round trip.
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(2),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// Key material is not read here; see [`VerifierConfig::public_key`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The algorithm is not supported
    /// - The expected audience is empty
    /// - A retention window is shorter than one second
    /// - The store operation timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        SigningAlgorithm::parse(&self.verifier.algorithm).ok_or_else(|| {
            ConfigError::InvalidValue(format!(
                "Invalid verifier algorithm: '{}'. Must be RS256, RS384, ES256, or ES384",
                self.verifier.algorithm
            ))
        })?;

        if self.verifier.expected_audience.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "verifier.expected_audience cannot be empty".to_string(),
            ));
        }

        if self.retention.identity_ttl.as_secs() == 0 {
            return Err(ConfigError::InvalidValue(
                "retention.identity_ttl must be at least 1s".to_string(),
            ));
        }

        if self.retention.session_ttl.as_secs() == 0 {
            return Err(ConfigError::InvalidValue(
                "retention.session_ttl must be at least 1s".to_string(),
            ));
        }

        if self.store.operation_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "store.operation_timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
