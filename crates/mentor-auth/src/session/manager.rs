//! Request-facing entry point: verify, then reconcile.

use std::sync::Arc;

use crate::AuthResult;
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::store::SessionStore;
use crate::token::{ClaimSet, CredentialVerifier};

use super::SessionReconciler;
use super::records::ReconcileReport;

/// An authorized request: the verified claims and what happened to the
/// session records they produced.
#[derive(Debug)]
pub struct Authorization {
    /// Verified claims. These alone decide what the request may do.
    pub claims: ClaimSet,
    /// Bookkeeping outcome.
    pub report: ReconcileReport,
}

/// Verifies credentials and records them in the session store.
#[derive(Debug, Clone)]
pub struct SessionManager {
    verifier: CredentialVerifier,
    reconciler: SessionReconciler,
}

impl SessionManager {
    #[must_use]
    pub fn new(verifier: CredentialVerifier, reconciler: SessionReconciler) -> Self {
        Self {
            verifier,
            reconciler,
        }
    }

    /// Builds the verifier and reconciler from `config` on `store`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the configuration is invalid or
    /// the public key cannot be loaded.
    pub fn from_config(config: &AuthConfig, store: Arc<dyn SessionStore>) -> AuthResult<Self> {
        config.validate()?;

        let verifier = CredentialVerifier::from_config(&config.verifier)?;
        let reconciler = SessionReconciler::new(store, config);
        Ok(Self::new(verifier, reconciler))
    }

    /// Drives both components from `clock`.
    #[must_use]
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self {
            verifier: self.verifier.with_clock(Arc::clone(&clock)),
            reconciler: self.reconciler.with_clock(clock),
        }
    }

    #[must_use]
    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    #[must_use]
    pub fn reconciler(&self) -> &SessionReconciler {
        &self.reconciler
    }

    /// Authorizes a request carrying `raw_credential`.
    ///
    /// The outcome is decided by verification alone; store failures show up
    /// in [`Authorization::report`] only.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CredentialInvalid` or `AuthError::CredentialExpired`
    /// if the credential is rejected.
    pub async fn authorize(&self, raw_credential: &str) -> AuthResult<Authorization> {
        let claims = self.verifier.verify(raw_credential)?;
        let report = self.reconciler.on_verified(&claims).await?;

        if !report.is_complete() {
            tracing::warn!(
                subject = %claims.sub,
                failed = report.failures().count(),
                "authorized with incomplete session bookkeeping"
            );
        }

        Ok(Authorization { claims, report })
    }
}
