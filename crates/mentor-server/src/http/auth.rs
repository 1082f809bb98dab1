//! Bearer credential extractor.
//!
//! ```ignore
//! async fn handler(Authenticated(auth): Authenticated) -> String {
//!     format!("Hello, {}!", auth.claims.sub)
//! }
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use mentor_auth::{AuthError, Authorization, SessionManager, SessionReconciler};

use super::error::ApiError;

/// State required by the [`Authenticated`] extractor and the lookup handlers.
#[derive(Clone)]
pub struct AuthState {
    /// Verifier plus reconciler.
    pub manager: Arc<SessionManager>,
}

impl AuthState {
    pub fn new(manager: SessionManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }

    pub fn reconciler(&self) -> &SessionReconciler {
        self.manager.reconciler()
    }
}

/// Axum extractor that verifies the bearer credential and records the
/// session state it produces.
///
/// The request is rejected only when the credential is; session store
/// failures are logged by the reconciler and left in the report.
pub struct Authenticated(pub Authorization);

impl Authenticated {
    /// Rejects the request unless it was made by `subject`.
    pub fn require_subject(&self, subject: &str) -> Result<(), ApiError> {
        if self.0.claims.sub == subject {
            Ok(())
        } else {
            tracing::debug!(
                caller = %self.0.claims.sub,
                subject = %subject,
                "cross-subject access denied"
            );
            Err(AuthError::forbidden("Credential subject does not match the requested user").into())
        }
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        let token = bearer_token(&parts.headers).ok_or(ApiError::MissingCredential)?;

        let authorization = auth_state.manager.authorize(token).await.map_err(|e| {
            tracing::debug!(error = %e, "credential rejected");
            ApiError::from(e)
        })?;

        Ok(Self(authorization))
    }
}

/// Extracts the token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
