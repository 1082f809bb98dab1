//! # mentor-auth
//!
//! Credential verification and session state reconciliation for the Mentor
//! onboarding API.
//!
//! This crate provides:
//! - Verification of externally issued, asymmetrically signed access tokens
//! - A key-value session store abstraction with per-key expiry
//! - Ephemeral token records bound to a credential's remaining lifetime
//! - Durable identity records that outlive the credential
//! - The reconciler that keeps both in step on every verification
//!
//! ## Overview
//!
//! A request carries a signed credential. [`token::CredentialVerifier`] checks
//! it and yields a [`token::ClaimSet`]. [`session::SessionReconciler`] then
//! writes the claims under the token identifier (expiring with the
//! credential) and a reduced projection under the subject (expiring after a
//! long, configured retention window). Downstream features can look either
//! record up later, including after the credential has expired.
//!
//! The authorization decision depends on verification alone. Store failures
//! are reported and logged, never turned into a rejection.
//!
//! ## Modules
//!
//! - [`config`] - Verifier, retention and store configuration
//! - [`token`] - Claim set and credential verification
//! - [`store`] - Session store trait and its memory/Redis backends
//! - [`session`] - Records, reconciler and the request-facing manager
//! - [`clock`] - Injectable time source

pub mod clock;
pub mod config;
pub mod error;
pub mod session;
pub mod store;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use session::{
    Authorization, DurableIdentityRecord, RecordKind, ReconcileReport, SessionData,
    SessionManager, SessionReconciler, WriteOutcome, WriteStatus,
};
pub use store::{MemoryStore, RedisStore, SessionStore, StoreError, StoreResult};
pub use token::{Audience, ClaimSet, CredentialVerifier, SigningAlgorithm};

/// Type alias for authentication/session results.
pub type AuthResult<T> = Result<T, AuthError>;
