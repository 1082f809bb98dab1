//! Session state derived from verified credentials.
//!
//! - [`SessionReconciler`] writes and reads the per-token and per-subject records
//! - [`SessionManager`] combines verification and reconciliation for a request
//! - [`keys`] holds the store key layout

pub mod keys;
mod manager;
mod reconciler;
mod records;

pub use manager::{Authorization, SessionManager};
pub use reconciler::SessionReconciler;
pub use records::{
    DurableIdentityRecord, RecordKind, ReconcileReport, SessionData, WriteOutcome, WriteStatus,
};
