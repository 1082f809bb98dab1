//! Records written by the reconciler and the report of a reconciliation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthError;
use crate::token::{Audience, ClaimSet};

/// Reduced projection of a claim set, stored under the subject.
///
/// Outlives the credential that produced it. It records what the last
/// credential carried; it never grants anything by itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurableIdentityRecord {
    /// Subject identity.
    pub subject: String,

    /// Identifier of the last verified token for the subject.
    pub token_id: String,

    /// Audience of that token.
    pub audience: Audience,

    /// Scopes of that token.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// When the record was written (Unix timestamp).
    pub stored_at: i64,

    /// Expiry of the credential that produced the record (Unix timestamp).
    pub expires_at: i64,
}

impl DurableIdentityRecord {
    /// Projects `claims` into a record stamped with `stored_at`.
    #[must_use]
    pub fn from_claims(claims: &ClaimSet, stored_at: i64) -> Self {
        Self {
            subject: claims.sub.clone(),
            token_id: claims.jti.clone(),
            audience: claims.aud.clone(),
            scopes: claims.scopes.clone(),
            stored_at,
            expires_at: claims.exp,
        }
    }

    /// Returns `true` if every projected field equals the one in `claims`.
    #[must_use]
    pub fn reflects(&self, claims: &ClaimSet) -> bool {
        self.subject == claims.sub
            && self.token_id == claims.jti
            && self.audience == claims.aud
            && self.scopes == claims.scopes
            && self.expires_at == claims.exp
    }

    /// Returns `true` if the credential behind this record had lapsed at `now`.
    #[must_use]
    pub fn credential_lapsed(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Free-form per-subject session data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// Caller supplied fields.
    #[serde(flatten)]
    pub data: Map<String, Value>,

    /// When the data was last written (Unix timestamp).
    pub updated_at: i64,
}

impl SessionData {
    /// Wraps `data`, dropping any caller supplied `updated_at`.
    #[must_use]
    pub fn new(mut data: Map<String, Value>, updated_at: i64) -> Self {
        data.remove("updated_at");
        Self { data, updated_at }
    }
}

/// Kinds of records the reconciler writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// `token:<jti>`
    EphemeralToken,
    /// `subject:<sub>:record`
    DurableIdentity,
    /// `subject:<sub>:latest_token`
    LatestTokenPointer,
}

impl RecordKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EphemeralToken => "ephemeral_token",
            Self::DurableIdentity => "durable_identity",
            Self::LatestTokenPointer => "latest_token_pointer",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single record write.
#[derive(Debug)]
pub enum WriteStatus {
    /// The store acknowledged the write.
    Written,
    /// The write failed or could not be encoded.
    Failed(AuthError),
    /// The write was not attempted because a write it depends on failed.
    Skipped,
}

impl WriteStatus {
    #[must_use]
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written)
    }
}

/// Outcome of one record write during reconciliation.
#[derive(Debug)]
pub struct WriteOutcome {
    /// Which record.
    pub kind: RecordKind,
    /// Store key of the record.
    pub key: String,
    /// What happened.
    pub status: WriteStatus,
}

/// Per-record outcomes of [`SessionReconciler::on_verified`](super::SessionReconciler::on_verified).
///
/// Failures here never affect the authorization decision.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Outcomes in write order: ephemeral record, durable record, pointer.
    pub outcomes: Vec<WriteOutcome>,
}

impl ReconcileReport {
    /// Returns `true` if every record was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.status.is_written())
    }

    /// Outcome for `kind`, if it was part of the reconciliation.
    #[must_use]
    pub fn outcome(&self, kind: RecordKind) -> Option<&WriteOutcome> {
        self.outcomes.iter().find(|o| o.kind == kind)
    }

    /// Outcomes that did not end in a write.
    pub fn failures(&self) -> impl Iterator<Item = &WriteOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_written())
    }
}
