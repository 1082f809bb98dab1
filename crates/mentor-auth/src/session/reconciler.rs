//! Keeps the ephemeral token record and the durable identity record in step.
//!
//! On every successful verification the reconciler writes:
//!
//! 1. `token:<jti>` with the full claims, expiring with the credential
//! 2. `subject:<sub>:record` with the identity projection, expiring after the
//!    retention window
//! 3. `subject:<sub>:latest_token` with the token identifier, same window
//!
//! Write 1 runs concurrently with writes 2 and 3. Write 3 only happens after
//! write 2 succeeded, so the pointer never names a token the record has not
//! seen. There is no cross-key atomicity: a reader racing a reconciliation
//! may see the new ephemeral record next to the previous identity record.
//!
//! Every store call is bounded by the configured operation timeout.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::keys;
use super::records::{
    DurableIdentityRecord, RecordKind, ReconcileReport, SessionData, WriteOutcome, WriteStatus,
};
use crate::AuthResult;
use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::store::{SessionStore, StoreError, StoreResult};
use crate::token::ClaimSet;

/// Writes and reads session state for verified credentials.
#[derive(Clone)]
pub struct SessionReconciler {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    identity_ttl: Duration,
    session_ttl: Duration,
    operation_timeout: Duration,
}

impl fmt::Debug for SessionReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionReconciler")
            .field("identity_ttl", &self.identity_ttl)
            .field("session_ttl", &self.session_ttl)
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionReconciler {
    /// Creates a reconciler on `store` with retention and timeouts from `config`.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, config: &AuthConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            identity_ttl: config.retention.identity_ttl,
            session_ttl: config.retention.session_ttl,
            operation_timeout: config.store.operation_timeout,
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Retention window of the identity record and pointer.
    #[must_use]
    pub fn identity_ttl(&self) -> Duration {
        self.identity_ttl
    }

    /// Records a freshly verified credential.
    ///
    /// Store failures are collected in the returned report and logged; they
    /// do not turn into an error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CredentialExpired` if the credential has no
    /// remaining lifetime. Nothing is written in that case.
    pub async fn on_verified(&self, claims: &ClaimSet) -> AuthResult<ReconcileReport> {
        let now = self.clock.now_unix();
        let remaining = claims.remaining_lifetime(now);
        if remaining <= 0 {
            return Err(AuthError::CredentialExpired);
        }
        let token_ttl = Duration::from_secs(remaining.unsigned_abs());

        let token_key = keys::token_key(&claims.jti);
        let identity_key = keys::identity_key(&claims.sub);
        let pointer_key = keys::latest_token_key(&claims.sub);
        let record = DurableIdentityRecord::from_claims(claims, now);

        let ephemeral = self.put_json(&token_key, claims, token_ttl);
        let durable = async {
            let record_status = self.put_json(&identity_key, &record, self.identity_ttl).await;
            let pointer_status = if record_status.is_written() {
                to_status(self.put(&pointer_key, &claims.jti, self.identity_ttl).await)
            } else {
                WriteStatus::Skipped
            };
            (record_status, pointer_status)
        };

        let (ephemeral_status, (record_status, pointer_status)) =
            tokio::join!(ephemeral, durable);

        let report = ReconcileReport {
            outcomes: vec![
                WriteOutcome {
                    kind: RecordKind::EphemeralToken,
                    key: token_key,
                    status: ephemeral_status,
                },
                WriteOutcome {
                    kind: RecordKind::DurableIdentity,
                    key: identity_key,
                    status: record_status,
                },
                WriteOutcome {
                    kind: RecordKind::LatestTokenPointer,
                    key: pointer_key,
                    status: pointer_status,
                },
            ],
        };

        for outcome in report.failures() {
            match &outcome.status {
                WriteStatus::Failed(error) => tracing::warn!(
                    subject = %claims.sub,
                    jti = %claims.jti,
                    record = %outcome.kind,
                    key = %outcome.key,
                    error = %error,
                    "session record write failed"
                ),
                _ => tracing::warn!(
                    subject = %claims.sub,
                    record = %outcome.kind,
                    key = %outcome.key,
                    "session record write skipped"
                ),
            }
        }

        if report.is_complete() {
            tracing::debug!(
                subject = %claims.sub,
                jti = %claims.jti,
                token_ttl_secs = remaining,
                "session state reconciled"
            );
        }

        Ok(report)
    }

    /// Returns the claims stored for `jti`, or `None` once they expired.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store fails and
    /// `AuthError::Serialization` if the stored record is corrupt.
    pub async fn get_by_token(&self, jti: &str) -> AuthResult<Option<ClaimSet>> {
        self.get_json(&keys::token_key(jti)).await
    }

    /// Returns the identity record for `subject`.
    ///
    /// # Errors
    ///
    /// See [`SessionReconciler::get_by_token`].
    pub async fn get_by_subject(&self, subject: &str) -> AuthResult<Option<DurableIdentityRecord>> {
        self.get_json(&keys::identity_key(subject)).await
    }

    /// Returns the last token identifier seen for `subject`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store fails.
    pub async fn get_latest_token_for(&self, subject: &str) -> AuthResult<Option<String>> {
        Ok(self.get(&keys::latest_token_key(subject)).await?)
    }

    /// Follows the pointer for `subject` to the still-live claims, if any.
    ///
    /// # Errors
    ///
    /// See [`SessionReconciler::get_by_token`].
    pub async fn resolve_latest_claims(&self, subject: &str) -> AuthResult<Option<ClaimSet>> {
        match self.get_latest_token_for(subject).await? {
            Some(jti) => self.get_by_token(&jti).await,
            None => Ok(None),
        }
    }

    /// Returns `true` if an identity record exists for `subject` and was
    /// written within the retention window.
    ///
    /// # Errors
    ///
    /// See [`SessionReconciler::get_by_token`].
    pub async fn is_identity_fresh(&self, subject: &str) -> AuthResult<bool> {
        let window = i64::try_from(self.identity_ttl.as_secs()).unwrap_or(i64::MAX);
        let now = self.clock.now_unix();

        Ok(self
            .get_by_subject(subject)
            .await?
            .is_some_and(|record| now.saturating_sub(record.stored_at) < window))
    }

    /// Removes every record held for `subject`: identity record, pointer,
    /// session data, and the ephemeral record of the last seen token.
    ///
    /// Returns how many keys were present.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store fails. The record
    /// is read first to find the token; a corrupt record is still removed.
    pub async fn purge_subject(&self, subject: &str) -> AuthResult<u64> {
        let mut doomed = vec![
            keys::identity_key(subject),
            keys::latest_token_key(subject),
            keys::session_key(subject),
        ];

        let mut token_ids = Vec::with_capacity(2);
        match self.get_by_subject(subject).await {
            Ok(Some(record)) => token_ids.push(record.token_id),
            Ok(None) => {}
            Err(AuthError::Serialization { message }) => {
                tracing::warn!(subject = %subject, error = %message, "purging corrupt identity record");
            }
            Err(e) => return Err(e),
        }
        if let Some(jti) = self.get_latest_token_for(subject).await? {
            if !token_ids.contains(&jti) {
                token_ids.push(jti);
            }
        }
        doomed.extend(token_ids.iter().map(|jti| keys::token_key(jti)));

        let deleted = self
            .bounded("delete", self.store.delete(&doomed))
            .await?;
        tracing::info!(subject = %subject, deleted, "subject session state purged");
        Ok(deleted)
    }

    /// Overwrites the session data of `subject`, stamping `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store fails.
    pub async fn store_session_data(
        &self,
        subject: &str,
        data: Map<String, Value>,
    ) -> AuthResult<SessionData> {
        let session = SessionData::new(data, self.clock.now_unix());
        let value = encode(&session)?;
        self.put(&keys::session_key(subject), &value, self.session_ttl)
            .await?;
        Ok(session)
    }

    /// Returns the session data of `subject`.
    ///
    /// # Errors
    ///
    /// See [`SessionReconciler::get_by_token`].
    pub async fn get_session_data(&self, subject: &str) -> AuthResult<Option<SessionData>> {
        self.get_json(&keys::session_key(subject)).await
    }

    /// Checks that the store answers.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if it does not.
    pub async fn check_store(&self) -> AuthResult<()> {
        self.get("health:probe").await?;
        Ok(())
    }

    async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> WriteStatus {
        match encode(value) {
            Ok(json) => to_status(self.put(key, &json, ttl).await),
            Err(e) => WriteStatus::Failed(e),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> AuthResult<Option<T>> {
        match self.get(key).await? {
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                AuthError::serialization(format!("corrupt record under '{key}': {e}"))
            }),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.bounded("put", self.store.put(key, value, ttl)).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.bounded("get", self.store.get(key)).await
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        tokio::time::timeout(self.operation_timeout, call)
            .await
            .map_err(|_| StoreError::Timeout {
                operation,
                after: self.operation_timeout,
            })?
    }
}

fn encode<T: Serialize>(value: &T) -> AuthResult<String> {
    serde_json::to_string(value).map_err(|e| AuthError::serialization(e.to_string()))
}

fn to_status(result: StoreResult<()>) -> WriteStatus {
    match result {
        Ok(()) => WriteStatus::Written,
        Err(e) => WriteStatus::Failed(e.into()),
    }
}
