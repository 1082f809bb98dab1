//! End-to-end verification and reconciliation scenarios on the memory store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Harness, NOW};
use mentor_auth::{
    AuthError, Clock, RecordKind, SessionManager, SessionStore, StoreError, StoreResult,
    WriteStatus,
};

#[tokio::test]
async fn test_subject_42_lookups_outlive_credential() {
    let h = Harness::new();
    let raw = h.issuer.credential("42", "tok-A", NOW, 60);

    let auth = h.manager.authorize(&raw).await.unwrap();
    assert!(auth.report.is_complete());

    let reconciler = h.manager.reconciler();
    assert_eq!(
        reconciler.get_by_token("tok-A").await.unwrap(),
        Some(auth.claims.clone())
    );

    h.clock.advance(61);
    assert_eq!(reconciler.get_by_token("tok-A").await.unwrap(), None);

    let record = reconciler.get_by_subject("42").await.unwrap().unwrap();
    assert_eq!(record.token_id, "tok-A");
    assert!(record.reflects(&auth.claims));
    assert!(record.credential_lapsed(h.clock.now_unix()));

    // The same credential is no longer accepted.
    let err = h.manager.authorize(&raw).await.unwrap_err();
    assert!(matches!(err, AuthError::CredentialExpired));
}

#[tokio::test]
async fn test_subject_7_pointer_follows_latest_token() {
    let h = Harness::new();
    let reconciler = h.manager.reconciler();

    h.manager
        .authorize(&h.issuer.credential("7", "tok-1", NOW, 600))
        .await
        .unwrap();
    h.clock.advance(30);
    let second = h
        .manager
        .authorize(&h.issuer.credential("7", "tok-2", NOW + 30, 600))
        .await
        .unwrap();

    assert_eq!(
        reconciler.get_latest_token_for("7").await.unwrap().as_deref(),
        Some("tok-2")
    );
    let record = reconciler.get_by_subject("7").await.unwrap().unwrap();
    assert_eq!(record.token_id, "tok-2");
    assert_eq!(record.stored_at, NOW + 30);

    // Both ephemeral records stay until their own expiry.
    assert!(reconciler.get_by_token("tok-1").await.unwrap().is_some());
    assert_eq!(
        reconciler.resolve_latest_claims("7").await.unwrap(),
        Some(second.claims)
    );
}

#[tokio::test]
async fn test_pointer_and_record_agree() {
    let h = Harness::new();
    let reconciler = h.manager.reconciler();
    h.manager
        .authorize(&h.issuer.credential("99", "tok-X", NOW, 300))
        .await
        .unwrap();

    let jti = reconciler.get_latest_token_for("99").await.unwrap().unwrap();
    let claims = reconciler.get_by_token(&jti).await.unwrap().unwrap();
    let record = reconciler.get_by_subject("99").await.unwrap().unwrap();

    assert_eq!(jti, "tok-X");
    assert!(record.reflects(&claims));
}

#[tokio::test]
async fn test_ephemeral_ttl_matches_remaining_lifetime() {
    let h = Harness::new();
    h.clock.advance(20);
    h.manager
        .authorize(&h.issuer.credential("5", "tok-5", NOW, 120))
        .await
        .unwrap();

    assert_eq!(h.store.ttl_of("token:tok-5"), Some(100));

    h.clock.advance(99);
    assert!(h.manager.reconciler().get_by_token("tok-5").await.unwrap().is_some());
    h.clock.advance(1);
    assert!(h.manager.reconciler().get_by_token("tok-5").await.unwrap().is_none());
}

#[tokio::test]
async fn test_purge_clears_subject() {
    let h = Harness::new();
    let reconciler = h.manager.reconciler();
    h.manager
        .authorize(&h.issuer.credential("42", "tok-A", NOW, 60))
        .await
        .unwrap();
    reconciler
        .store_session_data("42", serde_json::Map::new())
        .await
        .unwrap();

    assert_eq!(reconciler.purge_subject("42").await.unwrap(), 4);
    assert!(reconciler.get_by_subject("42").await.unwrap().is_none());
    assert!(reconciler.get_latest_token_for("42").await.unwrap().is_none());
    assert!(reconciler.get_by_token("tok-A").await.unwrap().is_none());
    assert!(reconciler.get_session_data("42").await.unwrap().is_none());
}

struct RefusingStore;

#[async_trait]
impl SessionStore for RefusingStore {
    async fn put(&self, _: &str, _: &str, _: Duration) -> StoreResult<()> {
        Err(StoreError::unavailable("connection refused"))
    }
    async fn get(&self, _: &str) -> StoreResult<Option<String>> {
        Err(StoreError::unavailable("connection refused"))
    }
    async fn delete(&self, _: &[String]) -> StoreResult<u64> {
        Err(StoreError::unavailable("connection refused"))
    }
}

#[tokio::test]
async fn test_unreachable_store_still_authorizes() {
    let h = Harness::new();
    let manager = SessionManager::from_config(&h.issuer.config(), Arc::new(RefusingStore))
        .unwrap()
        .with_clock(h.clock.clone());

    let auth = manager
        .authorize(&h.issuer.credential("42", "tok-A", NOW, 60))
        .await
        .unwrap();

    assert_eq!(auth.claims.sub, "42");
    assert!(!auth.report.is_complete());
    for kind in [RecordKind::EphemeralToken, RecordKind::DurableIdentity] {
        let outcome = auth.report.outcome(kind).unwrap();
        assert!(matches!(
            &outcome.status,
            WriteStatus::Failed(e) if e.is_store_error()
        ));
    }
    assert!(matches!(
        auth.report.outcome(RecordKind::LatestTokenPointer).unwrap().status,
        WriteStatus::Skipped
    ));
}

#[tokio::test]
async fn test_rejected_credentials_write_nothing() {
    let h = Harness::new();
    let impostor = common::Issuer::new();

    let err = h
        .manager
        .authorize(&impostor.credential("42", "tok-A", NOW, 60))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CredentialInvalid { .. }));

    let err = h.manager.authorize("garbage").await.unwrap_err();
    assert!(err.is_credential_error());

    assert!(h.store.is_empty());
}
