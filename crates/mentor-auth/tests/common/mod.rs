//! Shared fixtures: an ES384 issuer and a manager on a manual clock.

#![allow(dead_code)]

use std::sync::Arc;

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use mentor_auth::{AuthConfig, ManualClock, MemoryStore, SessionManager};
use p384::SecretKey;
use p384::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use serde_json::{Value, json};

pub const NOW: i64 = 1_700_000_000;

pub struct Issuer {
    encoding_key: EncodingKey,
    pub public_pem: String,
}

impl Issuer {
    pub fn new() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let private_pem = secret.to_pkcs8_pem(LineEnding::LF).unwrap();
        let public_pem = secret
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        Self {
            encoding_key: EncodingKey::from_ec_pem(private_pem.as_bytes()).unwrap(),
            public_pem,
        }
    }

    pub fn sign(&self, claims: &Value) -> String {
        encode(&Header::new(Algorithm::ES384), claims, &self.encoding_key).unwrap()
    }

    /// Credential for `sub`/`jti` issued at `iat`, valid for `lifetime` seconds.
    pub fn credential(&self, sub: &str, jti: &str, iat: i64, lifetime: i64) -> String {
        self.sign(&json!({
            "sub": sub,
            "aud": "1",
            "jti": jti,
            "iat": iat,
            "exp": iat + lifetime,
            "scopes": ["profile:read"]
        }))
    }

    pub fn config(&self) -> AuthConfig {
        let mut config = AuthConfig::default();
        config.verifier.algorithm = "ES384".to_string();
        config.verifier.public_key_pem = Some(self.public_pem.clone());
        config
    }
}

pub struct Harness {
    pub issuer: Issuer,
    pub clock: Arc<ManualClock>,
    pub store: MemoryStore,
    pub manager: SessionManager,
}

impl Harness {
    pub fn new() -> Self {
        let issuer = Issuer::new();
        let clock = Arc::new(ManualClock::new(NOW));
        let store = MemoryStore::with_clock(clock.clone());
        let manager = SessionManager::from_config(&issuer.config(), Arc::new(store.clone()))
            .unwrap()
            .with_clock(clock.clone());
        Self {
            issuer,
            clock,
            store,
            manager,
        }
    }
}
