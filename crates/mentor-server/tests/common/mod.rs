//! Router fixture on an in-memory store and a manual clock.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, header},
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use mentor_auth::{AuthConfig, ManualClock, MemoryStore, SessionManager};
use mentor_server::{AppState, build_app, config::ServerConfig, http::AuthState};
use p384::SecretKey;
use p384::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use serde_json::{Value, json};
use tower::ServiceExt;

pub const NOW: i64 = 1_700_000_000;

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub store: MemoryStore,
    encoding_key: EncodingKey,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_server_config(ServerConfig::default())
    }

    pub fn with_server_config(server: ServerConfig) -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let private_pem = secret.to_pkcs8_pem(LineEnding::LF).unwrap();
        let public_pem = secret
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();

        let mut config = AuthConfig::default();
        config.verifier.algorithm = "ES384".to_string();
        config.verifier.public_key_pem = Some(public_pem);

        let clock = Arc::new(ManualClock::new(NOW));
        let store = MemoryStore::with_clock(clock.clone());
        let manager = SessionManager::from_config(&config, Arc::new(store.clone()))
            .unwrap()
            .with_clock(clock.clone());

        let state = AppState {
            auth: AuthState::new(manager),
        };

        Self {
            router: build_app(state, &server),
            clock,
            store,
            encoding_key: EncodingKey::from_ec_pem(private_pem.as_bytes()).unwrap(),
        }
    }

    /// Signed credential for `sub`/`jti`, issued now and valid for `lifetime` seconds.
    pub fn credential(&self, sub: &str, jti: &str, lifetime: i64) -> String {
        let iat = NOW;
        encode(
            &Header::new(Algorithm::ES384),
            &json!({
                "sub": sub,
                "aud": "1",
                "jti": jti,
                "iat": iat,
                "exp": iat + lifetime,
                "scopes": ["profile:read"]
            }),
            &self.encoding_key,
        )
        .unwrap()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, bearer: Option<&str>) -> Response<Body> {
        self.send(Method::GET, uri, bearer, None).await
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
