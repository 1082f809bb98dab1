use std::net::SocketAddr;

use axum::{Router, extract::FromRef, http::HeaderValue, routing::get};
use mentor_auth::SessionManager;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::{AppConfig, ServerConfig},
    http::{self, AuthState},
    store::create_session_store,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthState,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

pub struct MentorServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(state: AppState, cfg: &ServerConfig) -> Router {
    let api = http::auth_routes::<AppState>();
    let prefix = cfg.api_prefix.trim_end_matches('/');
    let router = if prefix.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(prefix, api)
    };

    router
        .route("/health", get(http::health))
        .layer(cors_layer(&cfg.cors_allow_origins))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Connects the session store and builds the router.
    ///
    /// # Errors
    ///
    /// Fails if Redis is required but unreachable, or if the verifier cannot
    /// be built from the auth configuration.
    pub async fn build(self) -> anyhow::Result<MentorServer> {
        let store = create_session_store(&self.config).await?;
        let manager = SessionManager::from_config(&self.config.auth, store)?;
        tracing::info!(
            algorithm = %manager.verifier().algorithm(),
            audience = %manager.verifier().expected_audience(),
            "credential verifier ready"
        );

        let state = AppState {
            auth: AuthState::new(manager),
        };
        let app = build_app(state, &self.config.server);

        Ok(MentorServer {
            addr: self.addr,
            app,
        })
    }
}

impl MentorServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
