//! `/auth` handlers.

use axum::{
    Json, Router,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use serde_json::{Map, Value, json};

use super::auth::{AuthState, Authenticated};
use super::error::ApiError;

/// Routes of the `/auth` API, relative to the API prefix.
pub fn auth_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    AuthState: FromRef<S>,
{
    Router::new()
        .route("/auth/secure", get(secure))
        .route("/auth/token/{jti}", get(token_payload))
        .route("/auth/user/{user_id}", delete(purge_user))
        .route("/auth/user/{user_id}/data", get(user_record))
        .route("/auth/user/{user_id}/latest-jti", get(latest_jti))
        .route(
            "/auth/user/{user_id}/session",
            get(get_session).put(put_session),
        )
}

/// GET /auth/secure
async fn secure(Authenticated(auth): Authenticated) -> Json<Value> {
    let claims = auth.claims;
    Json(json!({
        "ok": true,
        "user_id": claims.sub,
        "aud": claims.aud,
        "scopes": claims.scopes,
        "exp": claims.exp,
        "jti": claims.jti,
    }))
}

/// GET /auth/token/{jti}
async fn token_payload(
    State(state): State<AuthState>,
    Path(jti): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let claims = state
        .reconciler()
        .get_by_token(&jti)
        .await?
        .ok_or_else(|| ApiError::not_found("Token not found or expired"))?;
    Ok(Json(json!({ "jti": jti, "payload": claims })))
}

/// GET /auth/user/{user_id}/data
async fn user_record(
    State(state): State<AuthState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .reconciler()
        .get_by_subject(&user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User data not found"))?;
    Ok(Json(json!({ "user_id": user_id, "data": record })))
}

/// GET /auth/user/{user_id}/latest-jti
async fn latest_jti(
    State(state): State<AuthState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let jti = state
        .reconciler()
        .get_latest_token_for(&user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No token recorded for user"))?;
    Ok(Json(json!({ "user_id": user_id, "latest_jti": jti })))
}

/// GET /auth/user/{user_id}/session
async fn get_session(
    State(state): State<AuthState>,
    Path(user_id): Path<String>,
    caller: Authenticated,
) -> Result<Json<Value>, ApiError> {
    caller.require_subject(&user_id)?;
    let session = state
        .reconciler()
        .get_session_data(&user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;
    Ok(Json(json!({ "user_id": user_id, "session": session })))
}

/// PUT /auth/user/{user_id}/session
async fn put_session(
    State(state): State<AuthState>,
    Path(user_id): Path<String>,
    caller: Authenticated,
    Json(data): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    caller.require_subject(&user_id)?;
    let session = state
        .reconciler()
        .store_session_data(&user_id, data)
        .await?;
    Ok(Json(json!({ "user_id": user_id, "session": session })))
}

/// DELETE /auth/user/{user_id}
async fn purge_user(
    State(state): State<AuthState>,
    Path(user_id): Path<String>,
    caller: Authenticated,
) -> Result<Json<Value>, ApiError> {
    caller.require_subject(&user_id)?;
    let deleted = state.reconciler().purge_subject(&user_id).await?;
    Ok(Json(json!({ "user_id": user_id, "deleted": deleted })))
}

/// GET /health
pub async fn health(State(state): State<AuthState>) -> impl IntoResponse {
    match state.reconciler().check_store().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "store": "unavailable" })),
            )
        }
    }
}
