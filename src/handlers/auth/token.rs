// handlers/auth/token.rs - /auth/token handlers

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::Json,
    Extension,
};
use std::net::SocketAddr;
use tracing::info;

use super::{client_ip, record_login};
use crate::app::AppState;
use crate::auth::{AccessToken, AuthError};
use crate::error::ApiError;
use crate::filter::QueryParams;
use crate::handlers::request_context;
use crate::jsonapi::ErrorObject;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::validation::auth::{validate_token_create, validate_token_register};

/**
 * POST /auth/token - sign in
 *
 * Expected Input:
 * ```json
 * { "username": "jdoe", "password": "secret", "isRemember": 1 }
 * ```
 *
 * `username` may also be an email address or a phone number.
 *
 * Expected Output:
 * ```json
 * { "accessToken": "eyJ0eXAiOiJKV1Qi...", "tokenType": "bearer", "expiresIn": 3600 }
 * ```
 */
pub async fn token_create(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    JsonBody(body): JsonBody,
) -> Result<Json<AccessToken>, ApiError> {
    let context = request_context(&method, &uri);
    let (credentials, remember) = validate_token_create(&context, &body).await?;

    let (token, user) = state.auth.attempt(&credentials, remember).await.map_err(|e| match e {
        AuthError::InvalidCredentials => invalid_login(),
        other => ApiError::from(other),
    })?;

    record_login(&state, &user, client_ip(&headers, peer.as_ref())).await?;
    info!("User signed in by {}", credentials.login_column());
    Ok(Json(token))
}

/// GET /auth/token?uuid=..&time=.. - token for a freshly registered user
pub async fn token_register(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<Json<AccessToken>, ApiError> {
    let context = request_context(&method, &uri);
    let params = QueryParams::parse(uri.query());
    let uuid = validate_token_register(&context, state.store.as_ref(), &params).await?;

    let user = state.users.select_404(&uuid).await?;
    let token = state.auth.login(&user, false)?;
    record_login(&state, &user, client_ip(&headers, peer.as_ref())).await?;
    Ok(Json(token))
}

/// PUT /auth/token - exchange the bearer token for a fresh one
pub async fn token_refresh(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<AccessToken>, ApiError> {
    Ok(Json(state.auth.refresh(&auth.token)?))
}

/// DELETE /auth/token - revoke the bearer token
pub async fn token_delete(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult {
    state.auth.logout(&auth.token)?;
    Ok(ApiResponse::no_content())
}

fn invalid_login() -> ApiError {
    ApiError::single(
        StatusCode::UNAUTHORIZED,
        ErrorObject::new(StatusCode::UNAUTHORIZED, "401", "invalid login", "user or password is invalid")
            .with_parameter("username"),
    )
}
