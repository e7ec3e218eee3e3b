use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::app::AppState;
use crate::auth::AuthError;
use crate::database::store::Row;
use crate::error::ApiError;

/// Signed-in user, inserted into request extensions by `bearer_auth`
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub token: String,
    pub user: Row,
}

/// Bearer token middleware: resolves the token to a live user or answers 401
pub async fn bearer_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers())?;
    let user = state.auth.current_user(&token).await.map_err(|e| {
        debug!("Bearer token rejected: {}", e);
        ApiError::from(e)
    })?;

    request.extensions_mut().insert(AuthUser { token, user });
    Ok(next.run(request).await)
}

/// Token from `Authorization: Bearer <token>`
pub fn extract_bearer(headers: &HeaderMap) -> Result<String, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken)?;

    let (scheme, token) = value.trim().split_once(' ').ok_or(AuthError::MissingToken)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token.trim().to_string())
}
