// handlers/auth/profile.rs - GET/PUT/PATCH /auth handlers

use axum::{
    extract::State,
    http::{HeaderMap, Method, Uri},
    Extension,
};
use serde_json::Value;

use crate::app::AppState;
use crate::auth::hash_password;
use crate::database::models::user::writable_values;
use crate::database::models::{User, UserTransformer};
use crate::error::ApiError;
use crate::handlers::request_context;
use crate::jsonapi::Serializer;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::validation::auth::validate_profile_update;

/// GET /auth - the signed-in user
pub async fn profile(State(state): State<AppState>, headers: HeaderMap, Extension(auth): Extension<AuthUser>) -> ApiResult {
    let links = state.links(&headers);
    let transformer = UserTransformer::auth();
    Ok(ApiResponse::success(Serializer::new(&links, &transformer).item(&auth.user)))
}

/// PUT/PATCH /auth - update the signed-in user; a new password needs `passwordOld`
pub async fn profile_update(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Extension(auth): Extension<AuthUser>,
    JsonBody(body): JsonBody,
) -> ApiResult {
    let user = User::from_row(&auth.user).map_err(|e| ApiError::internal_server_error(e.to_string()))?;
    let context = request_context(&method, &uri);
    let parsed = validate_profile_update(&context, state.store.as_ref(), &user, &body).await?;

    let mut values = writable_values(&parsed.attributes);
    if let Some(password) = parsed.attributes.get("password").and_then(Value::as_str) {
        values.insert("password".into(), Value::String(hash_password(password)?));
    }

    let row = state
        .users
        .update(&user.uuid, values)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("user {}", user.uuid)))?;

    let links = state.links(&headers);
    let transformer = UserTransformer::auth();
    Ok(ApiResponse::success(Serializer::new(&links, &transformer).item(&row)))
}
