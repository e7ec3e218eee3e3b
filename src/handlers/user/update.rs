// handlers/user/update.rs - PUT/PATCH /user/:uuid handler

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method, Uri},
};
use serde_json::Value;

use crate::app::AppState;
use crate::auth::hash_password;
use crate::database::models::user::writable_values;
use crate::database::models::UserTransformer;
use crate::error::ApiError;
use crate::handlers::request_context;
use crate::jsonapi::Serializer;
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::validation::user::{validate_update, validate_uuid};

/// PUT/PATCH /user/:uuid - partial update; only attributes sent are written
pub async fn user_update(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> ApiResult {
    validate_uuid(state.store.as_ref(), &uuid).await?;
    let context = request_context(&method, &uri);
    let parsed = validate_update(&context, state.store.as_ref(), &uuid, &body).await?;

    let mut values = writable_values(&parsed.attributes);
    if let Some(password) = parsed.attributes.get("password").and_then(Value::as_str) {
        values.insert("password".into(), Value::String(hash_password(password)?));
    }

    let row = state
        .users
        .update(&uuid, values)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("user {}", uuid)))?;

    let links = state.links(&headers);
    let transformer = UserTransformer::user();
    Ok(ApiResponse::success(Serializer::new(&links, &transformer).item(&row)))
}
