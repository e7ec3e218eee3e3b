// handlers/user/create.rs - POST /user handler

use axum::{
    extract::State,
    http::{HeaderMap, Method, Uri},
};
use serde_json::Value;
use tracing::info;

use crate::app::AppState;
use crate::auth::hash_password;
use crate::database::models::user::writable_values;
use crate::database::models::UserTransformer;
use crate::handlers::request_context;
use crate::jsonapi::{Serializer, Transformer};
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::validation::user::validate_create;

/**
 * POST /user - create a user with a client generated uuid
 *
 * Expected Input:
 * ```json
 * {
 *   "data": {
 *     "type": "user",
 *     "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
 *     "attributes": { "fullname": "...", "username": "...", "phone": "...",
 *                     "password": "...", "passwordConfirm": "..." }
 *   }
 * }
 * ```
 *
 * Responds 201 with the stored user and a `Location` header.
 */
pub async fn user_create(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> ApiResult {
    let context = request_context(&method, &uri);
    let parsed = validate_create(&context, state.store.as_ref(), &body).await?;

    let mut values = writable_values(&parsed.attributes);
    values.insert("uuid".into(), Value::String(parsed.id.clone()));
    let password = parsed.attributes.get("password").and_then(Value::as_str).unwrap_or_default();
    values.insert("password".into(), Value::String(hash_password(password)?));

    let row = state.users.create(values).await?;
    info!("User {} created", parsed.id);

    let links = state.links(&headers);
    let transformer = UserTransformer::user();
    let location = links.resource(transformer.url(), Some(&parsed.id));
    Ok(ApiResponse::created(Serializer::new(&links, &transformer).item(&row), location))
}
