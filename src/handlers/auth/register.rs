// handlers/auth/register.rs - POST /auth handler

use axum::{
    extract::State,
    http::{HeaderMap, Method, Uri},
};
use chrono::{Duration, Utc};
use serde_json::Value;
use tracing::info;

use crate::app::AppState;
use crate::auth::hash_password;
use crate::database::models::UserTransformer;
use crate::database::store::Row;
use crate::handlers::request_context;
use crate::jsonapi::Serializer;
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::validation::auth::validate_register;

const REGISTER_COLUMNS: &[(&str, &str)] = &[
    ("fullname", "fullname"),
    ("username", "username"),
    ("email", "email"),
    ("phone", "phone"),
];

/**
 * POST /auth - self registration
 *
 * Expected Input:
 * ```json
 * {
 *   "data": {
 *     "type": "auth",
 *     "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
 *     "attributes": { "fullname": "...", "username": "...", "email": "...",
 *                     "phone": "...", "password": "...", "passwordConfirm": "..." }
 *   }
 * }
 * ```
 *
 * Responds 201. `Location` points at `GET /auth/token` with a short-lived
 * `time` so the client can pick up its first token.
 */
pub async fn register(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> ApiResult {
    let context = request_context(&method, &uri);
    let parsed = validate_register(&context, state.store.as_ref(), &body).await?;

    let mut values = Row::new();
    values.insert("uuid".into(), Value::String(parsed.id.clone()));
    for (attribute, column) in REGISTER_COLUMNS {
        if let Some(value) = parsed.attributes.get(*attribute).and_then(Value::as_str) {
            values.insert(column.to_string(), Value::String(value.trim().to_string()));
        }
    }
    let password = parsed.attributes.get("password").and_then(Value::as_str).unwrap_or_default();
    values.insert("password".into(), Value::String(hash_password(password)?));

    let row = state.users.create(values).await?;
    info!("User {} registered", parsed.id);

    let links = state.links(&headers);
    let expires = Utc::now() + Duration::minutes(state.config.security.register_link_minutes);
    let location = format!(
        "{}?uuid={}&time={}",
        links.resource("auth/token", None),
        parsed.id,
        expires.timestamp()
    );

    let transformer = UserTransformer::auth();
    Ok(ApiResponse::created(Serializer::new(&links, &transformer).item(&row), location))
}
