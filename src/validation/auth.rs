// Request validation for token, registration and profile endpoints
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::{Map, Value};

use super::body::{ensure_id_unused, invalid_parameter, invalid_request, key_exists, parse_resource_body, ResourceBody};
use super::{as_integer, FieldValidator};
use crate::auth::{verify_password, Credentials};
use crate::database::models::{User, USER_RESOURCE};
use crate::database::store::Store;
use crate::error::ApiError;
use crate::filter::QueryParams;
use crate::jsonapi::errors::RequestContext;

pub const AUTH_TYPE: &str = "auth";

pub const TOKEN_CREATE_RULES: &[(&str, &str)] = &[
    ("username", "required|filled|string"),
    ("password", "required|filled|string"),
    ("isRemember", "required|filled|numeric|in:0,1"),
];

pub const TOKEN_REGISTER_RULES: &[(&str, &str)] = &[
    ("uuid", "required|filled|string|uuid"),
    ("time", "required|filled|numeric"),
];

pub const REGISTER_RULES: &[(&str, &str)] = &[
    ("fullname", "required|filled|string|between:2,100"),
    ("username", "required|filled|string|unique:user,username|max:50"),
    ("email", "required|filled|string|email|unique:user,email|max:50"),
    ("phone", "required|filled|string|unique:user,phone|max:50"),
    ("password", "required|filled|string|min:5"),
    ("passwordConfirm", "required|filled|string|same:password"),
];

pub const PROFILE_RULES: &[(&str, &str)] = &[
    ("fullname", "filled|string|between:2,100"),
    ("username", "filled|string|unique:user,username|max:50"),
    ("email", "filled|string|email|unique:user,email|max:50"),
    ("phone", "filled|string|unique:user,phone|max:50"),
    ("dateOfBirth", "filled|date|date_format:Y-m-d"),
    ("address", "filled|string"),
    ("passwordOld", "filled|string|min:5|required_with:password"),
    ("password", "filled|string|min:5|different:passwordOld|required_with:passwordOld,passwordConfirm"),
    ("passwordConfirm", "filled|string|same:password|required_with:password"),
];

/// `POST /auth/token` body. Returns the credentials and the remember flag.
pub async fn validate_token_create(context: &RequestContext, body: &Value) -> Result<(Credentials, bool), ApiError> {
    let empty = Map::new();
    let data = body.as_object().unwrap_or(&empty);
    FieldValidator::new(context, StatusCode::UNPROCESSABLE_ENTITY)
        .validate(data, TOKEN_CREATE_RULES)
        .await?;

    let text = |key: &str| data.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let credentials = Credentials { username: text("username"), password: text("password") };
    let remember = data.get("isRemember").and_then(as_integer) == Some(1);
    Ok((credentials, remember))
}

/// `GET /auth/token?uuid&time`: the hand-off link of a fresh registration.
/// Returns the user uuid.
pub async fn validate_token_register(
    context: &RequestContext,
    store: &dyn Store,
    params: &QueryParams,
) -> Result<String, ApiError> {
    FieldValidator::new(context, StatusCode::UNPROCESSABLE_ENTITY)
        .validate(params.tree(), TOKEN_REGISTER_RULES)
        .await?;

    let uuid = params.get("uuid").and_then(Value::as_str).unwrap_or_default().to_string();
    if !key_exists(store, &USER_RESOURCE, &uuid).await? {
        return Err(invalid_parameter(StatusCode::UNPROCESSABLE_ENTITY, "uuid resource is not exists.", "uuid"));
    }

    let time = params
        .get("time")
        .and_then(Value::as_str)
        .and_then(|t| t.trim().parse::<f64>().ok())
        .unwrap_or(0.0) as i64;
    if Utc::now().timestamp() >= time {
        return Err(invalid_parameter(StatusCode::UNPROCESSABLE_ENTITY, "time expired", "time"));
    }
    Ok(uuid)
}

pub async fn validate_register(context: &RequestContext, store: &dyn Store, body: &Value) -> Result<ResourceBody, ApiError> {
    let parsed = parse_resource_body(body, AUTH_TYPE)?;
    ensure_id_unused(store, &USER_RESOURCE, &parsed.id).await?;

    FieldValidator::new(context, StatusCode::UNPROCESSABLE_ENTITY)
        .with_store(store)
        .validate(&parsed.attributes, REGISTER_RULES)
        .await?;
    Ok(parsed)
}

/// Profile update by the signed-in `user`, including the old password check
pub async fn validate_profile_update(
    context: &RequestContext,
    store: &dyn Store,
    user: &User,
    body: &Value,
) -> Result<ResourceBody, ApiError> {
    let parsed = parse_resource_body(body, AUTH_TYPE)?;
    if !key_exists(store, &USER_RESOURCE, &parsed.id).await? {
        return Err(invalid_request(StatusCode::UNPROCESSABLE_ENTITY, "id resource is not exists.", "data/id"));
    }
    if parsed.id != user.uuid {
        return Err(invalid_request(StatusCode::UNPROCESSABLE_ENTITY, "id resource is invalid.", "data/id"));
    }

    FieldValidator::new(context, StatusCode::UNPROCESSABLE_ENTITY)
        .with_store(store)
        .ignoring(USER_RESOURCE.key_column, &user.uuid)
        .validate(&parsed.attributes, PROFILE_RULES)
        .await?;

    if parsed.attributes.contains_key("password") {
        let old = parsed.attributes.get("passwordOld").and_then(Value::as_str).unwrap_or_default();
        if !verify_password(old, &user.password) {
            return Err(invalid_request(StatusCode::UNPROCESSABLE_ENTITY, "Old Password is invalid.", "data/id"));
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::testing::fixture_uuid;
    use axum::http::Method;
    use serde_json::json;

    fn token_context() -> RequestContext {
        RequestContext::new(Method::POST, "/api/v1/auth/token")
    }

    async fn user(store: &MemoryStore, n: usize) -> User {
        User::from_row(&store.rows("user").await[n - 1]).unwrap()
    }

    fn detail(err: &ApiError) -> String {
        err.to_document().errors[0].detail.clone()
    }

    #[tokio::test]
    async fn token_create_reads_credentials() {
        let body = json!({"username": "user1", "password": "password", "isRemember": 1});
        let (credentials, remember) = validate_token_create(&token_context(), &body).await.unwrap();
        assert_eq!(credentials.username, "user1");
        assert!(remember);

        let body = json!({"username": "user1", "password": "password", "isRemember": "0"});
        assert!(!validate_token_create(&token_context(), &body).await.unwrap().1);
    }

    #[tokio::test]
    async fn token_create_points_at_plain_attributes() {
        let err = validate_token_create(&token_context(), &json!({"isRemember": 3})).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let doc = serde_json::to_value(err.to_document()).unwrap();
        let pointers: Vec<&str> = doc["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["source"]["pointer"].as_str().unwrap())
            .collect();
        assert_eq!(pointers, vec!["username", "password", "isRemember"]);
        assert_eq!(doc["errors"][2]["code"], "030");
    }

    #[tokio::test]
    async fn token_register_checks_user_and_expiry() {
        let store = MemoryStore::seeded_users(1);
        let context = RequestContext::get("/api/v1/auth/token");
        let future = Utc::now().timestamp() + 600;

        let params = QueryParams::parse(Some(&format!("uuid={}&time={}", fixture_uuid(1), future)));
        assert_eq!(validate_token_register(&context, &store, &params).await.unwrap(), fixture_uuid(1));

        let params = QueryParams::parse(Some(&format!("uuid={}&time={}", fixture_uuid(5), future)));
        let err = validate_token_register(&context, &store, &params).await.unwrap_err();
        assert_eq!(detail(&err), "uuid resource is not exists.");

        let params = QueryParams::parse(Some(&format!("uuid={}&time=1000", fixture_uuid(1))));
        let err = validate_token_register(&context, &store, &params).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(detail(&err), "time expired");

        let err = validate_token_register(&context, &store, &QueryParams::parse(Some("uuid=x"))).await.unwrap_err();
        let doc = serde_json::to_value(err.to_document()).unwrap();
        assert_eq!(doc["errors"][0]["source"]["parameter"], "uuid");
        assert_eq!(doc["errors"][1]["source"]["parameter"], "time");
    }

    #[tokio::test]
    async fn register_requires_email() {
        let store = MemoryStore::seeded_users(1);
        let context = RequestContext::new(Method::POST, "/api/v1/auth");
        let body = json!({"data": {"type": "auth", "id": "67e55044-10b1-426f-9247-bb680e5fe0c8", "attributes": {
            "fullname": "Ada", "username": "ada", "phone": "0812", "password": "secret", "passwordConfirm": "secret"
        }}});
        let err = validate_register(&context, &store, &body).await.unwrap_err();
        let doc = err.to_document();
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.errors[0].code, "050");
    }

    #[tokio::test]
    async fn profile_update_checks_the_old_password() {
        let store = MemoryStore::seeded_users(2);
        let me = user(&store, 1).await;
        let context = RequestContext::new(Method::PATCH, "/api/v1/auth");
        let change = |old: &str| {
            json!({"data": {"type": "auth", "id": fixture_uuid(1), "attributes": {
                "passwordOld": old, "password": "brand-new", "passwordConfirm": "brand-new"
            }}})
        };

        let err = validate_profile_update(&context, &store, &me, &change("wrong-one")).await.unwrap_err();
        assert_eq!(detail(&err), "Old Password is invalid.");
        assert!(validate_profile_update(&context, &store, &me, &change("password")).await.is_ok());

        let other = json!({"data": {"type": "auth", "id": fixture_uuid(2), "attributes": {"fullname": "Ada"}}});
        let err = validate_profile_update(&context, &store, &me, &other).await.unwrap_err();
        assert_eq!(detail(&err), "id resource is invalid.");
    }
}
