// Request validation for the user resource
use axum::http::StatusCode;
use serde_json::Value;

use super::body::{ensure_id_unused, invalid_parameter, invalid_request, key_exists, parse_resource_body, ResourceBody};
use super::{is_uuid, FieldValidator};
use crate::database::models::USER_RESOURCE;
use crate::database::store::Store;
use crate::error::ApiError;
use crate::jsonapi::errors::RequestContext;

pub const CREATE_RULES: &[(&str, &str)] = &[
    ("fullname", "required|filled|string|between:2,100"),
    ("username", "required|filled|string|unique:user,username|max:50"),
    ("email", "filled|string|email|unique:user,email|max:100"),
    ("phone", "required|filled|numeric|unique:user,phone"),
    ("dateOfBirth", "filled|date|date_format:Y-m-d"),
    ("address", "filled|string"),
    ("password", "required|filled|string|min:5"),
    ("passwordConfirm", "required|filled|string|same:password"),
];

pub const UPDATE_RULES: &[(&str, &str)] = &[
    ("fullname", "filled|string|between:2,100"),
    ("username", "filled|string|unique:user,username|max:50"),
    ("email", "filled|string|email|unique:user,email|max:100"),
    ("phone", "filled|numeric|unique:user,phone"),
    ("dateOfBirth", "filled|date|date_format:Y-m-d"),
    ("address", "filled|string"),
    ("passwordOld", "filled|string|min:5|required_with:password"),
    ("password", "filled|string|min:5|different:passwordOld|required_with:passwordOld,passwordConfirm"),
    ("passwordConfirm", "filled|string|same:password|required_with:password"),
];

/// Path identifier: format first, then existence among live users
pub async fn validate_uuid(store: &dyn Store, uuid: &str) -> Result<(), ApiError> {
    if !is_uuid(uuid) {
        return Err(invalid_parameter(StatusCode::BAD_REQUEST, "uuid is invalid format.", "uuid"));
    }
    if !key_exists(store, &USER_RESOURCE, uuid).await? {
        return Err(invalid_parameter(StatusCode::BAD_REQUEST, "uuid resource is not exists.", "uuid"));
    }
    Ok(())
}

pub async fn validate_create(context: &RequestContext, store: &dyn Store, body: &Value) -> Result<ResourceBody, ApiError> {
    let parsed = parse_resource_body(body, USER_RESOURCE.resource_type)?;
    ensure_id_unused(store, &USER_RESOURCE, &parsed.id).await?;

    FieldValidator::new(context, StatusCode::UNPROCESSABLE_ENTITY)
        .with_store(store)
        .validate(&parsed.attributes, CREATE_RULES)
        .await?;
    Ok(parsed)
}

/// `uuid` has already passed `validate_uuid`
pub async fn validate_update(
    context: &RequestContext,
    store: &dyn Store,
    uuid: &str,
    body: &Value,
) -> Result<ResourceBody, ApiError> {
    let parsed = parse_resource_body(body, USER_RESOURCE.resource_type)?;
    if !key_exists(store, &USER_RESOURCE, &parsed.id).await? {
        return Err(invalid_request(StatusCode::BAD_REQUEST, "id resource is invalid format.", "data/id"));
    }
    if parsed.id != uuid {
        return Err(invalid_request(StatusCode::UNPROCESSABLE_ENTITY, "id resource is invalid.", "data/id"));
    }

    FieldValidator::new(context, StatusCode::UNPROCESSABLE_ENTITY)
        .with_store(store)
        .ignoring(USER_RESOURCE.key_column, uuid)
        .validate(&parsed.attributes, UPDATE_RULES)
        .await?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::testing::fixture_uuid;
    use axum::http::Method;
    use serde_json::json;

    const NEW_ID: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";

    fn create_context() -> RequestContext {
        RequestContext::new(Method::POST, "/api/v1/user")
    }

    fn body(id: &str, attributes: Value) -> Value {
        json!({"data": {"type": "user", "id": id, "attributes": attributes}})
    }

    fn valid_attributes() -> Value {
        json!({
            "fullname": "Ada Lovelace",
            "username": "ada",
            "email": "ada@example.com",
            "phone": "081234567",
            "dateOfBirth": "1815-12-10",
            "password": "secret",
            "passwordConfirm": "secret"
        })
    }

    fn details(err: ApiError) -> Vec<(String, String)> {
        err.to_document()
            .errors
            .into_iter()
            .map(|e| (e.code, serde_json::to_value(e.source).unwrap()["pointer"].as_str().unwrap_or("").to_string()))
            .collect()
    }

    #[tokio::test]
    async fn path_uuid_checks() {
        let store = MemoryStore::seeded_users(2);
        let err = validate_uuid(&store, "abc").await.unwrap_err();
        assert_eq!(err.to_document().errors[0].detail, "uuid is invalid format.");
        let err = validate_uuid(&store, NEW_ID).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_document().errors[0].detail, "uuid resource is not exists.");
        assert!(validate_uuid(&store, &fixture_uuid(2)).await.is_ok());
    }

    #[tokio::test]
    async fn create_accepts_valid_attributes() {
        let store = MemoryStore::seeded_users(2);
        let parsed = validate_create(&create_context(), &store, &body(NEW_ID, valid_attributes())).await.unwrap();
        assert_eq!(parsed.attributes["username"], "ada");
    }

    #[tokio::test]
    async fn create_rejects_taken_ids() {
        let store = MemoryStore::seeded_users(2);
        let err = validate_create(&create_context(), &store, &body(&fixture_uuid(1), valid_attributes()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_document().errors[0].detail, "id resource is not exists.");
    }

    #[tokio::test]
    async fn create_collects_every_rule_failure() {
        let store = MemoryStore::seeded_users(2);
        let attributes = json!({
            "fullname": "A",
            "username": "USER1",
            "email": "not-an-email",
            "phone": "08x",
            "password": "secret",
            "passwordConfirm": "other"
        });
        let err = validate_create(&create_context(), &store, &body(NEW_ID, attributes)).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let found = details(err);
        for expected in [
            ("011", "/data/attributes/fullname"),
            ("062", "/data/attributes/username"),
            ("022", "/data/attributes/email"),
            ("046", "/data/attributes/phone"),
            ("057", "/data/attributes/passwordConfirm"),
        ] {
            assert!(
                found.contains(&(expected.0.to_string(), expected.1.to_string())),
                "missing {:?} in {:?}",
                expected,
                found
            );
        }
    }

    #[tokio::test]
    async fn update_requires_matching_id_and_ignores_self_for_unique() {
        let store = MemoryStore::seeded_users(2);
        let context = RequestContext::new(Method::PATCH, format!("/api/v1/user/{}", fixture_uuid(1)));

        let err = validate_update(&context, &store, &fixture_uuid(1), &body(&fixture_uuid(2), json!({"fullname": "Ada"})))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.to_document().errors[0].detail, "id resource is invalid.");

        let err = validate_update(&context, &store, &fixture_uuid(1), &body(NEW_ID, json!({"fullname": "Ada"})))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let own = body(&fixture_uuid(1), json!({"username": "user1", "email": "USER1@example.com"}));
        assert!(validate_update(&context, &store, &fixture_uuid(1), &own).await.is_ok());

        let taken = body(&fixture_uuid(1), json!({"username": "user2"}));
        let err = validate_update(&context, &store, &fixture_uuid(1), &taken).await.unwrap_err();
        assert_eq!(details(err), vec![("062".to_string(), "/data/attributes/username".to_string())]);
    }

    #[tokio::test]
    async fn update_password_needs_old_and_confirmation() {
        let store = MemoryStore::seeded_users(1);
        let context = RequestContext::new(Method::PUT, format!("/api/v1/user/{}", fixture_uuid(1)));
        let request = body(&fixture_uuid(1), json!({"password": "newpass"}));
        let err = validate_update(&context, &store, &fixture_uuid(1), &request).await.unwrap_err();
        let found = details(err);
        assert!(found.contains(&("053".to_string(), "/data/attributes/passwordOld".to_string())));
        assert!(found.contains(&("053".to_string(), "/data/attributes/passwordConfirm".to_string())));
    }
}
