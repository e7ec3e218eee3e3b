use axum::http::StatusCode;
use serde_json::{Map, Value};

use crate::database::store::{ExistsQuery, Store};
use crate::error::ApiError;
use crate::jsonapi::errors::ErrorObject;
use crate::resource::ResourceDescriptor;
use crate::validation::is_uuid;

/// `data` member of a create/update request
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBody {
    pub id: String,
    pub attributes: Map<String, Value>,
}

/// Single `invalid request` error with a pointer source
pub fn invalid_request(status: StatusCode, detail: &str, pointer: &str) -> ApiError {
    let error = ErrorObject::new(status, status.as_u16().to_string(), "invalid request", detail).with_pointer(pointer);
    ApiError::single(status, error)
}

/// Single `invalid request` error with a parameter source
pub fn invalid_parameter(status: StatusCode, detail: &str, parameter: &str) -> ApiError {
    let error = ErrorObject::new(status, status.as_u16().to_string(), "invalid request", detail).with_parameter(parameter);
    ApiError::single(status, error)
}

/// Structural checks, each one stopping the request with a 400:
/// `data`, `data.attributes`, `data.type`, then the `data.id` format
pub fn parse_resource_body(body: &Value, resource_type: &str) -> Result<ResourceBody, ApiError> {
    let data = body
        .get("data")
        .and_then(Value::as_object)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| invalid_request(StatusCode::BAD_REQUEST, "missing 'data' parameter at request.", ""))?;

    let attributes = data
        .get("attributes")
        .and_then(Value::as_object)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| invalid_request(StatusCode::BAD_REQUEST, "missing 'attributes' parameter at request.", ""))?;

    if data.get("type").and_then(Value::as_str) != Some(resource_type) {
        return Err(invalid_request(StatusCode::BAD_REQUEST, "type resource is invalid.", "data/type"));
    }

    let id = data
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| is_uuid(id))
        .ok_or_else(|| invalid_request(StatusCode::BAD_REQUEST, "id resource is invalid format.", "data/id"))?;

    Ok(ResourceBody { id: id.to_string(), attributes: attributes.clone() })
}

pub async fn key_exists(store: &dyn Store, descriptor: &ResourceDescriptor, key: &str) -> Result<bool, ApiError> {
    let query = ExistsQuery::new(descriptor.table, descriptor.key_column, key);
    Ok(store.exists(&query).await?)
}

/// Client generated ids must not be taken yet
pub async fn ensure_id_unused(store: &dyn Store, descriptor: &ResourceDescriptor, id: &str) -> Result<(), ApiError> {
    if key_exists(store, descriptor, id).await? {
        return Err(invalid_request(StatusCode::BAD_REQUEST, "id resource is not exists.", "data/id"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detail(err: ApiError) -> (StatusCode, String, Option<String>) {
        let doc = err.to_document();
        let source = serde_json::to_value(&doc.errors[0].source).unwrap();
        (err.status_code(), doc.errors[0].detail.clone(), source["pointer"].as_str().map(str::to_string))
    }

    #[test]
    fn phases_stop_at_the_first_failure() {
        let cases = [
            (json!({}), "missing 'data' parameter at request.", ""),
            (json!({"data": {"type": "user"}}), "missing 'attributes' parameter at request.", ""),
            (json!({"data": {"type": "auth", "attributes": {"a": 1}}}), "type resource is invalid.", "data/type"),
            (json!({"data": {"type": "user", "id": "nope", "attributes": {"a": 1}}}), "id resource is invalid format.", "data/id"),
        ];
        for (body, expected, pointer) in cases {
            let (status, message, source) = detail(parse_resource_body(&body, "user").unwrap_err());
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(message, expected);
            assert_eq!(source.as_deref(), Some(pointer));
        }
    }

    #[test]
    fn accepts_a_well_formed_body() {
        let body = json!({"data": {"type": "user", "id": "67e55044-10b1-426f-9247-bb680e5fe0c8", "attributes": {"fullname": "Ada"}}});
        let parsed = parse_resource_body(&body, "user").unwrap();
        assert_eq!(parsed.id, "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert_eq!(parsed.attributes["fullname"], "Ada");
    }
}
