use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header, StatusCode},
};
use serde_json::Value;

use crate::error::ApiError;
use crate::jsonapi::errors::ErrorObject;

/// Request body that must be sent as `application/json` and parse as JSON
#[derive(Debug, Clone)]
pub struct JsonBody(pub Value);

fn bad_request(detail: &str) -> ApiError {
    ApiError::single(StatusCode::BAD_REQUEST, ErrorObject::new(StatusCode::BAD_REQUEST, "400", "Bad Request", detail))
}

pub fn is_json_content_type(value: Option<&str>) -> bool {
    value
        .and_then(|v| v.split(';').next())
        .map(|media| media.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = request.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
        if !is_json_content_type(content_type) {
            return Err(bad_request("Content-Type request must application/json"));
        }

        let bytes = Bytes::from_request(request, state)
            .await
            .map_err(|_| bad_request("The request is not a valid JSON."))?;
        let value = serde_json::from_slice(&bytes).map_err(|_| bad_request("The request is not a valid JSON."))?;
        Ok(JsonBody(value))
    }
}
