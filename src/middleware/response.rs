use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;

use crate::jsonapi::JSON_API_MEDIA_TYPE;

pub const ALLOWED_METHODS: &str = "GET,HEAD,OPTIONS,POST,PUT,PATCH,DELETE";

/// JSON:API document response
#[derive(Debug)]
pub struct ApiResponse {
    pub document: Value,
    pub status_code: StatusCode,
    pub location: Option<String>,
}

impl ApiResponse {
    /// 200 OK
    pub fn success(document: Value) -> Self {
        Self { document, status_code: StatusCode::OK, location: None }
    }

    /// 201 Created with a `Location` header
    pub fn created(document: Value, location: impl Into<String>) -> Self {
        Self { document, status_code: StatusCode::CREATED, location: Some(location.into()) }
    }

    /// 204 No Content (document is ignored)
    pub fn no_content() -> Self {
        Self { document: Value::Null, status_code: StatusCode::NO_CONTENT, location: None }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut response = if self.status_code == StatusCode::NO_CONTENT {
            self.status_code.into_response()
        } else {
            let mut response = (self.status_code, Json(self.document)).into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_API_MEDIA_TYPE));
            response
        };

        if let Some(location) = self.location {
            match HeaderValue::from_str(&location) {
                Ok(value) => {
                    response.headers_mut().insert(header::LOCATION, value);
                }
                Err(e) => tracing::warn!("Dropping unrepresentable Location header: {}", e),
            }
        }
        response
    }
}

pub type ApiResult = Result<ApiResponse, crate::error::ApiError>;

/// Adds the `Allow` header to every response
pub async fn allow_header(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    response
}
