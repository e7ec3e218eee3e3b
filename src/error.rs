// HTTP API Error Types
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::AuthError;
use crate::database::manager::DatabaseError;
use crate::filter::error::FilterError;
use crate::jsonapi::errors::{ErrorDocument, ErrorObject};
use crate::jsonapi::JSON_API_MEDIA_TYPE;

/// HTTP API error. Every variant renders as a JSON:API error document.
#[derive(Debug)]
pub enum ApiError {
    // 400 / 401 / 422 with a fully built document
    Validation { status: StatusCode, document: ErrorDocument },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 405 Method Not Allowed
    MethodNotAllowed,

    // 500 Internal Server Error
    Internal(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { status, .. } => *status,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Client-facing document
    pub fn to_document(&self) -> ErrorDocument {
        let status = self.status_code();
        let canned = |title: &str, detail: String| {
            ErrorDocument::single(ErrorObject::new(status, status.as_u16().to_string(), title, detail))
        };
        match self {
            ApiError::Validation { document, .. } => document.clone(),
            ApiError::Unauthorized(msg) => canned("Unauthorized", msg.clone()),
            ApiError::Forbidden(msg) => canned("Forbidden", msg.clone()),
            ApiError::NotFound(_) => canned("Not Found", "request not found".to_string()),
            ApiError::MethodNotAllowed => canned("Method Not Allowed", "method request not allowed".to_string()),
            ApiError::Internal(msg) => canned("Internal Server Error", format!("something wrong, {}", msg)),
            ApiError::ServiceUnavailable(msg) => canned("Service Unavailable", msg.clone()),
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn validation(status: StatusCode, document: ErrorDocument) -> Self {
        ApiError::Validation { status, document }
    }

    /// Single-error document with a `parameter` or `pointer` source
    pub fn single(status: StatusCode, error: ErrorObject) -> Self {
        ApiError::Validation { status, document: ErrorDocument::single(error) }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            ref e if e.is_unavailable() => {
                tracing::error!("Database unavailable: {}", e);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Filter(e) => e.into(),
            other => {
                // Log the real error but return a generic message
                tracing::error!("Database error: {}", other);
                ApiError::internal_server_error("database error occurred")
            }
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        tracing::error!("Query plan error: {}", err);
        ApiError::internal_server_error("query invalid")
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Hash(msg) | AuthError::Encode(msg) => {
                tracing::error!("Auth error: {}", msg);
                ApiError::internal_server_error("token could not be issued")
            }
            AuthError::Database(e) => e.into(),
            other => ApiError::unauthorized(other.to_string()),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_document().errors.first() {
            Some(e) => write!(f, "{} {}: {}", e.status, e.title, e.detail),
            None => write!(f, "{}", self.status_code()),
        }
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self.to_document())).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_API_MEDIA_TYPE));
        response
    }
}
