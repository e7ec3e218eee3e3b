// handlers/mod.rs - HTTP handlers
//
// Public (no auth) → User resource (no auth) → Auth (bearer token where noted)

pub mod auth;   // /auth, /auth/token
pub mod public; // /, /health, fallbacks
pub mod user;   // /user, /user/:uuid

use axum::http::{Method, Uri};

use crate::jsonapi::errors::RequestContext;

/// Method and path of the current request, for error `source` members
pub fn request_context(method: &Method, uri: &Uri) -> RequestContext {
    RequestContext::new(method.clone(), uri.path())
}
