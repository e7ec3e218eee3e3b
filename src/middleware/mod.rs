pub mod auth;
pub mod json;
pub mod response;

pub use auth::{bearer_auth, AuthUser};
pub use json::JsonBody;
pub use response::{allow_header, ApiResponse, ApiResult};
