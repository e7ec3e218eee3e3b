// handlers/user/delete.rs - DELETE /user/:uuid handler

use axum::extract::{Path, State};
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::validation::user::validate_uuid;

/// DELETE /user/:uuid - soft delete, 204 on success
pub async fn user_delete(State(state): State<AppState>, Path(uuid): Path<String>) -> ApiResult {
    validate_uuid(state.store.as_ref(), &uuid).await?;
    if !state.users.delete(&uuid, None).await? {
        return Err(ApiError::not_found(format!("user {}", uuid)));
    }
    info!("User {} deleted", uuid);
    Ok(ApiResponse::no_content())
}
