// handlers/user/show.rs - GET /user/:uuid handler

use axum::{
    extract::{Path, State},
    http::HeaderMap,
};

use crate::app::AppState;
use crate::database::models::UserTransformer;
use crate::jsonapi::Serializer;
use crate::middleware::{ApiResponse, ApiResult};
use crate::validation::user::validate_uuid;

/// GET /user/:uuid - single user
pub async fn user_show(State(state): State<AppState>, Path(uuid): Path<String>, headers: HeaderMap) -> ApiResult {
    validate_uuid(state.store.as_ref(), &uuid).await?;
    let row = state.users.select_404(&uuid).await?;

    let links = state.links(&headers);
    let transformer = UserTransformer::user();
    Ok(ApiResponse::success(Serializer::new(&links, &transformer).item(&row)))
}
