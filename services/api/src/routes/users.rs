//! Public user handlers

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
};

/// Get all users
pub async fn get_users(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let users = state.users.find_all().await?;
    Ok(Json(users))
}

/// Get a user by ID
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User".to_string()))?;

    Ok(Json(user))
}

/// Get the listings owned by a user
pub async fn get_user_pets(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if state.users.find_by_id(id).await?.is_none() {
        return Err(ApiError::NotFound("User".to_string()));
    }

    let pets = state.pets.find_by_owner(id).await?;
    Ok(Json(pets))
}
