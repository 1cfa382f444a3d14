//! Handlers for the authenticated user's own account

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use common::{
    error::DatabaseError,
    models::{UpdateUser, User},
    password::hash_password,
    validation::{validate_name, validate_password, validate_phone},
};
use tracing::{error, info};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::UpdateProfileRequest,
};

/// Get the caller's profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(load_user(&state, &user).await?))
}

/// Update the caller's profile; a new password is re-hashed
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    let update = build_update(payload)?;

    let updated = match state.users.update(user.id, &update).await {
        Ok(Some(updated)) => updated,
        Ok(None) => return Err(ApiError::NotFound("User".to_string())),
        Err(DatabaseError::Duplicate(_)) => {
            return Err(ApiError::Conflict(
                "Phone is already registered".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    info!("User {} updated their profile", user.id);

    Ok(Json(updated))
}

/// Delete the caller's account together with their listings
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    if !state.users.delete(user.id).await? {
        return Err(ApiError::NotFound("User".to_string()));
    }

    info!("User {} deleted their account", user.id);

    Ok(StatusCode::NO_CONTENT)
}

/// Listings owned by the caller
pub async fn get_my_pets(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let pets = state.pets.find_by_owner(user.id).await?;
    Ok(Json(pets))
}

/// Listings the caller has liked
pub async fn get_my_likes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let me = load_user(&state, &user).await?;

    let pets: Vec<_> = state
        .pets
        .find_all()
        .await?
        .into_iter()
        .filter(|pet| me.has_liked(pet.id))
        .collect();

    Ok(Json(pets))
}

async fn load_user(state: &AppState, user: &AuthUser) -> ApiResult<User> {
    state
        .users
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User".to_string()))
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

fn build_update(payload: UpdateProfileRequest) -> ApiResult<UpdateUser> {
    let first_name = trimmed(payload.first_name);
    if let Some(name) = &first_name {
        validate_name("First name", name).map_err(ApiError::BadRequest)?;
    }

    let phone = trimmed(payload.phone);
    if let Some(phone) = &phone {
        validate_phone(phone).map_err(ApiError::BadRequest)?;
    }

    let password_hash = match payload.password {
        Some(password) => {
            validate_password(&password).map_err(ApiError::BadRequest)?;
            let hash = hash_password(&password).map_err(|e| {
                error!("Failed to hash password: {}", e);
                ApiError::InternalServerError
            })?;
            Some(hash)
        }
        None => None,
    };

    Ok(UpdateUser {
        first_name,
        last_name: trimmed(payload.last_name),
        company_name: trimmed(payload.company_name),
        phone,
        account_type: payload.account_type,
        telegram: trimmed(payload.telegram),
        instagram: trimmed(payload.instagram),
        password_hash,
    })
}
