//! Pet listing handlers

use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
};
use common::models::{NewPet, Pet};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::{LikeResponse, PetForm},
    recommendation::{Pagination, PetFilters, RecommendationQuery, recommend},
    storage::{ImageUpload, MAX_IMAGE_BYTES, is_image_content_type},
};

/// Get all pets
pub async fn get_pets(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let pets = state.pets.find_all().await?;
    Ok(Json(pets))
}

/// Get a pet by ID
pub async fn get_pet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let pet = find_pet(&state, id).await?;
    Ok(Json(pet))
}

/// Ranked listings, personalized when the caller sends a valid token
pub async fn get_recommendations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RecommendationQuery>,
) -> ApiResult<impl IntoResponse> {
    let credential = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let pets = recommend(
        state.users.as_ref(),
        state.pets.as_ref(),
        &state.gate,
        &PetFilters::from_query(&query),
        Pagination::from_query(&query),
        credential,
    )
    .await?;

    Ok(Json(pets))
}

/// Create a listing owned by the caller
pub async fn create_pet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let (form, uploads) = read_pet_form(multipart).await?;
    let new_pet = form.into_new_pet(user.id, Vec::new())?;

    let images = store_images(&state, uploads).await?;
    let pet = state.pets.create(&NewPet { images, ..new_pet }).await?;

    info!("User {} created pet {}", user.id, pet.id);

    Ok((StatusCode::CREATED, Json(pet)))
}

/// Update a listing; only its owner or an admin may do so
pub async fn update_pet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let pet = find_pet(&state, id).await?;
    ensure_can_edit(&user, &pet)?;

    let (form, uploads) = read_pet_form(multipart).await?;
    let images = store_images(&state, uploads).await?;

    let updated = state
        .pets
        .update(id, &form.into_update(images))
        .await?
        .ok_or_else(|| ApiError::NotFound("Pet".to_string()))?;

    info!("User {} updated pet {}", user.id, id);

    Ok(Json(updated))
}

/// Delete a listing; only its owner or an admin may do so
pub async fn delete_pet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let pet = find_pet(&state, id).await?;
    ensure_can_edit(&user, &pet)?;

    if !state.pets.delete(id).await? {
        return Err(ApiError::NotFound("Pet".to_string()));
    }

    info!("User {} deleted pet {}", user.id, id);

    Ok(StatusCode::NO_CONTENT)
}

/// Add a pet to the caller's liked set
pub async fn like_pet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    find_pet(&state, id).await?;
    state.users.like(user.id, id).await?;

    Ok(Json(LikeResponse {
        pet_id: id,
        liked: true,
    }))
}

/// Remove a pet from the caller's liked set
pub async fn unlike_pet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    find_pet(&state, id).await?;
    state.users.unlike(user.id, id).await?;

    Ok(Json(LikeResponse {
        pet_id: id,
        liked: false,
    }))
}

async fn find_pet(state: &AppState, id: Uuid) -> ApiResult<Pet> {
    state
        .pets
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Pet".to_string()))
}

fn ensure_can_edit(user: &AuthUser, pet: &Pet) -> ApiResult<()> {
    if pet.owner_id == user.id || user.is_admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Split a multipart request into form fields and pending image uploads
async fn read_pet_form(mut multipart: Multipart) -> ApiResult<(PetForm, Vec<ImageUpload>)> {
    let mut form = PetForm::default();
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "images" || name == "image" {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;

            // Browsers send an empty part when no file was picked
            if bytes.is_empty() {
                continue;
            }
            if !is_image_content_type(&content_type) {
                return Err(ApiError::BadRequest(
                    "Only image uploads are allowed".to_string(),
                ));
            }
            if bytes.len() > MAX_IMAGE_BYTES {
                return Err(ApiError::BadRequest(format!(
                    "Images must not exceed {} bytes",
                    MAX_IMAGE_BYTES
                )));
            }

            uploads.push(ImageUpload::new(
                file_name.as_deref(),
                &content_type,
                bytes.to_vec(),
            ));
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            form.set(&name, &value)?;
        }
    }

    Ok((form, uploads))
}

async fn store_images(state: &AppState, uploads: Vec<ImageUpload>) -> ApiResult<Vec<String>> {
    let mut urls = Vec::with_capacity(uploads.len());

    for upload in uploads {
        let url = state.images.upload(upload).await.map_err(|e| {
            error!("Image upload failed: {}", e);
            ApiError::InternalServerError
        })?;
        urls.push(url);
    }

    Ok(urls)
}
