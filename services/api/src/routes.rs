//! API service routes

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use common::database;
use serde_json::json;
use tracing::error;

use crate::{AppState, middleware::auth_middleware, storage::MAX_IMAGE_BYTES};

mod me;
mod pets;
mod users;

/// Upper bound for a whole multipart request
const MAX_BODY_BYTES: usize = MAX_IMAGE_BYTES * 10;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/pets", post(pets::create_pet))
        .route("/pets/:id", put(pets::update_pet).delete(pets::delete_pet))
        .route(
            "/pets/:id/like",
            post(pets::like_pet).delete(pets::unlike_pet),
        )
        .route(
            "/me",
            get(me::get_profile)
                .patch(me::update_profile)
                .delete(me::delete_account),
        )
        .route("/me/pets", get(me::get_my_pets))
        .route("/me/likes", get(me::get_my_likes))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/pets", get(pets::get_pets))
        .route("/pets/recommendations", get(pets::get_recommendations))
        .route("/pets/:id", get(pets::get_pet))
        .route("/users", get(users::get_users))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/pets", get(users::get_user_pets))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.db_pool {
        Some(pool) => match database::health_check(pool).await {
            Ok(true) => "up",
            Ok(false) => "down",
            Err(e) => {
                error!("Database health check failed: {}", e);
                "down"
            }
        },
        None => "not configured",
    };

    let (status, summary) = if database == "down" {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        status,
        Json(json!({
            "status": summary,
            "service": "api-service",
            "database": database,
        })),
    )
}
