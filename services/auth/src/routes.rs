//! Authentication service routes

use axum::{
    Json, Router,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use common::{
    error::DatabaseError,
    models::{AccountType, NewUser, User},
    password::{hash_password, verify_password},
    validation::{validate_name, validate_password, validate_phone},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::{error, info, warn};

use crate::{
    AppState,
    error::{AuthError, AuthResult},
};

/// Response for token generation
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: User,
}

/// Request for token refresh
#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Response for token refresh
#[derive(Serialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Request for user login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

/// Request for user registration
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub company_name: String,
    pub phone: String,
    pub password: String,
    #[serde(default)]
    pub account_type: AccountType,
    #[serde(default)]
    pub telegram: String,
    #[serde(default)]
    pub instagram: String,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// Key the rate limiter by route and client address
///
/// `X-Forwarded-For` is client-controlled, so its first hop is only used when
/// the service is configured to sit behind a trusted proxy.
fn client_key(
    route: &str,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded: bool,
) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .filter(|_| trust_forwarded)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let client = forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    format!("{}:{}", route, client)
}

async fn enforce_rate_limit(
    state: &AppState,
    route: &str,
    headers: &HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> AuthResult<()> {
    let key = client_key(
        route,
        headers,
        peer.map(|ConnectInfo(addr)| addr),
        state.rate_limiter.trusts_forwarded(),
    );
    if !state.rate_limiter.is_allowed(&key).await {
        warn!("Rate limit exceeded for {}", key);
        return Err(AuthError::TooManyRequests);
    }
    Ok(())
}

fn issue_tokens(state: &AppState, user: User) -> AuthResult<TokenResponse> {
    let access_token = state
        .jwt_service
        .generate_access_token(&user)
        .map_err(|e| {
            error!("Failed to generate access token: {}", e);
            AuthError::InternalServerError
        })?;

    let refresh_token = state
        .jwt_service
        .generate_refresh_token(&user)
        .map_err(|e| {
            error!("Failed to generate refresh token: {}", e);
            AuthError::InternalServerError
        })?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_service.access_token_expiry(),
        user,
    })
}

/// User registration endpoint
pub async fn register(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> AuthResult<impl IntoResponse> {
    enforce_rate_limit(&state, "register", &headers, peer).await?;

    let phone = payload.phone.trim().to_string();
    validate_phone(&phone).map_err(AuthError::BadRequest)?;
    validate_password(&payload.password).map_err(AuthError::BadRequest)?;
    validate_name("First name", &payload.first_name).map_err(AuthError::BadRequest)?;

    info!("Registration attempt for phone: {}", phone);

    if state.users.find_by_phone(&phone).await?.is_some() {
        return Err(AuthError::Conflict("Phone is already registered".to_string()));
    }

    let password_hash = hash_password(&payload.password).map_err(|e| {
        error!("Failed to hash password: {}", e);
        AuthError::InternalServerError
    })?;

    let new_user = NewUser {
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        company_name: payload.company_name.trim().to_string(),
        phone,
        account_type: payload.account_type,
        telegram: payload.telegram,
        instagram: payload.instagram,
        password_hash,
    };

    let user = match state.users.create(&new_user).await {
        Ok(user) => user,
        // Lost a race against a concurrent registration with the same phone
        Err(DatabaseError::Duplicate(_)) => {
            return Err(AuthError::Conflict("Phone is already registered".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    info!("Registered user {}", user.id);

    Ok((StatusCode::CREATED, Json(issue_tokens(&state, user)?)))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AuthResult<impl IntoResponse> {
    enforce_rate_limit(&state, "login", &headers, peer).await?;

    let phone = payload.phone.trim();
    info!("Login attempt for phone: {}", phone);

    let user = state
        .users
        .find_by_phone(phone)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    let valid = verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!("Failed to verify password for user {}: {}", user.id, e);
        AuthError::InternalServerError
    })?;

    if !valid {
        return Err(AuthError::Unauthorized);
    }

    Ok((StatusCode::OK, Json(issue_tokens(&state, user)?)))
}

/// Refresh token endpoint
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AuthResult<impl IntoResponse> {
    info!("Token refresh request");

    let claims = state
        .jwt_service
        .validate_refresh_token(&payload.refresh_token)
        .map_err(|_| AuthError::Unauthorized)?;

    // The account may have been removed since the refresh token was issued
    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    let access_token = state
        .jwt_service
        .generate_access_token(&user)
        .map_err(|e| {
            error!("Failed to generate access token: {}", e);
            AuthError::InternalServerError
        })?;

    let response = RefreshTokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_service.access_token_expiry(),
    };

    Ok((StatusCode::OK, Json(response)))
}
