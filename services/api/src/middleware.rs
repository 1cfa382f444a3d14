//! Authentication gate for bearer tokens
//!
//! The gate verifies an access token and resolves it to a stored user. It is
//! used as route middleware for protected routes and directly by the
//! recommendation endpoint, where an unresolved requester is not an error.

use axum::{
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use common::{jwt::JwtService, models::AccountType, repositories::UserStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// Authenticated user information
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub phone: String,
    pub account_type: AccountType,
    pub is_admin: bool,
}

/// Result of checking a request's credentials
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Authenticated(AuthUser),
    Unauthenticated,
}

impl AuthOutcome {
    pub fn into_user(self) -> Option<AuthUser> {
        match self {
            AuthOutcome::Authenticated(user) => Some(user),
            AuthOutcome::Unauthenticated => None,
        }
    }
}

/// Resolves bearer credentials to users
#[derive(Clone)]
pub struct AuthGate {
    jwt_service: JwtService,
    users: Arc<dyn UserStore>,
    admins: Arc<HashSet<Uuid>>,
}

impl AuthGate {
    pub fn new(
        jwt_service: JwtService,
        users: Arc<dyn UserStore>,
        admins: &[Uuid],
    ) -> Self {
        Self {
            jwt_service,
            users,
            admins: Arc::new(admins.iter().copied().collect()),
        }
    }

    /// Check an `Authorization` header value
    ///
    /// Failure reasons are logged at debug level and never surfaced.
    pub async fn authenticate(&self, header: Option<&str>) -> AuthOutcome {
        let Some(token) = header.and_then(bearer_token) else {
            debug!("Missing or malformed authorization header");
            return AuthOutcome::Unauthenticated;
        };

        let claims = match self.jwt_service.validate_access_token(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("Rejected access token: {}", e);
                return AuthOutcome::Unauthenticated;
            }
        };

        let user = match self.users.find_by_id(claims.sub).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("Token subject {} no longer exists", claims.sub);
                return AuthOutcome::Unauthenticated;
            }
            Err(e) => {
                error!("Failed to load user {} for authentication: {}", claims.sub, e);
                return AuthOutcome::Unauthenticated;
            }
        };

        AuthOutcome::Authenticated(AuthUser {
            is_admin: self.admins.contains(&user.id),
            id: user.id,
            phone: user.phone,
            account_type: user.account_type,
        })
    }
}

/// Token part of a `Bearer <token>` header value; the scheme is case-insensitive
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    match state.gate.authenticate(header.as_deref()).await {
        AuthOutcome::Authenticated(user) => {
            // Insert the user into the request extensions
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        AuthOutcome::Unauthenticated => Err(ApiError::Unauthorized),
    }
}
