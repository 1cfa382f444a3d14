//! Application state shared across handlers

use common::repositories::{PetStore, UserStore};
use sqlx::PgPool;
use std::sync::Arc;

use crate::{middleware::AuthGate, storage::ImageStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Present when running against Postgres; used by the health check
    pub db_pool: Option<PgPool>,
    pub users: Arc<dyn UserStore>,
    pub pets: Arc<dyn PetStore>,
    pub images: Arc<dyn ImageStore>,
    pub gate: AuthGate,
}
