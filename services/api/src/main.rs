use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod middleware;
mod models;
mod recommendation;
mod routes;
mod state;
mod storage;
#[cfg(test)]
mod test_support;

use common::{
    database::{self, DatabaseConfig, init_pool},
    http::{shutdown_signal, with_http_layers},
    jwt::{JwtConfig, JwtService},
    repositories::{PetRepository, UserRepository, UserStore},
};

use crate::{
    config::ApiConfig,
    middleware::AuthGate,
    state::AppState,
    storage::{S3ImageStore, StorageConfig},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting API service");

    let config = ApiConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    database::run_migrations(&pool).await?;

    let jwt_service = JwtService::new(JwtConfig::from_env()?);
    let images = S3ImageStore::new(&StorageConfig::from_env()?).await;

    // Initialize repositories
    let users: Arc<dyn UserStore> = Arc::new(UserRepository::new(pool.clone()));
    let pets = Arc::new(PetRepository::new(pool.clone()));

    let app_state = AppState {
        db_pool: Some(pool),
        gate: AuthGate::new(jwt_service, users.clone(), &config.admin_ids),
        users,
        pets,
        images: Arc::new(images),
    };

    info!(
        "API service initialized successfully ({} admin(s))",
        config.admin_ids.len()
    );

    // Start the web server
    let app = with_http_layers(routes::create_router(app_state), &config.http);

    let address = config.http.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("API service listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
