use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod rate_limiter;
mod routes;

use common::{
    database,
    http::{HttpConfig, shutdown_signal, with_http_layers},
    jwt::{JwtConfig, JwtService},
    repositories::{UserRepository, UserStore},
};

use crate::rate_limiter::{RateLimiter, RateLimiterConfig};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub jwt_service: JwtService,
    pub rate_limiter: RateLimiter,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    // Initialize database connection pool
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    database::run_migrations(&pool).await?;

    // Initialize JWT service
    let jwt_config = JwtConfig::from_env()?;
    let jwt_service = JwtService::new(jwt_config);

    let app_state = AppState {
        users: Arc::new(UserRepository::new(pool)),
        jwt_service,
        rate_limiter: RateLimiter::new(RateLimiterConfig::from_env()),
    };

    info!("Authentication service initialized successfully");

    // Start the web server
    let http_config = HttpConfig::from_env("AUTH_PORT", 3000);
    let app = with_http_layers(routes::create_router(app_state), &http_config);

    let address = http_config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Authentication service listening on {}", address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
