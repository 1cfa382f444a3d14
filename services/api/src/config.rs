//! API service configuration

use anyhow::{Context, Result};
use common::http::HttpConfig;
use uuid::Uuid;

/// API service configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub http: HttpConfig,
    /// Users allowed to edit and delete any listing
    pub admin_ids: Vec<Uuid>,
}

impl ApiConfig {
    /// Create a new ApiConfig from environment variables
    ///
    /// # Environment Variables
    /// - `API_PORT`: Port to listen on (default: 3001)
    /// - `CORS_ORIGINS`: Comma-separated list of allowed origins
    /// - `ADMIN_USER_IDS`: Comma-separated list of admin user ids (default: none)
    pub fn from_env() -> Result<Self> {
        let admin_ids = match std::env::var("ADMIN_USER_IDS") {
            Ok(value) => parse_admin_ids(&value)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            http: HttpConfig::from_env("API_PORT", 3001),
            admin_ids,
        })
    }
}

fn parse_admin_ids(value: &str) -> Result<Vec<Uuid>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Uuid::parse_str(s).with_context(|| format!("Invalid id in ADMIN_USER_IDS: {}", s)))
        .collect()
}
