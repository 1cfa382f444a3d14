//! JWT service for token generation and validation
//!
//! Access and refresh tokens are HS256-signed with two different secrets.
//! Tokens are not stored server-side; a token is valid as long as its
//! signature and expiry check out and its subject still exists.

use anyhow::Result;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::models::{AccountType, User};

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret for signing access tokens
    pub access_secret: String,
    /// Secret for signing refresh tokens
    pub refresh_secret: String,
    /// Access token expiration time in seconds (default: 12 hours)
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds (default: 7 days)
    pub refresh_token_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: Secret for access tokens (required)
    /// - `JWT_REFRESH_SECRET`: Secret for refresh tokens (required)
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 43200)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: Refresh token expiry in seconds (default: 604800)
    pub fn from_env() -> Result<Self> {
        let access_secret = std::env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;
        let refresh_secret = std::env::var("JWT_REFRESH_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_REFRESH_SECRET environment variable not set"))?;

        if access_secret.is_empty() || refresh_secret.is_empty() {
            anyhow::bail!("JWT secrets must not be empty");
        }
        if access_secret == refresh_secret {
            anyhow::bail!("JWT_SECRET and JWT_REFRESH_SECRET must differ");
        }

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "43200".to_string()) // 12 hours
            .parse()
            .unwrap_or(43200);

        let refresh_token_expiry = std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "604800".to_string()) // 7 days
            .parse()
            .unwrap_or(604800);

        Ok(JwtConfig {
            access_secret,
            refresh_secret,
            access_token_expiry,
            refresh_token_expiry,
        })
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// User phone at issue time
    pub phone: String,
    /// Account type at issue time
    pub account_type: AccountType,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum TokenType {
    /// Access token
    Access,
    /// Refresh token
    Refresh,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    access_encoding_key: EncodingKey,
    access_decoding_key: DecodingKey,
    refresh_encoding_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        JwtService {
            access_encoding_key: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding_key: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding_key: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding_key: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            validation,
            config,
        }
    }

    fn now() -> Result<u64> {
        Ok(SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
            .as_secs())
    }

    fn claims_for(user: &User, token_type: TokenType, expiry: u64) -> Result<Claims> {
        let now = Self::now()?;
        Ok(Claims {
            sub: user.id,
            phone: user.phone.clone(),
            account_type: user.account_type,
            iat: now,
            exp: now + expiry,
            token_type,
        })
    }

    /// Generate an access token for a user
    pub fn generate_access_token(&self, user: &User) -> Result<String> {
        let claims = Self::claims_for(user, TokenType::Access, self.config.access_token_expiry)?;
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.access_encoding_key,
        )?;
        Ok(token)
    }

    /// Generate a refresh token for a user
    pub fn generate_refresh_token(&self, user: &User) -> Result<String> {
        let claims = Self::claims_for(user, TokenType::Refresh, self.config.refresh_token_expiry)?;
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.refresh_encoding_key,
        )?;
        Ok(token)
    }

    /// Validate an access token and return the claims
    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.access_decoding_key, &self.validation)?;
        if token_data.claims.token_type != TokenType::Access {
            anyhow::bail!("Token is not an access token");
        }
        Ok(token_data.claims)
    }

    /// Validate a refresh token and return the claims
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.refresh_decoding_key, &self.validation)?;
        if token_data.claims.token_type != TokenType::Refresh {
            anyhow::bail!("Token is not a refresh token");
        }
        Ok(token_data.claims)
    }

    /// Get the access token expiry time
    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }

    /// Get the refresh token expiry time
    pub fn refresh_token_expiry(&self) -> u64 {
        self.config.refresh_token_expiry
    }
}
