//! Rate limiter for login and registration attempts

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::info;

/// Entries are pruned once the map grows past this size
const PRUNE_THRESHOLD: usize = 10_000;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of attempts allowed per window
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Ban duration in seconds once the limit is hit
    pub ban_duration_seconds: u64,
    /// Key clients by the first `X-Forwarded-For` hop instead of the peer address
    pub trust_forwarded: bool,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 60,
            ban_duration_seconds: 60,
            trust_forwarded: false,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new RateLimiterConfig from environment variables
    ///
    /// # Environment Variables
    /// - `RATE_LIMIT_MAX_ATTEMPTS` (default: 5)
    /// - `RATE_LIMIT_WINDOW_SECONDS` (default: 60)
    /// - `RATE_LIMIT_BAN_SECONDS` (default: 60)
    /// - `RATE_LIMIT_TRUST_FORWARDED`: `true` behind a trusted reverse proxy (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read = |key: &str, default: u64| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };

        Self {
            max_attempts: u32::try_from(read(
                "RATE_LIMIT_MAX_ATTEMPTS",
                u64::from(defaults.max_attempts),
            ))
            .unwrap_or(defaults.max_attempts),
            window_seconds: read("RATE_LIMIT_WINDOW_SECONDS", defaults.window_seconds),
            ban_duration_seconds: read("RATE_LIMIT_BAN_SECONDS", defaults.ban_duration_seconds),
            trust_forwarded: std::env::var("RATE_LIMIT_TRUST_FORWARDED")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.trust_forwarded),
        }
    }
}

#[derive(Debug)]
struct RateLimiterEntry {
    attempts: u32,
    window_start: Instant,
    ban_expires: Option<Instant>,
}

/// Fixed-window rate limiter keyed by route and client
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, RateLimiterEntry>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn trusts_forwarded(&self) -> bool {
        self.config.trust_forwarded
    }

    /// Record an attempt for `key` and report whether it may proceed
    pub async fn is_allowed(&self, key: &str) -> bool {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().await;
        let window = Duration::from_secs(self.config.window_seconds);

        if entries.len() > PRUNE_THRESHOLD {
            entries.retain(|_, e| {
                e.ban_expires.is_some_and(|ban| ban > now)
                    || now.duration_since(e.window_start) < window
            });
        }

        let entry = entries
            .entry(key.to_string())
            .or_insert(RateLimiterEntry {
                attempts: 0,
                window_start: now,
                ban_expires: None,
            });

        if let Some(ban_expires) = entry.ban_expires {
            if now < ban_expires {
                return false;
            }
            entry.ban_expires = None;
            entry.attempts = 0;
            entry.window_start = now;
        }

        if now.duration_since(entry.window_start) >= window {
            entry.attempts = 0;
            entry.window_start = now;
        }

        if entry.attempts >= self.config.max_attempts {
            entry.ban_expires = Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            info!(
                "Banned key {} for {} seconds",
                key, self.config.ban_duration_seconds
            );
            return false;
        }

        entry.attempts += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            max_attempts: 2,
            window_seconds: 60,
            ban_duration_seconds: 120,
            trust_forwarded: false,
        })
    }

    #[tokio::test]
    async fn test_blocks_after_max_attempts() {
        let limiter = limiter();
        let now = Instant::now();

        assert!(limiter.check_at("login:1.1.1.1", now).await);
        assert!(limiter.check_at("login:1.1.1.1", now).await);
        assert!(!limiter.check_at("login:1.1.1.1", now).await);

        // Other keys are independent
        assert!(limiter.check_at("login:2.2.2.2", now).await);
    }

    #[tokio::test]
    async fn test_ban_outlasts_window_then_resets() {
        let limiter = limiter();
        let start = Instant::now();

        limiter.check_at("k", start).await;
        limiter.check_at("k", start).await;
        assert!(!limiter.check_at("k", start).await);

        assert!(!limiter.check_at("k", start + Duration::from_secs(90)).await);
        assert!(limiter.check_at("k", start + Duration::from_secs(121)).await);
    }

    #[tokio::test]
    async fn test_window_expiry_resets_attempts() {
        let limiter = limiter();
        let start = Instant::now();

        limiter.check_at("k", start).await;
        limiter.check_at("k", start).await;
        assert!(limiter.check_at("k", start + Duration::from_secs(61)).await);
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        unsafe {
            std::env::set_var("RATE_LIMIT_MAX_ATTEMPTS", "99999999999");
            std::env::set_var("RATE_LIMIT_WINDOW_SECONDS", "30");
            std::env::remove_var("RATE_LIMIT_BAN_SECONDS");
            std::env::remove_var("RATE_LIMIT_TRUST_FORWARDED");
        }

        let config = RateLimiterConfig::from_env();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.window_seconds, 30);
        assert_eq!(config.ban_duration_seconds, 60);
        assert!(!config.trust_forwarded);

        unsafe {
            std::env::set_var("RATE_LIMIT_MAX_ATTEMPTS", "3");
            std::env::set_var("RATE_LIMIT_TRUST_FORWARDED", "TRUE");
        }
        let config = RateLimiterConfig::from_env();
        assert_eq!(config.max_attempts, 3);
        assert!(config.trust_forwarded);

        unsafe {
            std::env::remove_var("RATE_LIMIT_MAX_ATTEMPTS");
            std::env::remove_var("RATE_LIMIT_WINDOW_SECONDS");
            std::env::remove_var("RATE_LIMIT_TRUST_FORWARDED");
        }
    }
}
