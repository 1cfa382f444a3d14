//! HTTP plumbing shared by the services
//!
//! Listener configuration, the CORS allow-list, security headers,
//! compression, request tracing and graceful shutdown.

use axum::Router;
use axum::http::{HeaderValue, Method, header, request::Parts};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:5173", "http://localhost:4173"];

/// Origins on the local network are always accepted
const LOCAL_NETWORK: [u8; 3] = [192, 168, 1];

/// Listener and CORS configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Port to bind on 0.0.0.0
    pub port: u16,
    /// Origins allowed to make browser requests
    pub cors_origins: Vec<String>,
}

impl HttpConfig {
    /// Create a new HttpConfig from environment variables
    ///
    /// # Environment Variables
    /// - `port_var`: Port to listen on (default: `default_port`)
    /// - `CORS_ORIGINS`: Comma-separated list of allowed origins
    pub fn from_env(port_var: &str, default_port: u16) -> Self {
        let port = std::env::var(port_var)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default_port);

        let cors_origins = match std::env::var("CORS_ORIGINS") {
            Ok(value) => parse_origins(&value),
            Err(_) => DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        };

        Self { port, cors_origins }
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whether a browser origin may call the API
pub fn is_origin_allowed(origin: &str, allowed: &[String]) -> bool {
    if allowed.iter().any(|o| o == origin) {
        return true;
    }

    let Some(authority) = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
    else {
        return false;
    };

    let authority = authority.split('/').next().unwrap_or(authority);
    let host = match authority.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => host,
        Some(_) => return false,
        None => authority,
    };

    match host.parse::<Ipv4Addr>() {
        Ok(ip) => {
            let [a, b, c, _] = ip.octets();
            [a, b, c] == LOCAL_NETWORK
        }
        Err(_) => false,
    }
}

fn cors_layer(allowed: &[String]) -> CorsLayer {
    let allowed = Arc::new(allowed.to_vec());

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .map(|o| is_origin_allowed(o, &allowed))
                    .unwrap_or(false)
            },
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CACHE_CONTROL,
            header::EXPIRES,
            header::PRAGMA,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}

/// Wrap a router with tracing, CORS, compression and security headers
pub fn with_http_layers(router: Router, config: &HttpConfig) -> Router {
    router
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_DNS_PREFETCH_CONTROL,
            HeaderValue::from_static("off"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=15552000; includeSubDomains"),
        ))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_origin_allow_list() {
        let allowed = vec!["https://pete.kz".to_string()];

        assert!(is_origin_allowed("https://pete.kz", &allowed));
        assert!(is_origin_allowed("http://192.168.1.24:5173", &allowed));
        assert!(!is_origin_allowed("https://evil.example", &allowed));
        assert!(!is_origin_allowed("https://pete.kz.evil.example", &allowed));

        assert!(is_origin_allowed("https://192.168.1.7", &allowed));
        assert!(!is_origin_allowed("https://192.168.1.attacker.com", &allowed));
        assert!(!is_origin_allowed("http://192.168.1.24.evil.example:5173", &allowed));
        assert!(!is_origin_allowed("http://192.168.10.24", &allowed));
        assert!(!is_origin_allowed("http://192.168.1.24:evil", &allowed));
        assert!(!is_origin_allowed("192.168.1.24", &allowed));
    }

    #[test]
    fn test_parse_origins_trims_entries() {
        assert_eq!(
            parse_origins(" https://pete.kz/, ,https://preview.pete.kz"),
            vec!["https://pete.kz", "https://preview.pete.kz"]
        );
    }

    #[test]
    #[serial]
    fn test_http_config_from_env() {
        unsafe {
            std::env::set_var("TEST_HTTP_PORT", "8088");
            std::env::remove_var("CORS_ORIGINS");
        }

        let config = HttpConfig::from_env("TEST_HTTP_PORT", 3000);
        assert_eq!(config.port, 8088);
        assert_eq!(config.bind_address(), "0.0.0.0:8088");
        assert_eq!(config.cors_origins.len(), DEFAULT_CORS_ORIGINS.len());

        unsafe {
            std::env::set_var("TEST_HTTP_PORT", "not-a-port");
        }
        assert_eq!(HttpConfig::from_env("TEST_HTTP_PORT", 3000).port, 3000);

        unsafe {
            std::env::remove_var("TEST_HTTP_PORT");
        }
    }
}
