//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Server configuration loaded from environment variables
#[derive(Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: IpAddr,
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in KB (default: 64)
    pub body_limit_kb: usize,
    /// Request timeout in seconds (default: 120)
    pub timeout_secs: u64,
    /// PostgreSQL connection string; the in-memory store is used when unset
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 10)
    pub database_max_connections: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("host", &self.host)
            .field("allowed_origins", &self.allowed_origins)
            .field("body_limit_kb", &self.body_limit_kb)
            .field("timeout_secs", &self.timeout_secs)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("database_max_connections", &self.database_max_connections)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_kb: 64,
            timeout_secs: 120,
            database_url: None,
            database_max_connections: 10,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|h| h.trim().parse().ok())
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let body_limit_kb = std::env::var("BODY_LIMIT_KB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.body_limit_kb);

        let timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.timeout_secs);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let database_max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.database_max_connections);

        Self {
            port,
            host,
            allowed_origins,
            body_limit_kb,
            timeout_secs,
            database_url,
            database_max_connections,
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether the outer request timeout outlasts a run of `worst_case`.
    pub fn covers(&self, worst_case: Duration) -> bool {
        self.request_timeout() >= worst_case
    }
}
