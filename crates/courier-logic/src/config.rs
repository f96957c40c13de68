//! Logic tier configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the service can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use courier_shared::constants::{DEFAULT_LOGIC_PORT, DEFAULT_PUSH_PORT};

/// Logic tier configuration.
#[derive(Debug, Clone)]
pub struct LogicConfig {
    /// Socket address for the routing RPC server.
    /// Env: `LOGIC_ADDR`
    /// Default: `0.0.0.0:8090`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./courier.db`
    pub database_path: PathBuf,

    /// Push port assumed for gates that do not advertise an address.
    /// Env: `PUSH_PORT`
    /// Default: `9000`
    pub push_port: u16,

    /// Per-call timeout for push RPCs to gate nodes.
    /// Env: `PUSH_TIMEOUT_MS`
    /// Default: 5000
    pub push_timeout: Duration,

    /// Upper bound on concurrently running deliveries.
    /// Env: `MAX_INFLIGHT_PUSHES`
    /// Default: 64
    pub max_inflight_pushes: usize,
}

impl Default for LogicConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_LOGIC_PORT).into(),
            database_path: PathBuf::from("./courier.db"),
            push_port: DEFAULT_PUSH_PORT,
            push_timeout: Duration::from_millis(5000),
            max_inflight_pushes: 64,
        }
    }
}

impl LogicConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("LOGIC_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid LOGIC_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = PathBuf::from(path);
            }
        }

        if let Some(val) = lookup("PUSH_PORT") {
            match val.parse::<u16>() {
                Ok(port) if port > 0 => config.push_port = port,
                _ => tracing::warn!(value = %val, "Invalid PUSH_PORT, using default"),
            }
        }

        if let Some(val) = lookup("PUSH_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms > 0 => config.push_timeout = Duration::from_millis(ms),
                _ => tracing::warn!(value = %val, "Invalid PUSH_TIMEOUT_MS, using default"),
            }
        }

        if let Some(val) = lookup("MAX_INFLIGHT_PUSHES") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_inflight_pushes = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_INFLIGHT_PUSHES, using default"),
            }
        }

        config
    }
}
