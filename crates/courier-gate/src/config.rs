//! Gate node configuration loaded from environment variables.
//!
//! All settings have defaults so a single gate can start next to a local
//! logic tier with zero configuration.

use std::net::SocketAddr;
use std::time::Duration;

use courier_shared::constants::{
    DEFAULT_LOGIC_PORT, DEFAULT_PUSH_PORT, PING_PERIOD_SECS, PONG_WAIT_SECS, WRITE_WAIT_SECS,
};

/// Gate node configuration.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Address the client WebSocket endpoint listens on.
    /// Env: `GATE_WS_ADDR`
    /// Default: `0.0.0.0:8000`
    pub ws_addr: SocketAddr,

    /// Address the push RPC service listens on.
    /// Env: `GATE_PUSH_ADDR`
    /// Default: `0.0.0.0:9000`
    pub push_addr: SocketAddr,

    /// Push address the logic tier should record for users on this node.
    /// Env: `GATE_ADVERTISE_ADDR`
    /// Default: `127.0.0.1:9000`
    pub advertise_addr: String,

    /// Base URL of the logic tier's routing RPC.
    /// Env: `LOGIC_URL`
    /// Default: `http://127.0.0.1:8090`
    pub logic_url: String,

    /// Per-call timeout for routing RPCs.
    /// Env: `RPC_TIMEOUT_MS`
    /// Default: 5000
    pub rpc_timeout: Duration,

    /// Per-connection deadlines.
    pub session: SessionTimings,
}

/// Deadlines enforced by each connection actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// Longest silence tolerated from a client before it is dropped.
    pub idle_timeout: Duration,
    /// Interval between keep-alive pings; must stay below `idle_timeout`.
    pub ping_period: Duration,
    /// Time allowed to write one frame.
    pub write_wait: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(PONG_WAIT_SECS),
            ping_period: Duration::from_secs(PING_PERIOD_SECS),
            write_wait: Duration::from_secs(WRITE_WAIT_SECS),
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            ws_addr: ([0, 0, 0, 0], 8000).into(),
            push_addr: ([0, 0, 0, 0], DEFAULT_PUSH_PORT).into(),
            advertise_addr: format!("127.0.0.1:{}", DEFAULT_PUSH_PORT),
            logic_url: format!("http://127.0.0.1:{}", DEFAULT_LOGIC_PORT),
            rpc_timeout: Duration::from_millis(5000),
            session: SessionTimings::default(),
        }
    }
}

impl GateConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("GATE_WS_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.ws_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid GATE_WS_ADDR, using default"),
            }
        }

        if let Some(addr) = lookup("GATE_PUSH_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.push_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid GATE_PUSH_ADDR, using default"),
            }
        }

        if let Some(addr) = lookup("GATE_ADVERTISE_ADDR") {
            if !addr.is_empty() {
                config.advertise_addr = addr;
            }
        }

        if let Some(url) = lookup("LOGIC_URL") {
            if !url.is_empty() {
                config.logic_url = url.trim_end_matches('/').to_string();
            }
        }

        if let Some(val) = lookup("RPC_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms > 0 => config.rpc_timeout = Duration::from_millis(ms),
                _ => tracing::warn!(value = %val, "Invalid RPC_TIMEOUT_MS, using default"),
            }
        }

        config
    }
}
