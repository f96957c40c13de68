//! # courier-logic
//!
//! Logic tier of the messaging backbone.
//!
//! This binary provides:
//! - the **routing RPC** gate nodes call for auth, logout, sends, pulls and
//!   acks
//! - **durable storage** of messages and per-recipient receipts (SQLite)
//! - the **presence directory** mapping online users to their gate node
//! - **live delivery** of stored messages to online recipients through the
//!   gates' push RPC, on a bounded pool of background tasks

mod api;
mod config;
mod error;
mod policy;
mod push_client;
mod service;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use courier_store::Store;

use crate::api::AppState;
use crate::config::LogicConfig;
use crate::policy::DefaultIdentityPolicy;
use crate::push_client::HttpPushClient;
use crate::service::RoutingService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,courier_logic=debug")),
        )
        .init();

    info!("Starting courier logic tier v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = LogicConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Message store and presence directory share one database
    let store = Arc::new(Store::open_at(&config.database_path)?);
    info!(path = %config.database_path.display(), "Opened database");

    let push = Arc::new(HttpPushClient::new(config.push_timeout)?);

    let service = RoutingService::new(
        store.clone(),
        store,
        push,
        Arc::new(DefaultIdentityPolicy),
        config.max_inflight_pushes,
    );

    let app_state = AppState {
        service,
        push_port: config.push_port,
    };

    // -----------------------------------------------------------------------
    // 4. Run the routing RPC server until Ctrl+C
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Routing RPC server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
