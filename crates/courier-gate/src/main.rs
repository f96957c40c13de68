//! # courier-gate
//!
//! Edge node of the messaging backbone.
//!
//! This binary provides:
//! - a **WebSocket endpoint** (`/ws`) where each client connection becomes a
//!   connection actor speaking the binary packet protocol
//! - the **connection hub**, a single task owning the registry of locally
//!   connected users
//! - a **push RPC service** the logic tier calls to deliver messages to, or
//!   force-disconnect, users connected here

mod api;
mod config;
mod error;
mod hub;
mod logic_client;
mod outbound;
mod push;
mod session;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::GateState;
use crate::config::GateConfig;
use crate::logic_client::{HttpLogicClient, LogicApi};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,courier_gate=debug")),
        )
        .init();

    info!("Starting courier gate v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = GateConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Start the hub and the routing RPC client
    // -----------------------------------------------------------------------
    let hub = hub::spawn_hub();

    let logic: Arc<dyn LogicApi> = Arc::new(HttpLogicClient::new(
        &config.logic_url,
        &config.advertise_addr,
        config.rpc_timeout,
    )?);

    let state = GateState {
        hub: hub.clone(),
        logic,
        timings: config.session,
    };

    // -----------------------------------------------------------------------
    // 4. Serve clients and push RPCs until Ctrl+C
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(state, config.ws_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "WebSocket endpoint failed");
                return Err(e);
            }
        }
        result = push::serve(hub, config.push_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Push RPC service failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
