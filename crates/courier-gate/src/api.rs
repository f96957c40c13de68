//! Client-facing HTTP surface: the WebSocket upgrade endpoint.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use courier_shared::constants::{HEADER_LEN, MAX_BODY_LEN};

use crate::config::SessionTimings;
use crate::hub::HubHandle;
use crate::logic_client::LogicApi;
use crate::session::run_session;

#[derive(Clone)]
pub struct GateState {
    pub hub: HubHandle,
    pub logic: Arc<dyn LogicApi>,
    pub timings: SessionTimings,
}

pub fn build_router(state: GateState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /ws
async fn ws_upgrade(State(state): State<GateState>, ws: WebSocketUpgrade) -> Response {
    ws.max_message_size(HEADER_LEN + MAX_BODY_LEN as usize)
        .on_upgrade(move |socket| run_session(socket, state.hub, state.logic, state.timings))
}

pub async fn serve(state: GateState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting client WebSocket endpoint");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
