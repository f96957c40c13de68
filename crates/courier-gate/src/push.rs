//! Push RPC service: how the logic tier reaches users connected here.
//!
//! Each operation is a thin translation into a hub push and answers as
//! soon as the push is queued on the hub, without waiting for the socket
//! write.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use courier_shared::messages::{C2CPushRequest, C2GPushRequest, KickOutRequest, PushAck};
use courier_shared::UserId;

use crate::error::GateError;
use crate::hub::{HubHandle, PushMessage};

pub fn build_router(hub: HubHandle) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/push/kickout", post(kick_out))
        .route("/push/c2c", post(deliver_c2c))
        .route("/push/c2g", post(deliver_c2g))
        .layer(TraceLayer::new_for_http())
        .with_state(hub)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    connections: usize,
    users: usize,
}

async fn health_check(State(hub): State<HubHandle>) -> Result<Json<HealthResponse>, GateError> {
    let stats = hub.stats().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        connections: stats.connections,
        users: stats.users,
    }))
}

async fn kick_out(
    State(hub): State<HubHandle>,
    Json(req): Json<KickOutRequest>,
) -> Result<Json<PushAck>, GateError> {
    info!(uid = %req.uid, reason = req.reason, "Kick-out requested");
    let uid = UserId::from(req.uid.as_str());
    hub.push(uid, PushMessage::KickOut(req)).await?;
    Ok(Json(PushAck::now()))
}

async fn deliver_c2c(
    State(hub): State<HubHandle>,
    Json(req): Json<C2CPushRequest>,
) -> Result<Json<PushAck>, GateError> {
    debug!(to = %req.to, msg_id = req.msg_id, "One-to-one push");
    let uid = UserId::from(req.to.as_str());
    hub.push(uid, PushMessage::C2C(req)).await?;
    Ok(Json(PushAck::now()))
}

async fn deliver_c2g(
    State(hub): State<HubHandle>,
    Json(req): Json<C2GPushRequest>,
) -> Result<Json<PushAck>, GateError> {
    debug!(to = %req.to, group = %req.group, msg_id = req.msg_id, "Group push");
    let uid = UserId::from(req.to.as_str());
    hub.push(uid, PushMessage::C2G(req)).await?;
    Ok(Json(PushAck::now()))
}

pub async fn serve(hub: HubHandle, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(hub);

    info!(addr = %addr, "Starting push RPC service");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
