use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use courier_shared::constants::GATE_ADDR_HEADER;
use courier_shared::messages::*;

use crate::error::ServerError;
use crate::service::RoutingService;

#[derive(Clone)]
pub struct AppState {
    pub service: RoutingService,
    /// Push port assumed for callers that do not advertise an address.
    pub push_port: u16,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/rpc/auth", post(auth))
        .route("/rpc/logout", post(logout))
        .route("/rpc/c2c/send", post(c2c_send))
        .route("/rpc/c2g/send", post(c2g_send))
        .route("/rpc/pull", post(pull))
        .route("/rpc/c2c/ack", post(ack))
        .route("/rpc/c2g/ack", post(ack))
        .route("/rpc/group/join", post(join_group))
        .route("/rpc/group/leave", post(leave_group))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// GET /health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Push address of the calling gate: its advertised header, else the peer
/// IP on the default push port.
fn caller_addr(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    push_port: u16,
) -> Result<String, ServerError> {
    if let Some(addr) = headers
        .get(GATE_ADDR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Ok(addr.to_string());
    }

    peer.map(|p| SocketAddr::new(p.ip(), push_port).to_string())
        .ok_or_else(|| ServerError::BadRequest("cannot determine caller gate address".into()))
}

/// POST /rpc/auth
async fn auth(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, ServerError> {
    let addr = caller_addr(&headers, peer.map(|ConnectInfo(p)| p), state.push_port)?;
    Ok(Json(state.service.authenticate(&req, &addr)?))
}

/// POST /rpc/logout
async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> Json<LogoutResponse> {
    Json(state.service.logout(&req))
}

/// POST /rpc/c2c/send
async fn c2c_send(
    State(state): State<AppState>,
    Json(req): Json<C2CSendRequest>,
) -> Result<Json<C2CSendResponse>, ServerError> {
    Ok(Json(state.service.send_c2c(&req)?))
}

/// POST /rpc/c2g/send
async fn c2g_send(
    State(state): State<AppState>,
    Json(req): Json<C2GSendRequest>,
) -> Result<Json<C2GSendResponse>, ServerError> {
    Ok(Json(state.service.send_group(&req)?))
}

/// POST /rpc/pull
async fn pull(
    State(state): State<AppState>,
    Json(req): Json<PullRequest>,
) -> Result<Json<PullResponse>, ServerError> {
    Ok(Json(state.service.pull(&req)?))
}

/// POST /rpc/c2c/ack and /rpc/c2g/ack
async fn ack(
    State(state): State<AppState>,
    Json(req): Json<AckRequest>,
) -> Result<Json<AckResponse>, ServerError> {
    Ok(Json(state.service.acknowledge(&req)?))
}

/// POST /rpc/group/join
async fn join_group(
    State(state): State<AppState>,
    Json(req): Json<GroupMemberRequest>,
) -> Result<Json<GroupMemberResponse>, ServerError> {
    Ok(Json(state.service.join_group(&req)?))
}

/// POST /rpc/group/leave
async fn leave_group(
    State(state): State<AppState>,
    Json(req): Json<GroupMemberRequest>,
) -> Result<Json<GroupMemberResponse>, ServerError> {
    Ok(Json(state.service.leave_group(&req)?))
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting routing RPC server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
