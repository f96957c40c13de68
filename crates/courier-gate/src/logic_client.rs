//! Client for the logic tier's routing RPC.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use courier_shared::constants::GATE_ADDR_HEADER;
use courier_shared::messages::{
    AckRequest, AckResponse, AuthRequest, AuthResponse, C2CSendRequest, C2CSendResponse,
    C2GSendRequest, C2GSendResponse, LogoutRequest, LogoutResponse, PullRequest, PullResponse,
};

use crate::error::GateError;

/// The routing operations a session calls on behalf of its client.
#[async_trait]
pub trait LogicApi: Send + Sync {
    async fn auth(&self, req: &AuthRequest) -> Result<AuthResponse, GateError>;
    async fn logout(&self, req: &LogoutRequest) -> Result<LogoutResponse, GateError>;
    async fn c2c_send(&self, req: &C2CSendRequest) -> Result<C2CSendResponse, GateError>;
    async fn c2g_send(&self, req: &C2GSendRequest) -> Result<C2GSendResponse, GateError>;
    async fn pull(&self, req: &PullRequest) -> Result<PullResponse, GateError>;
    async fn c2c_ack(&self, req: &AckRequest) -> Result<AckResponse, GateError>;
    async fn c2g_ack(&self, req: &AckRequest) -> Result<AckResponse, GateError>;
}

/// JSON-over-HTTP implementation of [`LogicApi`].
#[derive(Debug, Clone)]
pub struct HttpLogicClient {
    http: reqwest::Client,
    base_url: String,
    /// Push address of this gate, recorded by the logic tier on auth.
    gate_addr: String,
}

impl HttpLogicClient {
    pub fn new(base_url: &str, gate_addr: &str, timeout: Duration) -> Result<Self, GateError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            gate_addr: gate_addr.to_string(),
        })
    }

    async fn call<Req, Rsp>(&self, path: &str, req: &Req) -> Result<Rsp, GateError>
    where
        Req: Serialize + Sync,
        Rsp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Routing RPC");

        let rsp = self
            .http
            .post(&url)
            .header(GATE_ADDR_HEADER, &self.gate_addr)
            .json(req)
            .send()
            .await?
            .error_for_status()?
            .json::<Rsp>()
            .await?;
        Ok(rsp)
    }
}

#[async_trait]
impl LogicApi for HttpLogicClient {
    async fn auth(&self, req: &AuthRequest) -> Result<AuthResponse, GateError> {
        self.call("/rpc/auth", req).await
    }

    async fn logout(&self, req: &LogoutRequest) -> Result<LogoutResponse, GateError> {
        self.call("/rpc/logout", req).await
    }

    async fn c2c_send(&self, req: &C2CSendRequest) -> Result<C2CSendResponse, GateError> {
        self.call("/rpc/c2c/send", req).await
    }

    async fn c2g_send(&self, req: &C2GSendRequest) -> Result<C2GSendResponse, GateError> {
        self.call("/rpc/c2g/send", req).await
    }

    async fn pull(&self, req: &PullRequest) -> Result<PullResponse, GateError> {
        self.call("/rpc/pull", req).await
    }

    async fn c2c_ack(&self, req: &AckRequest) -> Result<AckResponse, GateError> {
        self.call("/rpc/c2c/ack", req).await
    }

    async fn c2g_ack(&self, req: &AckRequest) -> Result<AckResponse, GateError> {
        self.call("/rpc/c2g/ack", req).await
    }
}
