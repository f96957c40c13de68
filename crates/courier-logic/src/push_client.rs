//! Client side of the gate nodes' push RPC.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use courier_shared::messages::{C2CPushRequest, C2GPushRequest, KickOutRequest, PushAck};

use crate::error::ServerError;

/// Push operations addressed to the gate node at `addr` (`host:port`).
#[async_trait]
pub trait PushClient: Send + Sync {
    async fn kick_out(&self, addr: &str, req: &KickOutRequest) -> Result<PushAck, ServerError>;
    async fn c2c_push(&self, addr: &str, req: &C2CPushRequest) -> Result<PushAck, ServerError>;
    async fn c2g_push(&self, addr: &str, req: &C2GPushRequest) -> Result<PushAck, ServerError>;
}

/// JSON-over-HTTP implementation of [`PushClient`].
///
/// The underlying connection pool keeps one keep-alive channel per gate
/// address, so sequential pushes to the same node reuse it.
#[derive(Debug, Clone)]
pub struct HttpPushClient {
    http: reqwest::Client,
}

impl HttpPushClient {
    pub fn new(timeout: Duration) -> Result<Self, ServerError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    async fn call<Req: Serialize + Sync>(
        &self,
        addr: &str,
        path: &str,
        req: &Req,
    ) -> Result<PushAck, ServerError> {
        let url = push_url(addr, path);
        debug!(url = %url, "Push RPC");

        let ack = self
            .http
            .post(&url)
            .json(req)
            .send()
            .await?
            .error_for_status()?
            .json::<PushAck>()
            .await?;
        Ok(ack)
    }
}

fn push_url(addr: &str, path: &str) -> String {
    if addr.starts_with("http://") || addr.starts_with("https://") {
        format!("{}{}", addr.trim_end_matches('/'), path)
    } else {
        format!("http://{}{}", addr, path)
    }
}

#[async_trait]
impl PushClient for HttpPushClient {
    async fn kick_out(&self, addr: &str, req: &KickOutRequest) -> Result<PushAck, ServerError> {
        self.call(addr, "/push/kickout", req).await
    }

    async fn c2c_push(&self, addr: &str, req: &C2CPushRequest) -> Result<PushAck, ServerError> {
        self.call(addr, "/push/c2c", req).await
    }

    async fn c2g_push(&self, addr: &str, req: &C2GPushRequest) -> Result<PushAck, ServerError> {
        self.call(addr, "/push/c2g", req).await
    }
}
