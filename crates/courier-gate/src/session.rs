//! Connection actor: one per client WebSocket.
//!
//! The socket is split in two. The read pump owns the stream half and
//! dispatches decoded packets; the write pump owns the sink half and is
//! the only writer. Either pump ending tears the whole session down, and
//! teardown asks the hub to deregister exactly once.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::stream::SplitStream;
use futures::{Sink, SinkExt, StreamExt};
use serde::Serialize;
use tokio::time::{interval_at, timeout, Instant};
use tracing::{debug, info, warn};

use courier_shared::constants::V1;
use courier_shared::messages::{
    now_millis, AckRequest, AuthResponse, C2CSendResponse, C2GSendResponse, LogoutResponse,
    PullResponse,
};
use courier_shared::status::{describe, STATUS_UNAUTHENTICATED, STATUS_UNAVAILABLE};
use courier_shared::{ClientRequest, Command, ConnId, Packet, UserId};

use crate::config::SessionTimings;
use crate::error::GateError;
use crate::hub::HubHandle;
use crate::logic_client::LogicApi;
use crate::outbound::{OutboundQueue, SessionHandle};

/// Drive one client connection until either direction fails or the hub
/// closes it.
pub async fn run_session(
    socket: WebSocket,
    hub: HubHandle,
    logic: Arc<dyn LogicApi>,
    timings: SessionTimings,
) {
    let conn_id = ConnId::new();
    let (handle, queue) = SessionHandle::new(conn_id);
    let (sink, stream) = socket.split();

    info!(conn = %conn_id, "Session started");

    let mut writer = tokio::spawn(write_pump(sink, queue, conn_id, timings));

    let mut session = Session {
        conn_id,
        uid: None,
        handle: handle.clone(),
        hub: hub.clone(),
        logic,
    };

    tokio::select! {
        _ = read_pump(stream, &mut session, timings.idle_timeout) => {}
        _ = &mut writer => {
            debug!(conn = %conn_id, "Write pump exited first");
        }
    }

    if let Err(e) = hub.deregister(handle.clone()).await {
        warn!(conn = %conn_id, error = %e, "Deregistration failed");
        handle.close();
    }

    // Give the writer a bounded chance to flush its close frame.
    if !writer.is_finished() && timeout(timings.write_wait, &mut writer).await.is_err() {
        writer.abort();
    }

    info!(conn = %conn_id, uid = ?session.uid.as_ref().map(|u| u.to_string()), "Session ended");
}

// ---------------------------------------------------------------------------
// Read path
// ---------------------------------------------------------------------------

async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    session: &mut Session,
    idle_timeout: std::time::Duration,
) {
    let conn_id = session.conn_id;

    loop {
        let message = match timeout(idle_timeout, stream.next()).await {
            Err(_) => {
                warn!(conn = %conn_id, "Read deadline exceeded, dropping peer");
                return;
            }
            Ok(None) => {
                debug!(conn = %conn_id, "Client stream ended");
                return;
            }
            Ok(Some(Err(e))) => {
                warn!(conn = %conn_id, error = %e, "WebSocket receive error");
                return;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Binary(data) => {
                let packet = match Packet::decode(&mut &data[..]) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!(conn = %conn_id, error = %e, "Malformed frame, closing session");
                        return;
                    }
                };

                if let Err(e) = session.dispatch(packet).await {
                    if e.is_transport_fault() {
                        warn!(conn = %conn_id, error = %e, "Transport fault, closing session");
                        return;
                    }
                    warn!(conn = %conn_id, error = %e, "Request failed");
                }
            }
            Message::Close(frame) => {
                debug!(conn = %conn_id, reason = ?frame, "Client initiated close");
                return;
            }
            // Pings are answered by the WebSocket layer; any frame resets the deadline.
            Message::Ping(_) | Message::Pong(_) | Message::Text(_) => {}
        }
    }
}

/// Per-connection state owned by the read path.
struct Session {
    conn_id: ConnId,
    /// Set once an auth request succeeds.
    uid: Option<UserId>,
    handle: SessionHandle,
    hub: HubHandle,
    logic: Arc<dyn LogicApi>,
}

impl Session {
    async fn dispatch(&mut self, packet: Packet) -> Result<(), GateError> {
        let Some(request) = ClientRequest::from_packet(&packet)? else {
            debug!(conn = %self.conn_id, command = packet.command, "Ignoring unhandled command");
            return Ok(());
        };

        match request {
            ClientRequest::HeartBeat => {
                self.handle
                    .enqueue(Packet::empty(V1, Command::HeartBeatResponse).to_bytes())
                    .await
            }

            ClientRequest::Auth(req) => {
                let rsp = match self.logic.auth(&req).await {
                    Ok(rsp) => rsp,
                    Err(e) => {
                        warn!(conn = %self.conn_id, error = %e, "Auth RPC failed");
                        AuthResponse {
                            status: STATUS_UNAVAILABLE,
                            msg: describe(STATUS_UNAVAILABLE).to_string(),
                            ts: now_millis(),
                            seq: req.seq,
                        }
                    }
                };
                self.reply(Command::AuthResponse, &rsp).await?;
                if rsp.is_success() {
                    let uid = UserId::from(req.uid);
                    info!(conn = %self.conn_id, uid = %uid, "Session authenticated");
                    self.uid = Some(uid.clone());
                    self.hub.register(uid, self.handle.clone()).await?;
                }
                Ok(())
            }

            ClientRequest::Logout(mut req) => {
                let rsp = match &self.uid {
                    Some(uid) => {
                        req.uid = uid.to_string();
                        self.logic.logout(&req).await?
                    }
                    None => LogoutResponse {
                        ts: now_millis(),
                        seq: req.seq,
                    },
                };
                self.reply(Command::LogoutResponse, &rsp).await
            }

            ClientRequest::C2CSend(mut req) => {
                let rsp = match &self.uid {
                    Some(uid) => {
                        req.from = uid.to_string();
                        match self.logic.c2c_send(&req).await {
                            Ok(rsp) => rsp,
                            Err(e) => {
                                warn!(conn = %self.conn_id, error = %e, "Send RPC failed");
                                C2CSendResponse {
                                    status: STATUS_UNAVAILABLE,
                                    msg_id: 0,
                                    ts: now_millis(),
                                    seq: req.seq,
                                }
                            }
                        }
                    }
                    None => C2CSendResponse {
                        status: STATUS_UNAUTHENTICATED,
                        msg_id: 0,
                        ts: now_millis(),
                        seq: req.seq,
                    },
                };
                self.reply(Command::C2CSendResponse, &rsp).await
            }

            ClientRequest::C2GSend(mut req) => {
                let rsp = match &self.uid {
                    Some(uid) => {
                        req.from = uid.to_string();
                        match self.logic.c2g_send(&req).await {
                            Ok(rsp) => rsp,
                            Err(e) => {
                                warn!(conn = %self.conn_id, error = %e, "Group send RPC failed");
                                C2GSendResponse {
                                    status: STATUS_UNAVAILABLE,
                                    msg_id: 0,
                                    ts: now_millis(),
                                    seq: req.seq,
                                }
                            }
                        }
                    }
                    None => C2GSendResponse {
                        status: STATUS_UNAUTHENTICATED,
                        msg_id: 0,
                        ts: now_millis(),
                        seq: req.seq,
                    },
                };
                self.reply(Command::C2GSendResponse, &rsp).await
            }

            ClientRequest::Pull(mut req) => {
                let rsp = match &self.uid {
                    Some(uid) => {
                        req.uid = uid.to_string();
                        self.logic.pull(&req).await?
                    }
                    None => PullResponse {
                        ts: now_millis(),
                        seq: req.seq,
                        msgs: Vec::new(),
                    },
                };
                self.reply(Command::PullResponse, &rsp).await
            }

            ClientRequest::C2CPushAck(ack) => {
                if let Some(req) = self.ack_request(ack.msg_id, ack.seq) {
                    self.logic.c2c_ack(&req).await?;
                }
                Ok(())
            }

            ClientRequest::C2GPushAck(ack) => {
                if let Some(req) = self.ack_request(ack.msg_id, ack.seq) {
                    self.logic.c2g_ack(&req).await?;
                }
                Ok(())
            }
        }
    }

    fn ack_request(&self, msg_id: i64, seq: i64) -> Option<AckRequest> {
        let Some(uid) = &self.uid else {
            debug!(conn = %self.conn_id, msg_id, "Dropping ack from unauthenticated session");
            return None;
        };
        Some(AckRequest {
            uid: uid.to_string(),
            msg_id,
            seq,
        })
    }

    async fn reply<T: Serialize>(&self, command: Command, body: &T) -> Result<(), GateError> {
        let packet = Packet::with_message(V1, command, body)?;
        self.handle.enqueue(packet.to_bytes()).await
    }
}

// ---------------------------------------------------------------------------
// Write path
// ---------------------------------------------------------------------------

async fn write_pump<S>(
    mut sink: S,
    mut queue: OutboundQueue,
    conn_id: ConnId,
    timings: SessionTimings,
)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let write_wait = timings.write_wait;
    let mut ticker = interval_at(Instant::now() + timings.ping_period, timings.ping_period);

    loop {
        tokio::select! {
            biased;

            _ = queue.closed() => {
                while let Some(frame) = queue.try_recv() {
                    if write_frame(&mut sink, frame, conn_id, write_wait).await.is_err() {
                        return;
                    }
                }
                let _ = timeout(write_wait, sink.send(Message::Close(None))).await;
                debug!(conn = %conn_id, "Outbound queue closed, sent close frame");
                return;
            }

            frame = queue.recv() => {
                let Some(frame) = frame else {
                    let _ = timeout(write_wait, sink.send(Message::Close(None))).await;
                    return;
                };
                if write_frame(&mut sink, frame, conn_id, write_wait).await.is_err() {
                    return;
                }
            }

            _ = ticker.tick() => {
                match timeout(write_wait, sink.send(Message::Ping(Vec::new()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(conn = %conn_id, error = %e, "Keep-alive ping failed");
                        return;
                    }
                    Err(_) => {
                        warn!(conn = %conn_id, "Keep-alive ping timed out");
                        return;
                    }
                }
            }
        }
    }
}

async fn write_frame<S>(
    sink: &mut S,
    frame: Bytes,
    conn_id: ConnId,
    write_wait: std::time::Duration,
) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match timeout(write_wait, sink.send(Message::Binary(frame.to_vec()))).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            warn!(conn = %conn_id, error = %e, "Write failed");
            Err(())
        }
        Err(_) => {
            warn!(conn = %conn_id, "Write deadline exceeded");
            Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;

    /// A peer that never accepts another byte.
    struct StalledSink;

    impl Sink<Message> for StalledSink {
        type Error = axum::Error;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn start_send(self: Pin<&mut Self>, _: Message) -> Result<(), Self::Error> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }
    }

    fn short(write_wait_ms: u64, ping_period_ms: u64) -> SessionTimings {
        SessionTimings {
            idle_timeout: Duration::from_secs(60),
            ping_period: Duration::from_millis(ping_period_ms),
            write_wait: Duration::from_millis(write_wait_ms),
        }
    }

    #[tokio::test]
    async fn test_write_deadline_ends_writer() {
        let (handle, queue) = SessionHandle::new(ConnId::new());
        let writer = tokio::spawn(write_pump(StalledSink, queue, ConnId::new(), short(50, 60_000)));

        handle.enqueue(Bytes::from_static(b"frame")).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), writer)
            .await
            .expect("writer should give up on a stalled peer")
            .unwrap();
    }

    #[tokio::test]
    async fn test_stalled_keep_alive_ends_writer() {
        let (_handle, queue) = SessionHandle::new(ConnId::new());
        let writer = tokio::spawn(write_pump(StalledSink, queue, ConnId::new(), short(50, 50)));

        tokio::time::timeout(Duration::from_secs(2), writer)
            .await
            .expect("writer should give up when a ping cannot be written")
            .unwrap();
    }
}
