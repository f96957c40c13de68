//! Connection hub: the registry of locally connected sessions.
//!
//! One hub task runs per gate node and owns both maps (connections by
//! [`ConnId`], connection by [`UserId`]). Every register, deregister, and
//! push goes through its command channel and is applied one at a time, in
//! submission order. No other task touches the maps.

use std::collections::HashMap;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use courier_shared::constants::V1;
use courier_shared::messages::{C2CPushRequest, C2GPushRequest, KickOutRequest};
use courier_shared::{CodecError, Command, ConnId, Packet, UserId};

use crate::error::GateError;
use crate::outbound::{EnqueueError, SessionHandle};

/// Capacity of the hub's command channel.
const HUB_QUEUE_LEN: usize = 1024;

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

/// A server-initiated message for one local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    /// Forced disconnect. Sent under the logout command tag.
    KickOut(KickOutRequest),
    C2C(C2CPushRequest),
    C2G(C2GPushRequest),
}

impl PushMessage {
    pub fn command(&self) -> Command {
        match self {
            PushMessage::KickOut(_) => Command::LogoutRequest,
            PushMessage::C2C(_) => Command::C2CPushRequest,
            PushMessage::C2G(_) => Command::C2GPushRequest,
        }
    }

    pub fn is_kick_out(&self) -> bool {
        self.command() == Command::LogoutRequest
    }

    /// Frame this push as a `V1` packet.
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let packet = match self {
            PushMessage::KickOut(body) => Packet::with_message(V1, self.command(), body)?,
            PushMessage::C2C(body) => Packet::with_message(V1, self.command(), body)?,
            PushMessage::C2G(body) => Packet::with_message(V1, self.command(), body)?,
        };
        Ok(packet.to_bytes())
    }
}

/// Commands sent *into* the hub task.
#[derive(Debug)]
pub enum HubCommand {
    /// Bind an authenticated session to `uid`, superseding any previous one.
    Register { uid: UserId, session: SessionHandle },
    /// Forget a session and close its outbound queue.
    Deregister { session: SessionHandle },
    /// Deliver to the session currently registered for `uid`, if any.
    Push { uid: UserId, message: PushMessage },
    /// Which connection (if any) currently owns `uid`.
    #[cfg(test)]
    Lookup {
        uid: UserId,
        reply: oneshot::Sender<Option<ConnId>>,
    },
    /// Counters for health reporting.
    Stats(oneshot::Sender<HubStats>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub connections: usize,
    pub users: usize,
}

// ---------------------------------------------------------------------------
// Hub state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Connection {
    uid: UserId,
    session: SessionHandle,
}

/// The maps owned by the hub task.
#[derive(Debug, Default)]
pub struct Hub {
    connections: HashMap<ConnId, Connection>,
    users: HashMap<UserId, ConnId>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register { uid, session } => self.register(uid, session),
            HubCommand::Deregister { session } => self.deregister(&session),
            HubCommand::Push { uid, message } => self.push(&uid, &message),
            #[cfg(test)]
            HubCommand::Lookup { uid, reply } => {
                let _ = reply.send(self.users.get(&uid).copied());
            }
            HubCommand::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
        }
    }

    pub fn register(&mut self, uid: UserId, session: SessionHandle) {
        let conn_id = session.conn_id();

        // Same connection re-authenticating under another identity.
        if let Some(previous) = self.connections.get(&conn_id) {
            if previous.uid != uid && self.users.get(&previous.uid) == Some(&conn_id) {
                self.users.remove(&previous.uid);
            }
        }

        if let Some(old_conn) = self.users.insert(uid.clone(), conn_id) {
            if old_conn != conn_id {
                if let Some(old) = self.connections.remove(&old_conn) {
                    old.session.close();
                    info!(
                        uid = %uid,
                        old_conn = %old_conn,
                        new_conn = %conn_id,
                        "Superseded existing session"
                    );
                }
            }
        }

        self.connections.insert(conn_id, Connection { uid: uid.clone(), session });

        debug!(
            uid = %uid,
            conn = %conn_id,
            users = self.users.len(),
            "Session registered"
        );
    }

    pub fn deregister(&mut self, session: &SessionHandle) {
        let conn_id = session.conn_id();

        if let Some(conn) = self.connections.remove(&conn_id) {
            if self.users.get(&conn.uid) == Some(&conn_id) {
                self.users.remove(&conn.uid);
            }
            debug!(
                uid = %conn.uid,
                conn = %conn_id,
                users = self.users.len(),
                "Session deregistered"
            );
        }

        session.close();
    }

    pub fn push(&mut self, uid: &UserId, message: &PushMessage) {
        let Some(conn_id) = self.users.get(uid).copied() else {
            debug!(uid = %uid, command = %message.command(), "Push target not connected, dropping");
            return;
        };

        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                error!(uid = %uid, error = %e, "Failed to encode push");
                return;
            }
        };

        if message.is_kick_out() {
            // The writer flushes queued frames before closing, so the
            // kick-out notice still reaches the client.
            if let Some(conn) = self.connections.remove(&conn_id) {
                let _ = conn.session.try_enqueue(frame);
                conn.session.close();
            }
            self.users.remove(uid);
            info!(uid = %uid, conn = %conn_id, "Kicked out session");
            return;
        }

        let Some(conn) = self.connections.get(&conn_id) else {
            return;
        };

        match conn.session.try_enqueue(frame) {
            Ok(()) => {
                debug!(uid = %uid, conn = %conn_id, command = %message.command(), "Push queued");
            }
            Err(EnqueueError::Full) => {
                warn!(uid = %uid, conn = %conn_id, "Outbound queue full, dropping push");
            }
            Err(EnqueueError::Closed) => {
                debug!(uid = %uid, conn = %conn_id, "Session closing, dropping push");
            }
        }
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            connections: self.connections.len(),
            users: self.users.len(),
        }
    }

    /// Consume commands until every [`HubHandle`] is dropped.
    pub async fn run(mut self, mut commands: mpsc::Receiver<HubCommand>) {
        while let Some(command) = commands.recv().await {
            self.apply(command);
        }
        info!("Hub command channel closed, shutting down hub");
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable sender side of the hub's command channel.
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
}

/// Spawn the hub task and return a handle to it.
pub fn spawn_hub() -> HubHandle {
    let (tx, rx) = mpsc::channel(HUB_QUEUE_LEN);
    tokio::spawn(Hub::new().run(rx));
    HubHandle { commands: tx }
}

impl HubHandle {
    async fn send(&self, command: HubCommand) -> Result<(), GateError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| GateError::HubClosed)
    }

    pub async fn register(&self, uid: UserId, session: SessionHandle) -> Result<(), GateError> {
        self.send(HubCommand::Register { uid, session }).await
    }

    pub async fn deregister(&self, session: SessionHandle) -> Result<(), GateError> {
        self.send(HubCommand::Deregister { session }).await
    }

    pub async fn push(&self, uid: UserId, message: PushMessage) -> Result<(), GateError> {
        self.send(HubCommand::Push { uid, message }).await
    }

    #[cfg(test)]
    pub async fn lookup(&self, uid: UserId) -> Result<Option<ConnId>, GateError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Lookup { uid, reply }).await?;
        rx.await.map_err(|_| GateError::HubClosed)
    }

    pub async fn stats(&self) -> Result<HubStats, GateError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Stats(reply)).await?;
        rx.await.map_err(|_| GateError::HubClosed)
    }
}
