//! Per-session outbound frame queue.
//!
//! The writer task owns the receiving end. Everyone else (the session's
//! own reader, the hub) holds a cloneable [`SessionHandle`]. Closing the
//! handle is the only way to tell the writer to stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Notify};

use courier_shared::constants::OUTBOUND_QUEUE_LEN;
use courier_shared::ConnId;

use crate::error::GateError;

/// Why a non-blocking enqueue was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The writer is behind; the frame was dropped.
    Full,
    /// The session is shutting down.
    Closed,
}

#[derive(Debug, Default)]
struct CloseSignal {
    closed: AtomicBool,
    notify: Notify,
}

/// Sending side of a session's outbound queue.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    conn_id: ConnId,
    frames: mpsc::Sender<Bytes>,
    signal: Arc<CloseSignal>,
}

/// Receiving side, owned by the writer task.
#[derive(Debug)]
pub struct OutboundQueue {
    frames: mpsc::Receiver<Bytes>,
    signal: Arc<CloseSignal>,
}

impl SessionHandle {
    pub fn new(conn_id: ConnId) -> (Self, OutboundQueue) {
        Self::with_capacity(conn_id, OUTBOUND_QUEUE_LEN)
    }

    pub fn with_capacity(conn_id: ConnId, capacity: usize) -> (Self, OutboundQueue) {
        let (tx, rx) = mpsc::channel(capacity);
        let signal = Arc::new(CloseSignal::default());
        (
            Self {
                conn_id,
                frames: tx,
                signal: signal.clone(),
            },
            OutboundQueue { frames: rx, signal },
        )
    }

    pub fn conn_id(&self) -> ConnId {
        self.conn_id
    }

    /// Queue a frame, waiting for room. Used for responses on the session's
    /// own read path.
    pub async fn enqueue(&self, frame: Bytes) -> Result<(), GateError> {
        if self.is_closed() {
            return Err(GateError::SessionClosed);
        }
        self.frames
            .send(frame)
            .await
            .map_err(|_| GateError::SessionClosed)
    }

    /// Queue a frame without waiting. Used by the hub, which must never
    /// block on a slow client.
    pub fn try_enqueue(&self, frame: Bytes) -> Result<(), EnqueueError> {
        if self.is_closed() {
            return Err(EnqueueError::Closed);
        }
        self.frames.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Signal the writer to flush what is queued, send a close frame, and
    /// exit. Idempotent.
    pub fn close(&self) {
        if !self.signal.closed.swap(true, Ordering::SeqCst) {
            self.signal.notify.notify_one();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.signal.closed.load(Ordering::SeqCst) || self.frames.is_closed()
    }
}

impl OutboundQueue {
    /// Next frame, or `None` once every handle is gone.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.frames.recv().await
    }

    /// Frames already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.frames.try_recv().ok()
    }

    /// Resolves once the session has been closed.
    pub fn closed(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let signal = self.signal.clone();
        async move {
            if signal.closed.load(Ordering::SeqCst) {
                return;
            }
            signal.notify.notified().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.signal.closed.load(Ordering::SeqCst)
    }
}
