//! One live participant connection.
//!
//! The connection is owned by the hub once registered. Its outbound queue is
//! bounded: a full queue is never waited on, the message is dropped instead.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::mpsc;

use super::value_object::{ConnectionId, ParticipantId, SessionId, UserId};

/// Serialized outbound frame, shared between every recipient of a broadcast
pub type OutboundFrame = Arc<str>;

/// Who is behind a connection, filled in once by a successful `join`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionIdentity {
    pub participant_id: Option<ParticipantId>,
    pub user_id: Option<UserId>,
    pub nickname: String,
    pub is_host: bool,
}

/// Result of offering a frame to the outbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Queued,
    /// Queue at capacity, frame dropped
    Full,
    /// Queue already closed by the hub
    Closed,
}

#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    room_id: SessionId,
    identity: RwLock<ConnectionIdentity>,
    outbound: Mutex<Option<mpsc::Sender<OutboundFrame>>>,
}

impl Connection {
    /// Create a connection bound to `room_id` with an outbound queue of
    /// `capacity` frames. The receiver is drained by the write loop.
    pub fn new(room_id: SessionId, capacity: usize) -> (Arc<Self>, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let conn = Arc::new(Self {
            id: ConnectionId::generate(),
            room_id,
            identity: RwLock::new(ConnectionIdentity::default()),
            outbound: Mutex::new(Some(tx)),
        });
        (conn, rx)
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn room_id(&self) -> SessionId {
        self.room_id
    }

    /// Snapshot of the bound identity
    pub fn identity(&self) -> ConnectionIdentity {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `None` until a join completes
    pub fn participant_id(&self) -> Option<ParticipantId> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .participant_id
    }

    pub fn is_host(&self) -> bool {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_host
    }

    /// Attach the participant found by the join handler
    pub fn bind_participant(&self, identity: ConnectionIdentity) {
        *self
            .identity
            .write()
            .unwrap_or_else(PoisonError::into_inner) = identity;
    }

    /// Offer a frame without waiting
    pub fn try_enqueue(&self, frame: OutboundFrame) -> Enqueue {
        let guard = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return Enqueue::Closed;
        };
        match tx.try_send(frame) {
            Ok(()) => Enqueue::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Enqueue::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Enqueue::Closed,
        }
    }

    /// Close the outbound queue. The write loop drains what is left, then
    /// sends a close frame. Returns `false` if it was already closed.
    pub fn close_queue(&self) -> bool {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    pub fn is_queue_open(&self) -> bool {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
