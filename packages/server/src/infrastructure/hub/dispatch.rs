//! The hub's dispatch loop.
//!
//! All mutations of the room map happen here, one command at a time.
//! Presence updates are forwarded, in order, to a separate worker so that
//! backbone I/O never stalls dispatch.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::{RwLock, mpsc, oneshot, watch};

use crate::domain::{
    Backbone, Connection, ConnectionId, Enqueue, OutboundFrame, ServerId, SessionId,
    room_presence_key,
};

pub(super) type RoomMap = HashMap<SessionId, HashMap<ConnectionId, Arc<Connection>>>;

pub(super) struct Registration {
    pub conn: Arc<Connection>,
    pub ack: oneshot::Sender<()>,
}

pub(super) struct LocalBroadcast {
    pub room_id: SessionId,
    pub frame: OutboundFrame,
    pub exclude: Option<ConnectionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PresenceOp {
    Join(SessionId),
    Leave(SessionId),
}

pub(super) struct Inbox {
    pub register: mpsc::UnboundedReceiver<Registration>,
    pub unregister: mpsc::UnboundedReceiver<Registration>,
    pub broadcast: mpsc::UnboundedReceiver<LocalBroadcast>,
}

pub(super) struct Dispatcher {
    pub rooms: Arc<RwLock<RoomMap>>,
    pub presence: mpsc::UnboundedSender<PresenceOp>,
}

impl Dispatcher {
    pub async fn run(self, mut inbox: Inbox, mut shutdown: watch::Receiver<bool>) {
        tracing::debug!("Hub dispatch loop started");
        loop {
            tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => break,
                Some(registration) = inbox.register.recv() => self.register(registration).await,
                Some(registration) = inbox.unregister.recv() => self.unregister(registration).await,
                Some(broadcast) = inbox.broadcast.recv() => self.broadcast(broadcast).await,
                else => break,
            }
        }

        // Withdraw from every room this process still serves
        let rooms = self.rooms.read().await;
        for room_id in rooms.keys() {
            let _ = self.presence.send(PresenceOp::Leave(*room_id));
        }
        tracing::info!(rooms = rooms.len(), "Hub dispatch loop stopped");
    }

    async fn register(&self, Registration { conn, ack }: Registration) {
        let room_id = conn.room_id();
        let count = {
            let mut rooms = self.rooms.write().await;
            let room = rooms.entry(room_id).or_default();
            room.insert(conn.id().clone(), conn.clone());
            room.len()
        };
        let _ = self.presence.send(PresenceOp::Join(room_id));
        tracing::debug!(
            session_id = %room_id,
            client_id = %conn.id(),
            room_clients = count,
            "Client registered"
        );
        let _ = ack.send(());
    }

    async fn unregister(&self, Registration { conn, ack }: Registration) {
        let room_id = conn.room_id();
        let removed = {
            let mut rooms = self.rooms.write().await;
            remove_connections(&mut rooms, room_id, std::slice::from_ref(conn.id()))
        };
        conn.close_queue();
        if removed.room_emptied {
            let _ = self.presence.send(PresenceOp::Leave(room_id));
        }
        tracing::debug!(
            session_id = %room_id,
            client_id = %conn.id(),
            room_removed = removed.room_emptied,
            "Client unregistered"
        );
        let _ = ack.send(());
    }

    async fn broadcast(&self, message: LocalBroadcast) {
        let mut dead = Vec::new();
        {
            let rooms = self.rooms.read().await;
            let Some(room) = rooms.get(&message.room_id) else {
                return;
            };
            for (id, conn) in room {
                if message.exclude.as_ref() == Some(id) {
                    continue;
                }
                match conn.try_enqueue(message.frame.clone()) {
                    Enqueue::Queued => {}
                    Enqueue::Full | Enqueue::Closed => dead.push(id.clone()),
                }
            }
        }
        if dead.is_empty() {
            return;
        }

        let removed = {
            let mut rooms = self.rooms.write().await;
            remove_connections(&mut rooms, message.room_id, &dead)
        };
        for conn in &removed.connections {
            conn.close_queue();
            tracing::warn!(
                session_id = %message.room_id,
                client_id = %conn.id(),
                "Send buffer full, dropping client"
            );
        }
        if removed.room_emptied {
            let _ = self.presence.send(PresenceOp::Leave(message.room_id));
        }
    }
}

struct Removed {
    connections: Vec<Arc<Connection>>,
    room_emptied: bool,
}

fn remove_connections(rooms: &mut RoomMap, room_id: SessionId, ids: &[ConnectionId]) -> Removed {
    let Some(room) = rooms.get_mut(&room_id) else {
        return Removed {
            connections: Vec::new(),
            room_emptied: false,
        };
    };
    let connections = ids.iter().filter_map(|id| room.remove(id)).collect();
    let room_emptied = room.is_empty();
    if room_emptied {
        rooms.remove(&room_id);
    }
    Removed {
        connections,
        room_emptied,
    }
}

/// Resolves once shutdown is signalled.
///
/// The `watch::Ref` from `wait_for` is dropped here, so `select!` arms that
/// await afterwards keep the loop future `Send`.
pub(super) async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Applies presence changes to the backbone in the order dispatch produced them.
pub(super) async fn presence_worker(
    backbone: Arc<dyn Backbone>,
    server_id: ServerId,
    ttl: Duration,
    mut ops: mpsc::UnboundedReceiver<PresenceOp>,
) {
    while let Some(op) = ops.recv().await {
        let result = match op {
            PresenceOp::Join(room_id) => {
                backbone
                    .add_presence(&room_presence_key(room_id), server_id.as_str(), ttl)
                    .await
            }
            PresenceOp::Leave(room_id) => {
                backbone
                    .remove_presence(&room_presence_key(room_id), server_id.as_str())
                    .await
            }
        };
        if let Err(e) = result {
            tracing::warn!(?op, error = %e, "Failed to update room presence");
        }
    }
}
