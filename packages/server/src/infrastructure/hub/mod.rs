//! Production hub: process-local room registry bridged to the backbone.
//!
//! ```text
//! broadcast_to_room ─┬─> dispatch loop ──> local connections
//!                    └─> backbone.publish(quiz:room:{id})
//!
//! backbone (quiz:room:*) ──> relay loop ──> dispatch loop ──> local connections
//! ```
//!
//! Messages relayed from other processes are delivered locally only, never
//! published again.

mod dispatch;

use std::{
    sync::{Arc, Mutex, OnceLock, PoisonError, Weak},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::{
    sync::{RwLock, mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{
    domain::{
        Backbone, BackboneError, Connection, ConnectionId, Enqueue, Hub, MessageHandler,
        OutboundFrame, ROOM_CHANNEL_PATTERN, ServerId, SessionId, Subscription, room_channel,
    },
    infrastructure::dto::backbone::CrossServerMessage,
};

use dispatch::{Dispatcher, Inbox, LocalBroadcast, Registration, RoomMap, presence_worker, stopped};

pub struct RoomHub {
    server_id: ServerId,
    backbone: Arc<dyn Backbone>,
    rooms: Arc<RwLock<RoomMap>>,
    register_tx: mpsc::UnboundedSender<Registration>,
    unregister_tx: mpsc::UnboundedSender<Registration>,
    broadcast_tx: mpsc::UnboundedSender<LocalBroadcast>,
    handler: OnceLock<Weak<dyn MessageHandler>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RoomHub {
    /// Subscribe to every room channel and spawn the hub's loops.
    ///
    /// The loops stop once `shutdown` turns `true`.
    pub async fn start(
        server_id: ServerId,
        backbone: Arc<dyn Backbone>,
        presence_ttl: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Arc<Self>, BackboneError> {
        let subscription = backbone.psubscribe(ROOM_CHANNEL_PATTERN).await?;

        let (register_tx, register) = mpsc::unbounded_channel();
        let (unregister_tx, unregister) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast) = mpsc::unbounded_channel();
        let (presence_tx, presence_rx) = mpsc::unbounded_channel();
        let rooms = Arc::new(RwLock::new(RoomMap::new()));

        let hub = Arc::new(Self {
            server_id: server_id.clone(),
            backbone: backbone.clone(),
            rooms: rooms.clone(),
            register_tx,
            unregister_tx,
            broadcast_tx: broadcast_tx.clone(),
            handler: OnceLock::new(),
            tasks: Mutex::new(Vec::new()),
        });

        let dispatcher = Dispatcher {
            rooms,
            presence: presence_tx,
        };
        let inbox = Inbox {
            register,
            unregister,
            broadcast,
        };
        let tasks = vec![
            tokio::spawn(dispatcher.run(inbox, shutdown.clone())),
            tokio::spawn(presence_worker(
                backbone,
                server_id.clone(),
                presence_ttl,
                presence_rx,
            )),
            tokio::spawn(relay_loop(subscription, server_id.clone(), broadcast_tx, shutdown)),
        ];
        *hub.tasks.lock().unwrap_or_else(PoisonError::into_inner) = tasks;

        tracing::info!(server_id = %server_id, "Hub started");
        Ok(hub)
    }

    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    /// Register the single consumer of client traffic.
    ///
    /// Must be called before the first connection is accepted; later calls are ignored.
    pub fn set_message_handler(&self, handler: &Arc<dyn MessageHandler>) {
        if self.handler.set(Arc::downgrade(handler)).is_err() {
            tracing::warn!("Message handler already set, ignoring");
        }
    }

    pub fn message_handler(&self) -> Option<Arc<dyn MessageHandler>> {
        self.handler.get().and_then(Weak::upgrade)
    }

    /// Wait for the hub's loops to finish after shutdown was signalled
    pub async fn stopped(&self) {
        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *tasks)
        };
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Hub task failed");
            }
        }
    }

    async fn publish(
        &self,
        room_id: SessionId,
        frame: &OutboundFrame,
        exclude: Option<&ConnectionId>,
    ) {
        let message = CrossServerMessage {
            server_id: self.server_id.as_str().to_string(),
            room_id,
            message: frame.to_string(),
            exclude_client: exclude.map(|id| id.as_str().to_string()),
            timestamp: Utc::now(),
        };
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(session_id = %room_id, error = %e, "Failed to encode cross-server message");
                return;
            }
        };
        if let Err(e) = self.backbone.publish(&room_channel(room_id), payload).await {
            tracing::warn!(session_id = %room_id, error = %e, "Failed to publish to backbone");
        }
    }
}

#[async_trait]
impl Hub for RoomHub {
    async fn register(&self, conn: Arc<Connection>) {
        let (ack, done) = oneshot::channel();
        if self.register_tx.send(Registration { conn, ack }).is_err() {
            tracing::warn!("Hub is stopped, cannot register client");
            return;
        }
        let _ = done.await;
    }

    async fn unregister(&self, conn: Arc<Connection>) {
        // The handler still sees the connection in its room
        if let Some(handler) = self.message_handler() {
            handler.handle_disconnect(conn.clone()).await;
        }
        let (ack, done) = oneshot::channel();
        if self
            .unregister_tx
            .send(Registration {
                conn: conn.clone(),
                ack,
            })
            .is_err()
        {
            conn.close_queue();
            return;
        }
        let _ = done.await;
    }

    async fn broadcast_to_room(
        &self,
        room_id: SessionId,
        frame: OutboundFrame,
        exclude: Option<ConnectionId>,
    ) {
        let local = LocalBroadcast {
            room_id,
            frame: frame.clone(),
            exclude: exclude.clone(),
        };
        if self.broadcast_tx.send(local).is_err() {
            tracing::warn!(session_id = %room_id, "Hub is stopped, dropping local broadcast");
        }
        self.publish(room_id, &frame, exclude.as_ref()).await;
    }

    fn send_to_client(&self, conn: &Connection, frame: OutboundFrame) -> bool {
        match conn.try_enqueue(frame) {
            Enqueue::Queued => true,
            Enqueue::Full => {
                tracing::warn!(client_id = %conn.id(), "Send buffer full, dropping message");
                false
            }
            Enqueue::Closed => false,
        }
    }

    async fn room_clients(&self, room_id: SessionId) -> Vec<Arc<Connection>> {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .map(|room| room.values().cloned().collect())
            .unwrap_or_default()
    }

    async fn room_client_count(&self, room_id: SessionId) -> usize {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .map_or(0, |room| room.len())
    }
}

/// Replays broadcasts published by other processes to local connections.
async fn relay_loop(
    mut subscription: Subscription,
    server_id: ServerId,
    broadcast_tx: mpsc::UnboundedSender<LocalBroadcast>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let message = tokio::select! {
            _ = stopped(&mut shutdown) => break,
            message = subscription.recv() => match message {
                Some(message) => message,
                None => {
                    tracing::warn!("Backbone subscription closed");
                    break;
                }
            },
        };

        let cross: CrossServerMessage = match serde_json::from_str(&message.payload) {
            Ok(cross) => cross,
            Err(e) => {
                tracing::warn!(channel = %message.channel, error = %e, "Invalid cross-server message");
                continue;
            }
        };
        if cross.server_id == server_id.as_str() {
            continue;
        }

        let local = LocalBroadcast {
            room_id: cross.room_id,
            frame: Arc::from(cross.message),
            exclude: cross.exclude_client.map(ConnectionId::from),
        };
        if broadcast_tx.send(local).is_err() {
            break;
        }
    }
    tracing::debug!("Backbone relay loop stopped");
}
