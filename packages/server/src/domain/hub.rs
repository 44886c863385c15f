//! Hub ports: the room registry and the message handler it feeds.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    connection::{Connection, OutboundFrame},
    message::InboundMessage,
    value_object::{ConnectionId, SessionId},
};

/// Process-local registry of room connections, bridged to the backbone.
///
/// Every frame handed to the hub is already serialized.
#[async_trait]
pub trait Hub: Send + Sync {
    /// Add a connection to its room and mark this process present for the room
    async fn register(&self, conn: Arc<Connection>);

    /// Run the disconnect hook, then remove the connection and close its queue
    async fn unregister(&self, conn: Arc<Connection>);

    /// Deliver to every local connection of the room except `exclude`, and
    /// replicate to sibling processes
    async fn broadcast_to_room(
        &self,
        room_id: SessionId,
        frame: OutboundFrame,
        exclude: Option<ConnectionId>,
    );

    /// Private reply. Returns `false` if the frame was dropped.
    fn send_to_client(&self, conn: &Connection, frame: OutboundFrame) -> bool;

    async fn room_clients(&self, room_id: SessionId) -> Vec<Arc<Connection>>;

    async fn room_client_count(&self, room_id: SessionId) -> usize;
}

/// Consumer of client traffic, registered once on the hub at startup
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, conn: Arc<Connection>, message: InboundMessage);

    /// Called by the hub before the connection leaves its room
    async fn handle_disconnect(&self, conn: Arc<Connection>);
}
