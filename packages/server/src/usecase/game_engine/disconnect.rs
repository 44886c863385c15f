//! Disconnect hook, invoked by the hub while the connection is still in its room.

use std::sync::Arc;

use crate::{
    domain::Connection,
    infrastructure::dto::websocket::{
        GamePausedPayload, ListUpdateTrigger, ParticipantLeftPayload, PauseReason,
        ServerMessageType,
    },
};

use super::GameEngine;

impl GameEngine {
    pub(super) async fn on_disconnect(&self, conn: &Arc<Connection>) {
        let identity = conn.identity();
        // Never joined: nothing to announce
        let Some(participant_id) = identity.participant_id else {
            return;
        };
        let room_id = conn.room_id();
        tracing::info!(
            client_id = %conn.id(),
            session_id = %room_id,
            participant_id = %participant_id,
            is_host = identity.is_host,
            "Participant disconnected"
        );

        let left = ParticipantLeftPayload {
            session_id: room_id,
            participant_id,
            left_at: self.now(),
        };
        self.broadcast(room_id, ServerMessageType::ParticipantLeft, &left, None)
            .await;
        self.broadcast_participant_list(
            room_id,
            ListUpdateTrigger::ParticipantDisconnect,
            Some(conn.id().clone()),
        )
        .await;

        if identity.is_host {
            self.inner.scheduler.cancel_all(room_id);
            tracing::info!(session_id = %room_id, "Host disconnected, room timers stopped");

            let paused = GamePausedPayload {
                session_id: room_id,
                reason: PauseReason::HostDisconnected,
                paused_at: self.now(),
                remaining_ms: None,
            };
            self.broadcast(
                room_id,
                ServerMessageType::GamePaused,
                &paused,
                Some(conn.id().clone()),
            )
            .await;
        }
    }
}
