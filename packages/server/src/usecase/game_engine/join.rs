//! join: bind a connection to a participant registered over HTTP.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    domain::{Connection, ConnectionId, ConnectionIdentity, SessionId},
    infrastructure::dto::websocket::{
        JoinPayload, JoinSuccessPayload, ListUpdateTrigger, ParticipantJoinPayload,
        ParticipantListUpdatePayload, ParticipantSummary, ServerMessageType,
    },
    usecase::error::{GameError, INVALID_JOIN_PAYLOAD},
};

use super::GameEngine;

impl GameEngine {
    /// The real-time layer never creates participants: the user id must come
    /// from a prior create/join HTTP call.
    pub(super) async fn handle_join(
        &self,
        conn: &Arc<Connection>,
        payload: Value,
    ) -> Result<(), GameError> {
        let payload: JoinPayload = serde_json::from_value(payload)
            .map_err(|_| GameError::InvalidPayload(INVALID_JOIN_PAYLOAD))?;
        let user_id = payload.user_id.ok_or(GameError::UserIdRequired)?;
        let room_id = conn.room_id();
        if let Some(requested) = payload.session_id.filter(|id| *id != room_id.value()) {
            tracing::warn!(
                client_id = %conn.id(),
                session_id = %room_id,
                requested_session_id = requested,
                "Join payload names another session, using the connection's room"
            );
        }

        let sessions = &self.inner.sessions;
        let (session, participants) = tokio::try_join!(
            sessions.get_by_id(room_id),
            sessions.list_participants(room_id)
        )
        .map_err(|e| {
            tracing::warn!(session_id = %room_id, error = %e, "Failed to load session for join");
            GameError::SessionNotFound
        })?;

        let participant = participants
            .into_iter()
            .find(|p| p.user_id == Some(user_id))
            .ok_or(GameError::ParticipantNotFound)?;

        conn.bind_participant(ConnectionIdentity {
            participant_id: Some(participant.id),
            user_id: Some(user_id),
            nickname: participant.nickname.clone(),
            is_host: participant.is_host,
        });
        tracing::info!(
            client_id = %conn.id(),
            session_id = %room_id,
            participant_id = %participant.id,
            is_host = participant.is_host,
            "Participant joined room"
        );

        let joined = ParticipantJoinPayload {
            session_id: room_id,
            participant_id: participant.id,
            nickname: participant.nickname.clone(),
            joined_at: self.now(),
        };
        let is_host = participant.is_host;
        self.send(
            conn,
            ServerMessageType::JoinSuccess,
            &JoinSuccessPayload {
                session: session.into(),
                participant: participant.into(),
                is_host,
            },
        );

        // Let join_success reach the client before the room-wide notifications
        tokio::time::sleep(self.inner.settings.join_grace).await;

        self.broadcast(room_id, ServerMessageType::ParticipantJoin, &joined, None)
            .await;
        self.broadcast_participant_list(room_id, ListUpdateTrigger::WebsocketConnection, None)
            .await;
        Ok(())
    }

    /// Fresh participant snapshot for the whole room
    pub(super) async fn broadcast_participant_list(
        &self,
        room_id: SessionId,
        trigger: ListUpdateTrigger,
        exclude: Option<ConnectionId>,
    ) {
        let participants = match self.inner.sessions.list_participants(room_id).await {
            Ok(participants) => participants,
            Err(e) => {
                tracing::error!(
                    session_id = %room_id,
                    ?trigger,
                    error = %e,
                    "Failed to load participants for list update"
                );
                return;
            }
        };

        let payload = ParticipantListUpdatePayload {
            session_id: room_id,
            participant_count: participants.len(),
            participants: participants
                .into_iter()
                .map(ParticipantSummary::from)
                .collect(),
            trigger,
            updated_at: self.now(),
        };
        self.broadcast(
            room_id,
            ServerMessageType::ParticipantListUpdate,
            &payload,
            exclude,
        )
        .await;
    }
}
