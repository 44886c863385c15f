//! get_session_state: full snapshot for clients resynchronizing after a
//! reconnect or a dropped message.

use std::sync::Arc;

use crate::{
    domain::{Connection, SessionStatus},
    infrastructure::dto::websocket::{
        LeaderboardRow, ParticipantSummary, PublicQuestion, ServerMessageType, SessionSnapshot,
        SessionStatePayload,
    },
    usecase::error::GameError,
};

use super::GameEngine;

impl GameEngine {
    pub(super) async fn handle_get_session_state(
        &self,
        conn: &Arc<Connection>,
    ) -> Result<(), GameError> {
        let room_id = conn.room_id();
        let sessions = &self.inner.sessions;
        let (session, participants, leaderboard) = tokio::try_join!(
            sessions.get_by_id(room_id),
            sessions.list_participants(room_id),
            sessions.get_leaderboard(room_id)
        )
        .map_err(|e| {
            tracing::warn!(session_id = %room_id, error = %e, "Failed to load session state");
            GameError::SessionNotFound
        })?;

        let current_question = match session.current_index() {
            Some(index) if session.status == SessionStatus::Active => {
                match self.inner.questions.list_by_quiz(session.quiz_id).await {
                    Ok(questions) => questions.get(index).map(PublicQuestion::from),
                    Err(e) => {
                        tracing::warn!(session_id = %room_id, error = %e, "Failed to load current question for session state");
                        None
                    }
                }
            }
            _ => None,
        };

        let payload = SessionStatePayload {
            session: SessionSnapshot::from(&session),
            participants: participants
                .into_iter()
                .map(ParticipantSummary::from)
                .collect(),
            leaderboard: leaderboard.into_iter().map(LeaderboardRow::from).collect(),
            current_question,
        };
        self.send(conn, ServerMessageType::SessionState, &payload);
        Ok(())
    }
}
