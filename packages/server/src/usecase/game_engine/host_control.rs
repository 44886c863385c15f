//! Host-only controls: start, next question, end, pause and resume.

use std::sync::Arc;

use crate::{
    domain::{Connection, RepositoryError, SessionId, SessionStatus},
    infrastructure::dto::websocket::{
        CompletionReason, GamePausedPayload, GameResumedPayload, LeaderboardRow, PauseReason,
        QuizEndPayload, QuizStartPayload, ServerMessageType,
    },
    usecase::error::{GameError, HostAction, PersistenceOp},
};

use super::GameEngine;

fn require_host(conn: &Connection, action: HostAction) -> Result<(), GameError> {
    if conn.is_host() {
        Ok(())
    } else {
        Err(GameError::Unauthorized(action))
    }
}

fn session_not_found(room_id: SessionId) -> impl FnOnce(RepositoryError) -> GameError {
    move |e| {
        tracing::warn!(session_id = %room_id, error = %e, "Failed to load session");
        GameError::SessionNotFound
    }
}

fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl GameEngine {
    pub(super) async fn handle_start_quiz(&self, conn: &Arc<Connection>) -> Result<(), GameError> {
        require_host(conn, HostAction::Start)?;
        let room_id = conn.room_id();

        let (session, mut questions) = self
            .load_session_and_questions(room_id)
            .await
            .map_err(session_not_found(room_id))?;
        if session.status != SessionStatus::Waiting {
            return Err(GameError::NotStartable(session.status));
        }
        if questions.is_empty() {
            return Err(GameError::NoQuestions);
        }

        let started = self
            .inner
            .sessions
            .start(room_id)
            .await
            .map_err(GameError::persistence(PersistenceOp::StartSession))?;
        tracing::info!(
            session_id = %room_id,
            client_id = %conn.id(),
            questions = questions.len(),
            "Quiz started"
        );

        let payload = QuizStartPayload {
            session_id: room_id,
            started_at: started.started_at.unwrap_or_else(|| self.now()),
        };
        self.broadcast(room_id, ServerMessageType::QuizStart, &payload, None)
            .await;

        let first = questions.swap_remove(0);
        self.inner.scheduler.schedule_advance(
            room_id,
            self.inner.settings.start_delay,
            self.first_question_action(room_id, first),
        );
        Ok(())
    }

    pub(super) async fn handle_next_question(
        &self,
        conn: &Arc<Connection>,
    ) -> Result<(), GameError> {
        require_host(conn, HostAction::ControlQuestions)?;
        let room_id = conn.room_id();

        let (session, questions) = self
            .load_session_and_questions(room_id)
            .await
            .map_err(session_not_found(room_id))?;
        if session.status != SessionStatus::Active {
            return Err(GameError::NotActive(session.status));
        }

        if session.current_index().is_some() {
            self.end_question(room_id).await;
        }

        let current = session.current_question_index;
        let next = current + 1;
        let question = usize::try_from(next)
            .ok()
            .and_then(|i| questions.get(i))
            .ok_or(GameError::NoMoreQuestions)?;

        self.inner
            .sessions
            .update_current_question_index(room_id, current, next)
            .await
            .map_err(|e| match e {
                RepositoryError::IndexConflict { expected, actual } => {
                    GameError::QuestionConflict { expected, actual }
                }
                other => GameError::persistence(PersistenceOp::UpdateQuestion)(other),
            })?;

        self.start_question(room_id, question).await;
        Ok(())
    }

    pub(super) async fn handle_end_quiz(&self, conn: &Arc<Connection>) -> Result<(), GameError> {
        require_host(conn, HostAction::End)?;
        let room_id = conn.room_id();

        let session = self
            .inner
            .sessions
            .get_by_id(room_id)
            .await
            .map_err(session_not_found(room_id))?;
        if session.status.is_terminal() {
            return Err(GameError::AlreadyEnded);
        }

        self.inner.scheduler.cancel_all(room_id);
        if session.status == SessionStatus::Active {
            self.end_question(room_id).await;
        }

        let sessions = &self.inner.sessions;
        let (ended, leaderboard) =
            tokio::try_join!(sessions.end(room_id), sessions.get_leaderboard(room_id))
                .map_err(GameError::persistence(PersistenceOp::EndSession))?;

        tracing::info!(
            session_id = %room_id,
            client_id = %conn.id(),
            participants = leaderboard.len(),
            "Quiz ended by host"
        );
        let payload = QuizEndPayload {
            session_id: room_id,
            ended_at: ended.ended_at.unwrap_or_else(|| self.now()),
            final_leaderboard: leaderboard.into_iter().map(LeaderboardRow::from).collect(),
            status: ended.status,
            auto_ended: false,
            completion_reason: CompletionReason::HostEnded,
            server_driven: false,
        };
        self.broadcast(room_id, ServerMessageType::QuizEnd, &payload, None)
            .await;
        Ok(())
    }

    /// Freeze the open question's deadline. The persisted status is unchanged.
    pub(super) async fn handle_pause_quiz(&self, conn: &Arc<Connection>) -> Result<(), GameError> {
        require_host(conn, HostAction::Pause)?;
        let room_id = conn.room_id();

        let remaining = self.inner.scheduler.pause(room_id);
        tracing::info!(session_id = %room_id, ?remaining, "Quiz paused by host");

        let payload = GamePausedPayload {
            session_id: room_id,
            reason: PauseReason::HostRequested,
            paused_at: self.now(),
            remaining_ms: remaining.map(millis),
        };
        self.broadcast(room_id, ServerMessageType::GamePaused, &payload, None)
            .await;
        Ok(())
    }

    /// Re-arm a frozen deadline with the time that was left
    pub(super) async fn handle_resume_quiz(
        &self,
        conn: &Arc<Connection>,
    ) -> Result<(), GameError> {
        require_host(conn, HostAction::Resume)?;
        let room_id = conn.room_id();

        let resumed_at = self.now();
        let remaining = self
            .inner
            .scheduler
            .resume(room_id, self.timeout_action(room_id));
        tracing::info!(session_id = %room_id, ?remaining, "Quiz resumed by host");

        let deadline = remaining
            .and_then(|r| chrono::Duration::from_std(r).ok())
            .map(|r| resumed_at + r);
        let payload = GameResumedPayload {
            session_id: room_id,
            resumed_at,
            remaining_ms: remaining.map(millis),
            deadline,
        };
        self.broadcast(room_id, ServerMessageType::GameResumed, &payload, None)
            .await;
        Ok(())
    }
}
