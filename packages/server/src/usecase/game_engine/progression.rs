//! Server-driven question progression.
//!
//! A question timeout ends the question, shows the intermediate leaderboard
//! and schedules the next step after the display window. Failures in this
//! chain are logged and stop the chain; the persisted state stays truthful
//! and the host can still move the room forward manually.

use crate::{
    domain::{Question, RepositoryError, SessionId, SessionStatus, scoring::MAX_SCORE},
    infrastructure::dto::websocket::{
        CompletionReason, LeaderboardPayload, LeaderboardRow, NextAction, PublicQuestion,
        QuestionEndPayload, QuestionStartPayload, QuizEndPayload, ServerMessageType,
    },
};

use super::{Action, GameEngine};

impl GameEngine {
    /// Broadcast the question and arm the room's deadline for its time limit.
    ///
    /// Anything pending for the room is cancelled first.
    pub(super) async fn start_question(&self, room_id: SessionId, question: &Question) {
        let time_limit = question.time_limit;
        let started_at = self.now();
        let deadline = started_at + chrono::Duration::seconds(i64::from(time_limit.secs()));

        self.inner.scheduler.arm_question(
            room_id,
            time_limit.as_duration(),
            self.timeout_action(room_id),
        );

        let mut public = PublicQuestion::from(question);
        public.max_score = Some(MAX_SCORE);
        let payload = QuestionStartPayload {
            session_id: room_id,
            question: public,
            started_at,
            server_time_limit: time_limit.secs(),
            auto_advance: true,
            deadline,
        };

        tracing::info!(
            session_id = %room_id,
            question_id = %question.id,
            question_index = question.index,
            time_limit_secs = time_limit.secs(),
            "Question started"
        );
        self.broadcast(room_id, ServerMessageType::QuestionStart, &payload, None)
            .await;
    }

    /// Stop the question deadline and tell the room the question is over
    pub(super) async fn end_question(&self, room_id: SessionId) {
        self.inner.scheduler.stop_question(room_id);
        let payload = QuestionEndPayload {
            session_id: room_id,
            ended_at: self.now(),
        };
        self.broadcast(room_id, ServerMessageType::QuestionEnd, &payload, None)
            .await;
    }

    pub(super) fn timeout_action(&self, room_id: SessionId) -> Action {
        let engine = self.downgrade();
        Box::pin(async move {
            if let Some(engine) = engine.upgrade() {
                engine.on_question_timeout(room_id).await;
            }
        })
    }

    pub(super) fn first_question_action(&self, room_id: SessionId, first: Question) -> Action {
        let engine = self.downgrade();
        Box::pin(async move {
            if let Some(engine) = engine.upgrade() {
                engine.open_first_question(room_id, first).await;
            }
        })
    }

    fn auto_next_action(&self, room_id: SessionId) -> Action {
        let engine = self.downgrade();
        Box::pin(async move {
            if let Some(engine) = engine.upgrade() {
                engine.auto_next_question(room_id).await;
            }
        })
    }

    fn auto_end_action(&self, room_id: SessionId) -> Action {
        let engine = self.downgrade();
        Box::pin(async move {
            if let Some(engine) = engine.upgrade() {
                engine.auto_end_quiz(room_id).await;
            }
        })
    }

    async fn open_first_question(&self, room_id: SessionId, first: Question) {
        match self.inner.sessions.get_by_id(room_id).await {
            Ok(session) if session.status == SessionStatus::Active => {}
            Ok(session) => {
                tracing::warn!(session_id = %room_id, status = %session.status, "Session no longer active, not opening first question");
                return;
            }
            Err(e) => {
                tracing::error!(session_id = %room_id, error = %e, "Failed to load session for first question");
                return;
            }
        }

        match self
            .inner
            .sessions
            .update_current_question_index(room_id, -1, 0)
            .await
        {
            Ok(()) => self.start_question(room_id, &first).await,
            Err(RepositoryError::IndexConflict { actual, .. }) => {
                tracing::info!(session_id = %room_id, current_index = actual, "First question already opened");
            }
            Err(e) => {
                tracing::error!(session_id = %room_id, error = %e, "Failed to set first question");
            }
        }
    }

    async fn on_question_timeout(&self, room_id: SessionId) {
        let (session, questions) = match self.load_session_and_questions(room_id).await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(session_id = %room_id, error = %e, "Failed to load session for question timeout");
                return;
            }
        };
        if session.status != SessionStatus::Active {
            tracing::debug!(session_id = %room_id, status = %session.status, "Question timeout ignored");
            return;
        }

        tracing::info!(
            session_id = %room_id,
            question_index = session.current_question_index,
            "Question time is up"
        );
        self.end_question(room_id).await;

        let is_last = session
            .current_index()
            .is_none_or(|index| index + 1 >= questions.len());
        let (next_action, action) = if is_last {
            (NextAction::AutoEndQuiz, self.auto_end_action(room_id))
        } else {
            (NextAction::AutoNextQuestion, self.auto_next_action(room_id))
        };

        self.broadcast_leaderboard(room_id, next_action).await;
        self.inner.scheduler.schedule_advance(
            room_id,
            self.inner.settings.leaderboard_display,
            action,
        );
    }

    /// Intermediate leaderboard shown between questions
    async fn broadcast_leaderboard(&self, room_id: SessionId, next_action: NextAction) {
        let leaderboard = match self.inner.sessions.get_leaderboard(room_id).await {
            Ok(leaderboard) => leaderboard,
            Err(e) => {
                tracing::error!(session_id = %room_id, error = %e, "Failed to load intermediate leaderboard");
                return;
            }
        };
        let payload = LeaderboardPayload {
            session_id: room_id,
            leaderboard: leaderboard.into_iter().map(LeaderboardRow::from).collect(),
            display_time: self.inner.settings.leaderboard_display.as_secs(),
            next_action,
            server_driven: true,
            updated_at: self.now(),
        };
        self.broadcast(room_id, ServerMessageType::Leaderboard, &payload, None)
            .await;
    }

    async fn auto_next_question(&self, room_id: SessionId) {
        let (session, questions) = match self.load_session_and_questions(room_id).await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(session_id = %room_id, error = %e, "Failed to load session for auto next question");
                return;
            }
        };
        if session.status != SessionStatus::Active {
            tracing::warn!(session_id = %room_id, status = %session.status, "Session not active, skipping auto next question");
            return;
        }

        let current = session.current_question_index;
        let next = current + 1;
        let Some(question) = usize::try_from(next).ok().and_then(|i| questions.get(i)) else {
            self.auto_end_quiz(room_id).await;
            return;
        };

        match self
            .inner
            .sessions
            .update_current_question_index(room_id, current, next)
            .await
        {
            Ok(()) => self.start_question(room_id, question).await,
            Err(RepositoryError::IndexConflict { actual, .. }) => {
                tracing::info!(session_id = %room_id, expected = current, actual, "Question already advanced, skipping auto next");
            }
            Err(e) => {
                tracing::error!(session_id = %room_id, error = %e, "Failed to update question index for auto next");
            }
        }
    }

    /// End the session after the last question. A session that is already
    /// over is left alone.
    async fn auto_end_quiz(&self, room_id: SessionId) {
        let ended = match self.inner.sessions.end(room_id).await {
            Ok(ended) => ended,
            Err(RepositoryError::InvalidTransition { from, .. }) => {
                tracing::debug!(session_id = %room_id, status = %from, "Session already over, skipping auto end");
                self.inner.scheduler.cancel_all(room_id);
                return;
            }
            Err(e) => {
                tracing::error!(session_id = %room_id, error = %e, "Failed to auto-end session");
                return;
            }
        };

        let final_leaderboard = self
            .inner
            .sessions
            .get_leaderboard(room_id)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(session_id = %room_id, error = %e, "Failed to load final leaderboard for auto end");
                Vec::new()
            });

        tracing::info!(
            session_id = %room_id,
            participants = final_leaderboard.len(),
            "Quiz completed"
        );
        let payload = QuizEndPayload {
            session_id: room_id,
            ended_at: ended.ended_at.unwrap_or_else(|| self.now()),
            final_leaderboard: final_leaderboard
                .into_iter()
                .map(LeaderboardRow::from)
                .collect(),
            status: ended.status,
            auto_ended: true,
            completion_reason: CompletionReason::AllQuestionsCompleted,
            server_driven: true,
        };
        self.broadcast(room_id, ServerMessageType::QuizEnd, &payload, None)
            .await;
        self.inner.scheduler.cancel_all(room_id);
    }
}
