//! Game Event Engine
//!
//! Hub から届くクライアントメッセージを種類ごとのハンドラーに振り分け、
//! セッションの状態遷移・採点・問題タイマーによる自動進行を行います。
//!
//! 永続化された状態は全て Repository の向こうにあり、エンジン自身が持つのは
//! ルームごとのタイマー（`RoomScheduler`）だけです。ハンドラーはメッセージごとに
//! 並行に実行されます。
//!
//! ```text
//! start_quiz ──(1s)──> question_start ──(time limit)──> question_end + leaderboard
//!                            ^                                    │
//!                            └──────────(5s, auto next)───────────┤
//!                                                                 └──(5s, auto end)──> quiz_end
//! ```

mod answer;
mod disconnect;
mod host_control;
mod join;
mod progression;
mod scheduler;
mod session_state;

#[cfg(test)]
mod tests;

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Weak},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hayaoshi_shared::time::Clock;
use serde::Serialize;

use crate::{
    config::GameSettings,
    domain::{
        Connection, ConnectionId, Hub, InboundMessage, MessageHandler, OutboundFrame, Question,
        QuestionRepository, QuizSession, RepositoryError, SessionId, SessionRepository,
    },
    infrastructure::{
        MarshalCache,
        dto::websocket::{ClientMessageType, ErrorPayload, ServerEnvelope, ServerMessageType},
    },
};

use super::error::GameError;

pub use scheduler::{QuestionTimerState, RoomScheduler};

/// A delayed action owned by the scheduler
type Action = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct EngineInner {
    sessions: Arc<dyn SessionRepository>,
    questions: Arc<dyn QuestionRepository>,
    hub: Arc<dyn Hub>,
    clock: Arc<dyn Clock>,
    cache: MarshalCache,
    scheduler: Arc<RoomScheduler>,
    settings: GameSettings,
}

/// Cheap to clone; every clone drives the same rooms.
#[derive(Clone)]
pub struct GameEngine {
    inner: Arc<EngineInner>,
}

/// Handle held by scheduled actions so that pending timers never keep the
/// engine alive
#[derive(Clone)]
struct WeakEngine(Weak<EngineInner>);

impl WeakEngine {
    fn upgrade(&self) -> Option<GameEngine> {
        self.0.upgrade().map(|inner| GameEngine { inner })
    }
}

impl GameEngine {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        questions: Arc<dyn QuestionRepository>,
        hub: Arc<dyn Hub>,
        clock: Arc<dyn Clock>,
        settings: GameSettings,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                sessions,
                questions,
                hub,
                clock,
                cache: MarshalCache::new(settings.marshal_cache_ttl),
                scheduler: Arc::new(RoomScheduler::new()),
                settings,
            }),
        }
    }

    /// State of the room's question deadline
    pub fn question_timer(&self, room_id: SessionId) -> QuestionTimerState {
        self.inner.scheduler.question_state(room_id)
    }

    /// Number of rooms with a pending timer or follow-up action
    pub fn scheduled_rooms(&self) -> usize {
        self.inner.scheduler.room_count()
    }

    fn downgrade(&self) -> WeakEngine {
        WeakEngine(Arc::downgrade(&self.inner))
    }

    fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Session and its ordered question list
    async fn load_session_and_questions(
        &self,
        room_id: SessionId,
    ) -> Result<(QuizSession, Vec<Question>), RepositoryError> {
        let session = self.inner.sessions.get_by_id(room_id).await?;
        let questions = self.inner.questions.list_by_quiz(session.quiz_id).await?;
        Ok((session, questions))
    }

    /// Serialize an outbound envelope, reusing the marshal cache for high fan-out types
    fn encode<P: Serialize>(
        &self,
        room_id: SessionId,
        kind: ServerMessageType,
        payload: &P,
    ) -> Option<OutboundFrame> {
        let timestamp = self.now();
        let encode = || {
            serde_json::to_string(&ServerEnvelope {
                r#type: kind,
                payload,
                timestamp,
            })
            .map(OutboundFrame::from)
        };
        let encoded = if MarshalCache::is_cacheable(kind) {
            self.inner
                .cache
                .get_or_try_insert_with(MarshalCache::key(kind, room_id, timestamp), encode)
        } else {
            encode()
        };
        match encoded {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::error!(session_id = %room_id, message_type = kind.as_str(), error = %e, "Failed to encode message");
                None
            }
        }
    }

    /// Private reply to one connection
    fn send<P: Serialize>(&self, conn: &Connection, kind: ServerMessageType, payload: &P) {
        let Some(frame) = self.encode(conn.room_id(), kind, payload) else {
            return;
        };
        if !self.inner.hub.send_to_client(conn, frame) {
            tracing::debug!(
                client_id = %conn.id(),
                message_type = kind.as_str(),
                "Private message dropped"
            );
        }
    }

    async fn broadcast<P: Serialize + Sync>(
        &self,
        room_id: SessionId,
        kind: ServerMessageType,
        payload: &P,
        exclude: Option<ConnectionId>,
    ) {
        let Some(frame) = self.encode(room_id, kind, payload) else {
            return;
        };
        self.inner.hub.broadcast_to_room(room_id, frame, exclude).await;
    }

    fn send_error(&self, conn: &Connection, error: &GameError) {
        let payload = ErrorPayload {
            code: error.code().to_string(),
            message: error.message(),
        };
        self.send(conn, ServerMessageType::Error, &payload);
    }
}

#[async_trait]
impl MessageHandler for GameEngine {
    async fn handle_message(&self, conn: Arc<Connection>, message: InboundMessage) {
        let Some(kind) = ClientMessageType::parse(&message.kind) else {
            tracing::warn!(
                client_id = %conn.id(),
                session_id = %conn.room_id(),
                message_type = %message.kind,
                "Unknown message type, dropping"
            );
            return;
        };

        let result = match kind {
            ClientMessageType::Join => self.handle_join(&conn, message.payload).await,
            ClientMessageType::Answer => self.handle_answer(&conn, message.payload).await,
            ClientMessageType::StartQuiz => self.handle_start_quiz(&conn).await,
            ClientMessageType::NextQuestion => self.handle_next_question(&conn).await,
            ClientMessageType::EndQuiz => self.handle_end_quiz(&conn).await,
            ClientMessageType::PauseQuiz => self.handle_pause_quiz(&conn).await,
            ClientMessageType::ResumeQuiz => self.handle_resume_quiz(&conn).await,
            ClientMessageType::Ping => {
                self.send(&conn, ServerMessageType::Pong, &());
                Ok(())
            }
            ClientMessageType::GetSessionState => self.handle_get_session_state(&conn).await,
        };

        if let Err(error) = result {
            if error.is_internal() {
                tracing::error!(
                    client_id = %conn.id(),
                    session_id = %conn.room_id(),
                    message_type = ?kind,
                    error = %error,
                    "Message handling failed"
                );
            } else {
                tracing::warn!(
                    client_id = %conn.id(),
                    session_id = %conn.room_id(),
                    message_type = ?kind,
                    code = error.code(),
                    error = %error,
                    "Message rejected"
                );
            }
            self.send_error(&conn, &error);
        }
    }

    async fn handle_disconnect(&self, conn: Arc<Connection>) {
        self.on_disconnect(&conn).await;
    }
}
