//! InMemory Session Repository 実装
//!
//! ドメイン層が定義する SessionRepository trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。
//! 一つの Mutex で全ての状態を守るため、単一行の更新（スコア加算・
//! インデックスの compare-and-swap・参加者数の加算）はアトミックです。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use hayaoshi_shared::time::Clock;
use tokio::sync::Mutex;

use crate::domain::{
    JoinCode, LeaderboardEntry, NewParticipant, NewSession, Participant, ParticipantId,
    QuizSession, RepositoryError, SessionId, SessionRepository, SessionStatus,
};

#[derive(Default)]
struct SessionStore {
    last_session_id: i64,
    last_participant_id: i64,
    sessions: HashMap<SessionId, QuizSession>,
    /// 参加順
    participants: Vec<Participant>,
}

impl SessionStore {
    fn session_mut(&mut self, id: SessionId) -> Result<&mut QuizSession, RepositoryError> {
        self.sessions
            .get_mut(&id)
            .ok_or(RepositoryError::SessionNotFound(id))
    }
}

/// インメモリ Session Repository 実装
pub struct InMemorySessionRepository {
    store: Mutex<SessionStore>,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionRepository {
    /// 新しい InMemorySessionRepository を作成
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Mutex::new(SessionStore::default()),
            clock,
        }
    }
}

fn next_id(last: &mut i64) -> i64 {
    *last += 1;
    *last
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get_by_id(&self, id: SessionId) -> Result<QuizSession, RepositoryError> {
        let store = self.store.lock().await;
        store
            .sessions
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::SessionNotFound(id))
    }

    async fn get_by_join_code(&self, code: &JoinCode) -> Result<QuizSession, RepositoryError> {
        let store = self.store.lock().await;
        let mut matching: Vec<&QuizSession> = store
            .sessions
            .values()
            .filter(|s| &s.join_code == code)
            .collect();
        // 終了していないものを優先し、その中では新しいものを返す
        matching.sort_by_key(|s| (!s.status.is_terminal(), s.id));
        matching
            .last()
            .map(|s| (*s).clone())
            .ok_or_else(|| RepositoryError::JoinCodeNotFound(code.to_string()))
    }

    async fn join_code_in_use(&self, code: &JoinCode) -> Result<bool, RepositoryError> {
        let store = self.store.lock().await;
        Ok(store
            .sessions
            .values()
            .any(|s| &s.join_code == code && !s.status.is_terminal()))
    }

    async fn create(&self, new_session: NewSession) -> Result<QuizSession, RepositoryError> {
        let now = self.clock.now();
        let mut store = self.store.lock().await;
        let id = SessionId::new(next_id(&mut store.last_session_id))
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        let session = QuizSession {
            id,
            quiz_id: new_session.quiz_id,
            host_id: new_session.host_id,
            join_code: new_session.join_code,
            status: SessionStatus::Waiting,
            current_question_index: -1,
            max_participants: new_session.max_participants,
            participant_count: 0,
            created_at: now,
            started_at: None,
            ended_at: None,
            updated_at: now,
        };
        store.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn update(&self, session: QuizSession) -> Result<(), RepositoryError> {
        let now = self.clock.now();
        let mut store = self.store.lock().await;
        let stored = store.session_mut(session.id)?;
        *stored = QuizSession {
            updated_at: now,
            ..session
        };
        Ok(())
    }

    async fn start(&self, id: SessionId) -> Result<QuizSession, RepositoryError> {
        let now = self.clock.now();
        let mut store = self.store.lock().await;
        let session = store.session_mut(id)?;
        if session.status != SessionStatus::Waiting {
            return Err(RepositoryError::InvalidTransition {
                from: session.status,
                to: SessionStatus::Active,
            });
        }
        session.status = SessionStatus::Active;
        session.started_at = Some(now);
        session.updated_at = now;
        Ok(session.clone())
    }

    async fn end(&self, id: SessionId) -> Result<QuizSession, RepositoryError> {
        let now = self.clock.now();
        let mut store = self.store.lock().await;
        let session = store.session_mut(id)?;
        if session.status.is_terminal() {
            return Err(RepositoryError::InvalidTransition {
                from: session.status,
                to: SessionStatus::Completed,
            });
        }
        session.status = SessionStatus::Completed;
        session.ended_at = Some(now);
        session.updated_at = now;
        Ok(session.clone())
    }

    async fn update_current_question_index(
        &self,
        id: SessionId,
        expected: i32,
        next: i32,
    ) -> Result<(), RepositoryError> {
        let now = self.clock.now();
        let mut store = self.store.lock().await;
        let session = store.session_mut(id)?;
        if session.current_question_index != expected {
            return Err(RepositoryError::IndexConflict {
                expected,
                actual: session.current_question_index,
            });
        }
        if next < 0 {
            return Err(RepositoryError::IndexOutOfRange { index: next });
        }
        session.current_question_index = next;
        session.updated_at = now;
        Ok(())
    }

    async fn add_participant(
        &self,
        new_participant: NewParticipant,
    ) -> Result<Participant, RepositoryError> {
        let now = self.clock.now();
        let mut store = self.store.lock().await;
        let session = store.session_mut(new_participant.session_id)?;
        if session.is_full() {
            return Err(RepositoryError::SessionFull(session.id));
        }
        session.participant_count += 1;
        session.updated_at = now;

        let id = ParticipantId::new(next_id(&mut store.last_participant_id))
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        let participant = Participant {
            id,
            session_id: new_participant.session_id,
            user_id: new_participant.user_id,
            nickname: new_participant.nickname,
            score: 0,
            is_host: new_participant.is_host,
            joined_at: now,
            updated_at: now,
        };
        store.participants.push(participant.clone());
        Ok(participant)
    }

    async fn list_participants(&self, id: SessionId) -> Result<Vec<Participant>, RepositoryError> {
        let store = self.store.lock().await;
        if !store.sessions.contains_key(&id) {
            return Err(RepositoryError::SessionNotFound(id));
        }
        Ok(store
            .participants
            .iter()
            .filter(|p| p.session_id == id)
            .cloned()
            .collect())
    }

    async fn update_participant_score(
        &self,
        participant_id: ParticipantId,
        delta: i64,
    ) -> Result<(), RepositoryError> {
        let now = self.clock.now();
        let mut store = self.store.lock().await;
        let participant = store
            .participants
            .iter_mut()
            .find(|p| p.id == participant_id)
            .ok_or(RepositoryError::ParticipantNotFound(participant_id))?;
        participant.score += delta;
        participant.updated_at = now;
        Ok(())
    }

    async fn get_leaderboard(
        &self,
        id: SessionId,
    ) -> Result<Vec<LeaderboardEntry>, RepositoryError> {
        let mut participants = self.list_participants(id).await?;
        // 安定ソートなので同点は参加順
        participants.sort_by(|a, b| b.score.cmp(&a.score));

        let mut entries = Vec::with_capacity(participants.len());
        let mut rank = 0;
        let mut previous_score = None;
        for (position, p) in participants.into_iter().enumerate() {
            if previous_score != Some(p.score) {
                rank = position as u32 + 1;
                previous_score = Some(p.score);
            }
            entries.push(LeaderboardEntry {
                rank,
                participant_id: p.id,
                nickname: p.nickname,
                score: p.score,
                is_host: p.is_host,
            });
        }
        Ok(entries)
    }
}
