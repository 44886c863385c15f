//! UseCase: 参加コードによるセッション参加
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - JoinSessionUseCase::execute() メソッド
//!
//! ### なぜこのテストが必要か
//! - WebSocket の join は HTTP で登録済みの参加者しか受け付けないため、
//!   この経路が参加者を作る唯一の入口になる
//! - 同じ user_id での再参加で参加者が重複しないことを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：新規参加、既存 user_id での再参加
//! - 異常系：不正な参加コード、開始済みセッション、満員
//! - エッジケース：小文字・前後空白付きの参加コード

use std::sync::Arc;

use crate::domain::{
    JoinCode, NewParticipant, Participant, QuizRepository, QuizSession, RepositoryError,
    SessionRepository, SessionStatus, UserId,
};

use super::error::SessionSetupError;

pub const GUEST_NICKNAME: &str = "Guest";

/// 参加結果
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedSession {
    pub session: QuizSession,
    pub participant: Participant,
    pub quiz_title: String,
}

/// セッション参加のユースケース
pub struct JoinSessionUseCase {
    sessions: Arc<dyn SessionRepository>,
    quizzes: Arc<dyn QuizRepository>,
}

impl JoinSessionUseCase {
    pub fn new(sessions: Arc<dyn SessionRepository>, quizzes: Arc<dyn QuizRepository>) -> Self {
        Self { sessions, quizzes }
    }

    /// 参加コードでセッションを探し、参加者を登録する
    ///
    /// 既に同じ `user_id` の参加者がいる場合はその参加者を返す（満員でも可）。
    pub async fn execute(
        &self,
        raw_join_code: &str,
        user_id: Option<UserId>,
        nickname: Option<String>,
    ) -> Result<JoinedSession, SessionSetupError> {
        let join_code = JoinCode::parse(raw_join_code)
            .map_err(|_| SessionSetupError::InvalidJoinCode(raw_join_code.to_string()))?;

        let session = self
            .sessions
            .get_by_join_code(&join_code)
            .await
            .map_err(|e| match e {
                RepositoryError::JoinCodeNotFound(_) => SessionSetupError::SessionNotFound,
                other => SessionSetupError::Repository(other),
            })?;

        if session.status != SessionStatus::Waiting {
            return Err(SessionSetupError::NotJoinable(session.status));
        }

        let quiz_title = self.quizzes.get_by_id(session.quiz_id).await?.title;

        if let Some(user_id) = user_id {
            let existing = self
                .sessions
                .list_participants(session.id)
                .await?
                .into_iter()
                .find(|p| p.user_id == Some(user_id));
            if let Some(participant) = existing {
                tracing::debug!(
                    session_id = %session.id,
                    participant_id = %participant.id,
                    "Participant rejoined with known user_id"
                );
                return Ok(JoinedSession {
                    session,
                    participant,
                    quiz_title,
                });
            }
        }

        if session.is_full() {
            return Err(SessionSetupError::SessionFull);
        }

        let nickname = nickname
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| GUEST_NICKNAME.to_string());
        let participant = self
            .sessions
            .add_participant(NewParticipant {
                session_id: session.id,
                user_id: Some(user_id.unwrap_or_else(UserId::anonymous)),
                nickname,
                is_host: false,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::SessionFull(_) => SessionSetupError::SessionFull,
                other => SessionSetupError::Repository(other),
            })?;

        let session = self.sessions.get_by_id(session.id).await?;

        tracing::info!(
            session_id = %session.id,
            participant_id = %participant.id,
            participant_count = session.participant_count,
            "Participant joined via join code"
        );

        Ok(JoinedSession {
            session,
            participant,
            quiz_title,
        })
    }
}
