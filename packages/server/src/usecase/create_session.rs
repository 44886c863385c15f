//! UseCase: セッション作成（ホスト参加者の登録を含む）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - CreateSessionUseCase::execute() メソッド
//! - generate_unique_join_code() の衝突リトライ
//!
//! ### なぜこのテストが必要か
//! - 参加コードは終了していないセッション間で一意でなければならない
//! - 衝突が続いた場合に有限回で確実に失敗することを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：ユーザー ID 付き／匿名ホストでの作成
//! - 異常系：存在しないクイズ、10 回連続の参加コード衝突
//! - エッジケース：途中で衝突が解消される

use std::sync::Arc;

use crate::domain::{
    JoinCode, JoinCodeFactory, NewParticipant, NewSession, Participant, Quiz, QuizId,
    QuizRepository, QuizSession, RepositoryError, SessionRepository, UserId,
};

use super::error::SessionSetupError;

/// 参加コード生成の最大試行回数
pub const JOIN_CODE_ATTEMPTS: usize = 10;

pub const ANONYMOUS_HOST_NICKNAME: &str = "Anonymous Host";

/// 終了していないセッションで使われていない参加コードを生成する
///
/// `JOIN_CODE_ATTEMPTS` 回続けて衝突した場合は `JoinCodeExhausted` を返す。
pub async fn generate_unique_join_code(
    repository: &dyn SessionRepository,
    mut generate: impl FnMut() -> JoinCode,
) -> Result<JoinCode, SessionSetupError> {
    for attempt in 1..=JOIN_CODE_ATTEMPTS {
        let code = generate();
        if !repository.join_code_in_use(&code).await? {
            return Ok(code);
        }
        tracing::debug!(attempt, join_code = %code, "Join code collision, retrying");
    }
    Err(SessionSetupError::JoinCodeExhausted(JOIN_CODE_ATTEMPTS))
}

/// 作成結果
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSession {
    pub session: QuizSession,
    pub host: Participant,
    pub quiz: Quiz,
}

/// セッション作成のユースケース
pub struct CreateSessionUseCase {
    sessions: Arc<dyn SessionRepository>,
    quizzes: Arc<dyn QuizRepository>,
}

impl CreateSessionUseCase {
    pub fn new(sessions: Arc<dyn SessionRepository>, quizzes: Arc<dyn QuizRepository>) -> Self {
        Self { sessions, quizzes }
    }

    /// セッションを作成し、ホストを最初の参加者として登録する
    ///
    /// `user_id` が無い場合は匿名ホストとしてランダムな ID を払い出す。
    pub async fn execute(
        &self,
        quiz_id: QuizId,
        user_id: Option<UserId>,
        nickname: Option<String>,
    ) -> Result<CreatedSession, SessionSetupError> {
        let quiz = self
            .quizzes
            .get_by_id(quiz_id)
            .await
            .map_err(|e| match e {
                RepositoryError::QuizNotFound(_) => SessionSetupError::QuizNotFound,
                other => SessionSetupError::Repository(other),
            })?;

        let join_code =
            generate_unique_join_code(self.sessions.as_ref(), JoinCodeFactory::generate).await?;

        let session = self
            .sessions
            .create(NewSession {
                quiz_id,
                host_id: user_id,
                join_code,
                max_participants: quiz.max_participants,
            })
            .await?;

        let host_user_id = user_id.unwrap_or_else(UserId::anonymous);
        let nickname = nickname
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| ANONYMOUS_HOST_NICKNAME.to_string());
        let host = self
            .sessions
            .add_participant(NewParticipant {
                session_id: session.id,
                user_id: Some(host_user_id),
                nickname,
                is_host: true,
            })
            .await?;

        // participant_count を反映した状態を返す
        let session = self.sessions.get_by_id(session.id).await?;

        tracing::info!(
            session_id = %session.id,
            join_code = %session.join_code,
            quiz_id = %quiz.id,
            "Session created"
        );

        Ok(CreatedSession {
            session,
            host,
            quiz,
        })
    }
}
