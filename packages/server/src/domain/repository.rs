//! Repository trait 定義
//!
//! ドメイン層が必要とするデータアクセスのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! Game Event Engine が永続化された状態を変更する唯一の経路です。
//! 単一行の更新（スコア加算、問題インデックス更新）は実装側でアトミックに行う必要があります。

use async_trait::async_trait;

use super::{
    entity::{
        LeaderboardEntry, NewParticipant, NewSession, Participant, Question, Quiz, QuizSession,
    },
    error::RepositoryError,
    value_object::{JoinCode, ParticipantId, QuestionId, QuizId, SessionId},
};

/// Session Repository trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// セッションを ID で取得
    async fn get_by_id(&self, id: SessionId) -> Result<QuizSession, RepositoryError>;

    /// 参加コードでセッションを取得（終了していないセッションを優先）
    async fn get_by_join_code(&self, code: &JoinCode) -> Result<QuizSession, RepositoryError>;

    /// 参加コードが終了していないセッションで使用中かどうか
    async fn join_code_in_use(&self, code: &JoinCode) -> Result<bool, RepositoryError>;

    /// セッションを作成（status = waiting, current_question_index = -1）
    async fn create(&self, new_session: NewSession) -> Result<QuizSession, RepositoryError>;

    /// セッションを丸ごと置き換える
    async fn update(&self, session: QuizSession) -> Result<(), RepositoryError>;

    /// waiting → active
    async fn start(&self, id: SessionId) -> Result<QuizSession, RepositoryError>;

    /// 終了していないセッションを completed にする
    async fn end(&self, id: SessionId) -> Result<QuizSession, RepositoryError>;

    /// 現在の問題インデックスを `expected` から `next` に更新する（compare-and-swap）
    ///
    /// 保存されている値が `expected` と異なる場合は `IndexConflict` を返す。
    async fn update_current_question_index(
        &self,
        id: SessionId,
        expected: i32,
        next: i32,
    ) -> Result<(), RepositoryError>;

    /// 参加者を追加し、participant_count を同時に加算する
    async fn add_participant(
        &self,
        new_participant: NewParticipant,
    ) -> Result<Participant, RepositoryError>;

    /// 参加者一覧（参加順）
    async fn list_participants(&self, id: SessionId) -> Result<Vec<Participant>, RepositoryError>;

    /// スコアを加算する
    async fn update_participant_score(
        &self,
        participant_id: ParticipantId,
        delta: i64,
    ) -> Result<(), RepositoryError>;

    /// 順位付け済みのリーダーボード
    async fn get_leaderboard(
        &self,
        id: SessionId,
    ) -> Result<Vec<LeaderboardEntry>, RepositoryError>;
}

/// Question Repository trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// 問題を ID で取得
    async fn get_by_id(&self, id: QuestionId) -> Result<Question, RepositoryError>;

    /// クイズの問題一覧（index 昇順）
    async fn list_by_quiz(&self, quiz_id: QuizId) -> Result<Vec<Question>, RepositoryError>;
}

/// Quiz Repository trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn get_by_id(&self, id: QuizId) -> Result<Quiz, RepositoryError>;
}
