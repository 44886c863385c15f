//! UseCase 層のエラー定義

use std::fmt;

use thiserror::Error;

use crate::domain::{RepositoryError, SessionStatus, scoring::InvalidSubmission};

pub const INVALID_JOIN_PAYLOAD: &str = "Invalid join message payload format";
pub const INVALID_ANSWER_PAYLOAD: &str = "Invalid answer payload format";

/// ホストだけが実行できる操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    Start,
    ControlQuestions,
    End,
    Pause,
    Resume,
}

impl fmt::Display for HostAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start the game",
            Self::ControlQuestions => "control questions",
            Self::End => "end the game",
            Self::Pause => "pause the game",
            Self::Resume => "resume the game",
        })
    }
}

/// 失敗した永続化操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceOp {
    StartSession,
    UpdateQuestion,
    EndSession,
    UpdateScore,
}

impl PersistenceOp {
    pub fn code(self) -> &'static str {
        match self {
            Self::StartSession => "START_FAILED",
            Self::UpdateQuestion => "UPDATE_FAILED",
            Self::EndSession => "END_FAILED",
            Self::UpdateScore => "SCORE_UPDATE_FAILED",
        }
    }

    /// クライアントに返す汎用メッセージ
    pub fn message(self) -> &'static str {
        match self {
            Self::StartSession => "Failed to start session",
            Self::UpdateQuestion => "Failed to update question",
            Self::EndSession => "Failed to end session",
            Self::UpdateScore => "Failed to update score",
        }
    }
}

impl fmt::Display for PersistenceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Game Event Engine のエラー
///
/// 各バリアントはクライアントに返す `error` メッセージのコードに対応します。
/// `Display` はサーバーログ用で、永続化エラーの詳細を含みます。
/// クライアントには `message()` の内容だけを返します。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    #[error("{0}")]
    InvalidPayload(&'static str),

    #[error("user_id is missing from join payload")]
    UserIdRequired,

    #[error("session not found")]
    SessionNotFound,

    #[error("no participant with the given user_id")]
    ParticipantNotFound,

    #[error("question not found")]
    QuestionNotFound,

    #[error("invalid answer: {0}")]
    InvalidAnswer(#[from] InvalidSubmission),

    #[error("connection has not joined the session")]
    NotJoined,

    #[error("only host can {0}")]
    Unauthorized(HostAction),

    #[error("session cannot be started from status {0}")]
    NotStartable(SessionStatus),

    #[error("session is not active (status {0})")]
    NotActive(SessionStatus),

    #[error("quiz has no questions")]
    NoQuestions,

    #[error("no more questions")]
    NoMoreQuestions,

    #[error("question index changed concurrently (expected {expected}, found {actual})")]
    QuestionConflict { expected: i32, actual: i32 },

    #[error("session already ended")]
    AlreadyEnded,

    #[error("{op}: {source}")]
    Persistence {
        op: PersistenceOp,
        #[source]
        source: RepositoryError,
    },
}

impl GameError {
    pub fn persistence(op: PersistenceOp) -> impl FnOnce(RepositoryError) -> Self {
        move |source| Self::Persistence { op, source }
    }

    /// `error` メッセージの `code`
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::UserIdRequired => "USER_ID_REQUIRED",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::ParticipantNotFound => "PARTICIPANT_NOT_FOUND",
            Self::QuestionNotFound => "QUESTION_NOT_FOUND",
            Self::InvalidAnswer(_) => "INVALID_ANSWER",
            Self::NotJoined => "NOT_JOINED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotStartable(_) | Self::NotActive(_) => "INVALID_STATUS",
            Self::NoQuestions => "NO_QUESTIONS",
            Self::NoMoreQuestions => "NO_MORE_QUESTIONS",
            Self::QuestionConflict { .. } => "QUESTION_CONFLICT",
            Self::AlreadyEnded => "ALREADY_ENDED",
            Self::Persistence { op, .. } => op.code(),
        }
    }

    /// `error` メッセージの `message`（内部の詳細は含めない）
    pub fn message(&self) -> String {
        match self {
            Self::InvalidPayload(message) => (*message).to_string(),
            Self::UserIdRequired => {
                "Please call CreateSession or JoinSession API first to get user_id".to_string()
            }
            Self::SessionNotFound => "Session not found".to_string(),
            Self::ParticipantNotFound => "No participant found with this user_id. Please call CreateSession or JoinSession API first".to_string(),
            Self::QuestionNotFound => "Question not found".to_string(),
            Self::InvalidAnswer(reason) => reason.to_string(),
            Self::NotJoined => "Please join the session before answering".to_string(),
            Self::Unauthorized(action) => format!("Only host can {action}"),
            Self::NotStartable(_) => "Session cannot be started from current status".to_string(),
            Self::NotActive(_) => "Session is not active".to_string(),
            Self::NoQuestions => "No questions available for this quiz".to_string(),
            Self::NoMoreQuestions => "No more questions available".to_string(),
            Self::QuestionConflict { .. } => {
                "Question was already advanced, please refresh the session state".to_string()
            }
            Self::AlreadyEnded => "Game has already ended".to_string(),
            Self::Persistence { op, .. } => op.message().to_string(),
        }
    }

    /// サーバー側の障害かどうか（ログレベルの判定に使う）
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}

/// HTTP のセッション作成・参加のエラー
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionSetupError {
    #[error("quiz not found")]
    QuizNotFound,

    #[error("session not found")]
    SessionNotFound,

    #[error("invalid join code: {0}")]
    InvalidJoinCode(String),

    #[error("session is not accepting participants (status {0})")]
    NotJoinable(SessionStatus),

    #[error("session is full")]
    SessionFull,

    #[error("could not generate a unique join code after {0} attempts")]
    JoinCodeExhausted(usize),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl SessionSetupError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::QuizNotFound => "QUIZ_NOT_FOUND",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::InvalidJoinCode(_) => "INVALID_JOIN_CODE",
            Self::NotJoinable(_) => "SESSION_NOT_JOINABLE",
            Self::SessionFull => "SESSION_FULL",
            Self::JoinCodeExhausted(_) => "JOIN_CODE_GENERATION_FAILED",
            Self::Repository(_) => "INTERNAL_ERROR",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::QuizNotFound => "Quiz not found".to_string(),
            Self::SessionNotFound => "Session not found".to_string(),
            Self::InvalidJoinCode(_) => {
                "Join code must be 6 uppercase letters or digits".to_string()
            }
            Self::NotJoinable(_) => "Session is not accepting new participants".to_string(),
            Self::SessionFull => "Session is full".to_string(),
            Self::JoinCodeExhausted(_) => "Failed to generate a unique join code".to_string(),
            Self::Repository(_) => "Internal server error".to_string(),
        }
    }
}
