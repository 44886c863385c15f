//! Domain layer errors.

use thiserror::Error;

use super::{
    entity::SessionStatus,
    value_object::{ParticipantId, QuestionId, QuizId, SessionId},
};

/// Value object construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{kind} must be positive, got {value}")]
    NonPositiveId { kind: &'static str, value: i64 },

    #[error("{kind} is not a number: '{raw}'")]
    NotANumber { kind: &'static str, raw: String },

    #[error("join code must be 6 uppercase letters or digits, got '{0}'")]
    InvalidJoinCode(String),

    #[error("time limit must be one of 5, 10, 20, 45 or 80 seconds, got {0}")]
    InvalidTimeLimit(u32),
}

/// Repository errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("session with join code '{0}' not found")]
    JoinCodeNotFound(String),

    #[error("participant {0} not found")]
    ParticipantNotFound(ParticipantId),

    #[error("question {0} not found")]
    QuestionNotFound(QuestionId),

    #[error("quiz {0} not found")]
    QuizNotFound(QuizId),

    #[error("session cannot move from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("question index changed concurrently (expected {expected}, found {actual})")]
    IndexConflict { expected: i32, actual: i32 },

    #[error("question index {index} is out of range")]
    IndexOutOfRange { index: i32 },

    #[error("session {0} is full")]
    SessionFull(SessionId),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Broadcast backbone errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackboneError {
    #[error("backbone connection is closed")]
    Closed,

    #[error("invalid subscription pattern '{0}'")]
    InvalidPattern(String),
}
