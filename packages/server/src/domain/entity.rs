//! Domain entities.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_object::{
    JoinCode, ParticipantId, QuestionId, QuizId, SessionId, TimeLimit, UserId,
};

/// Lifecycle of a quiz session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Active,
    Completed,
    Cancelled,
}

impl SessionStatus {
    /// `completed` and `cancelled` have no outgoing transition
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of one live quiz instance (a room)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSession {
    pub id: SessionId,
    pub quiz_id: QuizId,
    /// `None` for anonymous hosts
    pub host_id: Option<UserId>,
    pub join_code: JoinCode,
    pub status: SessionStatus,
    /// -1 until the first question starts
    pub current_question_index: i32,
    pub max_participants: Option<u32>,
    pub participant_count: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl QuizSession {
    /// Index of the open question, if one has started
    pub fn current_index(&self) -> Option<usize> {
        usize::try_from(self.current_question_index).ok()
    }

    pub fn is_full(&self) -> bool {
        self.max_participants
            .is_some_and(|max| self.participant_count >= max)
    }
}

/// Input for creating a session
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub quiz_id: QuizId,
    pub host_id: Option<UserId>,
    pub join_code: JoinCode,
    pub max_participants: Option<u32>,
}

/// A player (or the host) registered in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub session_id: SessionId,
    pub user_id: Option<UserId>,
    pub nickname: String,
    pub score: i64,
    pub is_host: bool,
    pub joined_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a participant
#[derive(Debug, Clone, PartialEq)]
pub struct NewParticipant {
    pub session_id: SessionId,
    pub user_id: Option<UserId>,
    pub nickname: String,
    pub is_host: bool,
}

/// One rank-ordered leaderboard row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub participant_id: ParticipantId,
    pub nickname: String,
    pub score: i64,
    pub is_host: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TextInput,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleChoice => "single_choice",
            Self::MultipleChoice => "multiple_choice",
            Self::TextInput => "text_input",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub quiz_id: QuizId,
    pub text: String,
    pub question_type: QuestionType,
    /// Ordered as authored
    pub answers: Vec<AnswerOption>,
    pub time_limit: TimeLimit,
    /// Position inside the quiz, unique per quiz
    pub index: u32,
}

impl Question {
    /// Texts of every answer flagged correct, in authored order
    pub fn correct_texts(&self) -> impl Iterator<Item = &str> {
        self.answers
            .iter()
            .filter(|a| a.is_correct)
            .map(|a| a.text.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: QuizId,
    pub title: String,
    pub max_participants: Option<u32>,
}
