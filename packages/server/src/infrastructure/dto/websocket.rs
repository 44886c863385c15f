//! WebSocket message DTOs.
//!
//! Every frame, in both directions, is `{type, payload, timestamp}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ParticipantId, QuestionId, QuestionType, SessionId, SessionStatus, UserId};

/// Server → client message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerMessageType {
    JoinSuccess,
    ParticipantJoin,
    ParticipantLeft,
    ParticipantListUpdate,
    QuizStart,
    QuestionStart,
    QuestionEnd,
    AnswerReceived,
    Leaderboard,
    QuizEnd,
    GamePaused,
    GameResumed,
    Error,
    Pong,
    SessionState,
}

impl ServerMessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JoinSuccess => "join_success",
            Self::ParticipantJoin => "participant_join",
            Self::ParticipantLeft => "participant_left",
            Self::ParticipantListUpdate => "participant_list_update",
            Self::QuizStart => "quiz_start",
            Self::QuestionStart => "question_start",
            Self::QuestionEnd => "question_end",
            Self::AnswerReceived => "answer_received",
            Self::Leaderboard => "leaderboard",
            Self::QuizEnd => "quiz_end",
            Self::GamePaused => "game_paused",
            Self::GameResumed => "game_resumed",
            Self::Error => "error",
            Self::Pong => "pong",
            Self::SessionState => "session_state",
        }
    }
}

/// Client → server message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientMessageType {
    Join,
    Answer,
    StartQuiz,
    NextQuestion,
    EndQuiz,
    PauseQuiz,
    ResumeQuiz,
    Ping,
    GetSessionState,
}

impl ClientMessageType {
    /// `None` for unknown type tags
    pub fn parse(tag: &str) -> Option<Self> {
        serde_json::from_value(Value::String(tag.to_string())).ok()
    }
}

/// Outbound envelope
#[derive(Debug, Clone, Serialize)]
pub struct ServerEnvelope<P> {
    pub r#type: ServerMessageType,
    pub payload: P,
    pub timestamp: DateTime<Utc>,
}

/// Inbound envelope. The payload stays untyped until its handler decodes it.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    pub r#type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

// ========================================
// Client payloads
// ========================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinPayload {
    #[serde(default)]
    pub session_id: Option<i64>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerPayload {
    pub question_id: QuestionId,
    /// Informational; the stored question type is authoritative
    #[serde(default)]
    pub question_type: Option<String>,
    #[serde(default)]
    pub answer_value: Option<String>,
    #[serde(default)]
    pub answer_values: Vec<String>,
    /// Milliseconds since the question was shown
    #[serde(default)]
    pub time_taken: i64,
}

// ========================================
// Server payloads
// ========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDto {
    pub id: SessionId,
    pub quiz_id: i64,
    pub host_id: Option<UserId>,
    pub join_code: String,
    pub status: SessionStatus,
    pub current_question_index: i32,
    pub max_participants: Option<u32>,
    pub participant_count: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantDto {
    pub id: ParticipantId,
    pub session_id: SessionId,
    pub user_id: Option<UserId>,
    pub nickname: String,
    pub score: i64,
    pub is_host: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinSuccessPayload {
    pub session: SessionDto,
    pub participant: ParticipantDto,
    pub is_host: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantJoinPayload {
    pub session_id: SessionId,
    pub participant_id: ParticipantId,
    pub nickname: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantLeftPayload {
    pub session_id: SessionId,
    pub participant_id: ParticipantId,
    pub left_at: DateTime<Utc>,
}

/// Participant row in list snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub id: ParticipantId,
    pub nickname: String,
    pub is_host: bool,
    pub score: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListUpdateTrigger {
    WebsocketConnection,
    ParticipantDisconnect,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantListUpdatePayload {
    pub session_id: SessionId,
    pub participant_count: usize,
    pub participants: Vec<ParticipantSummary>,
    pub trigger: ListUpdateTrigger,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizStartPayload {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicAnswer {
    pub text: String,
}

/// Client-safe projection of a question: no correctness flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: QuestionId,
    pub question: String,
    pub r#type: QuestionType,
    /// Seconds
    pub time_limit: u32,
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_score: Option<i64>,
    pub answers: Vec<PublicAnswer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionStartPayload {
    pub session_id: SessionId,
    pub question: PublicQuestion,
    pub started_at: DateTime<Utc>,
    pub server_time_limit: u32,
    pub auto_advance: bool,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionEndPayload {
    pub session_id: SessionId,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerReceivedPayload {
    pub is_correct: bool,
    pub score_earned: i64,
    pub time_taken: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub rank: u32,
    pub participant_id: ParticipantId,
    pub nickname: String,
    pub score: i64,
    pub is_host: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    AutoNextQuestion,
    AutoEndQuiz,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardPayload {
    pub session_id: SessionId,
    pub leaderboard: Vec<LeaderboardRow>,
    /// Seconds the clients should show the board
    pub display_time: u64,
    pub next_action: NextAction,
    pub server_driven: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    AllQuestionsCompleted,
    HostEnded,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizEndPayload {
    pub session_id: SessionId,
    pub ended_at: DateTime<Utc>,
    pub final_leaderboard: Vec<LeaderboardRow>,
    pub status: SessionStatus,
    pub auto_ended: bool,
    pub completion_reason: CompletionReason,
    pub server_driven: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    HostRequested,
    HostDisconnected,
}

#[derive(Debug, Clone, Serialize)]
pub struct GamePausedPayload {
    pub session_id: SessionId,
    pub reason: PauseReason,
    pub paused_at: DateTime<Utc>,
    /// Time left on the frozen question timer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameResumedPayload {
    pub session_id: SessionId,
    pub resumed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub status: SessionStatus,
    pub current_question_index: i32,
    pub participant_count: u32,
    pub max_participants: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatePayload {
    pub session: SessionSnapshot,
    pub participants: Vec<ParticipantSummary>,
    pub leaderboard: Vec<LeaderboardRow>,
    pub current_question: Option<PublicQuestion>,
}
