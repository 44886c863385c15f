//! HTTP API DTOs.

use serde::{Deserialize, Serialize};

use crate::domain::{ParticipantId, QuizId, SessionId, SessionStatus, UserId};

/// `POST /api/games`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub quiz_id: QuizId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
    pub join_code: String,
    pub join_url: String,
    pub quiz_title: String,
    pub host_name: String,
    pub host_user_id: UserId,
    pub is_host: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<u32>,
}

/// `GET /api/games/join/{join_code}` query string
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinSessionQuery {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSessionResponse {
    pub session_id: SessionId,
    pub join_code: String,
    pub participant_id: ParticipantId,
    pub user_id: UserId,
    pub nickname: String,
    pub is_host: bool,
    pub quiz_title: String,
    pub status: SessionStatus,
    pub participant_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<u32>,
}

/// `GET /api/games/{session_id}/servers`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomServersResponse {
    pub session_id: SessionId,
    pub servers: Vec<String>,
    pub local_server_id: String,
    pub local_connections: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}
