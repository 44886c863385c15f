//! Conversion logic between DTOs and domain entities.

use crate::domain::{InboundMessage, LeaderboardEntry, Participant, Question, QuizSession};
use crate::infrastructure::dto::websocket as dto;

// ========================================
// DTO → Domain Entity
// ========================================

impl From<dto::ClientEnvelope> for InboundMessage {
    fn from(envelope: dto::ClientEnvelope) -> Self {
        Self {
            kind: envelope.r#type,
            payload: envelope.payload,
        }
    }
}

// ========================================
// Domain Entity → DTO
// ========================================

impl From<QuizSession> for dto::SessionDto {
    fn from(model: QuizSession) -> Self {
        Self {
            id: model.id,
            quiz_id: model.quiz_id.value(),
            host_id: model.host_id,
            join_code: model.join_code.into(),
            status: model.status,
            current_question_index: model.current_question_index,
            max_participants: model.max_participants,
            participant_count: model.participant_count,
            created_at: model.created_at,
            started_at: model.started_at,
            ended_at: model.ended_at,
        }
    }
}

impl From<&QuizSession> for dto::SessionSnapshot {
    fn from(model: &QuizSession) -> Self {
        Self {
            id: model.id,
            status: model.status,
            current_question_index: model.current_question_index,
            participant_count: model.participant_count,
            max_participants: model.max_participants,
        }
    }
}

impl From<Participant> for dto::ParticipantDto {
    fn from(model: Participant) -> Self {
        Self {
            id: model.id,
            session_id: model.session_id,
            user_id: model.user_id,
            nickname: model.nickname,
            score: model.score,
            is_host: model.is_host,
            joined_at: model.joined_at,
        }
    }
}

impl From<Participant> for dto::ParticipantSummary {
    fn from(model: Participant) -> Self {
        Self {
            id: model.id,
            nickname: model.nickname,
            is_host: model.is_host,
            score: model.score,
        }
    }
}

impl From<LeaderboardEntry> for dto::LeaderboardRow {
    fn from(model: LeaderboardEntry) -> Self {
        Self {
            rank: model.rank,
            participant_id: model.participant_id,
            nickname: model.nickname,
            score: model.score,
            is_host: model.is_host,
        }
    }
}

/// Correctness flags never leave the server
impl From<&Question> for dto::PublicQuestion {
    fn from(model: &Question) -> Self {
        Self {
            id: model.id,
            question: model.text.clone(),
            r#type: model.question_type,
            time_limit: model.time_limit.secs(),
            index: model.index,
            max_score: None,
            answers: model
                .answers
                .iter()
                .map(|a| dto::PublicAnswer {
                    text: a.text.clone(),
                })
                .collect(),
        }
    }
}
