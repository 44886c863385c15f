//! answer: score a submission and reply privately.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    domain::{
        Connection, RepositoryError,
        scoring::{calculate_score, evaluate_answer, validate_submission},
    },
    infrastructure::dto::websocket::{AnswerPayload, AnswerReceivedPayload, ServerMessageType},
    usecase::error::{GameError, INVALID_ANSWER_PAYLOAD, PersistenceOp},
};

use super::GameEngine;

impl GameEngine {
    pub(super) async fn handle_answer(
        &self,
        conn: &Arc<Connection>,
        payload: Value,
    ) -> Result<(), GameError> {
        let payload: AnswerPayload = serde_json::from_value(payload)
            .map_err(|_| GameError::InvalidPayload(INVALID_ANSWER_PAYLOAD))?;
        let participant_id = conn.participant_id().ok_or(GameError::NotJoined)?;

        let question = self
            .inner
            .questions
            .get_by_id(payload.question_id)
            .await
            .map_err(|e| {
                if !matches!(e, RepositoryError::QuestionNotFound(_)) {
                    tracing::error!(question_id = %payload.question_id, error = %e, "Failed to load question");
                }
                GameError::QuestionNotFound
            })?;

        let submission = validate_submission(
            question.question_type,
            payload.answer_value.as_deref(),
            &payload.answer_values,
        )?;
        let is_correct = evaluate_answer(&question, &submission);
        let score_earned = if is_correct {
            calculate_score(payload.time_taken)
        } else {
            0
        };

        if score_earned > 0 {
            self.inner
                .sessions
                .update_participant_score(participant_id, score_earned)
                .await
                .map_err(GameError::persistence(PersistenceOp::UpdateScore))?;
        }

        tracing::debug!(
            session_id = %conn.room_id(),
            participant_id = %participant_id,
            question_id = %question.id,
            is_correct,
            score_earned,
            "Answer evaluated"
        );

        self.send(
            conn,
            ServerMessageType::AnswerReceived,
            &AnswerReceivedPayload {
                is_correct,
                score_earned,
                time_taken: payload.time_taken,
            },
        );
        Ok(())
    }
}
