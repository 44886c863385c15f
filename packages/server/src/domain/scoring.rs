//! Answer evaluation and scoring. Pure functions of question + submission.

use super::entity::{Question, QuestionType};

/// Score of an instant correct answer
pub const MAX_SCORE: i64 = 1000;
/// Floor for any correct answer
pub const MIN_SCORE: i64 = 100;
/// One point is lost per this many milliseconds
pub const PENALTY_STEP_MS: i64 = 100;

/// A submission whose shape matches its question type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// `single_choice` and `text_input`
    Single(String),
    /// `multiple_choice`
    Multiple(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidSubmission {
    #[error("Answer value cannot be empty for single choice/text input")]
    EmptyValue,
    #[error("Answer values cannot be empty for multiple choice")]
    EmptyValues,
}

/// Check the raw payload fields against the question type.
pub fn validate_submission(
    question_type: QuestionType,
    answer_value: Option<&str>,
    answer_values: &[String],
) -> Result<Submission, InvalidSubmission> {
    match question_type {
        QuestionType::SingleChoice | QuestionType::TextInput => match answer_value {
            Some(value) if !value.is_empty() => Ok(Submission::Single(value.to_string())),
            _ => Err(InvalidSubmission::EmptyValue),
        },
        QuestionType::MultipleChoice => {
            if answer_values.is_empty() {
                Err(InvalidSubmission::EmptyValues)
            } else {
                Ok(Submission::Multiple(answer_values.to_vec()))
            }
        }
    }
}

/// Whether the submission is correct for the question.
///
/// - single choice: exact, case-sensitive match with the correct answer
/// - multiple choice: same multiset as the correct answers, order ignored
/// - text input: trimmed, case-insensitive match with any correct answer
pub fn evaluate_answer(question: &Question, submission: &Submission) -> bool {
    match (question.question_type, submission) {
        (QuestionType::SingleChoice, Submission::Single(value)) => {
            question.correct_texts().any(|text| text == value)
        }
        (QuestionType::MultipleChoice, Submission::Multiple(values)) => {
            let mut correct: Vec<&str> = question.correct_texts().collect();
            if correct.len() != values.len() {
                return false;
            }
            let mut submitted: Vec<&str> = values.iter().map(String::as_str).collect();
            correct.sort_unstable();
            submitted.sort_unstable();
            correct == submitted
        }
        (QuestionType::TextInput, Submission::Single(value)) => {
            let submitted = value.trim().to_lowercase();
            question
                .correct_texts()
                .any(|text| text.trim().to_lowercase() == submitted)
        }
        (question_type, submission) => {
            tracing::error!(
                question_id = %question.id,
                %question_type,
                ?submission,
                "Submission shape does not match question type"
            );
            false
        }
    }
}

/// Time-decayed score of a correct answer: `max(100, 1000 - t/100)`.
///
/// Negative times are treated as instant answers.
pub fn calculate_score(time_taken_ms: i64) -> i64 {
    let penalty = time_taken_ms.max(0) / PENALTY_STEP_MS;
    (MAX_SCORE - penalty).max(MIN_SCORE)
}
