//! Quiz fixture loader.
//!
//! Quizzes are authored outside the live engine. The server seeds its
//! in-memory repositories from a JSON document at startup.

use std::{collections::HashSet, path::Path};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::{AnswerOption, Question, QuestionId, QuestionType, Quiz, QuizId, TimeLimit};

/// Built-in quiz used when no fixture file is configured
pub const DEMO_QUIZ_FIXTURE: &str = include_str!("../../fixtures/demo_quiz.json");

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read quiz fixture: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse quiz fixture: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid quiz fixture: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct FixtureDocument {
    quizzes: Vec<FixtureQuiz>,
}

#[derive(Debug, Deserialize)]
struct FixtureQuiz {
    id: QuizId,
    title: String,
    #[serde(default)]
    max_participants: Option<u32>,
    questions: Vec<FixtureQuestion>,
}

#[derive(Debug, Deserialize)]
struct FixtureQuestion {
    id: QuestionId,
    index: u32,
    question: String,
    #[serde(rename = "type")]
    question_type: QuestionType,
    time_limit: TimeLimit,
    answers: Vec<AnswerOption>,
}

/// Quizzes and questions ready to be inserted into the repositories
#[derive(Debug, Clone, Default)]
pub struct QuizFixture {
    pub quizzes: Vec<Quiz>,
    pub questions: Vec<Question>,
}

impl QuizFixture {
    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        let document: FixtureDocument = serde_json::from_str(json)?;
        let mut fixture = Self::default();
        let mut quiz_ids = HashSet::new();
        let mut question_ids = HashSet::new();

        for quiz in document.quizzes {
            if !quiz_ids.insert(quiz.id) {
                return Err(FixtureError::Invalid(format!("duplicate quiz id {}", quiz.id)));
            }
            let mut indexes = HashSet::new();
            for question in quiz.questions {
                if !question_ids.insert(question.id) {
                    return Err(FixtureError::Invalid(format!(
                        "duplicate question id {}",
                        question.id
                    )));
                }
                if !indexes.insert(question.index) {
                    return Err(FixtureError::Invalid(format!(
                        "quiz {} has two questions at index {}",
                        quiz.id, question.index
                    )));
                }
                let correct = question.answers.iter().filter(|a| a.is_correct).count();
                let well_formed = match question.question_type {
                    QuestionType::SingleChoice => correct == 1,
                    QuestionType::MultipleChoice | QuestionType::TextInput => correct >= 1,
                };
                if !well_formed {
                    return Err(FixtureError::Invalid(format!(
                        "question {} ({}) has {} correct answers",
                        question.id, question.question_type, correct
                    )));
                }
                fixture.questions.push(Question {
                    id: question.id,
                    quiz_id: quiz.id,
                    text: question.question,
                    question_type: question.question_type,
                    answers: question.answers,
                    time_limit: question.time_limit,
                    index: question.index,
                });
            }
            fixture.quizzes.push(Quiz {
                id: quiz.id,
                title: quiz.title,
                max_participants: quiz.max_participants,
            });
        }
        Ok(fixture)
    }

    pub async fn from_file(path: &Path) -> Result<Self, FixtureError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    pub fn demo() -> Result<Self, FixtureError> {
        Self::from_json(DEMO_QUIZ_FIXTURE)
    }
}
