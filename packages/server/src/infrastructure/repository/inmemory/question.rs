//! InMemory Question Repository 実装

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Question, QuestionId, QuestionRepository, QuizId, RepositoryError};

/// インメモリ Question Repository 実装
///
/// 問題は起動時に投入され、その後は読み取りのみ。
#[derive(Default)]
pub struct InMemoryQuestionRepository {
    questions: RwLock<HashMap<QuestionId, Question>>,
}

impl InMemoryQuestionRepository {
    pub fn new(questions: impl IntoIterator<Item = Question>) -> Self {
        Self {
            questions: RwLock::new(questions.into_iter().map(|q| (q.id, q)).collect()),
        }
    }

    /// 問題を追加（同じ ID は上書き）
    pub async fn insert(&self, question: Question) {
        self.questions.write().await.insert(question.id, question);
    }
}

#[async_trait]
impl QuestionRepository for InMemoryQuestionRepository {
    async fn get_by_id(&self, id: QuestionId) -> Result<Question, RepositoryError> {
        self.questions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::QuestionNotFound(id))
    }

    async fn list_by_quiz(&self, quiz_id: QuizId) -> Result<Vec<Question>, RepositoryError> {
        let mut questions: Vec<Question> = self
            .questions
            .read()
            .await
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.index);
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnswerOption, QuestionType, TimeLimit};

    fn question(id: i64, quiz_id: i64, index: u32) -> Question {
        Question {
            id: QuestionId::new(id).unwrap(),
            quiz_id: QuizId::new(quiz_id).unwrap(),
            text: format!("question {id}"),
            question_type: QuestionType::SingleChoice,
            answers: vec![AnswerOption {
                text: "yes".to_string(),
                is_correct: true,
            }],
            time_limit: TimeLimit::from_secs(5).unwrap(),
            index,
        }
    }

    #[tokio::test]
    async fn test_list_by_quiz_is_ordered_by_index() {
        // テスト項目: クイズの問題一覧は index 昇順で返され、他のクイズの問題を含まない
        // given (前提条件):
        let repo = InMemoryQuestionRepository::new(vec![
            question(3, 1, 2),
            question(1, 1, 0),
            question(9, 2, 0),
            question(2, 1, 1),
        ]);

        // when (操作):
        let questions = repo.list_by_quiz(QuizId::new(1).unwrap()).await.unwrap();

        // then (期待する結果):
        let ids: Vec<i64> = questions.iter().map(|q| q.id.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        // テスト項目: 存在しない問題 ID はエラーになる
        // given (前提条件):
        let repo = InMemoryQuestionRepository::default();
        let id = QuestionId::new(5).unwrap();

        // when (操作):
        let result = repo.get_by_id(id).await;

        // then (期待する結果):
        assert_eq!(result, Err(RepositoryError::QuestionNotFound(id)));
    }
}
