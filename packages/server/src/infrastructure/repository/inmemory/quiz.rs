//! InMemory Quiz Repository 実装

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Quiz, QuizId, QuizRepository, RepositoryError};

/// インメモリ Quiz Repository 実装
#[derive(Default)]
pub struct InMemoryQuizRepository {
    quizzes: RwLock<HashMap<QuizId, Quiz>>,
}

impl InMemoryQuizRepository {
    pub fn new(quizzes: impl IntoIterator<Item = Quiz>) -> Self {
        Self {
            quizzes: RwLock::new(quizzes.into_iter().map(|q| (q.id, q)).collect()),
        }
    }

    pub async fn insert(&self, quiz: Quiz) {
        self.quizzes.write().await.insert(quiz.id, quiz);
    }
}

#[async_trait]
impl QuizRepository for InMemoryQuizRepository {
    async fn get_by_id(&self, id: QuizId) -> Result<Quiz, RepositoryError> {
        self.quizzes
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::QuizNotFound(id))
    }
}
