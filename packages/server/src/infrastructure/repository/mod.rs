//! Repository implementations.

pub mod inmemory;

pub use inmemory::{
    FixtureError, InMemoryQuestionRepository, InMemoryQuizRepository, InMemorySessionRepository,
    QuizFixture,
};
