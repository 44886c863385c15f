//! In-memory repository implementations.

mod fixture;
mod question;
mod quiz;
mod session;

pub use fixture::{DEMO_QUIZ_FIXTURE, FixtureError, QuizFixture};
pub use question::InMemoryQuestionRepository;
pub use quiz::InMemoryQuizRepository;
pub use session::InMemorySessionRepository;
