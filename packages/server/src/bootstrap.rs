//! Dependency construction.
//!
//! Everything is built explicitly here and handed down; nothing in the
//! server is a global.

use std::sync::Arc;

use hayaoshi_shared::time::{Clock, SystemClock};
use thiserror::Error;
use tokio::sync::watch;

use crate::{
    config::ServerConfig,
    domain::{Backbone, BackboneError, Hub, MessageHandler, ServerId},
    infrastructure::{
        InMemoryBackbone, RoomHub,
        repository::{
            FixtureError, InMemoryQuestionRepository, InMemoryQuizRepository,
            InMemorySessionRepository, QuizFixture,
        },
    },
    ui::state::AppState,
    usecase::{CreateSessionUseCase, GameEngine, GetRoomServersUseCase, JoinSessionUseCase},
};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error("failed to start hub: {0}")]
    Backbone(#[from] BackboneError),
}

/// A wired server process
pub struct App {
    pub state: Arc<AppState>,
    pub hub: Arc<RoomHub>,
    pub engine: GameEngine,
}

/// Build the process with its own in-memory backbone
pub async fn build(
    config: &ServerConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<App, BootstrapError> {
    build_with_backbone(config, Arc::new(InMemoryBackbone::new()), shutdown).await
}

/// Build the process on a given backbone.
///
/// Processes sharing one backbone replicate each other's room broadcasts.
pub async fn build_with_backbone(
    config: &ServerConfig,
    backbone: Arc<dyn Backbone>,
    shutdown: watch::Receiver<bool>,
) -> Result<App, BootstrapError> {
    // Initialize dependencies in order:
    // 1. Repositories (seeded from the quiz fixture)
    // 2. Hub
    // 3. GameEngine (registered on the hub)
    // 4. UseCases
    // 5. AppState

    // 1. Create Repositories (in-memory database)
    let fixture = match &config.quiz_file {
        Some(path) => QuizFixture::from_file(path).await?,
        None => QuizFixture::demo()?,
    };
    tracing::info!(
        quizzes = fixture.quizzes.len(),
        questions = fixture.questions.len(),
        source = %config
            .quiz_file
            .as_deref()
            .map_or_else(|| "built-in demo".to_string(), |p| p.display().to_string()),
        "Quiz fixture loaded"
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sessions = Arc::new(InMemorySessionRepository::new(clock.clone()));
    let questions = Arc::new(InMemoryQuestionRepository::new(fixture.questions));
    let quizzes = Arc::new(InMemoryQuizRepository::new(fixture.quizzes));

    // 2. Start the Hub
    let server_id = ServerId::generate();
    let hub = RoomHub::start(
        server_id.clone(),
        backbone.clone(),
        config.presence_ttl,
        shutdown,
    )
    .await?;
    let hub_port: Arc<dyn Hub> = hub.clone();

    // 3. Create the GameEngine and register it before any connection is accepted
    let engine = GameEngine::new(
        sessions.clone(),
        questions,
        hub_port.clone(),
        clock,
        config.game.clone(),
    );
    let message_handler: Arc<dyn MessageHandler> = Arc::new(engine.clone());
    hub.set_message_handler(&message_handler);

    // 4. Create UseCases
    let create_session_usecase = Arc::new(CreateSessionUseCase::new(
        sessions.clone(),
        quizzes.clone(),
    ));
    let join_session_usecase = Arc::new(JoinSessionUseCase::new(sessions, quizzes));
    let get_room_servers_usecase = Arc::new(GetRoomServersUseCase::new(
        server_id,
        backbone,
        hub_port,
    ));

    // 5. Create AppState
    let state = Arc::new(AppState {
        hub: hub.clone(),
        message_handler,
        create_session_usecase,
        join_session_usecase,
        get_room_servers_usecase,
        connection: config.connection.clone(),
    });

    Ok(App { state, hub, engine })
}
