//! UseCase 層
//!
//! HTTP のセッション準備（作成・参加）と、WebSocket のゲーム進行（GameEngine）を提供します。

mod create_session;
mod error;
pub mod game_engine;
mod get_room_servers;
mod join_session;

pub use create_session::{
    ANONYMOUS_HOST_NICKNAME, CreateSessionUseCase, CreatedSession, JOIN_CODE_ATTEMPTS,
    generate_unique_join_code,
};
pub use error::{GameError, HostAction, PersistenceOp, SessionSetupError};
pub use game_engine::{GameEngine, QuestionTimerState};
pub use get_room_servers::{GetRoomServersUseCase, RoomServers};
pub use join_session::{GUEST_NICKNAME, JoinSessionUseCase, JoinedSession};
