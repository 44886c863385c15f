//! Domain layer: entities, value objects, pure game rules and the ports the
//! rest of the server depends on.

pub mod backbone;
pub mod connection;
pub mod entity;
pub mod error;
pub mod hub;
pub mod message;
pub mod repository;
pub mod scoring;
pub mod value_object;

pub use backbone::{
    Backbone, BackboneMessage, ROOM_CHANNEL_PATTERN, Subscription, room_channel,
    room_presence_key,
};
pub use connection::{Connection, ConnectionIdentity, Enqueue, OutboundFrame};
pub use entity::{
    AnswerOption, LeaderboardEntry, NewParticipant, NewSession, Participant, Question,
    QuestionType, Quiz, QuizSession, SessionStatus,
};
pub use error::{BackboneError, RepositoryError, ValueObjectError};
pub use hub::{Hub, MessageHandler};
pub use message::InboundMessage;
pub use repository::{QuestionRepository, QuizRepository, SessionRepository};
pub use value_object::{
    ConnectionId, JoinCode, JoinCodeFactory, ParticipantId, QuestionId, QuizId, ServerId,
    SessionId, TimeLimit, UserId,
};
