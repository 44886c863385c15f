//! Infrastructure layer: persistence, backbone, hub, wire formats.

pub mod backbone;
pub mod dto;
pub mod hub;
pub mod marshal_cache;
pub mod repository;

pub use backbone::InMemoryBackbone;
pub use hub::RoomHub;
pub use marshal_cache::MarshalCache;
