//! Data Transfer Objects (DTOs) for the quiz server.
//!
//! DTOs are organized by protocol:
//! - `websocket`: WebSocket message DTOs
//! - `http`: HTTP API request/response DTOs
//! - `backbone`: messages exchanged between server processes

pub mod backbone;
pub mod conversion;
pub mod http;
pub mod websocket;
