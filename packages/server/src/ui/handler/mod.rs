mod http;
mod websocket;

pub use http::{create_session, get_room_servers, health_check, join_session};
pub use websocket::websocket_handler;
