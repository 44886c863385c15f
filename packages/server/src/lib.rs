//! Real-time quiz game server library.
//!
//! Hosts create a session over HTTP, players join it with a six-character
//! code, and the game itself runs over one WebSocket per participant.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// wiring
pub mod bootstrap;
pub mod config;
