//! Utilities shared between the Hayaoshi server binary and its tests.

pub mod logger;
pub mod time;
