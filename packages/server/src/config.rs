//! Server configuration.
//!
//! Defaults match the production deployment; the binary overrides them from
//! command-line arguments and environment variables.

use std::{path::PathBuf, time::Duration};

use hayaoshi_shared::logger::LogFormat;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("pong timeout ({pong:?}) must be longer than the ping interval ({ping:?})")]
    PongTimeoutTooShort { ping: Duration, pong: Duration },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Per-connection limits and keepalive timing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Outbound frames buffered per connection before it is considered dead
    pub send_buffer: usize,
    pub ping_interval: Duration,
    /// Read deadline, refreshed on every pong
    pub pong_timeout: Duration,
    /// Deadline for writing one frame
    pub write_timeout: Duration,
    /// Largest inbound frame accepted
    pub read_limit_bytes: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            send_buffer: 256,
            ping_interval: Duration::from_secs(54),
            pong_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            read_limit_bytes: 512,
        }
    }
}

/// Fixed delays of the game flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSettings {
    /// Between `join_success` and the room-wide join notifications
    pub join_grace: Duration,
    /// Between `quiz_start` and the first question
    pub start_delay: Duration,
    /// How long the intermediate leaderboard is shown before auto-advance
    pub leaderboard_display: Duration,
    pub marshal_cache_ttl: Duration,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            join_grace: Duration::from_millis(100),
            start_delay: Duration::from_secs(1),
            leaderboard_display: Duration::from_secs(5),
            marshal_cache_ttl: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub connection: ConnectionSettings,
    pub game: GameSettings,
    /// Expiration of this process's room presence markers
    pub presence_ttl: Duration,
    /// Quiz fixture; the built-in demo quiz is used when absent
    pub quiz_file: Option<PathBuf>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            connection: ConnectionSettings::default(),
            game: GameSettings::default(),
            presence_ttl: Duration::from_secs(30 * 60),
            quiz_file: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let connection = &self.connection;
        if connection.send_buffer == 0 {
            return Err(ConfigError::Zero("send buffer"));
        }
        if connection.read_limit_bytes == 0 {
            return Err(ConfigError::Zero("read limit"));
        }
        if connection.ping_interval.is_zero() {
            return Err(ConfigError::Zero("ping interval"));
        }
        if connection.write_timeout.is_zero() {
            return Err(ConfigError::Zero("write timeout"));
        }
        if self.presence_ttl.is_zero() {
            return Err(ConfigError::Zero("presence ttl"));
        }
        if connection.pong_timeout <= connection.ping_interval {
            return Err(ConfigError::PongTimeoutTooShort {
                ping: connection.ping_interval,
                pong: connection.pong_timeout,
            });
        }
        Ok(())
    }
}
