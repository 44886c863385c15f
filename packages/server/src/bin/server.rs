//! Real-time quiz game server.
//!
//! Hosts create sessions over HTTP, players join them with a join code and
//! play over one WebSocket per participant.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hayaoshi-server
//! cargo run --bin hayaoshi-server -- --host 0.0.0.0 --port 3000 --quiz-file quizzes.json
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use hayaoshi_server::{
    bootstrap,
    config::{ConnectionSettings, GameSettings, ServerConfig},
    ui::Server,
};
use hayaoshi_shared::logger::{LogFormat, setup_logger};
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(name = "hayaoshi-server")]
#[command(about = "Real-time multiplayer quiz game server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "PORT", default_value = "8080")]
    port: u16,

    /// JSON quiz fixture to seed; the built-in demo quiz is used otherwise
    #[arg(long, env = "QUIZ_FILE")]
    quiz_file: Option<PathBuf>,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format: pretty or json
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    /// Outbound queue capacity per connection (frames)
    #[arg(long, env = "WS_SEND_BUFFER", default_value = "256")]
    ws_send_buffer: usize,

    /// Keepalive ping interval
    #[arg(long, env = "WS_PING_INTERVAL_SECS", default_value = "54")]
    ws_ping_interval_secs: u64,

    /// Read deadline refreshed by each pong; must exceed the ping interval
    #[arg(long, env = "WS_PONG_TIMEOUT_SECS", default_value = "60")]
    ws_pong_timeout_secs: u64,

    /// Deadline for writing one frame
    #[arg(long, env = "WS_WRITE_TIMEOUT_SECS", default_value = "10")]
    ws_write_timeout_secs: u64,

    /// Largest inbound message accepted
    #[arg(long, env = "WS_READ_LIMIT_BYTES", default_value = "512")]
    ws_read_limit_bytes: usize,

    /// TTL of this server's room presence markers
    #[arg(long, env = "PRESENCE_TTL_SECS", default_value = "1800")]
    presence_ttl_secs: u64,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            connection: ConnectionSettings {
                send_buffer: args.ws_send_buffer,
                ping_interval: Duration::from_secs(args.ws_ping_interval_secs),
                pong_timeout: Duration::from_secs(args.ws_pong_timeout_secs),
                write_timeout: Duration::from_secs(args.ws_write_timeout_secs),
                read_limit_bytes: args.ws_read_limit_bytes,
            },
            game: GameSettings::default(),
            presence_ttl: Duration::from_secs(args.presence_ttl_secs),
            quiz_file: args.quiz_file,
            log_level: args.log_level,
            log_format: args.log_format,
        }
    }
}

#[tokio::main]
async fn main() {
    let config = ServerConfig::from(Args::parse());

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level, config.log_format);

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = match bootstrap::build(&config, shutdown_rx).await {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };
    let hub = app.hub.clone();

    let server = Server::new(app.state);
    let result = server.run(config.host, config.port).await;

    // Stop the hub loops once the listener is closed
    let _ = shutdown_tx.send(true);
    hub.stopped().await;

    if let Err(e) = result {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
