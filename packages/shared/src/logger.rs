//! Logging setup utilities for the quiz server.

use std::str::FromStr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable, colored when attached to a terminal
    #[default]
    Pretty,
    /// One JSON object per line (for log shippers)
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected 'pretty' or 'json')")),
        }
    }
}

/// Build the default filter directive used when `RUST_LOG` is not set.
///
/// Every crate of the workspace and the binary itself get the same level,
/// everything else stays at the subscriber default (`error`).
pub fn default_filter(binary_name: &str, default_log_level: &str) -> String {
    format!(
        "{}={level},hayaoshi_server={level},{}={level}",
        env!("CARGO_PKG_NAME").replace('-', "_"),
        binary_name.replace('-', "_"),
        level = default_log_level,
    )
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// The log level can be overridden using the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "hayaoshi-server")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
/// * `format` - Pretty or JSON output
///
/// # Examples
///
/// ```no_run
/// use hayaoshi_shared::logger::{LogFormat, setup_logger};
///
/// setup_logger("hayaoshi-server", "info", LogFormat::Pretty);
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(binary_name, default_log_level).into());

    let pretty = (format == LogFormat::Pretty).then(tracing_subscriber::fmt::layer);
    let json = (format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .init();
}
