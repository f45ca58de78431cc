//! # Structured Logging
//!
//! Environment-aware tracing bootstrap for the message-handling tier.
//! Console output by default; set `ACTION_HANDLER_LOG_FORMAT=json` for
//! structured JSON lines suitable for log shipping.

use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process.
///
/// Safe to call repeatedly; later calls are no-ops. Uses `RUST_LOG` when set,
/// otherwise an environment-derived default level.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_log_level()));

        let json_output = std::env::var("ACTION_HANDLER_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let subscriber = tracing_subscriber::registry();

        let init_result = if json_output {
            subscriber
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_ansi(false)
                        .with_filter(filter),
                )
                .try_init()
        } else {
            subscriber
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .with_level(true)
                        .with_filter(filter),
                )
                .try_init()
        };

        // A global subscriber may already be installed by an embedding host;
        // that is not an error.
        if init_result.is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }
    });
}

fn default_log_level() -> String {
    match std::env::var("ACTION_HANDLER_ENV").as_deref() {
        Ok("production") => "info".to_string(),
        Ok("test") => "warn".to_string(),
        _ => "debug".to_string(),
    }
}
