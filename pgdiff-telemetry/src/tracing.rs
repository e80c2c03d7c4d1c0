//! Installs the global `tracing` subscriber.
//!
//! Logs always go to stderr so that stdout carries nothing but generated SQL.

use std::io;
use std::sync::Once;

use pgdiff_config::Environment;
use thiserror::Error;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Keeps the non-blocking log writer alive. Buffered lines are flushed when dropped.
#[must_use = "dropping the flusher stops log output"]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to determine the runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("failed to install the log bridge: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),

    #[error("failed to install the tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Initializes tracing with `info` as the default level.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    init_tracing_with_default_level(app_name, Level::INFO)
}

/// Initializes tracing for `app_name`.
///
/// `RUST_LOG` takes precedence over `default_level`. In [`Environment::Dev`] logs are
/// human-readable, in [`Environment::Prod`] they are JSON lines.
pub fn init_tracing_with_default_level(
    app_name: &str,
    default_level: Level,
) -> Result<LogFlusher, TracingError> {
    let environment = Environment::load()?;

    LogTracer::init()?;

    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    let registry = tracing_subscriber::registry().with(filter);
    match environment {
        Environment::Dev => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(false)
                    .with_ansi(true),
            )
            .try_init()?,
        Environment::Prod => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .try_init()?,
    }

    tracing::debug!(app = app_name, %environment, "tracing initialized");

    Ok(LogFlusher { _guard: guard })
}

static TEST_TRACING: Once = Once::new();

/// Installs a test writer subscriber once per process. Enabled by `ENABLE_TRACING=1`.
pub fn init_test_tracing() {
    TEST_TRACING.call_once(|| {
        if std::env::var("ENABLE_TRACING").is_err() {
            return;
        }

        let filter = EnvFilter::builder()
            .with_default_directive(Level::DEBUG.into())
            .from_env_lossy();

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
