pub mod catalog;
pub mod db;
pub mod errors;
pub mod filters;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod reminders;
pub mod settings;

pub use crate::db::Database;
pub use crate::errors::{AppError, AppResult};
pub use crate::filters::{FilterField, ListingFilter};
pub use crate::metrics::MetricRunner;
pub use crate::settings::Settings;

use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Open (creating if needed) the store named in `settings` and wrap it in a runner.
pub fn open_runner(settings: &Settings) -> AppResult<MetricRunner> {
    let db = Database::new(&settings.database_path)?;
    Ok(MetricRunner::new(Arc::new(db)))
}

/// JSON logs to a daily rolling file under `log_dir`, or plain text on
/// stderr when no directory is configured. `RUST_LOG` wins over `filter`.
pub fn init_tracing(log_dir: Option<&Path>, filter: &str) -> Result<(), String> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let Some(log_dir) = log_dir else {
        return tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|error| error.to_string());
    };

    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "food-rescue.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
