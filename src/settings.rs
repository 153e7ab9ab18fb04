use crate::errors::{AppError, AppResult};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub database_path: PathBuf,
    pub listings_csv: PathBuf,
    pub claims_csv: PathBuf,
    /// Rolling log files go here; `None` logs to stderr.
    pub log_dir: Option<PathBuf>,
    pub log_filter: String,
    pub provider_reminder_day: Weekday,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("food_waste.db"),
            listings_csv: PathBuf::from("providers_foodlisting.csv"),
            claims_csv: PathBuf::from("receivers_claims.csv"),
            log_dir: None,
            log_filter: "info".to_string(),
            provider_reminder_day: Weekday::Mon,
        }
    }
}

impl Settings {
    /// Defaults when `path` is `None`; otherwise the YAML file layered over them.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .map_err(|error| AppError::Io(format!("{}: {}", path.display(), error)))?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(raw)?;
        if settings.log_filter.trim().is_empty() {
            return Err(AppError::Validation("logFilter cannot be empty".to_string()));
        }
        Ok(settings)
    }
}
