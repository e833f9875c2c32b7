use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::constraints::OptimizationConstraints;

pub const CONFIG_ENV_VAR: &str = "ROTAPLAN_CONFIG";
const DEFAULT_DATABASE_PATH: &str = "rotaplan.sqlite";
const DEFAULT_TIMEZONE: &str = "UTC";

/// Runtime settings, read from a YAML file.
///
/// ```yaml
/// databasePath: /var/lib/rotaplan/rotaplan.sqlite
/// logDir: /var/log/rotaplan
/// timezone: Europe/Berlin
/// defaults:
///   maxTasksPerUser: 6
///   considerPreviousPeriod: true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub timezone: String,
    pub defaults: OptimizationConstraints,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            log_dir: None,
            timezone: DEFAULT_TIMEZONE.to_string(),
            defaults: OptimizationConstraints::default(),
        }
    }
}

impl AppConfig {
    /// Explicit path first, then `ROTAPLAN_CONFIG`, then built-in defaults.
    pub fn load(explicit: Option<&Path>) -> AppResult<Self> {
        let from_env = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        let config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!(target: "app::config", "no config file given, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path)?;
        let config = Self::from_yaml(&raw)?;
        info!(target: "app::config", path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.timezone()?;
        self.defaults.validate()
    }

    pub fn timezone(&self) -> AppResult<Tz> {
        self.timezone.parse::<Tz>().map_err(|_| {
            AppError::validation_with_details(
                "unknown time zone",
                json!({"timezone": self.timezone}),
            )
        })
    }
}
