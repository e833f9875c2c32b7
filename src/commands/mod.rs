pub mod optimization;
pub mod snapshot;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tracing::{error, warn};

use crate::config::AppConfig;
use crate::db::{DbPool, SqliteAssignmentStore};
use crate::error::{AppError, AppResult};
use crate::services::assignment_service::AssignmentService;

#[derive(Clone)]
pub struct AppState {
    db_pool: DbPool,
    config: AppConfig,
    assignment_service: Arc<AssignmentService>,
}

impl AppState {
    pub fn new(db_pool: DbPool, config: AppConfig) -> AppResult<Self> {
        let timezone = config.timezone()?;
        let store = Arc::new(SqliteAssignmentStore::new(db_pool.clone(), timezone));
        let assignment_service = Arc::new(
            AssignmentService::new(store)
                .with_defaults(config.defaults.clone())
                .with_timezone(timezone),
        );

        Ok(Self {
            db_pool,
            config,
            assignment_service,
        })
    }

    pub fn assignments(&self) -> Arc<AssignmentService> {
        Arc::clone(&self.assignment_service)
    }

    pub fn db(&self) -> DbPool {
        self.db_pool.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl CommandError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<JsonValue>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details,
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for CommandError {}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Validation { message, details } => {
                CommandError::new("VALIDATION_ERROR", message, details)
            }
            AppError::NotFound => {
                CommandError::new("NOT_FOUND", "requested resource does not exist", None)
            }
            AppError::Conflict { message } => CommandError::new("CONFLICT", message, None),
            AppError::DataSource { operation, message } => {
                error!(target: "app::command", %operation, %message, "data source failure in command");
                CommandError::new(
                    "DATA_SOURCE_ERROR",
                    format!("failed to {operation}: {message}"),
                    Some(json!({ "operation": operation })),
                )
            }
            AppError::Commit {
                task_id,
                applied,
                message,
            } => {
                warn!(target: "app::command", %task_id, applied = applied.len(), "commit failed in command");
                CommandError::new(
                    "COMMIT_FAILED",
                    message,
                    Some(json!({ "taskId": task_id, "applied": applied })),
                )
            }
            AppError::Database { message } => {
                error!(target: "app::command", %message, "database error in command");
                CommandError::new("UNKNOWN", message, None)
            }
            AppError::Serialization(error) => {
                error!(target: "app::command", error = %error, "serialization error in command");
                CommandError::new("UNKNOWN", format!("serialization failed: {error}"), None)
            }
            AppError::Yaml(error) => {
                warn!(target: "app::command", error = %error, "yaml error in command");
                CommandError::new("VALIDATION_ERROR", format!("invalid YAML: {error}"), None)
            }
            AppError::Io(error) => {
                error!(target: "app::command", error = %error, "io error in command");
                CommandError::new("UNKNOWN", format!("file system error: {error}"), None)
            }
            AppError::Other(message) => {
                error!(target: "app::command", %message, "unexpected error in command");
                CommandError::new("UNKNOWN", message, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_errors_keep_applied_ids() {
        let cause = AppError::conflict("task t3 is already assigned to bob");
        let error: CommandError =
            AppError::commit("t3", vec!["t1".into(), "t2".into()], &cause).into();
        assert_eq!(error.code, "COMMIT_FAILED");
        let details = error.details.unwrap();
        assert_eq!(details["taskId"], "t3");
        assert_eq!(details["applied"], json!(["t1", "t2"]));
    }

    #[test]
    fn data_source_errors_name_the_operation() {
        let cause = AppError::database("disk I/O error");
        let error: CommandError = AppError::data_source("fetch availability", &cause).into();
        assert_eq!(error.code, "DATA_SOURCE_ERROR");
        assert!(error.message.contains("fetch availability"));
    }

    #[test]
    fn validation_details_reach_the_caller() {
        let error: CommandError =
            AppError::validation_with_details("invalid timestamp format", json!({"value": "x"}))
                .into();
        assert_eq!(error.code, "VALIDATION_ERROR");
        assert_eq!(error.details.unwrap()["value"], "x");
    }

    #[test]
    fn not_found_maps_to_code() {
        let error: CommandError = AppError::NotFound.into();
        assert_eq!(error.code, "NOT_FOUND");
        assert!(error.details.is_none());
    }
}
