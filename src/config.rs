use std::env;
use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Process settings read once at startup. Workspace setup sections live in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub log_level: String,
    pub log_format: LogFormat,
    pub workspace: Option<PathBuf>,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| env_optional(lookup(key));
        let log_level = get("GRADEBOOKD_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let log_format = match get("GRADEBOOKD_LOG_FORMAT") {
            None => LogFormat::Text,
            Some(raw) => parse_log_format(raw)?,
        };
        let workspace = get("GRADEBOOKD_WORKSPACE").map(PathBuf::from);
        Ok(Self {
            log_level,
            log_format,
            workspace,
        })
    }
}

fn env_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_log_format(value: String) -> Result<LogFormat, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "text" | "pretty" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        _ => Err(ConfigError::InvalidValue {
            field: "GRADEBOOKD_LOG_FORMAT",
            value,
        }),
    }
}
