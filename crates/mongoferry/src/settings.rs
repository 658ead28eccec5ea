//! Key-value settings file (`.env` layout).
//!
//! Values are read with `dotenvy`; process environment variables with the same
//! keys take precedence over the file.

use std::collections::HashMap;
use std::path::Path;

use crate::config::{
    default_batch_size, default_concurrency, default_timeout_ms, ConnectionConfig, DeploymentType,
    MigrationOptions,
};
use crate::error::{Error, Result};

/// Default settings file name.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Every key understood by the settings file.
pub const KEYS: [&str; 13] = [
    "SOURCE_MONGODB_URI",
    "SOURCE_DEPLOYMENT_TYPE",
    "SOURCE_REPLICA_SET",
    "SOURCE_API_KEY",
    "TARGET_MONGODB_URI",
    "TARGET_DEPLOYMENT_TYPE",
    "TARGET_REPLICA_SET",
    "TARGET_API_KEY",
    "TARGET_PROJECT_ID",
    "BATCH_SIZE",
    "CONCURRENCY",
    "TIMEOUT_MS",
    "LOG_LEVEL",
];

/// Settings materialized from the key-value file and the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Source connection.
    pub source: ConnectionConfig,
    /// Target connection.
    pub target: ConnectionConfig,
    /// Numeric migration options. Selection options are left unset.
    pub options: MigrationOptions,
    /// Default log filter for the CLI.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: ConnectionConfig::default(),
            target: ConnectionConfig::default(),
            options: MigrationOptions::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from `path`, overlaid with process environment values.
    ///
    /// A missing file is not an error: defaults and the environment apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a value is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let mut values = HashMap::new();
        if path.exists() {
            let iter = dotenvy::from_path_iter(path)
                .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
            for item in iter {
                let (key, value) =
                    item.map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
                values.insert(key, value);
            }
            tracing::debug!(path = %path.display(), keys = values.len(), "Loaded settings file");
        }
        for key in KEYS {
            if let Ok(value) = std::env::var(key) {
                values.insert(key.to_string(), value);
            }
        }
        Self::from_values(&values)
    }

    /// Builds settings from already collected key-value pairs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] for unknown deployment types and for
    /// non-numeric or zero numeric values.
    pub fn from_values(values: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            values
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let source = ConnectionConfig {
            uri: get("SOURCE_MONGODB_URI").unwrap_or_default(),
            deployment_type: parse_deployment_type("SOURCE_DEPLOYMENT_TYPE", get("SOURCE_DEPLOYMENT_TYPE"))?,
            replica_set: get("SOURCE_REPLICA_SET"),
            api_key: get("SOURCE_API_KEY"),
            project_id: None,
        };
        let target = ConnectionConfig {
            uri: get("TARGET_MONGODB_URI").unwrap_or_default(),
            deployment_type: parse_deployment_type("TARGET_DEPLOYMENT_TYPE", get("TARGET_DEPLOYMENT_TYPE"))?,
            replica_set: get("TARGET_REPLICA_SET"),
            api_key: get("TARGET_API_KEY"),
            project_id: get("TARGET_PROJECT_ID"),
        };
        let options = MigrationOptions {
            batch_size: parse_positive("BATCH_SIZE", get("BATCH_SIZE"), default_batch_size())?,
            concurrency: parse_positive("CONCURRENCY", get("CONCURRENCY"), default_concurrency())?,
            timeout_ms: parse_positive("TIMEOUT_MS", get("TIMEOUT_MS"), default_timeout_ms())?,
            ..MigrationOptions::default()
        };

        Ok(Self {
            source,
            target,
            options,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Renders the settings in the file layout written by `setup`.
    pub fn to_env_string(&self) -> String {
        let mut lines = vec![
            "# Source MongoDB Connection".to_string(),
            format!("SOURCE_MONGODB_URI={}", quote(&self.source.uri)),
            format!("SOURCE_DEPLOYMENT_TYPE={}", self.source.deployment_type),
            optional_line("SOURCE_REPLICA_SET", self.source.replica_set.as_deref()),
            optional_line("SOURCE_API_KEY", self.source.api_key.as_deref()),
            String::new(),
            "# Target MongoDB Connection".to_string(),
            format!("TARGET_MONGODB_URI={}", quote(&self.target.uri)),
            format!("TARGET_DEPLOYMENT_TYPE={}", self.target.deployment_type),
            optional_line("TARGET_REPLICA_SET", self.target.replica_set.as_deref()),
            optional_line("TARGET_API_KEY", self.target.api_key.as_deref()),
            optional_line("TARGET_PROJECT_ID", self.target.project_id.as_deref()),
            String::new(),
            "# Migration Settings".to_string(),
            format!("BATCH_SIZE={}", self.options.batch_size),
            format!("CONCURRENCY={}", self.options.concurrency),
            format!("TIMEOUT_MS={}", self.options.timeout_ms),
        ];
        lines.push(format!("LOG_LEVEL={}", self.log_level));
        lines.join("\n")
    }

    /// Writes the settings file, replacing any existing content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_env_string())?;
        tracing::info!(path = %path.display(), "Settings saved");
        Ok(())
    }
}

fn optional_line(key: &str, value: Option<&str>) -> String {
    match value.filter(|v| !v.is_empty()) {
        Some(v) => format!("{key}={}", quote(v)),
        None => format!("# {key}="),
    }
}

/// Single-quotes a value so `dotenvy` reads it back verbatim.
///
/// `$` and `#` are literal inside single quotes. Quotes and backslashes
/// cannot appear there, so they are written escaped between two quoted runs.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\'' => quoted.push_str("'\\''"),
            '\\' => quoted.push_str("'\\\\'"),
            _ => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

fn parse_deployment_type(key: &str, value: Option<String>) -> Result<DeploymentType> {
    match value {
        None => Ok(DeploymentType::default()),
        Some(v) => v.parse().map_err(|_| Error::InvalidValue {
            key: key.to_string(),
            message: format!("unknown deployment type '{v}'"),
        }),
    }
}

fn parse_positive<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let Some(raw) = value else {
        return Ok(default);
    };
    let parsed: T = raw.parse().map_err(|_| Error::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}' is not a number"),
    })?;
    if parsed == T::default() {
        return Err(Error::InvalidValue {
            key: key.to_string(),
            message: "must be greater than 0".to_string(),
        });
    }
    Ok(parsed)
}
