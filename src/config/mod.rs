use crate::datastore::Dialect;
use crate::migration::DEFAULT_TABLE;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Default config file name
pub const CONFIG_FILE: &str = "sqlshift.json";

/// Default environment name
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Matches `${NAME}` and `$NAME`
static VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("variable pattern is valid")
});

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Environment '{0}' not found in config")]
    UnknownEnvironment(String),

    #[error("Environment variable '{0}' is not set")]
    MissingVariable(String),

    #[error("Config file already exists: {0}")]
    AlreadyExists(PathBuf),
}

fn default_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

/// Connection and layout settings for one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Dialect name, e.g. "sqlite3" or "postgres"
    pub dialect: String,
    /// Driver-specific connection string. `$VAR` and `${VAR}` are expanded.
    pub datasource: String,
    /// Directory holding the migration scripts
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    /// Ledger table name
    #[serde(default = "default_table")]
    pub table: String,
}

/// Sqlshift configuration, keyed by environment name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlshiftConfig {
    #[serde(flatten)]
    pub environments: HashMap<String, Environment>,
}

impl SqlshiftConfig {
    /// A single development environment on a local SQLite file
    pub fn starter() -> Self {
        let development = Environment {
            dialect: Dialect::Sqlite.name().to_string(),
            datasource: "sqlshift.db".to_string(),
            dir: default_dir(),
            table: default_table(),
        };
        Self {
            environments: HashMap::from([(DEFAULT_ENVIRONMENT.to_string(), development)]),
        }
    }

    /// Look up an environment and expand variables in its datasource
    pub fn environment(&self, name: &str) -> Result<Environment, ConfigError> {
        let mut env = self
            .environments
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownEnvironment(name.to_string()))?;

        env.datasource = expand_vars(&env.datasource, |var| std::env::var(var).ok())?;
        Ok(env)
    }
}

/// Read the configuration file
pub async fn read_config(path: &Path) -> Result<SqlshiftConfig, ConfigError> {
    let content = fs::read_to_string(path).await?;
    let config: SqlshiftConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Write the configuration file
pub async fn write_config(path: &Path, config: &SqlshiftConfig) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).await?;
    Ok(())
}

/// Write the starter config to `path` unless a file is already there
pub async fn init_config(path: &Path) -> Result<SqlshiftConfig, ConfigError> {
    if path.exists() {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    let config = SqlshiftConfig::starter();
    write_config(path, &config).await?;
    Ok(config)
}

/// Replace `$NAME` and `${NAME}` using `lookup`
pub fn expand_vars<F>(value: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = None;

    let expanded = VARIABLE.replace_all(value, |caps: &Captures| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();

        match lookup(name) {
            Some(val) => val,
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(ConfigError::MissingVariable(name)),
        None => Ok(expanded.into_owned()),
    }
}
