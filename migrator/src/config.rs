//! Run configuration.
//!
//! The binary collects raw values from flags, environment variables and an
//! optional `.env` file into [`RawConfig`]; [`MigrationConfig::from_raw`]
//! validates them once. The library never reads the environment itself.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_STORE_URI: &str = "sqlite://./data";
pub const DEFAULT_DB_NAME: &str = "healthcare_db";
pub const DEFAULT_CSV_PATH: &str = "data/healthcare_dataset.csv";
pub const DEFAULT_LOG_DIR: &str = "./logs";
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;

/// Name of the log file written inside the log directory.
pub const LOG_FILE_NAME: &str = "migration.log";

// =============================================================================
// Store Address
// =============================================================================

/// Where the document store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUri {
    /// `sqlite://<dir>`: one database file per database name inside `dir`
    Sqlite(PathBuf),
    /// `memory://`: nothing survives the process
    Memory,
}

impl StoreUri {
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let trimmed = raw.trim();
        if let Some(rest) = trimmed.strip_prefix("sqlite://") {
            let dir = if rest.is_empty() { "." } else { rest };
            return Ok(StoreUri::Sqlite(PathBuf::from(dir)));
        }
        if trimmed == "memory://" || trimmed == "memory:" {
            return Ok(StoreUri::Memory);
        }
        Err(ConfigError::UnsupportedStoreUri(raw.to_string()))
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreUri::Sqlite(dir) => write!(f, "sqlite://{}", dir.display()),
            StoreUri::Memory => f.write_str("memory://"),
        }
    }
}

// =============================================================================
// Raw and Validated Configuration
// =============================================================================

/// Unvalidated configuration values as collected from the outside world.
#[derive(Debug, Clone)]
pub struct RawConfig {
    pub store_uri: String,
    pub db_name: String,
    pub csv_path: PathBuf,
    pub drop_collections: String,
    pub log_dir: PathBuf,
    pub store_timeout_secs: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            store_uri: DEFAULT_STORE_URI.to_string(),
            db_name: DEFAULT_DB_NAME.to_string(),
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            drop_collections: "true".to_string(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            store_timeout_secs: DEFAULT_STORE_TIMEOUT_SECS,
        }
    }
}

/// Validated configuration handed to the migration driver.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub store_uri: StoreUri,
    pub db_name: String,
    pub csv_path: PathBuf,
    /// Clear both collections before migrating (fresh mode)
    pub drop_collections: bool,
    pub log_dir: PathBuf,
    /// Upper bound for a single store call
    pub store_timeout: Duration,
}

impl MigrationConfig {
    pub fn from_raw(raw: RawConfig) -> ConfigResult<Self> {
        let store_uri = StoreUri::parse(&raw.store_uri)?;

        let db_name = raw.db_name.trim().to_string();
        if !is_valid_db_name(&db_name) {
            return Err(ConfigError::InvalidDatabaseName(raw.db_name));
        }

        if raw.csv_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyCsvPath);
        }

        if raw.store_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(Self {
            store_uri,
            db_name,
            csv_path: raw.csv_path,
            drop_collections: parse_flag("DROP_COLLECTIONS", &raw.drop_collections)?,
            log_dir: raw.log_dir,
            store_timeout: Duration::from_secs(raw.store_timeout_secs),
        })
    }

    /// Path of the log file inside the log directory.
    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }
}

/// Interpret a boolean option value.
pub fn parse_flag(option: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            option: option.to_string(),
            value: value.to_string(),
        }),
    }
}

fn is_valid_db_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MigrationConfig::from_raw(RawConfig::default()).unwrap();
        assert_eq!(config.store_uri, StoreUri::Sqlite(PathBuf::from("./data")));
        assert_eq!(config.db_name, "healthcare_db");
        assert!(config.drop_collections);
        assert_eq!(config.store_timeout, Duration::from_secs(30));
        assert_eq!(config.log_file(), PathBuf::from("./logs/migration.log"));
    }

    #[test]
    fn test_store_uri_parsing() {
        assert_eq!(StoreUri::parse("memory://").unwrap(), StoreUri::Memory);
        assert_eq!(
            StoreUri::parse("sqlite:///var/lib/care").unwrap(),
            StoreUri::Sqlite(PathBuf::from("/var/lib/care"))
        );
        assert_eq!(
            StoreUri::parse("sqlite://").unwrap(),
            StoreUri::Sqlite(PathBuf::from("."))
        );
        assert!(matches!(
            StoreUri::parse("mongodb://localhost:27017/"),
            Err(ConfigError::UnsupportedStoreUri(_))
        ));
    }

    #[test]
    fn test_flag_parsing() {
        assert!(parse_flag("X", "TRUE").unwrap());
        assert!(parse_flag("X", " yes ").unwrap());
        assert!(!parse_flag("X", "False").unwrap());
        assert!(!parse_flag("X", "0").unwrap());
        assert!(matches!(
            parse_flag("DROP_COLLECTIONS", "maybe"),
            Err(ConfigError::InvalidFlag { .. })
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_name = RawConfig {
            db_name: "../etc".into(),
            ..RawConfig::default()
        };
        assert!(matches!(
            MigrationConfig::from_raw(bad_name),
            Err(ConfigError::InvalidDatabaseName(_))
        ));

        let empty_csv = RawConfig {
            csv_path: PathBuf::new(),
            ..RawConfig::default()
        };
        assert!(matches!(
            MigrationConfig::from_raw(empty_csv),
            Err(ConfigError::EmptyCsvPath)
        ));

        let zero_timeout = RawConfig {
            store_timeout_secs: 0,
            ..RawConfig::default()
        };
        assert!(matches!(
            MigrationConfig::from_raw(zero_timeout),
            Err(ConfigError::ZeroTimeout)
        ));
    }
}
