use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "MedLinkX";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default database file name inside the data directory.
pub const DATABASE_FILE: &str = "medlinkx.db";

/// Pause between reaching `complete` and notifying the caller.
pub const DEFAULT_COMPLETION_DELAY: Duration = Duration::from_millis(1000);

pub const ENV_DATA_DIR: &str = "MEDLINKX_DATA_DIR";
pub const ENV_DATABASE: &str = "MEDLINKX_DATABASE";
pub const ENV_COMPLETION_DELAY_MS: &str = "MEDLINKX_COMPLETION_DELAY_MS";
pub const ENV_DEMO_FALLBACK: &str = "MEDLINKX_DEMO_FALLBACK";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "medlinkx_lib=info"
}

/// Startup configuration errors. Fatal: reported once, never retried.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Cannot determine home directory")]
    NoHomeDir,
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Get the application data directory: ~/MedLinkX/
pub fn app_data_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(APP_NAME))
}

/// How domain listings behave when the backing table is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataMode {
    /// Errors surface as errors.
    #[default]
    Live,
    /// Listings fall back to demo records, tagged as such.
    DemoFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub completion_delay: Duration,
    pub data_mode: DataMode,
}

impl AppConfig {
    /// Defaults rooted at `data_dir`.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            database_path: data_dir.join(DATABASE_FILE),
            data_dir,
            completion_delay: DEFAULT_COMPLETION_DELAY,
            data_mode: DataMode::Live,
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = match lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => app_data_dir()?,
        };
        let mut config = Self::in_dir(data_dir);

        if let Some(db) = lookup(ENV_DATABASE).filter(|v| !v.trim().is_empty()) {
            config.database_path = PathBuf::from(db);
        }

        if let Some(raw) = lookup(ENV_COMPLETION_DELAY_MS) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: ENV_COMPLETION_DELAY_MS,
                    value: raw.clone(),
                })?;
            config.completion_delay = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup(ENV_DEMO_FALLBACK) {
            config.data_mode = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => DataMode::DemoFallback,
                "0" | "false" | "no" => DataMode::Live,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_DEMO_FALLBACK,
                        value: raw,
                    })
                }
            };
        }

        Ok(config)
    }
}
