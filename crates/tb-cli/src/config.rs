//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tb_core::{DEFAULT_EPSILON_MS, TimeFormat};

/// Where the time-budget command clips observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// One in-memory store per observation, clipped in parallel.
    #[default]
    Memory,
    /// The SQLite database at `database_path`.
    Sqlite,
}

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// How times are rendered in human-readable output.
    pub time_format: TimeFormat,

    pub store: StoreBackend,

    /// Path to the database file, used when `store = "sqlite"`.
    pub database_path: PathBuf,

    /// Spacing between closing events added by `tb fix`.
    pub epsilon_ms: i64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("time_format", &self.time_format)
            .field("store", &self.store)
            .field("database_path", &self.database_path)
            .field("epsilon_ms", &self.epsilon_ms)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            time_format: TimeFormat::Seconds,
            store: StoreBackend::Memory,
            database_path: data_dir.join("events.db"),
            epsilon_ms: DEFAULT_EPSILON_MS,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // TB_TIME_FORMAT, TB_STORE, ...
        figment = figment.merge(Env::prefixed("TB_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for tb.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tb"))
}

/// Returns the platform-specific data directory for tb.
///
/// On Linux: `~/.local/share/tb`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("tb"))
}
