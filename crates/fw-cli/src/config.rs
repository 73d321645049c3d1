//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Minutes between foreground reminder checks.
    pub poll_period_minutes: u64,
    /// Minutes between background checks in `fw watch`; 0 disables them.
    pub background_period_minutes: u64,
    /// Seconds a reminder check may spend reading the database.
    pub read_timeout_secs: u64,
    /// Show alerts in the terminal. `false` behaves like a denied permission.
    pub notifications: bool,
    /// Ring the terminal bell for audible reminders.
    pub sound: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("feedwatch.db"),
            poll_period_minutes: 5,
            background_period_minutes: 60,
            read_timeout_secs: 10,
            notifications: true,
            sound: true,
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

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (FW_*)
        figment = figment.merge(Env::prefixed("FW_"));

        figment.extract()
    }

    pub const fn poll_period(&self) -> Duration {
        Duration::from_secs(self.poll_period_minutes.saturating_mul(60))
    }

    /// `None` when background checks are turned off.
    pub const fn background_period(&self) -> Option<Duration> {
        if self.background_period_minutes == 0 {
            None
        } else {
            Some(Duration::from_secs(self.background_period_minutes.saturating_mul(60)))
        }
    }

    pub const fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Returns the platform-specific config directory for feedwatch.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("feedwatch"))
}

/// Returns the platform-specific data directory for feedwatch.
///
/// On Linux: `~/.local/share/feedwatch`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("feedwatch"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_feedwatch() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "feedwatch");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("feedwatch.db"));
        assert_eq!(config.poll_period(), Duration::from_secs(300));
        assert_eq!(config.background_period(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "database_path = \"/tmp/fw-test.db\"\nbackground_period_minutes = 0\nsound = false\n",
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/fw-test.db"));
        assert_eq!(config.background_period(), None);
        assert!(!config.sound);
        assert!(config.notifications);
        assert_eq!(config.read_timeout(), Duration::from_secs(10));
    }
}
