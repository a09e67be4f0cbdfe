//! Configuration, loaded from `config.toml` under the queuectl home
//! directory (`$QUEUECTL_HOME`, falling back to `~/.queuectl`).
//!
//! Missing keys take defaults, so a partial file is fine. The job
//! database lives in the same directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};

pub const CONFIG_FILE: &str = "config.toml";
pub const DB_FILE: &str = "jobs.db";

/// Tunable queue policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Default retry ceiling used by enqueue when the caller omits one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Multiplier intended for exponential retry delay. Loaded and shown
    /// by `config get`, but the resolve path currently returns failed
    /// jobs straight to pending with no delay.
    #[serde(default = "default_backoff_base")]
    pub backoff_base: u32,

    /// Seconds before a running command is treated as timed out.
    #[serde(default = "default_worker_timeout")]
    pub worker_timeout: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base() -> u32 {
    2
}

// 5 minutes.
fn default_worker_timeout() -> u64 {
    300
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base: default_backoff_base(),
            worker_timeout: default_worker_timeout(),
        }
    }
}

impl QueueConfig {
    /// Load from `<home>/config.toml`, falling back to defaults when the
    /// file does not exist.
    pub fn load(home: &Path) -> Result<Self> {
        let path = home.join(CONFIG_FILE);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the config back to `<home>/config.toml`, creating the
    /// directory if needed.
    pub fn save(&self, home: &Path) -> Result<()> {
        std::fs::create_dir_all(home)?;
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(home.join(CONFIG_FILE), contents)?;
        Ok(())
    }

    /// Look up a key by name, as printed by `config get <key>`.
    pub fn get(&self, key: &str) -> Result<String> {
        match key {
            "max_retries" => Ok(self.max_retries.to_string()),
            "backoff_base" => Ok(self.backoff_base.to_string()),
            "worker_timeout" => Ok(self.worker_timeout.to_string()),
            other => Err(QueueError::Validation(format!(
                "unknown config key '{other}'"
            ))),
        }
    }

    /// Set a key by name from its string form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parsed = |v: &str| {
            v.parse::<u32>()
                .map_err(|_| QueueError::Validation(format!("'{v}' is not a valid number")))
        };
        match key {
            "max_retries" => self.max_retries = parsed(value)?,
            "backoff_base" => self.backoff_base = parsed(value)?,
            "worker_timeout" => {
                self.worker_timeout = value.parse::<u64>().map_err(|_| {
                    QueueError::Validation(format!("'{value}' is not a valid number"))
                })?
            }
            other => {
                return Err(QueueError::Validation(format!(
                    "unknown config key '{other}'"
                )));
            }
        }
        Ok(())
    }

    /// All keys in display order, as `(name, value)` pairs.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("backoff_base", self.backoff_base.to_string()),
            ("max_retries", self.max_retries.to_string()),
            ("worker_timeout", self.worker_timeout.to_string()),
        ]
    }
}

/// Resolve the queuectl home directory: `$QUEUECTL_HOME` when set,
/// otherwise `~/.queuectl`.
pub fn queue_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("QUEUECTL_HOME")
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir()
        .ok_or_else(|| QueueError::Validation("could not resolve home directory".into()))?;
    Ok(home.join(".queuectl"))
}

/// Path of the job database inside the queuectl home.
pub fn db_path(home: &Path) -> PathBuf {
    home.join(DB_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = QueueConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff_base, 2);
        assert_eq!(config.worker_timeout, 300);
    }

    #[test]
    fn deserialize_partial_toml() {
        let config: QueueConfig = toml::from_str("max_retries = 5").unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.backoff_base, 2);
        assert_eq!(config.worker_timeout, 300);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = QueueConfig::load(dir.path()).unwrap();
        assert_eq!(config, QueueConfig::default());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let home = dir.path();

        let mut config = QueueConfig::default();
        config.set("max_retries", "7").unwrap();
        config.save(home).unwrap();

        let loaded = QueueConfig::load(home).unwrap();
        assert_eq!(loaded.max_retries, 7);
        assert_eq!(loaded.worker_timeout, 300);
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_value() {
        let mut config = QueueConfig::default();
        assert!(matches!(
            config.set("poll_jitter", "1").unwrap_err(),
            QueueError::Validation(_)
        ));
        assert!(matches!(
            config.set("max_retries", "lots").unwrap_err(),
            QueueError::Validation(_)
        ));
        assert_eq!(config, QueueConfig::default());
    }

    #[test]
    fn get_returns_values_by_key() {
        let config = QueueConfig::default();
        assert_eq!(config.get("worker_timeout").unwrap(), "300");
        assert!(config.get("nope").is_err());
    }
}
