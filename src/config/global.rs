#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_global_config_default() {
        let config = GlobalConfig::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.backlog, 128);
        assert_eq!(config.daemon.working_dir, "/");
        assert!(config.daemon.pid_file.is_none());
        assert!(config.daemon.log_file.is_none());
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file_enabled);
    }

    #[test]
    fn test_global_config_serialization() {
        let config = GlobalConfig::default();

        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[daemon]"));
        assert!(toml_str.contains("[logging]"));

        let deserialized: GlobalConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.server.host, deserialized.server.host);
        assert_eq!(config.server.backlog, deserialized.server.backlog);
    }

    #[test]
    fn test_global_config_load_default_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config = GlobalConfig::load_from_path(&config_path).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_global_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = GlobalConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.backlog = 64;
        config.daemon.pid_file = Some("/tmp/custom.pid".to_string());

        config.save_to_path(&config_path).unwrap();

        let loaded = GlobalConfig::load_from_path(&config_path).unwrap();
        assert_eq!(loaded.server.host, "127.0.0.1");
        assert_eq!(loaded.server.backlog, 64);
        assert_eq!(loaded.daemon.pid_file.as_deref(), Some("/tmp/custom.pid"));
    }

    #[test]
    fn test_global_config_partial_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let partial_config = r#"
[server]
host = "::"

[logging]
level = "debug"
"#;

        std::fs::write(&config_path, partial_config).unwrap();

        let config = GlobalConfig::load_from_path(&config_path).unwrap();

        assert_eq!(config.server.host, "::");
        assert_eq!(config.logging.level, "debug");

        // Unspecified values fall back to defaults
        assert_eq!(config.server.backlog, 128);
        assert_eq!(config.daemon.working_dir, "/");
    }

    #[test]
    fn test_config_validation() {
        let mut config = GlobalConfig::default();
        assert!(config.validate().is_ok());

        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config = GlobalConfig::default();
        config.server.backlog = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_paths_are_temp_relative() {
        let config = GlobalConfig::default();
        let temp = std::env::temp_dir();

        assert!(config.pid_file_path().starts_with(&temp));
        assert!(config.log_file_path().starts_with(&temp));
        assert!(config.pid_file_path().ends_with("wardend.pid"));
    }

    #[test]
    fn test_explicit_paths_win_over_defaults() {
        let mut config = GlobalConfig::default();
        config.daemon.pid_file = Some("/run/wardend/wardend.pid".to_string());
        config.daemon.log_file = Some("/var/log/wardend.out".to_string());

        assert_eq!(
            config.pid_file_path(),
            PathBuf::from("/run/wardend/wardend.pid")
        );
        assert_eq!(config.log_file_path(), PathBuf::from("/var/log/wardend.out"));
    }
}

use crate::error::{Result, WardendError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Daemon-wide configuration. Loaded synchronously because it is consulted
/// before the tokio runtime exists (the detach sequence needs the log and
/// PID file paths).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GlobalConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub daemon: DaemonSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Interface to bind; the wildcard address by default.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_backlog")]
    pub backlog: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSection {
    /// PID lock file path. If None, a fixed file under the temp directory.
    pub pid_file: Option<String>,
    /// Append-mode file the detached daemon's stdout/stderr point at.
    /// If None, a fixed file under the temp directory.
    pub log_file: Option<String>,
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_file_enabled")]
    pub file_enabled: bool,
    /// Directory for structured logs. If None, alongside the daemon log file.
    pub file_path: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            backlog: default_backlog(),
        }
    }
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            pid_file: None,
            log_file: None,
            working_dir: default_working_dir(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_enabled: default_file_enabled(),
            file_path: None,
        }
    }
}

impl GlobalConfig {
    pub fn load() -> Result<Self> {
        let config_path = get_config_dir()?.join("config.toml");
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| WardendError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.backlog == 0 {
            return Err(WardendError::Config(
                "Listen backlog must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(WardendError::Config(format!(
                "Invalid logging level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Well-known PID lock file path. Temp-directory-relative unless
    /// overridden in `[daemon]`.
    pub fn pid_file_path(&self) -> PathBuf {
        match &self.daemon.pid_file {
            Some(path) => PathBuf::from(path),
            None => std::env::temp_dir().join("wardend.pid"),
        }
    }

    /// Append-only daemon output file. Temp-directory-relative unless
    /// overridden in `[daemon]`.
    pub fn log_file_path(&self) -> PathBuf {
        match &self.daemon.log_file {
            Some(path) => PathBuf::from(path),
            None => std::env::temp_dir().join("wardend.out"),
        }
    }

    /// Directory the structured log layer writes into.
    pub fn log_dir(&self) -> PathBuf {
        match &self.logging.file_path {
            Some(path) => PathBuf::from(path),
            None => self
                .log_file_path()
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(std::env::temp_dir),
        }
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| WardendError::Config("Could not determine home directory".to_string()))?;

    Ok(PathBuf::from(home_dir).join(".wardend"))
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_backlog() -> u32 {
    128
}

fn default_working_dir() -> String {
    "/".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_file_enabled() -> bool {
    true
}
