//! Configuration management
//!
//! Handles TOML configuration parsing, validation and defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_POLL_INTERVAL_MS, POLL_INTERVAL_MAX_MS,
    POLL_INTERVAL_MIN_MS,
};
use crate::logging::LogLevel;
use crate::models::{GuardError, GuardSettings};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerConfiguration {
    pub guard: GuardSection,
    pub logging: LoggingSection,
    /// Initial protection registry: program name -> password (plaintext)
    pub programs: BTreeMap<String, String>,
}

/// Guard driver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardSection {
    /// Delay between two driver ticks in milliseconds (10-60000)
    pub poll_interval_ms: u64,
    /// Resume every suspended program when locker exits
    pub release_on_exit: bool,
}

impl Default for GuardSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            release_on_exit: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: LogLevel,
}

impl LockerConfiguration {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        let config: LockerConfiguration = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Load from an explicit path, or from the default path when it exists.
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            return Ok((Self::load_from_file(path)?, Some(path.to_path_buf())));
        }

        match Self::default_config_path() {
            Ok(path) if path.exists() => Ok((Self::load_from_file(&path)?, Some(path))),
            _ => Ok((Self::default(), None)),
        }
    }

    /// `<user config dir>/locker/config.toml`
    pub fn default_config_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("Could not determine the user configuration directory")?;
        Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<(), GuardError> {
        let interval = self.guard.poll_interval_ms;
        if !(POLL_INTERVAL_MIN_MS..=POLL_INTERVAL_MAX_MS).contains(&interval) {
            return Err(GuardError::InvalidInterval(interval));
        }
        Ok(())
    }

    pub fn polling_duration(&self) -> Duration {
        Duration::from_millis(self.guard.poll_interval_ms)
    }

    pub fn guard_settings(&self) -> GuardSettings {
        GuardSettings {
            poll_interval: self.polling_duration(),
            release_on_exit: self.guard.release_on_exit,
        }
    }
}

/// Parse a `NAME=PASSWORD` command-line pair
pub fn parse_protect_pair(raw: &str) -> Result<(String, String)> {
    let (name, password) = raw
        .split_once('=')
        .with_context(|| format!("Expected NAME=PASSWORD, got '{}'", raw))?;
    if name.trim().is_empty() {
        anyhow::bail!("Program name is empty in '{}'", raw);
    }
    Ok((name.trim().to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_full_configuration_parsing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[guard]
poll_interval_ms = 500
release_on_exit = true

[logging]
level = "debug"

[programs]
"Notepad.exe" = "pw1"
"steam" = "Shared"
"#,
        )
        .unwrap();

        let config = LockerConfiguration::load_from_file(&path).unwrap();
        assert_eq!(config.guard.poll_interval_ms, 500);
        assert!(config.guard.release_on_exit);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.programs.get("Notepad.exe").map(String::as_str), Some("pw1"));
        assert_eq!(config.polling_duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[programs]\n\"a.exe\" = \"x\"\n").unwrap();

        let config = LockerConfiguration::load_from_file(&path).unwrap();
        assert_eq!(config.guard.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert!(!config.guard.release_on_exit);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.programs.len(), 1);
    }

    #[test]
    fn test_interval_out_of_bounds_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[guard]\npoll_interval_ms = 5\n").unwrap();

        let err = LockerConfiguration::load_from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid polling interval"));

        let mut config = LockerConfiguration::default();
        config.guard.poll_interval_ms = POLL_INTERVAL_MAX_MS + 1;
        assert!(config.validate().is_err());
        config.guard.poll_interval_ms = POLL_INTERVAL_MAX_MS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_wrong_type_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[guard]\nrelease_on_exit = \"yes\"\n").unwrap();

        assert!(LockerConfiguration::load_from_file(&path).is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = LockerConfiguration::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_guard_settings_from_configuration() {
        let config = LockerConfiguration::default();
        let settings = config.guard_settings();
        assert_eq!(settings.poll_interval, Duration::from_millis(200));
        assert!(!settings.release_on_exit);
    }

    #[test]
    fn test_parse_protect_pair() {
        assert_eq!(
            parse_protect_pair("notepad.exe=pw=1").unwrap(),
            ("notepad.exe".to_string(), "pw=1".to_string())
        );
        assert!(parse_protect_pair("notepad.exe").is_err());
        assert!(parse_protect_pair("=pw").is_err());
    }

    #[test]
    fn test_default_config_path_layout() {
        if let Ok(path) = LockerConfiguration::default_config_path() {
            assert!(path.ends_with("locker/config.toml"));
        }
    }
}
