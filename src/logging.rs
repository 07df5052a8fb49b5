//! Structured logging for the guard engine
//!
//! Events are emitted through the `log` facade as `message | {json}` lines.
//! The backend is macOS Unified Logging (`oslog`) on macOS and `env_logger`
//! elsewhere.

use anyhow::Result;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::constants::APP_SUBSYSTEM;
use crate::models::{ProcessInstance, ProcessName};

/// Log levels for guard operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
        }
    }
}

/// Install the platform log backend
#[cfg(target_os = "macos")]
pub fn init_logger(level: LogLevel) -> Result<()> {
    let logger = oslog::OsLogger::new(APP_SUBSYSTEM);
    log::set_boxed_logger(Box::new(logger))
        .map_err(|e| anyhow::anyhow!("Failed to set logger: {}", e))?;
    log::set_max_level(level.into());
    Ok(())
}

/// Install the platform log backend
#[cfg(not(target_os = "macos"))]
pub fn init_logger(level: LogLevel) -> Result<()> {
    env_logger::Builder::new()
        .filter_level(level.into())
        .parse_default_env()
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logger: {}", e))?;
    log::debug!("Logging initialized for {}", APP_SUBSYSTEM);
    Ok(())
}

/// Guard event logger shared by the drivers and the console
#[derive(Debug, Clone)]
pub struct GuardLogger {
    /// Current logging level
    level: LogLevel,
}

impl Default for GuardLogger {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl GuardLogger {
    pub fn new(level: LogLevel) -> Self {
        Self { level }
    }

    pub fn log_startup(&self, config_path: Option<&std::path::Path>, protected: usize) {
        let message = json!({
            "event": "guard_startup",
            "pid": std::process::id(),
            "config_path": config_path.map(|p| p.display().to_string()),
            "protected_programs": protected,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        self.log_structured(LogLevel::Info, "Guard started", &message);
    }

    pub fn log_shutdown(&self, reason: &str) {
        let message = json!({
            "event": "guard_shutdown",
            "reason": reason,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        self.log_structured(LogLevel::Info, "Guard shutting down", &message);
    }

    pub fn log_protected(&self, name: &ProcessName, replaced: bool) {
        let message = json!({
            "event": "program_protected",
            "name": name,
            "replaced": replaced,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        self.log_structured(LogLevel::Info, &format!("Protecting {}", name), &message);
    }

    pub fn log_unprotected(&self, name: &ProcessName) {
        let message = json!({
            "event": "program_unprotected",
            "name": name,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        self.log_structured(LogLevel::Info, &format!("No longer protecting {}", name), &message);
    }

    pub fn log_transition(&self, event: &str, instance: &ProcessInstance) {
        let message = json!({
            "event": event,
            "name": instance.name,
            "pid": instance.pid,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        let level = if event == "queued" { LogLevel::Debug } else { LogLevel::Info };
        self.log_structured(level, &format!("{}: {}", event, instance), &message);
    }

    pub fn log_session_ended(&self, name: &ProcessName) {
        let message = json!({
            "event": "session_ended",
            "name": name,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        self.log_structured(LogLevel::Info, &format!("Protected program {} was closed", name), &message);
    }

    pub fn log_unlock(&self, names: &[ProcessName]) {
        let message = json!({
            "event": "unlock",
            "names": names,
            "matched": !names.is_empty(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        let summary = if names.is_empty() {
            "Password matched no locked program".to_string()
        } else {
            format!("Password unlocked {} program(s)", names.len())
        };
        self.log_structured(LogLevel::Info, &summary, &message);
    }

    pub fn log_warning(&self, warning: &str, context: Option<&str>) {
        let message = json!({
            "event": "warning",
            "message": warning,
            "context": context,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        self.log_structured(LogLevel::Warn, warning, &message);
    }

    pub fn log_error(&self, error_message: &str, context: Option<&str>) {
        let message = json!({
            "event": "error",
            "message": error_message,
            "context": context,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        self.log_structured(LogLevel::Error, error_message, &message);
    }

    fn log_structured(&self, level: LogLevel, message: &str, data: &serde_json::Value) {
        if !self.should_log(level) {
            return;
        }

        let full_message = format!("{} | {}", message, data);
        match level {
            LogLevel::Error => error!("{}", full_message),
            LogLevel::Warn => warn!("{}", full_message),
            LogLevel::Info => info!("{}", full_message),
            LogLevel::Debug => debug!("{}", full_message),
        }
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level <= self.level
    }
}
