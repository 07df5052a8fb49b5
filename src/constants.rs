//! Global constants for locker
//!
//! Centralized location for application-wide constants

/// Application subsystem identifier for macOS Unified Logging System
pub const APP_SUBSYSTEM: &str = "io.github.locker";

/// Default delay between two driver ticks, in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// Note: bounds must match the message of `GuardError::InvalidInterval`
pub const POLL_INTERVAL_MIN_MS: u64 = 10;
pub const POLL_INTERVAL_MAX_MS: u64 = 60_000;

/// Longest query compared by the fuzzy matcher, in characters
pub const MAX_QUERY_CHARS: usize = 256;

/// Minimum similarity (percent, exclusive) for a fuzzy search hit
pub const SIMILARITY_THRESHOLD: f64 = 50.0;

/// Directory under the user config dir holding the configuration file
pub const CONFIG_DIR_NAME: &str = "locker";

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "config.toml";
