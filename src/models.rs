//! Data models module
//!
//! Defines core data structures:
//! - ProcessName: case-normalized program name used as every map key
//! - ProcessInstance: one running process, identified by (name, pid)
//! - ProcessSnapshot: live process table grouped by name
//! - GuardStatus: read-only view of the guard collections

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Case-normalized program name.
///
/// The only way to build one is through normalization (trim + lowercase), so
/// registry, queue and snapshot keys always agree. There is intentionally no
/// `Borrow<str>` impl: lookups must go through a `ProcessName` too.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ProcessName(String);

impl ProcessName {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Name without its extension, used for fuzzy matching ("chrome.exe" -> "chrome")
    pub fn stem(&self) -> &str {
        match self.0.find('.') {
            Some(index) => &self.0[..index],
            None => &self.0,
        }
    }
}

impl From<String> for ProcessName {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for ProcessName {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<ProcessName> for String {
    fn from(name: ProcessName) -> Self {
        name.0
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Plaintext password attached to a guarded program.
///
/// Comparison is exact and case-sensitive. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.0 == candidate
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Same length as the password, every character replaced
    pub fn masked(&self) -> String {
        "*".repeat(self.0.chars().count())
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

/// A single running process
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessInstance {
    /// Normalized executable name
    pub name: ProcessName,
    /// Process ID (PID)
    pub pid: u32,
}

impl ProcessInstance {
    pub fn new(name: impl AsRef<str>, pid: u32) -> Self {
        Self {
            name: ProcessName::new(name),
            pid,
        }
    }
}

impl fmt::Display for ProcessInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (PID: {})", self.name, self.pid)
    }
}

/// Snapshot of the running processes, grouped by normalized name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub processes: BTreeMap<ProcessName, Vec<ProcessInstance>>,
}

impl ProcessSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instance: ProcessInstance) {
        let instances = self.processes.entry(instance.name.clone()).or_default();
        if !instances.contains(&instance) {
            instances.push(instance);
        }
    }

    pub fn contains_name(&self, name: &ProcessName) -> bool {
        self.processes.get(name).is_some_and(|instances| !instances.is_empty())
    }

    pub fn contains(&self, instance: &ProcessInstance) -> bool {
        self.processes
            .get(&instance.name)
            .is_some_and(|instances| instances.iter().any(|i| i.pid == instance.pid))
    }

    pub fn instances(&self, name: &ProcessName) -> &[ProcessInstance] {
        self.processes.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct program names
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn process_count(&self) -> usize {
        self.processes.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProcessName, &[ProcessInstance])> {
        self.processes.iter().map(|(name, instances)| (name, instances.as_slice()))
    }
}

impl FromIterator<ProcessInstance> for ProcessSnapshot {
    fn from_iter<I: IntoIterator<Item = ProcessInstance>>(iter: I) -> Self {
        let mut snapshot = ProcessSnapshot::new();
        for instance in iter {
            snapshot.insert(instance);
        }
        snapshot
    }
}

/// Where a guarded program currently sits in the guard protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramState {
    Idle,
    Queued,
    Suspended,
    Resumed,
}

impl fmt::Display for ProgramState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProgramState::Idle => "idle",
            ProgramState::Queued => "queued",
            ProgramState::Suspended => "locked",
            ProgramState::Resumed => "unlocked",
        };
        f.pad(label)
    }
}

/// Row of the protected-programs table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedProgram {
    pub name: ProcessName,
    /// Masked password, never the plaintext
    pub password: String,
    pub state: ProgramState,
}

/// Read-only view of every guard collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardStatus {
    pub protected: Vec<ProtectedProgram>,
    pub queued: Vec<ProcessInstance>,
    pub suspended: Vec<ProcessInstance>,
    pub resumed: Vec<ProcessInstance>,
    /// Number of processes in the cached live snapshot
    pub running_processes: usize,
}

/// One fuzzy search hit over the live snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessMatch {
    pub name: ProcessName,
    pub pids: Vec<u32>,
    /// Similarity percentage between query and name stem
    pub similarity: f64,
}

/// Runtime settings of the guard drivers
#[derive(Debug, Clone)]
pub struct GuardSettings {
    /// Delay between two ticks of each driver
    pub poll_interval: Duration,
    /// Resume every suspended program when the engine shuts down
    pub release_on_exit: bool,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(crate::constants::DEFAULT_POLL_INTERVAL_MS),
            release_on_exit: false,
        }
    }
}

/// Custom error types for guard operations
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// Note: bounds must match POLL_INTERVAL_MIN_MS/MAX_MS in constants.rs
    #[error("Invalid polling interval: {0}ms. Must be between 10 and 60000 milliseconds")]
    InvalidInterval(u64),
    #[error("{0} is locked; unlock it before removing its protection")]
    ProgramLocked(ProcessName),
    #[error("{0} is not protected")]
    NotProtected(ProcessName),
    #[error("Program name must not be empty")]
    EmptyName,
    #[error("Failed to subscribe to process events: {0}")]
    Subscription(String),
    #[error("Process suspension is not supported on this platform")]
    UnsupportedPlatform,
}
