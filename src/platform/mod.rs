//! Operating-system capabilities consumed by the guard engine
//!
//! The engine never calls OS APIs directly; it is handed one implementation of
//! each capability at construction:
//! - [`ProcessSource`]: full enumeration of running processes
//! - [`EventSource`]: non-blocking creation/deletion notifications
//! - [`SuspendController`]: the suspend/resume primitive
//!
//! Production implementations live in [`sysinfo_source`] and [`signal`];
//! [`memory`] holds in-memory implementations for tests and dry runs.

pub mod memory;
#[cfg(unix)]
pub mod signal;
pub mod sysinfo_source;

use crate::models::{ProcessInstance, ProcessSnapshot};

#[cfg(unix)]
pub use signal::SignalController;
pub use sysinfo_source::{SnapshotEventSource, SysinfoProcessSource};

/// Errors reported by platform capabilities
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("Failed to enumerate processes: {0}")]
    Enumeration(String),
    #[error("Failed to subscribe to process events: {0}")]
    Subscription(String),
    #[error("Failed to {operation} {name} (PID: {pid}): {reason}")]
    Signal {
        operation: &'static str,
        name: String,
        pid: u32,
        reason: String,
    },
    #[error("Process {0} no longer exists")]
    ProcessGone(u32),
}

/// Point-in-time enumeration of running processes
pub trait ProcessSource: Send {
    /// Full snapshot; may be expensive, called at most once per listener tick
    fn list_running_processes(&mut self) -> Result<ProcessSnapshot, PlatformError>;
}

/// Asynchronous process lifecycle notifications with non-blocking polls
pub trait EventSource: Send {
    /// Return at most one pending creation event
    fn poll_creation_event(&mut self) -> Option<ProcessInstance>;

    /// Return at most one pending deletion event
    fn poll_deletion_event(&mut self) -> Option<ProcessInstance>;
}

/// Suspend/resume primitive acting on every thread of a process.
///
/// Implementations are not required to be idempotent; the engine guarantees it
/// never suspends the same instance twice.
pub trait SuspendController: Send + Sync {
    fn suspend(&self, instance: &ProcessInstance) -> Result<(), PlatformError>;

    fn resume(&self, instance: &ProcessInstance) -> Result<(), PlatformError>;
}

/// Suspend controller for the current platform
#[cfg(unix)]
pub fn platform_controller() -> Result<std::sync::Arc<dyn SuspendController>, crate::models::GuardError> {
    Ok(std::sync::Arc::new(SignalController::new()))
}

/// Suspend controller for the current platform
#[cfg(not(unix))]
pub fn platform_controller() -> Result<std::sync::Arc<dyn SuspendController>, crate::models::GuardError> {
    Err(crate::models::GuardError::UnsupportedPlatform)
}
