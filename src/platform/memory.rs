//! In-memory capability implementations
//!
//! Cloned handles share their state, so a test can keep one handle to script
//! events or inspect primitive calls while the engine owns the other.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{EventSource, PlatformError, ProcessSource, SuspendController};
use crate::models::{ProcessInstance, ProcessSnapshot};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct EventQueues {
    created: VecDeque<ProcessInstance>,
    deleted: VecDeque<ProcessInstance>,
}

/// Event source fed by hand
#[derive(Debug, Clone, Default)]
pub struct ScriptedEvents {
    queues: Arc<Mutex<EventQueues>>,
}

impl ScriptedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_created(&self, instance: ProcessInstance) {
        lock(&self.queues).created.push_back(instance);
    }

    pub fn push_deleted(&self, instance: ProcessInstance) {
        lock(&self.queues).deleted.push_back(instance);
    }

    /// Number of (creation, deletion) events not yet polled
    pub fn pending(&self) -> (usize, usize) {
        let queues = lock(&self.queues);
        (queues.created.len(), queues.deleted.len())
    }
}

impl EventSource for ScriptedEvents {
    fn poll_creation_event(&mut self) -> Option<ProcessInstance> {
        lock(&self.queues).created.pop_front()
    }

    fn poll_deletion_event(&mut self) -> Option<ProcessInstance> {
        lock(&self.queues).deleted.pop_front()
    }
}

#[derive(Debug, Default)]
struct ProcessTable {
    snapshot: ProcessSnapshot,
    failing: bool,
    calls: usize,
}

/// Process source returning a mutable in-memory table
#[derive(Debug, Clone, Default)]
pub struct StaticProcessSource {
    table: Arc<Mutex<ProcessTable>>,
}

impl StaticProcessSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processes(instances: impl IntoIterator<Item = ProcessInstance>) -> Self {
        let source = Self::new();
        lock(&source.table).snapshot = instances.into_iter().collect();
        source
    }

    pub fn add(&self, instance: ProcessInstance) {
        lock(&self.table).snapshot.insert(instance);
    }

    pub fn remove(&self, instance: &ProcessInstance) {
        let mut table = lock(&self.table);
        if let Some(instances) = table.snapshot.processes.get_mut(&instance.name) {
            instances.retain(|i| i.pid != instance.pid);
            if instances.is_empty() {
                table.snapshot.processes.remove(&instance.name);
            }
        }
    }

    /// Make every enumeration fail until called again with `false`
    pub fn set_failing(&self, failing: bool) {
        lock(&self.table).failing = failing;
    }

    pub fn calls(&self) -> usize {
        lock(&self.table).calls
    }
}

impl ProcessSource for StaticProcessSource {
    fn list_running_processes(&mut self) -> Result<ProcessSnapshot, PlatformError> {
        let mut table = lock(&self.table);
        table.calls += 1;
        if table.failing {
            return Err(PlatformError::Enumeration("process table unavailable".to_string()));
        }
        Ok(table.snapshot.clone())
    }
}

#[derive(Debug, Default)]
struct ControllerLog {
    suspend_calls: Vec<ProcessInstance>,
    resume_calls: Vec<ProcessInstance>,
    suspended: HashSet<ProcessInstance>,
    failing_suspend: HashSet<ProcessInstance>,
    failing_resume: HashSet<ProcessInstance>,
}

/// Suspend controller that records every call and tracks which instances it
/// currently holds suspended. Failures can be injected per instance.
#[derive(Debug, Clone, Default)]
pub struct RecordingController {
    log: Arc<Mutex<ControllerLog>>,
}

impl RecordingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_suspend(&self, instance: &ProcessInstance, failing: bool) {
        let mut log = lock(&self.log);
        if failing {
            log.failing_suspend.insert(instance.clone());
        } else {
            log.failing_suspend.remove(instance);
        }
    }

    pub fn fail_resume(&self, instance: &ProcessInstance, failing: bool) {
        let mut log = lock(&self.log);
        if failing {
            log.failing_resume.insert(instance.clone());
        } else {
            log.failing_resume.remove(instance);
        }
    }

    /// Every suspend call, including failed ones
    pub fn suspend_calls(&self) -> Vec<ProcessInstance> {
        lock(&self.log).suspend_calls.clone()
    }

    /// Every resume call, including failed ones
    pub fn resume_calls(&self) -> Vec<ProcessInstance> {
        lock(&self.log).resume_calls.clone()
    }

    pub fn suspend_count(&self, instance: &ProcessInstance) -> usize {
        lock(&self.log).suspend_calls.iter().filter(|i| *i == instance).count()
    }

    pub fn resume_count(&self, instance: &ProcessInstance) -> usize {
        lock(&self.log).resume_calls.iter().filter(|i| *i == instance).count()
    }

    /// Instances physically held suspended right now
    pub fn held(&self) -> HashSet<ProcessInstance> {
        lock(&self.log).suspended.clone()
    }
}

impl SuspendController for RecordingController {
    fn suspend(&self, instance: &ProcessInstance) -> Result<(), PlatformError> {
        let mut log = lock(&self.log);
        log.suspend_calls.push(instance.clone());
        if log.failing_suspend.contains(instance) {
            return Err(PlatformError::Signal {
                operation: "suspend",
                name: instance.name.to_string(),
                pid: instance.pid,
                reason: "injected failure".to_string(),
            });
        }
        log.suspended.insert(instance.clone());
        Ok(())
    }

    fn resume(&self, instance: &ProcessInstance) -> Result<(), PlatformError> {
        let mut log = lock(&self.log);
        log.resume_calls.push(instance.clone());
        if log.failing_resume.contains(instance) {
            return Err(PlatformError::Signal {
                operation: "resume",
                name: instance.name.to_string(),
                pid: instance.pid,
                reason: "injected failure".to_string(),
            });
        }
        log.suspended.remove(instance);
        Ok(())
    }
}
