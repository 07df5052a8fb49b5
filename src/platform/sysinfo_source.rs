//! Process enumeration and lifecycle events backed by `sysinfo`
//!
//! Creation and deletion events are derived by diffing successive process
//! tables. Entries are keyed by (PID, start_time) so a reused PID shows up as
//! a deletion followed by a creation.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use sysinfo::{ProcessesToUpdate, System};

use super::{EventSource, PlatformError, ProcessSource};
use crate::models::{ProcessInstance, ProcessSnapshot};

/// Process table keyed by (PID, start_time)
type ProcessTable = HashMap<(u32, u64), ProcessInstance>;

fn read_process_table(system: &mut System) -> ProcessTable {
    system.refresh_processes(ProcessesToUpdate::All, true);

    system
        .processes()
        .iter()
        .filter_map(|(pid, process)| {
            // Linux tasks are listed alongside their thread group leader
            if process.thread_kind().is_some() {
                return None;
            }
            let name = process.name().to_string_lossy();
            if name.trim().is_empty() {
                return None;
            }
            let instance = ProcessInstance::new(name.as_ref(), pid.as_u32());
            Some(((pid.as_u32(), process.start_time()), instance))
        })
        .collect()
}

/// Returns (created, deleted) between two process tables, ordered by PID
fn diff_process_tables(
    previous: &ProcessTable,
    current: &ProcessTable,
) -> (Vec<ProcessInstance>, Vec<ProcessInstance>) {
    let mut created: Vec<ProcessInstance> = current
        .iter()
        .filter(|(key, _)| !previous.contains_key(key))
        .map(|(_, instance)| instance.clone())
        .collect();
    let mut deleted: Vec<ProcessInstance> = previous
        .iter()
        .filter(|(key, _)| !current.contains_key(key))
        .map(|(_, instance)| instance.clone())
        .collect();

    created.sort_by_key(|instance| instance.pid);
    deleted.sort_by_key(|instance| instance.pid);
    (created, deleted)
}

/// Live process enumeration
pub struct SysinfoProcessSource {
    system: System,
}

impl SysinfoProcessSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for SysinfoProcessSource {
    fn list_running_processes(&mut self) -> Result<ProcessSnapshot, PlatformError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(PlatformError::Enumeration(
                "process enumeration is not supported on this system".to_string(),
            ));
        }

        let table = read_process_table(&mut self.system);
        if table.is_empty() {
            return Err(PlatformError::Enumeration("process table is empty".to_string()));
        }

        Ok(table.into_values().collect())
    }
}

/// Event source that polls the process table and queues the differences
pub struct SnapshotEventSource {
    system: System,
    known: ProcessTable,
    created: VecDeque<ProcessInstance>,
    deleted: VecDeque<ProcessInstance>,
    refresh_interval: Duration,
    last_refresh: Instant,
}

impl SnapshotEventSource {
    /// Take the baseline process table. Processes already running when the
    /// subscription starts never produce a creation event.
    pub fn subscribe(refresh_interval: Duration) -> Result<Self, PlatformError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(PlatformError::Subscription(
                "process enumeration is not supported on this system".to_string(),
            ));
        }

        let mut system = System::new();
        let known = read_process_table(&mut system);
        if known.is_empty() {
            return Err(PlatformError::Subscription(
                "no process is visible, the process table cannot be read".to_string(),
            ));
        }

        log::debug!("Subscribed to process events with {} known processes", known.len());

        Ok(Self {
            system,
            known,
            created: VecDeque::new(),
            deleted: VecDeque::new(),
            refresh_interval,
            last_refresh: Instant::now(),
        })
    }

    fn refresh_if_due(&mut self) {
        if self.last_refresh.elapsed() < self.refresh_interval {
            return;
        }
        self.last_refresh = Instant::now();

        let current = read_process_table(&mut self.system);
        let (created, deleted) = diff_process_tables(&self.known, &current);
        self.created.extend(created);
        self.deleted.extend(deleted);
        self.known = current;
    }
}

impl EventSource for SnapshotEventSource {
    fn poll_creation_event(&mut self) -> Option<ProcessInstance> {
        if self.created.is_empty() {
            self.refresh_if_due();
        }
        self.created.pop_front()
    }

    fn poll_deletion_event(&mut self) -> Option<ProcessInstance> {
        if self.deleted.is_empty() {
            self.refresh_if_due();
        }
        self.deleted.pop_front()
    }
}
