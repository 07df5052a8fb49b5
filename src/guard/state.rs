//! Guard state machine
//!
//! Owns every collection the guard protocol touches and implements each
//! transition as one method. Nothing here performs I/O: the drivers claim work
//! under the engine lock, call the OS primitive with the lock released, then
//! report the result back through a `complete_*` method.
//!
//! Invariants holding between transitions:
//! - an instance is in at most one of queue, in-flight claims and suspended
//! - every name keyed in queue, suspended or resumed is in the registry
//! - an instance stays in `suspended` until its resume call has succeeded

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::registry::ProtectionRegistry;
use crate::models::{
    GuardError, GuardStatus, Password, ProcessInstance, ProcessName, ProcessSnapshot,
    ProgramState, ProtectedProgram,
};

type InstanceMap = BTreeMap<ProcessName, Vec<ProcessInstance>>;

fn contains_instance(map: &InstanceMap, instance: &ProcessInstance) -> bool {
    map.get(&instance.name).is_some_and(|instances| instances.contains(instance))
}

fn push_instance(map: &mut InstanceMap, instance: ProcessInstance) -> bool {
    let instances = map.entry(instance.name.clone()).or_default();
    if instances.contains(&instance) {
        return false;
    }
    instances.push(instance);
    true
}

/// Remove one instance, dropping the name key once it has no instances left
fn remove_instance(map: &mut InstanceMap, instance: &ProcessInstance) -> bool {
    let Some(instances) = map.get_mut(&instance.name) else {
        return false;
    };
    let before = instances.len();
    instances.retain(|i| i != instance);
    let removed = instances.len() != before;
    if instances.is_empty() {
        map.remove(&instance.name);
    }
    removed
}

fn flatten(map: &InstanceMap) -> Vec<ProcessInstance> {
    map.values().flatten().cloned().collect()
}

/// Result of applying a creation event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationOutcome {
    /// Name is not in the registry
    Unguarded,
    /// Instance is already queued, being suspended, suspended or resumed
    AlreadyTracked,
    /// Name was unlocked earlier and is still running; recorded as resumed
    SessionUnlocked,
    Queued,
}

/// Result of reporting a suspend call back to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspensionOutcome {
    Suspended,
    /// The call failed; the instance is back in the queue for the next tick
    Requeued,
    /// The instance was purged while the call was in flight
    Cancelled,
}

/// Result of reporting a resume call back to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    Resumed,
    /// The call failed; the instance stays suspended and its name unlocked
    StillSuspended,
    /// The instance left the suspended set while the call was in flight
    Missing,
}

/// Which collection a purged instance was removed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Queue,
    InFlight,
    Suspended,
}

/// Bookkeeping change made while confirming deletions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Purged {
        instance: ProcessInstance,
        from: Collection,
    },
    /// Last instance of an unlocked program closed; its name is re-armed
    SessionEnded(ProcessName),
}

#[derive(Debug, Default)]
pub struct GuardState {
    registry: ProtectionRegistry,
    queued: InstanceMap,
    /// Claimed by the suspension driver, suspend call outstanding
    in_flight: HashSet<ProcessInstance>,
    suspended: InstanceMap,
    resumed: InstanceMap,
    /// Suspended names whose password has been supplied
    unlocked: BTreeSet<ProcessName>,
    /// Deletion events waiting for the live snapshot to confirm them
    pending_deletions: Vec<ProcessInstance>,
    snapshot: ProcessSnapshot,
}

impl GuardState {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- registry ----

    /// Upsert a protection entry. Returns true when an existing entry was replaced.
    pub fn register(&mut self, name: ProcessName, password: Password) -> bool {
        self.registry.register(name, password)
    }

    /// Remove a protection entry. Refused while the program is queued or locked.
    pub fn unregister(&mut self, name: &ProcessName) -> Result<Password, GuardError> {
        if !self.registry.is_guarded(name) {
            return Err(GuardError::NotProtected(name.clone()));
        }
        if self.is_locked(name) {
            return Err(GuardError::ProgramLocked(name.clone()));
        }

        self.resumed.remove(name);
        self.unlocked.remove(name);
        self.pending_deletions.retain(|instance| &instance.name != name);
        self.registry
            .unregister(name)
            .ok_or_else(|| GuardError::NotProtected(name.clone()))
    }

    pub fn is_guarded(&self, name: &ProcessName) -> bool {
        self.registry.is_guarded(name)
    }

    pub fn password_for(&self, name: &ProcessName) -> Option<&Password> {
        self.registry.password_for(name)
    }

    pub fn registry(&self) -> &ProtectionRegistry {
        &self.registry
    }

    // ---- listener side ----

    pub fn replace_snapshot(&mut self, snapshot: ProcessSnapshot) {
        self.snapshot = snapshot;
    }

    pub fn snapshot(&self) -> &ProcessSnapshot {
        &self.snapshot
    }

    /// Idle -> Queued for a newly created instance of a guarded program
    pub fn observe_created(&mut self, instance: ProcessInstance) -> CreationOutcome {
        if !self.registry.is_guarded(&instance.name) {
            return CreationOutcome::Unguarded;
        }
        if contains_instance(&self.queued, &instance)
            || self.in_flight.contains(&instance)
            || contains_instance(&self.suspended, &instance)
        {
            return CreationOutcome::AlreadyTracked;
        }
        if self.resumed.contains_key(&instance.name) {
            return if push_instance(&mut self.resumed, instance) {
                CreationOutcome::SessionUnlocked
            } else {
                CreationOutcome::AlreadyTracked
            };
        }

        push_instance(&mut self.queued, instance);
        CreationOutcome::Queued
    }

    /// Record a deletion event for later confirmation against the snapshot.
    /// Returns false when nothing tracks the instance's name.
    pub fn observe_deleted(&mut self, instance: ProcessInstance) -> bool {
        let tracked = self.queued.contains_key(&instance.name)
            || self.in_flight.iter().any(|i| i.name == instance.name)
            || self.suspended.contains_key(&instance.name)
            || self.resumed.contains_key(&instance.name);
        if !tracked {
            return false;
        }
        if !self.pending_deletions.contains(&instance) {
            self.pending_deletions.push(instance);
        }
        true
    }

    /// Apply every pending deletion the current snapshot confirms.
    ///
    /// A deletion whose PID is still listed stays pending, so a snapshot that
    /// lags by a tick only delays the purge.
    pub fn reconcile_deletions(&mut self) -> Vec<Reconciliation> {
        let mut changes = Vec::new();
        let pending = std::mem::take(&mut self.pending_deletions);

        for instance in pending {
            if self.snapshot.contains(&instance) {
                self.pending_deletions.push(instance);
                continue;
            }

            if remove_instance(&mut self.queued, &instance) {
                changes.push(Reconciliation::Purged {
                    instance: instance.clone(),
                    from: Collection::Queue,
                });
            }
            if self.in_flight.remove(&instance) {
                changes.push(Reconciliation::Purged {
                    instance: instance.clone(),
                    from: Collection::InFlight,
                });
            }
            if remove_instance(&mut self.suspended, &instance) {
                if !self.suspended.contains_key(&instance.name) {
                    self.unlocked.remove(&instance.name);
                }
                changes.push(Reconciliation::Purged {
                    instance: instance.clone(),
                    from: Collection::Suspended,
                });
            }

            if !self.snapshot.contains_name(&instance.name) {
                if self.resumed.remove(&instance.name).is_some() {
                    changes.push(Reconciliation::SessionEnded(instance.name.clone()));
                }
            } else if let Some(instances) = self.resumed.get_mut(&instance.name) {
                // Keep the session open while other instances of the name run
                instances.retain(|i| i != &instance);
            }
        }

        changes
    }

    // ---- suspension side ----

    /// Move every queued instance into the in-flight claims
    pub fn claim_queued(&mut self) -> Vec<ProcessInstance> {
        let claimed = flatten(&std::mem::take(&mut self.queued));
        self.in_flight.extend(claimed.iter().cloned());
        claimed
    }

    /// Queued -> Suspended on success, back to the queue on failure
    pub fn complete_suspension(&mut self, instance: &ProcessInstance, succeeded: bool) -> SuspensionOutcome {
        if !self.in_flight.remove(instance) {
            return SuspensionOutcome::Cancelled;
        }
        if succeeded {
            push_instance(&mut self.suspended, instance.clone());
            SuspensionOutcome::Suspended
        } else {
            push_instance(&mut self.queued, instance.clone());
            SuspensionOutcome::Requeued
        }
    }

    /// Drop every trace of an instance that no longer exists, without resuming it
    pub fn forget(&mut self, instance: &ProcessInstance) -> bool {
        let mut removed = remove_instance(&mut self.queued, instance);
        removed |= self.in_flight.remove(instance);
        if remove_instance(&mut self.suspended, instance) {
            removed = true;
            if !self.suspended.contains_key(&instance.name) {
                self.unlocked.remove(&instance.name);
            }
        }
        removed
    }

    /// Union-unlock: every suspended name whose password equals `password`
    /// is marked for resumption. A mismatch changes nothing.
    pub fn submit_password(&mut self, password: &str) -> Vec<ProcessName> {
        let names: Vec<ProcessName> = self
            .suspended
            .keys()
            .filter(|name| {
                self.registry
                    .password_for(name)
                    .is_some_and(|stored| stored.matches(password))
            })
            .cloned()
            .collect();

        self.unlocked.extend(names.iter().cloned());
        names
    }

    /// Suspended instances whose name has been unlocked. They stay in the
    /// suspended set until `complete_resume` reports success.
    /// A name stays unlocked until none of its instances is suspended, so an
    /// instance suspended in the meantime is released without a new password.
    pub fn claim_unlocked(&mut self) -> Vec<ProcessInstance> {
        let suspended = &self.suspended;
        self.unlocked.retain(|name| suspended.contains_key(name));

        self.unlocked
            .iter()
            .filter_map(|name| self.suspended.get(name))
            .flatten()
            .cloned()
            .collect()
    }

    /// Every suspended instance, regardless of passwords
    pub fn claim_all_suspended(&mut self) -> Vec<ProcessInstance> {
        flatten(&self.suspended)
    }

    /// Suspended -> Resumed on success
    pub fn complete_resume(&mut self, instance: &ProcessInstance, succeeded: bool) -> ResumeOutcome {
        if !contains_instance(&self.suspended, instance) {
            return ResumeOutcome::Missing;
        }
        if !succeeded {
            return ResumeOutcome::StillSuspended;
        }

        remove_instance(&mut self.suspended, instance);
        push_instance(&mut self.resumed, instance.clone());
        if !self.suspended.contains_key(&instance.name) {
            self.unlocked.remove(&instance.name);
        }
        ResumeOutcome::Resumed
    }

    // ---- views ----

    /// Queued, being suspended, or suspended
    pub fn is_locked(&self, name: &ProcessName) -> bool {
        self.queued.contains_key(name)
            || self.suspended.contains_key(name)
            || self.in_flight.iter().any(|i| &i.name == name)
    }

    pub fn program_state(&self, name: &ProcessName) -> ProgramState {
        if self.suspended.contains_key(name) {
            ProgramState::Suspended
        } else if self.is_locked(name) {
            ProgramState::Queued
        } else if self.resumed.contains_key(name) {
            ProgramState::Resumed
        } else {
            ProgramState::Idle
        }
    }

    /// Queued instances, in-flight claims included
    pub fn queued(&self) -> Vec<ProcessInstance> {
        let mut instances = flatten(&self.queued);
        let mut in_flight: Vec<ProcessInstance> = self.in_flight.iter().cloned().collect();
        in_flight.sort();
        instances.extend(in_flight);
        instances
    }

    pub fn suspended(&self) -> Vec<ProcessInstance> {
        flatten(&self.suspended)
    }

    pub fn resumed(&self) -> Vec<ProcessInstance> {
        flatten(&self.resumed)
    }

    pub fn has_suspended(&self) -> bool {
        !self.suspended.is_empty()
    }

    pub fn pending_deletions(&self) -> &[ProcessInstance] {
        &self.pending_deletions
    }

    pub fn protected_programs(&self) -> Vec<ProtectedProgram> {
        self.registry
            .iter()
            .map(|(name, password)| ProtectedProgram {
                name: name.clone(),
                password: password.masked(),
                state: self.program_state(name),
            })
            .collect()
    }

    pub fn status(&self) -> GuardStatus {
        GuardStatus {
            protected: self.protected_programs(),
            queued: self.queued(),
            suspended: self.suspended(),
            resumed: self.resumed(),
            running_processes: self.snapshot.process_count(),
        }
    }

    /// Describe every broken invariant; empty when the state is consistent
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for instance in self.queued.values().flatten() {
            if contains_instance(&self.suspended, instance) {
                violations.push(format!("{} is both queued and suspended", instance));
            }
            if self.in_flight.contains(instance) {
                violations.push(format!("{} is both queued and in flight", instance));
            }
        }
        for instance in &self.in_flight {
            if contains_instance(&self.suspended, instance) {
                violations.push(format!("{} is both in flight and suspended", instance));
            }
        }

        let keyed = self
            .queued
            .keys()
            .chain(self.suspended.keys())
            .chain(self.resumed.keys())
            .chain(self.in_flight.iter().map(|i| &i.name));
        for name in keyed {
            if !self.registry.is_guarded(name) {
                violations.push(format!("{} is tracked but not protected", name));
            }
        }

        for (name, instances) in self.queued.iter().chain(&self.suspended) {
            if instances.is_empty() {
                violations.push(format!("{} has an empty entry", name));
            }
        }

        violations
    }
}
