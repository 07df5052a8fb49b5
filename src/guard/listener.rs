//! Listener driver: keeps the live snapshot fresh and turns lifecycle events
//! into guard transitions. Performs no suspend/resume I/O.

use std::time::Duration;

use super::engine::GuardEngine;
use super::state::{CreationOutcome, Reconciliation};
use super::StopSignal;
use crate::platform::{EventSource, ProcessSource};
use crate::models::ProcessInstance;

/// What one listener tick did
#[derive(Debug, Default)]
pub struct ListenerReport {
    pub snapshot_refreshed: bool,
    pub created: Option<(ProcessInstance, CreationOutcome)>,
    /// Deletion event polled this tick, if any tracked name was affected
    pub deleted: Option<ProcessInstance>,
    pub reconciled: Vec<Reconciliation>,
}

pub struct ListenerDriver {
    engine: GuardEngine,
    events: Box<dyn EventSource>,
    processes: Box<dyn ProcessSource>,
}

impl ListenerDriver {
    pub fn new(
        engine: GuardEngine,
        events: impl EventSource + 'static,
        processes: impl ProcessSource + 'static,
    ) -> Self {
        Self {
            engine,
            events: Box::new(events),
            processes: Box::new(processes),
        }
    }

    /// Refresh the snapshot, apply at most one creation and one deletion
    /// event, then confirm pending deletions against the snapshot.
    pub async fn tick(&mut self) -> ListenerReport {
        let logger = self.engine.logger().clone();
        let mut report = ListenerReport::default();

        // Enumerate with the lock released; a failure keeps the previous snapshot
        match self.processes.list_running_processes() {
            Ok(snapshot) => {
                self.engine.lock().await.replace_snapshot(snapshot);
                report.snapshot_refreshed = true;
            }
            Err(e) => logger.log_warning(&e.to_string(), Some("keeping previous process snapshot")),
        }

        if let Some(instance) = self.events.poll_creation_event() {
            let outcome = self.engine.lock().await.observe_created(instance.clone());
            match outcome {
                CreationOutcome::Queued => logger.log_transition("queued", &instance),
                CreationOutcome::SessionUnlocked => logger.log_transition("session_unlocked", &instance),
                CreationOutcome::Unguarded | CreationOutcome::AlreadyTracked => {}
            }
            report.created = Some((instance, outcome));
        }

        if let Some(instance) = self.events.poll_deletion_event() {
            if self.engine.lock().await.observe_deleted(instance.clone()) {
                report.deleted = Some(instance);
            }
        }

        report.reconciled = self.engine.lock().await.reconcile_deletions();
        for change in &report.reconciled {
            match change {
                Reconciliation::Purged { instance, .. } => logger.log_transition("purged", instance),
                Reconciliation::SessionEnded(name) => logger.log_session_ended(name),
            }
        }

        report
    }

    /// Tick until the stop signal is set, sleeping `interval` between ticks
    pub async fn run(mut self, stop: StopSignal, interval: Duration) {
        while !stop.is_stopped() {
            self.tick().await;
            tokio::time::sleep(interval).await;
        }
        log::debug!("Listener driver stopped");
    }
}
