//! Suspension driver: the only component calling the suspend/resume primitive.
//!
//! Each tick suspends everything queued, then resumes everything unlocked.
//! Work is claimed under the engine lock and the primitive runs with the lock
//! released, so a slow call never stalls the listener or the console.

use std::sync::Arc;
use std::time::Duration;

use super::engine::GuardEngine;
use super::state::{ResumeOutcome, SuspensionOutcome};
use super::StopSignal;
use crate::models::ProcessInstance;
use crate::platform::{PlatformError, SuspendController};

/// What one suspension tick did
#[derive(Debug, Default)]
pub struct SuspensionReport {
    pub suspended: Vec<ProcessInstance>,
    pub resumed: Vec<ProcessInstance>,
    /// Instances whose primitive call failed and will be retried
    pub retrying: Vec<ProcessInstance>,
    /// Instances dropped because their process is gone
    pub gone: Vec<ProcessInstance>,
}

pub struct SuspensionDriver {
    engine: GuardEngine,
    controller: Arc<dyn SuspendController>,
}

impl SuspensionDriver {
    pub fn new(engine: GuardEngine, controller: Arc<dyn SuspendController>) -> Self {
        Self { engine, controller }
    }

    pub async fn tick(&self) -> SuspensionReport {
        let mut report = SuspensionReport::default();
        self.suspend_queued(&mut report).await;

        let unlocked = self.engine.lock().await.claim_unlocked();
        self.resume_instances(unlocked, &mut report).await;

        debug_assert!(self.engine.lock().await.invariant_violations().is_empty());
        report
    }

    async fn suspend_queued(&self, report: &mut SuspensionReport) {
        let logger = self.engine.logger();
        let claimed = self.engine.lock().await.claim_queued();

        for instance in claimed {
            let result = self.controller.suspend(&instance);

            let outcome = {
                let mut state = self.engine.lock().await;
                match &result {
                    Err(PlatformError::ProcessGone(_)) => {
                        state.forget(&instance);
                        None
                    }
                    other => Some(state.complete_suspension(&instance, other.is_ok())),
                }
            };

            match (outcome, result) {
                (None, _) => {
                    logger.log_transition("purged", &instance);
                    report.gone.push(instance);
                }
                (Some(SuspensionOutcome::Suspended), _) => {
                    logger.log_transition("suspended", &instance);
                    report.suspended.push(instance);
                }
                (Some(SuspensionOutcome::Cancelled), Ok(())) => {
                    // Purged while the call was in flight: nothing may stay stopped
                    if let Err(e) = self.controller.resume(&instance) {
                        logger.log_error(&e.to_string(), Some("releasing purged instance"));
                    }
                }
                (Some(SuspensionOutcome::Cancelled), Err(_)) => {}
                (Some(SuspensionOutcome::Requeued), result) => {
                    if let Err(e) = result {
                        logger.log_error(&e.to_string(), Some("suspend will be retried next tick"));
                    }
                    report.retrying.push(instance);
                }
            }
        }
    }

    async fn resume_instances(&self, instances: Vec<ProcessInstance>, report: &mut SuspensionReport) {
        let logger = self.engine.logger();

        for instance in instances {
            let result = self.controller.resume(&instance);

            let outcome = {
                let mut state = self.engine.lock().await;
                match &result {
                    Err(PlatformError::ProcessGone(_)) => {
                        state.forget(&instance);
                        None
                    }
                    other => Some(state.complete_resume(&instance, other.is_ok())),
                }
            };

            match (outcome, result) {
                (None, _) => {
                    logger.log_transition("purged", &instance);
                    report.gone.push(instance);
                }
                (Some(ResumeOutcome::Resumed), _) => {
                    logger.log_transition("resumed", &instance);
                    report.resumed.push(instance);
                }
                (Some(ResumeOutcome::StillSuspended), result) => {
                    if let Err(e) = result {
                        logger.log_error(&e.to_string(), Some("resume will be retried next tick"));
                    }
                    report.retrying.push(instance);
                }
                (Some(ResumeOutcome::Missing), _) => {}
            }
        }
    }

    /// Resume every suspended instance regardless of passwords
    pub async fn release_all(&self) -> SuspensionReport {
        let mut report = SuspensionReport::default();
        let instances = self.engine.lock().await.claim_all_suspended();
        self.resume_instances(instances, &mut report).await;
        report
    }

    /// Tick until the stop signal is set, sleeping `interval` between ticks.
    /// With `release_on_exit`, every suspended program is resumed on the way out.
    pub async fn run(self, stop: StopSignal, interval: Duration, release_on_exit: bool) {
        while !stop.is_stopped() {
            self.tick().await;
            tokio::time::sleep(interval).await;
        }

        if release_on_exit {
            let report = self.release_all().await;
            if !report.retrying.is_empty() {
                self.engine.logger().log_error(
                    &format!("{} program(s) could not be resumed", report.retrying.len()),
                    Some("release on exit"),
                );
            }
        }
        log::debug!("Suspension driver stopped");
    }
}
