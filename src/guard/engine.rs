//! Guard engine: shared handle over the guard state
//!
//! Cloning the engine is cheap; every clone sees the same state. The console,
//! the listener driver and the suspension driver each hold one.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

use super::listener::ListenerDriver;
use super::state::GuardState;
use super::suspension::SuspensionDriver;
use super::StopSignal;
use crate::logging::GuardLogger;
use crate::models::{
    GuardError, GuardSettings, GuardStatus, Password, ProcessInstance, ProcessMatch, ProcessName,
    ProcessSnapshot, ProgramState, ProtectedProgram,
};
use crate::platform::{EventSource, ProcessSource, SuspendController};
use crate::search;

#[derive(Clone)]
pub struct GuardEngine {
    state: Arc<Mutex<GuardState>>,
    logger: GuardLogger,
}

impl GuardEngine {
    pub fn new(logger: GuardLogger) -> Self {
        Self {
            state: Arc::new(Mutex::new(GuardState::new())),
            logger,
        }
    }

    pub fn logger(&self) -> &GuardLogger {
        &self.logger
    }

    /// Take the state lock for a single transition
    pub(crate) async fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().await
    }

    /// Register or replace a protection entry; returns the normalized name
    pub async fn request_protect(&self, name: &str, password: &str) -> Result<ProcessName, GuardError> {
        let name = ProcessName::new(name);
        if name.is_empty() {
            return Err(GuardError::EmptyName);
        }

        let replaced = self.lock().await.register(name.clone(), Password::new(password));
        self.logger.log_protected(&name, replaced);
        Ok(name)
    }

    pub async fn unprotect(&self, name: &str) -> Result<(), GuardError> {
        let name = ProcessName::new(name);
        self.lock().await.unregister(&name)?;
        self.logger.log_unprotected(&name);
        Ok(())
    }

    /// Unlock every suspended program whose password equals `password`.
    /// Returns the unlocked names; empty on a mismatch.
    pub async fn submit_password(&self, password: &str) -> Vec<ProcessName> {
        let names = self.lock().await.submit_password(password);
        self.logger.log_unlock(&names);
        names
    }

    pub async fn live_snapshot(&self) -> ProcessSnapshot {
        self.lock().await.snapshot().clone()
    }

    pub async fn queued(&self) -> Vec<ProcessInstance> {
        self.lock().await.queued()
    }

    pub async fn suspended(&self) -> Vec<ProcessInstance> {
        self.lock().await.suspended()
    }

    pub async fn resumed(&self) -> Vec<ProcessInstance> {
        self.lock().await.resumed()
    }

    pub async fn has_suspended(&self) -> bool {
        self.lock().await.has_suspended()
    }

    pub async fn program_state(&self, name: &str) -> ProgramState {
        self.lock().await.program_state(&ProcessName::new(name))
    }

    pub async fn protected_programs(&self) -> Vec<ProtectedProgram> {
        self.lock().await.protected_programs()
    }

    pub async fn status(&self) -> GuardStatus {
        self.lock().await.status()
    }

    /// Fuzzy search over the cached live snapshot
    pub async fn search(&self, query: &str) -> Vec<ProcessMatch> {
        let state = self.lock().await;
        search::search_matches(query, state.snapshot())
    }

    pub async fn invariant_violations(&self) -> Vec<String> {
        self.lock().await.invariant_violations()
    }

    /// Spawn the listener and suspension drivers on the current tokio runtime
    pub fn start(
        &self,
        settings: &GuardSettings,
        events: impl EventSource + 'static,
        processes: impl ProcessSource + 'static,
        controller: Arc<dyn SuspendController>,
    ) -> GuardTasks {
        let stop = StopSignal::new();

        let listener = ListenerDriver::new(self.clone(), events, processes);
        let suspension = SuspensionDriver::new(self.clone(), controller);

        let listener = tokio::spawn(listener.run(stop.clone(), settings.poll_interval));
        let suspension = tokio::spawn(suspension.run(
            stop.clone(),
            settings.poll_interval,
            settings.release_on_exit,
        ));

        GuardTasks {
            stop,
            listener,
            suspension,
        }
    }
}

/// Handles of the running drivers
pub struct GuardTasks {
    stop: StopSignal,
    listener: JoinHandle<()>,
    suspension: JoinHandle<()>,
}

impl GuardTasks {
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Signal both drivers and wait for them to finish their current tick
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.stop.stop();
        self.listener.await?;
        self.suspension.await?;
        Ok(())
    }
}
