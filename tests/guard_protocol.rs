//! Guard protocol scenarios driven through the public drivers with
//! in-memory capabilities.

use std::sync::Arc;
use std::time::Duration;

use locker::guard::state::CreationOutcome;
use locker::guard::{GuardEngine, ListenerDriver, SuspensionDriver};
use locker::logging::GuardLogger;
use locker::models::{GuardError, GuardSettings, ProcessInstance, ProcessName, ProgramState};
use locker::platform::memory::{RecordingController, ScriptedEvents, StaticProcessSource};

struct Harness {
    engine: GuardEngine,
    events: ScriptedEvents,
    processes: StaticProcessSource,
    controller: RecordingController,
    listener: ListenerDriver,
    suspension: SuspensionDriver,
}

impl Harness {
    fn new() -> Self {
        let engine = GuardEngine::new(GuardLogger::default());
        let events = ScriptedEvents::new();
        let processes = StaticProcessSource::new();
        let controller = RecordingController::new();
        let listener = ListenerDriver::new(engine.clone(), events.clone(), processes.clone());
        let suspension = SuspensionDriver::new(engine.clone(), Arc::new(controller.clone()));
        Self {
            engine,
            events,
            processes,
            controller,
            listener,
            suspension,
        }
    }

    /// A process starts: it shows up in the process table and raises a creation event
    fn launch(&self, name: &str, pid: u32) -> ProcessInstance {
        let instance = ProcessInstance::new(name, pid);
        self.processes.add(instance.clone());
        self.events.push_created(instance.clone());
        instance
    }

    fn exit(&self, instance: &ProcessInstance) {
        self.processes.remove(instance);
        self.events.push_deleted(instance.clone());
    }

    async fn tick(&mut self) {
        self.listener.tick().await;
        self.suspension.tick().await;
    }

    async fn assert_consistent(&self) {
        let violations = self.engine.invariant_violations().await;
        assert!(violations.is_empty(), "invariants broken: {:?}", violations);
    }
}

fn names(raw: &[&str]) -> Vec<ProcessName> {
    raw.iter().map(ProcessName::new).collect()
}

#[tokio::test]
async fn test_protected_program_is_suspended_until_password() {
    let mut h = Harness::new();
    h.engine.request_protect("notepad.exe", "pw1").await.unwrap();
    let notepad = h.launch("notepad.exe", 10);

    h.tick().await;
    assert_eq!(h.engine.suspended().await, vec![notepad.clone()]);
    assert_eq!(h.engine.program_state("notepad.exe").await, ProgramState::Suspended);
    assert!(h.controller.held().contains(&notepad));

    assert_eq!(h.engine.submit_password("pw1").await, names(&["notepad.exe"]));
    h.tick().await;

    assert!(h.engine.suspended().await.is_empty());
    assert_eq!(h.engine.resumed().await, vec![notepad.clone()]);
    assert_eq!(h.controller.suspend_count(&notepad), 1);
    assert_eq!(h.controller.resume_count(&notepad), 1);
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_password_unlocks_every_program_sharing_it() {
    let mut h = Harness::new();
    h.engine.request_protect("a.exe", "shared").await.unwrap();
    h.engine.request_protect("b.exe", "shared").await.unwrap();
    h.engine.request_protect("c.exe", "y").await.unwrap();
    let a = h.launch("a.exe", 1);
    let b = h.launch("b.exe", 2);
    let c = h.launch("c.exe", 3);

    // One creation event per listener tick
    for _ in 0..3 {
        h.tick().await;
    }
    assert_eq!(h.engine.suspended().await.len(), 3);

    assert_eq!(h.engine.submit_password("shared").await, names(&["a.exe", "b.exe"]));
    h.tick().await;

    assert_eq!(h.engine.suspended().await, vec![c.clone()]);
    assert_eq!(h.controller.resume_count(&a), 1);
    assert_eq!(h.controller.resume_count(&b), 1);
    assert_eq!(h.controller.resume_count(&c), 0);
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_wrong_password_changes_nothing() {
    let mut h = Harness::new();
    h.engine.request_protect("a.exe", "secret").await.unwrap();
    let a = h.launch("a.exe", 1);
    h.tick().await;

    assert!(h.engine.submit_password("Secret").await.is_empty());
    assert!(h.engine.submit_password("").await.is_empty());
    h.tick().await;

    assert_eq!(h.engine.suspended().await, vec![a.clone()]);
    assert_eq!(h.controller.resume_count(&a), 0);
}

#[tokio::test]
async fn test_unprotected_program_is_never_touched() {
    let mut h = Harness::new();
    h.engine.request_protect("a.exe", "pw").await.unwrap();
    let calc = h.launch("calc.exe", 5);

    let report = h.listener.tick().await;
    assert_eq!(report.created.map(|(_, outcome)| outcome), Some(CreationOutcome::Unguarded));
    h.suspension.tick().await;

    assert!(h.engine.queued().await.is_empty());
    assert!(h.engine.suspended().await.is_empty());
    assert_eq!(h.controller.suspend_count(&calc), 0);
}

#[tokio::test]
async fn test_duplicate_creation_event_suspends_once() {
    let mut h = Harness::new();
    h.engine.request_protect("a.exe", "pw").await.unwrap();
    let a = h.launch("a.exe", 1);
    h.events.push_created(a.clone());

    h.tick().await;
    h.tick().await;
    h.tick().await;

    assert_eq!(h.controller.suspend_count(&a), 1);
    assert_eq!(h.engine.suspended().await, vec![a]);
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_names_match_case_insensitively() {
    let mut h = Harness::new();
    h.engine.request_protect("NOTEPAD.EXE", "pw").await.unwrap();
    h.launch("Notepad.exe", 7);

    h.tick().await;
    assert_eq!(h.engine.suspended().await, vec![ProcessInstance::new("notepad.exe", 7)]);
}

#[tokio::test]
async fn test_unlocked_session_lets_new_instances_through() {
    let mut h = Harness::new();
    h.engine.request_protect("a.exe", "pw").await.unwrap();
    h.launch("a.exe", 1);
    h.tick().await;
    h.engine.submit_password("pw").await;
    h.tick().await;

    let second = h.launch("a.exe", 2);
    let report = h.listener.tick().await;
    assert_eq!(report.created.map(|(_, outcome)| outcome), Some(CreationOutcome::SessionUnlocked));
    h.suspension.tick().await;

    assert_eq!(h.controller.suspend_count(&second), 0);
    assert_eq!(h.engine.resumed().await.len(), 2);
}

#[tokio::test]
async fn test_closing_unlocked_program_rearms_it() {
    let mut h = Harness::new();
    h.engine.request_protect("a.exe", "pw").await.unwrap();
    let first = h.launch("a.exe", 1);
    h.tick().await;
    h.engine.submit_password("pw").await;
    h.tick().await;

    h.exit(&first);
    h.tick().await;
    assert_eq!(h.engine.program_state("a.exe").await, ProgramState::Idle);
    assert!(h.engine.resumed().await.is_empty());

    let again = h.launch("a.exe", 2);
    h.tick().await;
    assert_eq!(h.engine.suspended().await, vec![again.clone()]);
    assert_eq!(h.controller.suspend_count(&again), 1);
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_failed_suspend_is_retried() {
    let mut h = Harness::new();
    h.engine.request_protect("a.exe", "pw").await.unwrap();
    let a = h.launch("a.exe", 1);
    h.controller.fail_suspend(&a, true);

    h.tick().await;
    assert_eq!(h.engine.queued().await, vec![a.clone()]);
    assert!(h.engine.suspended().await.is_empty());

    h.controller.fail_suspend(&a, false);
    h.tick().await;
    assert_eq!(h.engine.suspended().await, vec![a.clone()]);
    assert_eq!(h.controller.suspend_count(&a), 2);
}

#[tokio::test]
async fn test_failed_resume_keeps_program_suspended() {
    let mut h = Harness::new();
    h.engine.request_protect("a.exe", "pw").await.unwrap();
    let a = h.launch("a.exe", 1);
    h.tick().await;

    h.controller.fail_resume(&a, true);
    h.engine.submit_password("pw").await;
    h.tick().await;
    assert_eq!(h.engine.suspended().await, vec![a.clone()]);
    assert!(h.engine.resumed().await.is_empty());

    h.controller.fail_resume(&a, false);
    h.tick().await;
    assert!(h.engine.suspended().await.is_empty());
    assert_eq!(h.engine.resumed().await, vec![a]);
}

#[tokio::test]
async fn test_vanished_suspended_instance_is_purged() {
    let mut h = Harness::new();
    h.engine.request_protect("a.exe", "pw").await.unwrap();
    let a = h.launch("a.exe", 1);
    h.tick().await;

    h.exit(&a);
    h.tick().await;
    assert!(h.engine.suspended().await.is_empty());
    assert_eq!(h.engine.program_state("a.exe").await, ProgramState::Idle);

    assert!(h.engine.submit_password("pw").await.is_empty());
    h.tick().await;
    assert_eq!(h.controller.resume_count(&a), 0);
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_deletion_waits_for_snapshot_to_confirm() {
    let mut h = Harness::new();
    h.engine.request_protect("a.exe", "pw").await.unwrap();
    let a = h.launch("a.exe", 1);
    h.tick().await;

    // Event arrives before the process table reflects the exit
    h.events.push_deleted(a.clone());
    let report = h.listener.tick().await;
    assert_eq!(report.deleted, Some(a.clone()));
    assert!(report.reconciled.is_empty());
    assert_eq!(h.engine.suspended().await, vec![a.clone()]);

    h.processes.remove(&a);
    let report = h.listener.tick().await;
    assert_eq!(report.reconciled.len(), 1);
    assert!(h.engine.suspended().await.is_empty());
}

#[tokio::test]
async fn test_unprotect_only_when_not_locked() {
    let mut h = Harness::new();
    h.engine.request_protect("a.exe", "pw").await.unwrap();
    h.launch("a.exe", 1);
    h.tick().await;

    assert!(matches!(
        h.engine.unprotect("a.exe").await,
        Err(GuardError::ProgramLocked(_))
    ));

    h.engine.submit_password("pw").await;
    h.tick().await;
    h.engine.unprotect("a.exe").await.unwrap();
    assert!(h.engine.protected_programs().await.is_empty());
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_search_over_live_snapshot() {
    let mut h = Harness::new();
    h.processes.add(ProcessInstance::new("chrome.exe", 11));
    h.processes.add(ProcessInstance::new("chrome.exe", 12));
    h.processes.add(ProcessInstance::new("sshd", 13));
    h.tick().await;

    let hits = h.engine.search("Chrome").await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name.as_str(), "chrome.exe");
    assert_eq!(hits[0].pids, vec![11, 12]);
    assert!(h.engine.search("zzzzzzzzzzzzzzzz").await.is_empty());
}

async fn wait_for<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_running_engine_end_to_end() {
    let engine = GuardEngine::new(GuardLogger::default());
    let events = ScriptedEvents::new();
    let processes = StaticProcessSource::new();
    let controller = RecordingController::new();
    let settings = GuardSettings {
        poll_interval: Duration::from_millis(10),
        release_on_exit: false,
    };

    engine.request_protect("notepad.exe", "pw1").await.unwrap();
    let tasks = engine.start(&settings, events.clone(), processes.clone(), Arc::new(controller.clone()));

    let notepad = ProcessInstance::new("notepad.exe", 42);
    processes.add(notepad.clone());
    events.push_created(notepad.clone());

    wait_for(|| async { engine.has_suspended().await }).await;
    engine.submit_password("pw1").await;
    wait_for(|| async { !engine.resumed().await.is_empty() }).await;

    tasks.shutdown().await.unwrap();
    assert_eq!(controller.suspend_count(&notepad), 1);
    assert_eq!(controller.resume_count(&notepad), 1);
}

#[tokio::test]
async fn test_release_on_exit_resumes_locked_programs() {
    let engine = GuardEngine::new(GuardLogger::default());
    let events = ScriptedEvents::new();
    let processes = StaticProcessSource::new();
    let controller = RecordingController::new();
    let settings = GuardSettings {
        poll_interval: Duration::from_millis(10),
        release_on_exit: true,
    };

    engine.request_protect("a.exe", "pw").await.unwrap();
    let tasks = engine.start(&settings, events.clone(), processes.clone(), Arc::new(controller.clone()));
    let a = ProcessInstance::new("a.exe", 1);
    processes.add(a.clone());
    events.push_created(a.clone());

    wait_for(|| async { engine.has_suspended().await }).await;
    tasks.shutdown().await.unwrap();

    assert!(controller.held().is_empty());
    assert!(engine.suspended().await.is_empty());
}
