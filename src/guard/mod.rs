//! Guard engine: protection registry, state machine and the two drivers

pub mod engine;
pub mod listener;
pub mod registry;
pub mod state;
pub mod suspension;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use engine::{GuardEngine, GuardTasks};
pub use listener::{ListenerDriver, ListenerReport};
pub use registry::ProtectionRegistry;
pub use state::GuardState;
pub use suspension::{SuspensionDriver, SuspensionReport};

/// Cooperative stop flag shared by the drivers, the console and signal handlers
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Underlying flag, for `signal_hook::flag::register`
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}
