//! Job-control signal suspend/resume for unix targets
//!
//! SIGSTOP halts every thread of the target's thread group at once and SIGCONT
//! continues them, so one signal per process covers all of its OS threads.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use super::{PlatformError, SuspendController};
use crate::models::ProcessInstance;

#[derive(Debug, Default, Clone, Copy)]
pub struct SignalController;

impl SignalController {
    pub fn new() -> Self {
        Self
    }

    fn send(
        &self,
        instance: &ProcessInstance,
        signal: Signal,
        operation: &'static str,
    ) -> Result<(), PlatformError> {
        let signal_error = |reason: String| PlatformError::Signal {
            operation,
            name: instance.name.to_string(),
            pid: instance.pid,
            reason,
        };

        // PID 0 would address our own process group
        if instance.pid == 0 || instance.pid == std::process::id() {
            return Err(signal_error("refusing to signal this PID".to_string()));
        }
        let raw = i32::try_from(instance.pid)
            .map_err(|_| signal_error("PID out of range".to_string()))?;

        match kill(Pid::from_raw(raw), signal) {
            Ok(()) => {
                log::debug!("Sent {} to {}", signal, instance);
                Ok(())
            }
            Err(Errno::ESRCH) => Err(PlatformError::ProcessGone(instance.pid)),
            Err(errno) => Err(signal_error(errno.desc().to_string())),
        }
    }
}

impl SuspendController for SignalController {
    fn suspend(&self, instance: &ProcessInstance) -> Result<(), PlatformError> {
        self.send(instance, Signal::SIGSTOP, "suspend")
    }

    fn resume(&self, instance: &ProcessInstance) -> Result<(), PlatformError> {
        self.send(instance, Signal::SIGCONT, "resume")
    }
}
