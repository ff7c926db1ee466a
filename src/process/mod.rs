//! Process management utilities.

mod control;
mod manager;

use std::process::ExitStatus;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

pub use control::{check_port_available, force_kill, graceful_signal};
pub use manager::ProcessManager;

/// How long to wait for the exit event after a force kill.
const FORCE_KILL_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeEventReason {
    ProcessTracked,
    ProcessExited,
    ProcessRemoved,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeEvent {
    pub instance_id: String,
    pub reason: RuntimeEventReason,
}

/// Outcome of a server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessExit {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// A running server process tracked for one instance.
#[derive(Debug, Clone)]
pub struct InstanceProcess {
    pub pid: u32,
    pub port: u16,
    /// Resolves to `Some` once the owning waiter task has reaped the child.
    pub(crate) exit: watch::Receiver<Option<ProcessExit>>,
}

impl InstanceProcess {
    pub(crate) fn new(pid: u32, port: u16, exit: watch::Receiver<Option<ProcessExit>>) -> Self {
        Self { pid, port, exit }
    }

    pub fn has_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }

    /// Wait for the exit event, giving up after `timeout`.
    pub async fn wait_for_exit(&self, timeout: Duration) -> Option<ProcessExit> {
        let mut rx = self.exit.clone();
        let exit = match tokio::time::timeout(timeout, rx.wait_for(Option::is_some)).await {
            Ok(Ok(exit)) => *exit,
            // Waiter task went away without reporting; the child is gone with it.
            Ok(Err(_)) => Some(ProcessExit { code: None }),
            Err(_) => None,
        };
        exit
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceRuntimeSnapshot {
    pub running: bool,
    pub pid: Option<u32>,
    pub port: Option<u16>,
    pub last_exit: Option<ProcessExit>,
}

/// Terminate `process`: SIGTERM, wait up to `timeout`, then SIGKILL the
/// process group. Returns the observed exit.
pub async fn terminate(
    instance_id: &str,
    process: &InstanceProcess,
    timeout: Duration,
) -> crate::error::Result<ProcessExit> {
    if !process.has_exited() {
        if let Err(e) = graceful_signal(process.pid) {
            log::warn!(
                "Graceful signal failed for instance {} (pid {}): {}",
                instance_id,
                process.pid,
                e
            );
        }
    }

    if let Some(exit) = process.wait_for_exit(timeout).await {
        return Ok(exit);
    }

    log::warn!(
        "Instance {} (pid {}) did not exit within {}s, force killing",
        instance_id,
        process.pid,
        timeout.as_secs()
    );
    if !process.has_exited() {
        force_kill(process.pid)?;
    }

    process.wait_for_exit(FORCE_KILL_WAIT).await.ok_or_else(|| {
        crate::error::AppError::process(format!(
            "Instance {} (pid {}) survived SIGKILL",
            instance_id, process.pid
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_for_exit_reports_sent_exit() {
        let (tx, rx) = watch::channel(None);
        let process = InstanceProcess::new(1, 25565, rx);

        assert_eq!(process.wait_for_exit(Duration::from_millis(50)).await, None);
        assert!(!process.has_exited());

        tx.send(Some(ProcessExit { code: Some(0) })).unwrap();
        assert_eq!(
            process.wait_for_exit(Duration::from_secs(1)).await,
            Some(ProcessExit { code: Some(0) })
        );
    }

    #[tokio::test]
    async fn lost_waiter_counts_as_exit() {
        let (tx, rx) = watch::channel(None);
        let process = InstanceProcess::new(1, 25565, rx);
        drop(tx);

        assert_eq!(
            process.wait_for_exit(Duration::from_secs(1)).await,
            Some(ProcessExit { code: None })
        );
    }
}
