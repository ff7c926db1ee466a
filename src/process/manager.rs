//! Instance process tracking.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use tokio::sync::{broadcast, watch};

use super::{
    terminate, InstanceProcess, InstanceRuntimeSnapshot, ProcessExit, RuntimeEvent,
    RuntimeEventReason,
};

/// Manages running instance processes.
///
/// Each running instance maps to exactly one tracked process. The `Child`
/// itself is owned by the waiter task spawned at start; the manager keeps
/// the pid and the exit channel.
pub struct ProcessManager {
    processes: RwLock<HashMap<String, InstanceProcess>>,
    exits: RwLock<HashMap<String, ProcessExit>>,
    runtime_events: broadcast::Sender<RuntimeEvent>,
}

impl ProcessManager {
    pub fn new() -> Self {
        let (runtime_events, _) = broadcast::channel(128);

        Self {
            processes: RwLock::new(HashMap::new()),
            exits: RwLock::new(HashMap::new()),
            runtime_events,
        }
    }

    pub fn subscribe_runtime_events(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.runtime_events.subscribe()
    }

    fn emit_runtime_event(&self, instance_id: &str, reason: RuntimeEventReason) {
        let _ = self.runtime_events.send(RuntimeEvent {
            instance_id: instance_id.to_string(),
            reason,
        });
    }

    /// Check if an instance has a live tracked process.
    pub fn is_running(&self, instance_id: &str) -> bool {
        let procs = self.processes.read().unwrap_or_else(|e| e.into_inner());
        procs
            .get(instance_id)
            .map(|info| !info.has_exited())
            .unwrap_or(false)
    }

    /// Start tracking a freshly spawned process.
    pub(crate) fn set_process(
        &self,
        instance_id: &str,
        pid: u32,
        port: u16,
        exit: watch::Receiver<Option<ProcessExit>>,
    ) {
        let mut procs = self.processes.write().unwrap_or_else(|e| e.into_inner());
        procs.insert(instance_id.to_string(), InstanceProcess::new(pid, port, exit));
        drop(procs);
        self.exits
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(instance_id);
        self.emit_runtime_event(instance_id, RuntimeEventReason::ProcessTracked);
    }

    pub fn get(&self, instance_id: &str) -> Option<InstanceProcess> {
        let procs = self.processes.read().unwrap_or_else(|e| e.into_inner());
        procs.get(instance_id).cloned()
    }

    /// Get the port for an instance.
    pub fn get_port(&self, instance_id: &str) -> Option<u16> {
        let procs = self.processes.read().unwrap_or_else(|e| e.into_inner());
        procs.get(instance_id).map(|info| info.port)
    }

    /// Record that the process `expected_pid` of an instance exited.
    ///
    /// A newer process tracked under the same id is left alone.
    pub(crate) fn mark_exited(&self, instance_id: &str, expected_pid: u32, exit: ProcessExit) {
        let mut procs = self.processes.write().unwrap_or_else(|e| e.into_inner());
        let matches = procs
            .get(instance_id)
            .map(|info| info.pid == expected_pid)
            .unwrap_or(false);
        if !matches {
            return;
        }
        procs.remove(instance_id);
        drop(procs);

        self.exits
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(instance_id.to_string(), exit);
        self.emit_runtime_event(instance_id, RuntimeEventReason::ProcessExited);
    }

    pub fn last_exit(&self, instance_id: &str) -> Option<ProcessExit> {
        let exits = self.exits.read().unwrap_or_else(|e| e.into_inner());
        exits.get(instance_id).copied()
    }

    /// Drop everything known about an instance.
    pub fn forget(&self, instance_id: &str) {
        let removed = self
            .processes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(instance_id);
        self.exits
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(instance_id);
        if removed.is_some() {
            self.emit_runtime_event(instance_id, RuntimeEventReason::ProcessRemoved);
        }
    }

    pub fn snapshot(&self, instance_id: &str) -> InstanceRuntimeSnapshot {
        let process = self.get(instance_id);
        let running = process.as_ref().map(|p| !p.has_exited()).unwrap_or(false);
        InstanceRuntimeSnapshot {
            running,
            pid: process.as_ref().map(|p| p.pid),
            port: process.as_ref().map(|p| p.port),
            last_exit: self.last_exit(instance_id),
        }
    }

    /// Get the IDs of all currently tracked instances.
    pub fn get_tracked_ids(&self) -> Vec<String> {
        let procs = self.processes.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = procs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stop all running instances with graceful shutdown.
    pub async fn stop_all(&self, timeout: Duration) {
        let entries: Vec<(String, InstanceProcess)> = {
            let procs = self.processes.read().unwrap_or_else(|e| e.into_inner());
            procs
                .iter()
                .map(|(id, info)| (id.clone(), info.clone()))
                .collect()
        };

        let stops = entries.iter().map(|(id, info)| async move {
            log::info!(
                "Stopping instance {} (pid: {}, port: {})",
                id,
                info.pid,
                info.port
            );
            if let Err(e) = terminate(id, info, timeout).await {
                log::error!("Failed to stop instance {}: {}", id, e);
            }
        });
        futures_util::future::join_all(stops).await;
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}
