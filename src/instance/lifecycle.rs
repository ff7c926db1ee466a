//! Instance lifecycle management (start/stop/restart).

use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt as _, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::watch;

use crate::config::LauncherConfig;
use crate::error::{AppError, Result};
use crate::paths::InstanceStore;
use crate::process::{check_port_available, terminate, ProcessExit, ProcessManager};
use crate::properties::{update_setting, ServerProperties};

const PORT_KEY: &str = "server-port";

fn require_instance(store: &InstanceStore, instance_id: &str) -> Result<()> {
    if store.exists(instance_id) {
        Ok(())
    } else {
        log::error!("Server with ID {:?} not found.", instance_id);
        Err(AppError::instance_not_found(instance_id))
    }
}

/// Forward each output line to the log until the stream closes. Lines are
/// decoded lossily so the pipe stays drained whatever the server writes.
fn spawn_output_logger<R>(
    stream: R,
    instance_id: &str,
    label: &'static str,
    level: log::Level,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let instance_id = instance_id.to_string();
    let mut reader = BufReader::new(stream);
    tokio::spawn(async move {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\r', '\n']);
                    log::log!(level, "[{} {}] {}", instance_id, label, line);
                }
                Err(e) => {
                    log::warn!("Failed to read {} of server {}: {}", label, instance_id, e);
                    break;
                }
            }
        }
    });
}

/// Start the server for an instance on `port` (default from config).
///
/// Returns once the process is spawned; output is logged in the background
/// until the process exits.
pub async fn start_instance(
    config: &LauncherConfig,
    process_manager: Arc<ProcessManager>,
    instance_id: &str,
    port: Option<u16>,
) -> Result<u32> {
    let store = InstanceStore::new(&config.instances_dir);
    require_instance(&store, instance_id)?;

    if process_manager.is_running(instance_id) {
        log::error!("Server {:?} is already running.", instance_id);
        return Err(AppError::instance_running(instance_id));
    }

    let port = port.unwrap_or(config.default_port);
    check_port_available(port).inspect_err(|e| {
        log::error!("Cannot start {}: {}", instance_id, e);
    })?;

    update_setting(&store.properties_path(instance_id), PORT_KEY, port)?;

    log::info!("Starting server {:?} on port {}...", instance_id, port);

    let mut cmd = Command::new(&config.launch.program);
    cmd.args(&config.launch.args)
        .current_dir(store.path(instance_id))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(|e| {
        log::error!("Failed to start server {}: {}", instance_id, e);
        AppError::process(format!("Failed to start {}: {}", config.launch.program, e))
    })?;

    let pid = child
        .id()
        .ok_or_else(|| AppError::process("Failed to get process ID"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::process("Failed to capture stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::process("Failed to capture stderr"))?;

    let (exit_tx, exit_rx) = watch::channel(None);
    process_manager.set_process(instance_id, pid, port, exit_rx);

    spawn_output_logger(stdout, instance_id, "stdout", log::Level::Info);
    spawn_output_logger(stderr, instance_id, "stderr", log::Level::Warn);

    // The waiter task owns the child; it is the only place the process is reaped.
    let instance_id_wait = instance_id.to_string();
    let process_manager_for_wait = Arc::clone(&process_manager);
    tokio::spawn(async move {
        let exit = match child.wait().await {
            Ok(status) => ProcessExit::from(status),
            Err(e) => {
                log::error!("Failed to wait on server {}: {}", instance_id_wait, e);
                ProcessExit { code: None }
            }
        };
        log::info!(
            "Server {} process exited with code {:?}",
            instance_id_wait,
            exit.code
        );
        process_manager_for_wait.mark_exited(&instance_id_wait, pid, exit);
        let _ = exit_tx.send(Some(exit));
    });

    log::info!(
        "Instance {} started (pid: {}, port: {})",
        instance_id,
        pid,
        port
    );
    Ok(pid)
}

/// Stop the tracked server process of an instance and wait for it to exit.
///
/// Returns `None` when the instance exists but nothing is running.
pub async fn stop_instance(
    config: &LauncherConfig,
    process_manager: &ProcessManager,
    instance_id: &str,
) -> Result<Option<ProcessExit>> {
    let store = InstanceStore::new(&config.instances_dir);
    require_instance(&store, instance_id)?;

    let Some(process) = process_manager.get(instance_id) else {
        log::info!("Server {:?} is not running, nothing to stop.", instance_id);
        return Ok(None);
    };

    log::info!("Stopping server {:?} (pid {})...", instance_id, process.pid);
    let exit = terminate(instance_id, &process, config.stop_timeout())
        .await
        .inspect_err(|e| {
            log::error!("Failed to stop server {}: {}", instance_id, e);
        })?;
    log::info!("Server {:?} stopped.", instance_id);
    Ok(Some(exit))
}

/// Restart an instance, keeping its port.
///
/// The old process has fully exited before the new one is spawned.
pub async fn restart_instance(
    config: &LauncherConfig,
    process_manager: Arc<ProcessManager>,
    instance_id: &str,
) -> Result<u32> {
    let store = InstanceStore::new(&config.instances_dir);
    require_instance(&store, instance_id)?;

    log::info!("Restarting server {:?}...", instance_id);

    let port = match process_manager.get_port(instance_id) {
        Some(port) => port,
        None => ServerProperties::load(&store.properties_path(instance_id))?
            .get(PORT_KEY)
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(config.default_port),
    };

    stop_instance(config, &process_manager, instance_id).await?;
    start_instance(config, process_manager, instance_id, Some(port)).await
}
