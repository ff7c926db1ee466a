//! Platform-agnostic process control functions.

use crate::error::{AppError, Result};

/// Asks the process to shut down.
#[cfg(not(unix))]
pub fn graceful_signal(pid: u32) -> Result<()> {
    run_taskkill(pid, false)
}

/// Send a graceful shutdown signal to a process.
#[cfg(unix)]
pub fn graceful_signal(pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
        .map_err(|e| AppError::process(format!("Failed to send SIGTERM to PID {}: {}", pid, e)))
}

#[cfg(not(unix))]
pub fn force_kill(pid: u32) -> Result<()> {
    run_taskkill(pid, true)
}

#[cfg(not(unix))]
fn run_taskkill(pid: u32, force: bool) -> Result<()> {
    let pid_arg = pid.to_string();
    let mut args = vec!["/PID", pid_arg.as_str(), "/T"];
    if force {
        args.push("/F");
    }
    let output = std::process::Command::new("taskkill")
        .args(&args)
        .output()
        .map_err(|e| AppError::process(format!("Failed to run taskkill: {e}")))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.trim();
        Err(AppError::process(format!(
            "taskkill failed for pid {}: {}",
            pid,
            if detail.is_empty() {
                "(no output)"
            } else {
                detail
            }
        )))
    }
}

/// Kill the whole process group the server was spawned into.
#[cfg(unix)]
pub fn force_kill(pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::{getpgid, Pid};

    let target = Pid::from_raw(pid as i32);
    match getpgid(Some(target)) {
        Ok(pgid) => killpg(pgid, Signal::SIGKILL).map_err(|e| {
            AppError::process(format!(
                "Failed to kill process group {} (from pid {}): {}",
                pgid.as_raw(),
                pid,
                e
            ))
        }),
        Err(e) => kill(target, Signal::SIGKILL).map_err(|kill_err| {
            AppError::process(format!(
                "Failed to kill process {} (getpgid failed: {}): {}",
                pid, e, kill_err
            ))
        }),
    }
}

pub fn check_port_available(port: u16) -> Result<()> {
    std::net::TcpListener::bind(("0.0.0.0", port)).map_err(|_| AppError::port_occupied(port))?;
    Ok(())
}
