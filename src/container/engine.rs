//! CLI wrapper around a Docker-compatible container engine.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::config::ContainerConfig;
use crate::error::{AppError, Result};

/// Why an engine invocation failed, before it is mapped to an error kind.
#[derive(Debug)]
enum RunFailure {
    /// The engine binary could not be executed at all.
    Spawn(std::io::Error),
    TimedOut(Duration),
    /// Non-zero exit; carries trimmed stderr.
    Exit(String),
}

/// Container engine driven through its command line (`docker`, `podman`, ...).
#[derive(Debug, Clone)]
pub struct ContainerEngine {
    program: String,
    build_timeout: Duration,
    command_timeout: Duration,
}

impl ContainerEngine {
    pub fn new(config: &ContainerConfig) -> Self {
        Self {
            program: config.engine.clone(),
            build_timeout: Duration::from_secs(config.build_timeout_secs),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the engine with `args` and return stdout.
    async fn run(
        &self,
        args: &[&str],
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> std::result::Result<String, RunFailure> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(RunFailure::Spawn(e)),
            Err(_) => return Err(RunFailure::TimedOut(timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(RunFailure::Exit(detail));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Map a failure of a plain engine command (`run`, `stop`, ...).
    fn command_error(&self, args: &[&str], failure: RunFailure) -> AppError {
        let command = format!("{} {}", self.program, args.join(" "));
        match failure {
            RunFailure::Spawn(e) => AppError::engine_unavailable(&self.program, e.to_string()),
            RunFailure::TimedOut(t) => AppError::timeout(&command, t.as_secs()),
            RunFailure::Exit(detail) => AppError::engine_command(&command, detail),
        }
    }

    async fn run_command(&self, args: &[&str]) -> Result<String> {
        self.run(args, None, self.command_timeout)
            .await
            .map_err(|failure| self.command_error(args, failure))
    }

    /// Check the engine is installed and its daemon answers.
    pub async fn ping(&self) -> Result<()> {
        match self.run(&["info"], None, self.command_timeout).await {
            Ok(_) => Ok(()),
            Err(RunFailure::Spawn(e)) => {
                Err(AppError::engine_unavailable(&self.program, e.to_string()))
            }
            Err(RunFailure::TimedOut(t)) => Err(AppError::engine_unavailable(
                &self.program,
                format!("no answer within {}s", t.as_secs()),
            )),
            Err(RunFailure::Exit(detail)) => Err(AppError::engine_unavailable(&self.program, detail)),
        }
    }

    /// Build `context` into an image tagged `tag`.
    pub async fn build(&self, context: &Path, tag: &str) -> Result<()> {
        let output = self
            .run(&["build", "-t", tag, "."], Some(context), self.build_timeout)
            .await
            .map_err(|failure| match failure {
                RunFailure::Spawn(e) => AppError::engine_unavailable(&self.program, e.to_string()),
                RunFailure::TimedOut(t) => AppError::timeout("image build", t.as_secs()),
                RunFailure::Exit(detail) => AppError::build(tag, detail),
            })?;
        log::debug!("Build output: {}", output);
        Ok(())
    }

    /// Start a detached container publishing `port` on the same host port.
    pub async fn run_detached(&self, name: &str, image: &str, port: u16) -> Result<String> {
        let publish = format!("{port}:{port}");
        let output = self
            .run_command(&["run", "-d", "-p", &publish, "--name", name, image])
            .await?;
        Ok(output.trim().to_string())
    }

    pub async fn stop(&self, name: &str) -> Result<()> {
        self.run_command(&["stop", name]).await.map(drop)
    }

    pub async fn restart(&self, name: &str) -> Result<()> {
        self.run_command(&["restart", name]).await.map(drop)
    }

    pub async fn remove(&self, name: &str) -> Result<()> {
        self.run_command(&["rm", name]).await.map(drop)
    }
}
