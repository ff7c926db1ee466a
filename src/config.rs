use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::paths::{default_data_dir, ARTIFACT_FILE};

pub const DEFAULT_MANIFEST_URL: &str =
    "https://launchermeta.mojang.com/mc/game/version_manifest.json";
pub const DEFAULT_VERSION: &str = "1.21.8";
pub const DEFAULT_PORT: u16 = 25565;
pub const DEFAULT_MAX_PLAYERS: u32 = 20;

/// Load the launcher config from `path`, writing defaults if the file is missing.
pub fn load_config(path: &Path) -> Result<LauncherConfig> {
    if !path.exists() {
        let config = LauncherConfig::default();
        save_config(path, &config)?;
        return Ok(config);
    }
    let content = fs::read_to_string(path).map_err(|e| AppError::config(e.to_string()))?;
    toml::from_str(&content).map_err(|e| AppError::config(e.to_string()))
}

pub fn save_config(path: &Path, config: &LauncherConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| AppError::config(e.to_string()))?;
    }
    let content = toml::to_string_pretty(config).map_err(|e| AppError::config(e.to_string()))?;
    fs::write(path, content).map_err(|e| AppError::config(e.to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default = "default_instances_dir")]
    pub instances_dir: PathBuf,
    #[serde(default = "default_manifest_url")]
    pub manifest_url: String,
    #[serde(default = "default_version")]
    pub default_version: String,
    #[serde(default = "default_port")]
    pub default_port: u16,
    #[serde(default = "default_max_players")]
    pub default_max_players: u32,
    #[serde(default)]
    pub launch: LaunchConfig,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
}

fn default_instances_dir() -> PathBuf {
    default_data_dir().join("instances")
}

fn default_manifest_url() -> String {
    DEFAULT_MANIFEST_URL.to_string()
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_players() -> u32 {
    DEFAULT_MAX_PLAYERS
}

fn default_http_timeout() -> u64 {
    30
}

fn default_download_timeout() -> u64 {
    600
}

fn default_stop_timeout() -> u64 {
    30
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            instances_dir: default_instances_dir(),
            manifest_url: default_manifest_url(),
            default_version: default_version(),
            default_port: DEFAULT_PORT,
            default_max_players: DEFAULT_MAX_PLAYERS,
            launch: LaunchConfig::default(),
            container: ContainerConfig::default(),
            http_timeout_secs: default_http_timeout(),
            download_timeout_secs: default_download_timeout(),
            stop_timeout_secs: default_stop_timeout(),
        }
    }
}

impl LauncherConfig {
    /// Defaults rooted at a specific instances directory.
    pub fn with_instances_dir(instances_dir: impl Into<PathBuf>) -> Self {
        Self {
            instances_dir: instances_dir.into(),
            ..Self::default()
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

/// How the server runtime is launched, both on the host and inside images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            program: "java".to_string(),
            args: [
                "-Xmx1024M",
                "-Xms1024M",
                "-jar",
                ARTIFACT_FILE,
                "nogui",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl LaunchConfig {
    /// Program followed by its arguments.
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_base_image")]
    pub base_image: String,
    #[serde(default = "default_workdir")]
    pub workdir: String,
    #[serde(default = "default_build_timeout")]
    pub build_timeout_secs: u64,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_engine() -> String {
    "docker".to_string()
}

fn default_base_image() -> String {
    "openjdk:21-jdk-slim".to_string()
}

fn default_workdir() -> String {
    "/app".to_string()
}

fn default_build_timeout() -> u64 {
    600
}

fn default_command_timeout() -> u64 {
    60
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            base_image: default_base_image(),
            workdir: default_workdir(),
            build_timeout_secs: default_build_timeout(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("launcher.toml");

        let config = load_config(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.default_version, DEFAULT_VERSION);
        assert_eq!(config.default_port, 25565);
        assert_eq!(config.container.engine, "docker");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launcher.toml");
        fs::write(
            &path,
            "default_version = \"1.20.4\"\n\n[container]\nengine = \"podman\"\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.default_version, "1.20.4");
        assert_eq!(config.container.engine, "podman");
        assert_eq!(config.container.base_image, "openjdk:21-jdk-slim");
        assert_eq!(config.default_max_players, 20);
    }

    #[test]
    fn save_then_load_keeps_launch_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launcher.toml");
        let mut config = LauncherConfig::with_instances_dir(dir.path().join("instances"));
        config.launch.args = vec!["-Xmx2G".into(), "-jar".into(), "server.jar".into()];
        save_config(&path, &config).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.launch, config.launch);
        assert_eq!(loaded.instances_dir, dir.path().join("instances"));
    }

    #[test]
    fn garbage_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launcher.toml");
        fs::write(&path, "default_port = \"nope\"").unwrap();

        let err = load_config(&path).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }

    #[test]
    fn default_command_line_matches_server_invocation() {
        assert_eq!(
            LaunchConfig::default().command_line(),
            vec!["java", "-Xmx1024M", "-Xms1024M", "-jar", "server.jar", "nogui"]
        );
    }
}
