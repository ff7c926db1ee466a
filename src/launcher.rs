//! Entry point tying config, HTTP client and process tracking together.

use std::sync::Arc;

use reqwest::Client;

use crate::config::LauncherConfig;
use crate::container::ContainerPackager;
use crate::error::{AppError, Result};
use crate::instance::{self, CreateOptions, InstanceState, InstanceStatus};
use crate::manifest::{self, VersionDescriptor};
use crate::paths::InstanceStore;
use crate::process::{ProcessExit, ProcessManager};

/// Manages the server instances under one instances directory.
pub struct Launcher {
    config: LauncherConfig,
    client: Client,
    process_manager: Arc<ProcessManager>,
}

impl Launcher {
    pub fn new(config: LauncherConfig) -> Result<Self> {
        // Only connects are bounded here; each request sets its own deadline.
        let client = Client::builder()
            .connect_timeout(config.http_timeout())
            .build()
            .map_err(|e| AppError::transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: LauncherConfig, client: Client) -> Self {
        Self {
            config,
            client,
            process_manager: Arc::new(ProcessManager::new()),
        }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn store(&self) -> InstanceStore {
        InstanceStore::new(&self.config.instances_dir)
    }

    pub fn process_manager(&self) -> &Arc<ProcessManager> {
        &self.process_manager
    }

    pub async fn resolve_version(&self, version: &str) -> Result<VersionDescriptor> {
        manifest::resolve_version(
            &self.client,
            &self.config.manifest_url,
            version,
            self.config.http_timeout(),
        )
        .await
    }

    pub async fn create(&self, options: CreateOptions) -> Result<String> {
        instance::create_instance(&self.config, &self.client, options).await
    }

    /// Spawn the server; returns its pid.
    pub async fn start(&self, instance_id: &str, port: Option<u16>) -> Result<u32> {
        instance::start_instance(
            &self.config,
            Arc::clone(&self.process_manager),
            instance_id,
            port,
        )
        .await
    }

    pub async fn stop(&self, instance_id: &str) -> Result<Option<ProcessExit>> {
        instance::stop_instance(&self.config, &self.process_manager, instance_id).await
    }

    pub async fn restart(&self, instance_id: &str) -> Result<u32> {
        instance::restart_instance(&self.config, Arc::clone(&self.process_manager), instance_id)
            .await
    }

    pub async fn delete(&self, instance_id: &str) -> Result<()> {
        instance::delete_instance(&self.config, &self.process_manager, instance_id).await
    }

    pub fn status(&self, instance_id: &str) -> InstanceState {
        instance::instance_state(&self.store(), &self.process_manager, instance_id)
    }

    pub fn list(&self) -> Result<Vec<InstanceStatus>> {
        instance::list_instances(&self.config, &self.process_manager)
    }

    pub fn containers(&self) -> ContainerPackager {
        ContainerPackager::new(&self.config)
    }

    /// Stop every server this launcher started.
    pub async fn shutdown(&self) {
        log::info!("Launcher shutting down, stopping all instances...");
        self.process_manager
            .stop_all(self.config.stop_timeout())
            .await;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::properties::ServerProperties;
    use crate::error::ErrorKind;
    use crate::test_support::{stalled_server, test_client, test_config, StubServer};

    #[tokio::test]
    async fn full_lifecycle() {
        let stub = StubServer::with_versions(&["1.21.8"]).await;
        let dir = tempfile::tempdir().unwrap();
        let launcher =
            Launcher::with_client(test_config(dir.path(), stub.manifest_url()), test_client());

        assert_eq!(launcher.status("t1"), InstanceState::Absent);
        launcher
            .create(CreateOptions::new("Hello").id("t1"))
            .await
            .unwrap();
        assert_eq!(launcher.status("t1"), InstanceState::Provisioned);

        launcher.start("t1", Some(25566)).await.unwrap();
        assert_eq!(launcher.status("t1"), InstanceState::Running);
        let props =
            ServerProperties::load(&launcher.store().properties_path("t1")).unwrap();
        assert_eq!(props.get("server-port"), Some("25566"));
        assert_eq!(props.get("motd"), Some("Hello"));

        let listed = launcher.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].port, Some(25566));

        launcher.stop("t1").await.unwrap();
        assert_eq!(launcher.status("t1"), InstanceState::Stopped);

        launcher.start("t1", Some(25566)).await.unwrap();
        launcher.delete("t1").await.unwrap();
        assert_eq!(launcher.status("t1"), InstanceState::Absent);
        assert!(!launcher.store().path("t1").exists());
    }

    #[tokio::test]
    async fn shutdown_stops_everything() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Launcher::with_client(test_config(dir.path(), String::new()), test_client());
        for id in ["a", "b"] {
            launcher.store().create(id).unwrap();
            launcher.start(id, Some(0)).await.unwrap();
        }

        launcher.shutdown().await;

        assert!(launcher.process_manager().get_tracked_ids().is_empty());
        assert_eq!(launcher.status("a"), InstanceState::Stopped);
        assert_eq!(launcher.status("b"), InstanceState::Stopped);
    }

    #[tokio::test]
    async fn resolve_goes_through_configured_manifest() {
        let stub = StubServer::with_versions(&["1.21.8"]).await;
        let dir = tempfile::tempdir().unwrap();
        let launcher =
            Launcher::with_client(test_config(dir.path(), stub.manifest_url()), test_client());

        let descriptor = launcher.resolve_version("1.21.8").await.unwrap();
        assert_eq!(descriptor.download_url, stub.artifact_url("1.21.8"));
        assert!(launcher
            .resolve_version("9.9.9")
            .await
            .unwrap_err()
            .kind()
            .is_not_found());
    }

    #[tokio::test]
    async fn resolve_gives_up_on_stalled_manifest_host() {
        let (url, _server) = stalled_server().await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path(), url);
        config.http_timeout_secs = 1;
        let launcher = Launcher::with_client(config, test_client());

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            launcher.resolve_version("1.21.8"),
        )
        .await
        .expect("lookup should give up on its own");
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Timeout);
    }
}
