//! Packaging provisioned instances as container images.

use crate::config::{ContainerConfig, LaunchConfig, LauncherConfig};
use crate::error::{AppError, Result};
use crate::paths::InstanceStore;
use crate::validation::{validate_image_name, validate_instance_id};

use super::engine::ContainerEngine;

/// Render the build recipe: base image, workdir, full-context copy and the
/// same launch command used for host processes.
pub fn render_build_descriptor(container: &ContainerConfig, launch: &LaunchConfig) -> String {
    let cmd = serde_json::to_string(&launch.command_line()).unwrap_or_else(|_| "[]".to_string());
    format!(
        "FROM {}\nWORKDIR {}\nCOPY . .\nCMD {}\n",
        container.base_image, container.workdir, cmd
    )
}

/// Builds images from instances and manages the containers run from them.
/// Containers are named after the instance id.
#[derive(Debug, Clone)]
pub struct ContainerPackager {
    store: InstanceStore,
    engine: ContainerEngine,
    container: ContainerConfig,
    launch: LaunchConfig,
}

impl ContainerPackager {
    pub fn new(config: &LauncherConfig) -> Self {
        Self {
            store: InstanceStore::new(&config.instances_dir),
            engine: ContainerEngine::new(&config.container),
            container: config.container.clone(),
            launch: config.launch.clone(),
        }
    }

    pub fn engine(&self) -> &ContainerEngine {
        &self.engine
    }

    /// Build an image from the instance directory. `image` defaults to the
    /// id lowercased, since image names may not contain uppercase letters.
    pub async fn build_image(&self, instance_id: &str, image: Option<&str>) -> Result<String> {
        let image = image.map_or_else(|| instance_id.to_ascii_lowercase(), str::to_string);
        log::info!(
            "Converting server {:?} to container with image {:?}...",
            instance_id,
            image
        );

        if !self.store.exists(instance_id) {
            log::error!("Server with ID {:?} not found.", instance_id);
            return Err(AppError::instance_not_found(instance_id));
        }
        validate_image_name(&image)?;

        self.engine.ping().await.inspect_err(|e| {
            log::error!(
                "{} is not installed or its daemon is not running: {}",
                self.engine.program(),
                e
            );
        })?;

        let descriptor = render_build_descriptor(&self.container, &self.launch);
        let descriptor_path = self.store.build_descriptor_path(instance_id);
        std::fs::write(&descriptor_path, descriptor).map_err(|e| {
            AppError::io(format!("Failed to write {:?}: {}", descriptor_path, e))
        })?;

        self.engine
            .build(&self.store.path(instance_id), &image)
            .await
            .inspect_err(|e| log::error!("Failed to build image {}: {}", image, e))?;

        log::info!("Image {:?} built successfully.", image);
        Ok(image)
    }

    pub async fn start_container(&self, instance_id: &str, image: &str, port: u16) -> Result<()> {
        validate_instance_id(instance_id)?;
        validate_image_name(image)?;
        log::info!("Starting container for server {:?}...", instance_id);

        let container_id = self
            .engine
            .run_detached(instance_id, image, port)
            .await
            .inspect_err(|e| log::error!("Failed to start container: {}", e))?;

        log::info!(
            "Container for server {:?} started ({}).",
            instance_id,
            container_id
        );
        Ok(())
    }

    pub async fn stop_container(&self, instance_id: &str) -> Result<()> {
        validate_instance_id(instance_id)?;
        log::info!("Stopping container for server {:?}...", instance_id);
        self.engine
            .stop(instance_id)
            .await
            .inspect_err(|e| log::error!("Failed to stop container: {}", e))?;
        log::info!("Container for server {:?} stopped.", instance_id);
        Ok(())
    }

    pub async fn restart_container(&self, instance_id: &str) -> Result<()> {
        validate_instance_id(instance_id)?;
        log::info!("Restarting container for server {:?}...", instance_id);
        self.engine
            .restart(instance_id)
            .await
            .inspect_err(|e| log::error!("Failed to restart container: {}", e))?;
        log::info!("Container for server {:?} restarted.", instance_id);
        Ok(())
    }

    pub async fn delete_container(&self, instance_id: &str) -> Result<()> {
        validate_instance_id(instance_id)?;
        log::info!("Deleting container for server {:?}...", instance_id);
        self.engine
            .remove(instance_id)
            .await
            .inspect_err(|e| log::error!("Failed to delete container: {}", e))?;
        log::info!("Container for server {:?} deleted.", instance_id);
        Ok(())
    }
}
