//! Instance CRUD operations.

use std::path::Path;

use reqwest::Client;

use super::types::{CreateOptions, InstanceState, InstanceStatus};
use crate::config::LauncherConfig;
use crate::download::fetch_artifact;
use crate::error::{AppError, Result};
use crate::manifest::resolve_version;
use crate::paths::{InstanceStore, EULA_FILE, PROPERTIES_FILE};
use crate::process::{terminate, ProcessManager};
use crate::properties::ServerProperties;
use crate::validation::validate_motd;

fn generate_instance_id() -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    format!("minecraft-server-{}", &token[..6])
}

struct Settings<'a> {
    motd: &'a str,
    max_players: u32,
    hardcore: bool,
}

/// Create a new instance: reserve its directory, download the server and
/// write the initial settings. On failure the directory is removed again.
pub async fn create_instance(
    config: &LauncherConfig,
    client: &Client,
    options: CreateOptions,
) -> Result<String> {
    let motd = validate_motd(options.motd.as_deref()).inspect_err(|e| {
        log::error!("Refusing to create instance: {}", e);
    })?;

    let id = options.id.clone().unwrap_or_else(generate_instance_id);
    let version = options
        .version
        .clone()
        .unwrap_or_else(|| config.default_version.clone());
    let settings = Settings {
        motd,
        max_players: options.max_players.unwrap_or(config.default_max_players),
        hardcore: options.hardcore,
    };

    let store = InstanceStore::new(&config.instances_dir);
    let instance_dir = store.create(&id).inspect_err(|e| {
        log::error!("Failed to create instance {}: {}", id, e);
    })?;

    match provision(config, client, &instance_dir, &version, &settings).await {
        Ok(()) => {
            log::info!("Created server {:?} at {:?}", id, instance_dir);
            Ok(id)
        }
        Err(e) => {
            log::error!("Provisioning {} failed, rolling back: {}", id, e);
            if let Err(rm_err) = std::fs::remove_dir_all(&instance_dir) {
                log::warn!(
                    "Failed to remove partial instance directory {:?}: {}",
                    instance_dir,
                    rm_err
                );
            }
            Err(e)
        }
    }
}

async fn provision(
    config: &LauncherConfig,
    client: &Client,
    instance_dir: &Path,
    version: &str,
    settings: &Settings<'_>,
) -> Result<()> {
    let descriptor =
        resolve_version(client, &config.manifest_url, version, config.http_timeout()).await?;

    fetch_artifact(client, &descriptor, instance_dir, config.download_timeout()).await?;

    std::fs::write(instance_dir.join(EULA_FILE), "eula=true\n")
        .map_err(|e| AppError::io(format!("Failed to write {}: {}", EULA_FILE, e)))?;

    let mut props = ServerProperties::default();
    props.set("motd", settings.motd);
    props.set("max-players", settings.max_players);
    props.set("hardcore", settings.hardcore);
    props.save(&instance_dir.join(PROPERTIES_FILE))
}

/// Delete an instance, stopping its server first if one is tracked.
pub async fn delete_instance(
    config: &LauncherConfig,
    process_manager: &ProcessManager,
    instance_id: &str,
) -> Result<()> {
    let store = InstanceStore::new(&config.instances_dir);
    if !store.exists(instance_id) {
        log::error!("Server with ID {:?} not found.", instance_id);
        return Err(AppError::instance_not_found(instance_id));
    }

    log::info!("Deleting server {:?}...", instance_id);

    if let Some(process) = process_manager.get(instance_id) {
        if !process.has_exited() {
            log::info!(
                "Instance {} is still running (pid {}), stopping before delete",
                instance_id,
                process.pid
            );
            terminate(instance_id, &process, config.stop_timeout()).await?;
        }
    }

    store.remove(instance_id).inspect_err(|e| {
        log::error!("Failed to delete server {}: {}", instance_id, e);
    })?;
    process_manager.forget(instance_id);

    log::info!("Server {:?} deleted.", instance_id);
    Ok(())
}

pub fn instance_state(
    store: &InstanceStore,
    process_manager: &ProcessManager,
    instance_id: &str,
) -> InstanceState {
    if !store.exists(instance_id) {
        InstanceState::Absent
    } else if process_manager.is_running(instance_id) {
        InstanceState::Running
    } else if process_manager.last_exit(instance_id).is_some() {
        InstanceState::Stopped
    } else {
        InstanceState::Provisioned
    }
}

/// List all instances with their running status.
pub fn list_instances(
    config: &LauncherConfig,
    process_manager: &ProcessManager,
) -> Result<Vec<InstanceStatus>> {
    let store = InstanceStore::new(&config.instances_dir);

    Ok(store
        .ids()?
        .into_iter()
        .map(|id| {
            let snapshot = process_manager.snapshot(&id);
            let state = instance_state(&store, process_manager, &id);
            InstanceStatus {
                state,
                pid: snapshot.pid.filter(|_| snapshot.running),
                port: snapshot.port.filter(|_| snapshot.running),
                last_exit_code: snapshot.last_exit.and_then(|exit| exit.code),
                id,
            }
        })
        .collect())
}
