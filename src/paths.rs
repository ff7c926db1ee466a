//! On-disk layout of server instances.
//!
//! An instance is a directory named after its id under the instances root.
//! Directory presence is the only record of whether an instance exists.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::validation::validate_instance_id;

/// Server binary inside an instance directory.
pub const ARTIFACT_FILE: &str = "server.jar";
/// License acceptance marker.
pub const EULA_FILE: &str = "eula.txt";
/// Server settings file.
pub const PROPERTIES_FILE: &str = "server.properties";
/// Generated container build recipe.
pub const BUILD_DESCRIPTOR_FILE: &str = "Dockerfile";

/// Get the root data directory for the launcher (~/.mcserver_launcher).
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mcserver_launcher")
}

/// Maps instance ids to directories under a root.
#[derive(Debug, Clone)]
pub struct InstanceStore {
    root: PathBuf,
}

impl InstanceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for `id`. Does not touch the filesystem.
    pub fn path(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    pub fn exists(&self, id: &str) -> bool {
        validate_instance_id(id).is_ok() && self.path(id).is_dir()
    }

    /// Create the directory for a new instance.
    pub fn create(&self, id: &str) -> Result<PathBuf> {
        validate_instance_id(id)?;

        fs::create_dir_all(&self.root)
            .map_err(|e| AppError::io(format!("Failed to create instances dir: {}", e)))?;

        let dir = self.path(id);
        // create_dir (not create_dir_all) so a concurrent create of the same id loses
        match fs::create_dir(&dir) {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(AppError::already_exists(id))
            }
            Err(e) => Err(AppError::io(format!(
                "Failed to create instance dir {:?}: {}",
                dir, e
            ))),
        }
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        if !self.exists(id) {
            return Err(AppError::instance_not_found(id));
        }
        let dir = self.path(id);
        fs::remove_dir_all(&dir)
            .map_err(|e| AppError::io(format!("Failed to remove instance dir {:?}: {}", dir, e)))
    }

    /// Ids of every instance directory, sorted.
    pub fn ids(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_instance_id(name).is_ok() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn artifact_path(&self, id: &str) -> PathBuf {
        self.path(id).join(ARTIFACT_FILE)
    }

    pub fn properties_path(&self, id: &str) -> PathBuf {
        self.path(id).join(PROPERTIES_FILE)
    }

    pub fn eula_path(&self, id: &str) -> PathBuf {
        self.path(id).join(EULA_FILE)
    }

    pub fn build_descriptor_path(&self, id: &str) -> PathBuf {
        self.path(id).join(BUILD_DESCRIPTOR_FILE)
    }
}
