//! Lifecycle manager for self-hosted game server instances.
//!
//! Each instance is a directory under the configured instances root holding
//! the server artifact, the EULA marker and `server.properties`. The
//! [`Launcher`] creates instances from the public version manifest, runs them
//! as tracked child processes, and [`ContainerPackager`] turns them into
//! container images.
//!
//! Logging goes through the `log` facade; install any logger to see it.

pub mod config;
pub mod container;
mod download;
mod error;
pub mod instance;
mod launcher;
pub mod manifest;
pub mod paths;
pub mod process;
pub mod properties;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use config::{load_config, save_config, ContainerConfig, LaunchConfig, LauncherConfig};
pub use container::{ContainerEngine, ContainerPackager};
pub use download::fetch_artifact;
pub use error::{AppError, ErrorKind, Result};
pub use instance::{CreateOptions, InstanceState, InstanceStatus};
pub use launcher::Launcher;
pub use manifest::{resolve_version, VersionDescriptor};
pub use paths::InstanceStore;
pub use process::{ProcessExit, ProcessManager, RuntimeEvent, RuntimeEventReason};
pub use properties::ServerProperties;
