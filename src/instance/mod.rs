//! Server instance management.
//!
//! Layout under the instances root:
//! - {id}/server.jar - downloaded server artifact
//! - {id}/eula.txt - license acceptance marker
//! - {id}/server.properties - server settings
//! - {id}/Dockerfile - written when the instance is packaged as an image

mod crud;
mod lifecycle;
mod types;

// Re-export types
pub use types::{CreateOptions, InstanceState, InstanceStatus};

// Re-export CRUD operations
pub use crud::{create_instance, delete_instance, instance_state, list_instances};

// Re-export lifecycle
pub use lifecycle::{restart_instance, start_instance, stop_instance};
