//! Container images built from provisioned instances.

mod engine;
mod packager;

pub use engine::ContainerEngine;
pub use packager::{render_build_descriptor, ContainerPackager};
