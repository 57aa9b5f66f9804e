//! Core utilities and common types for Agent Mesh.

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::{BlobConfig, CoordinatorConfig, MeshConfig};
pub use error::{Error, ErrorKind, RecordKind, Result};
pub use events::{EventBus, MeshEvent};
pub use types::*;
