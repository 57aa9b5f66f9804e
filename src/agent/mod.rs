//! Agent Layer
//!
//! Agent identities and their LLM configuration:
//! - Capability permission masks
//! - Agent and model profile records
//! - Registry with owner-authorized updates

pub mod permission;
pub mod profile;
pub mod record;
pub mod registry;

pub use permission::{Permission, PermissionSet};
pub use profile::{ModelProfile, ModelProfileUpdate, NewModelProfile, ProfileId};
pub use record::{Agent, AgentUpdate, RegisterAgent};
pub use registry::Registry;
