//! Provider Layer
//!
//! LLM backends behind model profiles:
//! - Backend trait and the built-in echo backend
//! - Profile to backend routing
//! - Per-profile usage caps

pub mod backend;
pub mod router;
pub mod usage;

pub use backend::{BackendError, BackendResponse, EchoBackend, InvocationOptions, LlmBackend};
pub use router::{BackendFactory, BuildResult, ProviderRouter};
pub use usage::UsageMeter;
