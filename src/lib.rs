//! # Agent Mesh - Permissioned Intent Coordination
//!
//! Coordinates autonomous agents exchanging payment-bearing requests:
//! - **Identity**: deterministic derived addresses for agents, profiles and intents
//! - **Agents**: capability permissions and model profiles
//! - **Intents**: the `Pending -> Accepted -> Completed | Failed` state machine
//! - **Integrity**: canonical JSON digests over payloads and results
//! - **Providers**: routing accepted intents to LLM backends
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agent_mesh::agent::{NewModelProfile, Permission, RegisterAgent, Registry};
//! use agent_mesh::core::{BlobConfig, EventBus, Identity};
//! use agent_mesh::identity::Keypair;
//! use agent_mesh::intent::{ActionExecutor, ActionReceipt, AgentAction, IntentCoordinator};
//! use agent_mesh::provider::ProviderRouter;
//! use agent_mesh::store::{MemoryBlobStore, MemoryStore};
//! use std::sync::Arc;
//!
//! struct Venue;
//!
//! #[async_trait::async_trait]
//! impl ActionExecutor for Venue {
//!     async fn execute(
//!         &self,
//!         agent: &agent_mesh::agent::Agent,
//!         action: &AgentAction,
//!     ) -> agent_mesh::Result<ActionReceipt> {
//!         Ok(ActionReceipt::new(agent.address, action, "tx"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> agent_mesh::Result<()> {
//!     let registry = Arc::new(Registry::new(Arc::new(MemoryStore::new()), EventBus::default()));
//!     let alice = registry
//!         .register_agent(
//!             Keypair::generate().identity(),
//!             RegisterAgent::default().with_permissions(Permission::CAN_CREATE_INTENT),
//!         )
//!         .await?;
//!     let bob_owner = Keypair::generate().identity();
//!     let profile = registry
//!         .create_model_profile(bob_owner, NewModelProfile::new("echo", "echo://"))
//!         .await?;
//!     let bob = registry
//!         .register_agent(
//!             bob_owner,
//!             RegisterAgent::default()
//!                 .with_permissions(Permission::CAN_ACCEPT_INTENT)
//!                 .with_model_profile(profile.address),
//!         )
//!         .await?;
//!
//!     let coordinator = IntentCoordinator::new(
//!         registry,
//!         Arc::new(MemoryBlobStore::new(&BlobConfig::default())),
//!         Arc::new(ProviderRouter::new()),
//!         Arc::new(Venue),
//!     );
//!     let payload = serde_json::json!({"question": "price of SOL?"});
//!     let intent = coordinator
//!         .create_intent(&alice.address, &bob.address, payload, 0, Identity::zero())
//!         .await?;
//!     coordinator.accept_intent(&intent.address, &bob.address).await?;
//!     let done = coordinator.process_intent(&intent.address).await?;
//!     println!("result: {:?}", done.result_body);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod core;
pub mod identity;
pub mod integrity;
pub mod intent;
pub mod monitoring;
pub mod provider;
pub mod store;

pub use core::error::{Error, Result};
