//! Identity Layer
//!
//! Provides wallet identities and record addressing:
//! - Ed25519 wallet key pairs
//! - Deterministic, off-curve address derivation

pub mod address;
pub mod crypto;

pub use address::{
    agent_address, derive, intent_address, model_profile_address, DerivedAddress,
    AGENT_NAMESPACE, INTENT_NAMESPACE, MODEL_PROFILE_NAMESPACE,
};
pub use crypto::Keypair;
