//! Deterministic address derivation.
//!
//! An address is the SHA3-256 of the namespace and every seed, in order and
//! each length-prefixed, followed by a one-byte bump and a fixed domain tag.
//! Bumps are tried from 255 downwards and the first candidate that is not an
//! Ed25519 curve point wins, so derived addresses never have a private key.

use crate::core::{Address, Identity};
use crate::identity::crypto::{is_on_curve, sha3_256_multi};
use serde::{Deserialize, Serialize};

/// Namespace for agent identity records.
pub const AGENT_NAMESPACE: &str = "agent";
/// Namespace for model profile records.
pub const MODEL_PROFILE_NAMESPACE: &str = "model_profile";
/// Namespace for intent records.
pub const INTENT_NAMESPACE: &str = "intent";

const DERIVATION_DOMAIN: &[u8] = b"agent-mesh/derived-address";

/// A derived address together with its bump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DerivedAddress {
    pub address: Address,
    pub bump: u8,
}

/// Compute the candidate address for one bump value.
///
/// Returns `None` when the candidate lies on the curve.
pub fn create(namespace: &str, seeds: &[&[u8]], bump: u8) -> Option<Address> {
    let candidate = candidate(namespace, seeds, bump);
    if is_on_curve(candidate.as_bytes()) {
        None
    } else {
        Some(candidate)
    }
}

/// Derive the address for `namespace` and ordered `seeds`.
pub fn derive(namespace: &str, seeds: &[&[u8]]) -> DerivedAddress {
    (0..=u8::MAX)
        .rev()
        .find_map(|bump| create(namespace, seeds, bump).map(|address| DerivedAddress { address, bump }))
        // Every bump landing on the curve has probability 2^-256.
        .unwrap_or_else(|| DerivedAddress {
            address: candidate(namespace, seeds, 0),
            bump: 0,
        })
}

/// Check that `bump` proves `address` for the given inputs.
pub fn verify(namespace: &str, seeds: &[&[u8]], bump: u8, address: &Address) -> bool {
    derive(namespace, seeds) == DerivedAddress {
        address: *address,
        bump,
    }
}

/// Address of the agent controlled by `owner`.
pub fn agent_address(owner: &Identity) -> DerivedAddress {
    derive(AGENT_NAMESPACE, &[owner.as_ref()])
}

/// Address of the model profile `profile_id` owned by `owner`.
pub fn model_profile_address(owner: &Identity, profile_id: &[u8; 16]) -> DerivedAddress {
    derive(MODEL_PROFILE_NAMESPACE, &[owner.as_ref(), profile_id])
}

/// Address of the intent `from -> to` with the given nonce.
///
/// The nonce is encoded as exactly eight big-endian bytes.
pub fn intent_address(from: &Address, to: &Address, nonce: u64) -> DerivedAddress {
    derive(
        INTENT_NAMESPACE,
        &[from.as_ref(), to.as_ref(), &nonce.to_be_bytes()],
    )
}

fn candidate(namespace: &str, seeds: &[&[u8]], bump: u8) -> Address {
    let namespace_len = (namespace.len() as u32).to_be_bytes();
    let seed_lens: Vec<[u8; 4]> = seeds
        .iter()
        .map(|seed| (seed.len() as u32).to_be_bytes())
        .collect();
    let bump = [bump];

    let mut chunks: Vec<&[u8]> = Vec::with_capacity(4 + seeds.len() * 2);
    chunks.push(&namespace_len);
    chunks.push(namespace.as_bytes());
    for (len, seed) in seed_lens.iter().zip(seeds) {
        chunks.push(len);
        chunks.push(seed);
    }
    chunks.push(&bump);
    chunks.push(DERIVATION_DOMAIN);

    Address::new(*sha3_256_multi(&chunks).as_bytes())
}
