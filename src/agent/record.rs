//! Agent identity records.

use crate::agent::permission::{Permission, PermissionSet};
use crate::core::{now, Address, Error, Identity, Result, Timestamp};
use crate::identity::agent_address;
use serde::{Deserialize, Serialize};

/// Longest accepted metadata locator, in bytes.
pub const MAX_METADATA_URI_LEN: usize = 200;

/// An agent identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Derived from the owner wallet
    pub address: Address,
    /// Controls configuration
    pub owner_wallet: Identity,
    /// Executes actions; may equal the owner
    pub agent_wallet: Identity,
    /// Model profile used to fulfil intents
    pub model_profile: Option<Address>,
    /// Metadata locator
    pub metadata_uri: String,
    pub permissions: PermissionSet,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub bump: u8,
}

impl Agent {
    /// Build a new agent record for `owner`.
    pub fn new(owner: Identity, params: RegisterAgent) -> Result<Self> {
        let derived = agent_address(&owner);
        validate_metadata_uri(&derived.address, &params.metadata_uri)?;
        let created = now();
        Ok(Self {
            address: derived.address,
            owner_wallet: owner,
            agent_wallet: params.agent_wallet.unwrap_or(owner),
            model_profile: params.model_profile,
            metadata_uri: params.metadata_uri,
            permissions: params.permissions,
            created_at: created,
            updated_at: created,
            bump: derived.bump,
        })
    }

    /// Whether this agent holds `flag`.
    pub fn can(&self, flag: Permission) -> bool {
        self.permissions.has(flag)
    }

    /// Fail with `PermissionDenied` unless this agent holds `flag`.
    pub fn require(&self, flag: Permission) -> Result<()> {
        if self.can(flag) {
            Ok(())
        } else {
            Err(Error::permission_denied(
                self.address,
                format!("missing {flag}"),
            ))
        }
    }

    /// Apply a partial update, returning the new record.
    pub fn updated(&self, update: &AgentUpdate) -> Result<Self> {
        let mut next = self.clone();
        if let Some(wallet) = update.agent_wallet {
            next.agent_wallet = wallet;
        }
        if let Some(profile) = update.model_profile {
            next.model_profile = profile;
        }
        if let Some(uri) = &update.metadata_uri {
            validate_metadata_uri(&self.address, uri)?;
            next.metadata_uri = uri.clone();
        }
        if let Some(perms) = update.permissions {
            next.permissions = perms;
        }
        next.updated_at = now();
        Ok(next)
    }
}

/// Parameters for registering an agent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RegisterAgent {
    /// Acting wallet; defaults to the owner
    pub agent_wallet: Option<Identity>,
    pub model_profile: Option<Address>,
    pub metadata_uri: String,
    pub permissions: PermissionSet,
}

impl RegisterAgent {
    pub fn with_permissions(mut self, permissions: impl Into<PermissionSet>) -> Self {
        self.permissions = permissions.into();
        self
    }

    pub fn with_model_profile(mut self, profile: Address) -> Self {
        self.model_profile = Some(profile);
        self
    }

    pub fn with_agent_wallet(mut self, wallet: Identity) -> Self {
        self.agent_wallet = Some(wallet);
        self
    }

    pub fn with_metadata_uri(mut self, uri: &str) -> Self {
        self.metadata_uri = uri.to_string();
        self
    }
}

/// Partial update of an agent; `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentUpdate {
    pub agent_wallet: Option<Identity>,
    /// `Some(None)` clears the profile
    pub model_profile: Option<Option<Address>>,
    pub metadata_uri: Option<String>,
    pub permissions: Option<PermissionSet>,
}

fn validate_metadata_uri(address: &Address, uri: &str) -> Result<()> {
    if uri.len() > MAX_METADATA_URI_LEN {
        return Err(Error::invalid_argument(
            Some(*address),
            format!(
                "metadata_uri is {} bytes, limit is {}",
                uri.len(),
                MAX_METADATA_URI_LEN
            ),
        ));
    }
    Ok(())
}
