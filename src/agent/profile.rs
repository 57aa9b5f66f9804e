//! Model profiles: which LLM an agent uses and under what limits.

use crate::core::{now, Address, Error, Identity, Result, Timestamp};
use crate::identity::model_profile_address;
use serde::{Deserialize, Serialize};

/// Longest accepted profile label, in bytes.
pub const MAX_LABEL_LEN: usize = 64;
/// Longest accepted provider locator, in bytes.
pub const MAX_PROVIDER_URI_LEN: usize = 200;

/// 16-byte discriminator distinguishing profiles of one owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileId(pub [u8; 16]);

impl ProfileId {
    /// A random discriminator.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }
}

/// LLM configuration record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub address: Address,
    pub owner_wallet: Identity,
    pub profile_id: ProfileId,
    pub label: String,
    /// Locator of the backend, e.g. `echo://` or `https://...`
    pub provider_uri: String,
    /// Price in micro-units per 1000 tokens
    pub pricing: u64,
    pub billing_wallet: Identity,
    /// 0 means uncapped
    pub max_tokens_per_day: u64,
    /// 0 means uncapped
    pub max_requests_per_min: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub bump: u8,
}

impl ModelProfile {
    /// Build a new profile record for `owner`.
    pub fn new(owner: Identity, params: NewModelProfile) -> Result<Self> {
        let derived = model_profile_address(&owner, &params.profile_id.0);
        validate_label(&derived.address, &params.label)?;
        validate_provider_uri(&derived.address, &params.provider_uri)?;
        let created = now();
        Ok(Self {
            address: derived.address,
            owner_wallet: owner,
            profile_id: params.profile_id,
            label: params.label,
            provider_uri: params.provider_uri,
            pricing: params.pricing,
            billing_wallet: params.billing_wallet.unwrap_or(owner),
            max_tokens_per_day: params.max_tokens_per_day,
            max_requests_per_min: params.max_requests_per_min,
            created_at: created,
            updated_at: created,
            bump: derived.bump,
        })
    }

    /// Scheme of the provider locator (`"echo"` for `echo://model`).
    pub fn provider_scheme(&self) -> Option<&str> {
        self.provider_uri
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .filter(|scheme| !scheme.is_empty())
    }

    /// Cost of `tokens` at this profile's price, rounded up.
    pub fn cost_for(&self, tokens: u64) -> u64 {
        let total = u128::from(tokens) * u128::from(self.pricing);
        u64::try_from(total.div_ceil(1000)).unwrap_or(u64::MAX)
    }

    /// Apply a partial update, returning the new record.
    pub fn updated(&self, update: &ModelProfileUpdate) -> Result<Self> {
        let mut next = self.clone();
        if let Some(label) = &update.label {
            validate_label(&self.address, label)?;
            next.label = label.clone();
        }
        if let Some(uri) = &update.provider_uri {
            validate_provider_uri(&self.address, uri)?;
            next.provider_uri = uri.clone();
        }
        if let Some(pricing) = update.pricing {
            next.pricing = pricing;
        }
        if let Some(wallet) = update.billing_wallet {
            next.billing_wallet = wallet;
        }
        if let Some(tokens) = update.max_tokens_per_day {
            next.max_tokens_per_day = tokens;
        }
        if let Some(requests) = update.max_requests_per_min {
            next.max_requests_per_min = requests;
        }
        next.updated_at = now();
        Ok(next)
    }
}

/// Parameters for creating a model profile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewModelProfile {
    pub profile_id: ProfileId,
    pub label: String,
    pub provider_uri: String,
    pub pricing: u64,
    /// Defaults to the owner
    pub billing_wallet: Option<Identity>,
    pub max_tokens_per_day: u64,
    pub max_requests_per_min: u64,
}

impl NewModelProfile {
    /// Uncapped, free profile with a random discriminator.
    pub fn new(label: &str, provider_uri: &str) -> Self {
        Self {
            profile_id: ProfileId::random(),
            label: label.to_string(),
            provider_uri: provider_uri.to_string(),
            pricing: 0,
            billing_wallet: None,
            max_tokens_per_day: 0,
            max_requests_per_min: 0,
        }
    }

    pub fn with_pricing(mut self, pricing: u64) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_limits(mut self, max_tokens_per_day: u64, max_requests_per_min: u64) -> Self {
        self.max_tokens_per_day = max_tokens_per_day;
        self.max_requests_per_min = max_requests_per_min;
        self
    }
}

/// Partial update of a model profile.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelProfileUpdate {
    pub label: Option<String>,
    pub provider_uri: Option<String>,
    pub pricing: Option<u64>,
    pub billing_wallet: Option<Identity>,
    pub max_tokens_per_day: Option<u64>,
    pub max_requests_per_min: Option<u64>,
}

fn validate_label(address: &Address, label: &str) -> Result<()> {
    if label.trim().is_empty() {
        return Err(Error::invalid_argument(Some(*address), "label is empty"));
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(Error::invalid_argument(
            Some(*address),
            format!("label is {} bytes, limit is {}", label.len(), MAX_LABEL_LEN),
        ));
    }
    Ok(())
}

fn validate_provider_uri(address: &Address, uri: &str) -> Result<()> {
    if uri.len() > MAX_PROVIDER_URI_LEN {
        return Err(Error::invalid_argument(
            Some(*address),
            format!(
                "provider_uri is {} bytes, limit is {}",
                uri.len(),
                MAX_PROVIDER_URI_LEN
            ),
        ));
    }
    Ok(())
}
