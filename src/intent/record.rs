//! Intent records and the status state machine.

use crate::core::{now, Address, Error, Hash256, Identity, Result, Timestamp};
use serde::{Deserialize, Serialize};

/// Status of an intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum IntentStatus {
    Pending = 0,
    Accepted = 1,
    Completed = 2,
    Failed = 3,
}

impl IntentStatus {
    /// `Completed` and `Failed` are never left.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IntentStatus::Completed | IntentStatus::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: IntentStatus) -> bool {
        use IntentStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted) | (Pending, Failed) | (Accepted, Completed) | (Accepted, Failed)
        )
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentStatus::Pending => write!(f, "pending"),
            IntentStatus::Accepted => write!(f, "accepted"),
            IntentStatus::Completed => write!(f, "completed"),
            IntentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A directed, content-addressed request between two agents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub address: Address,
    pub from_agent: Address,
    pub to_agent: Address,
    /// Unique per (from, to) pair
    pub nonce: u64,
    pub status: IntentStatus,
    pub payload_hash: Hash256,
    pub payload_uri: String,
    /// Fixed at creation
    pub payment_amount: u64,
    pub payment_mint: Identity,
    /// Set iff status is `Completed`
    pub result_hash: Option<Hash256>,
    pub result_uri: Option<String>,
    /// Canonical payload bytes, cached inline
    pub payload_body: Option<Vec<u8>>,
    pub result_body: Option<String>,
    pub failure_reason: Option<String>,
    pub tokens_used: Option<u64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub bump: u8,
}

impl Intent {
    /// Copy of this intent moved to `next`.
    ///
    /// Fails with `InvalidState` for illegal transitions.
    pub fn transitioned(&self, next: IntentStatus) -> Result<Intent> {
        if !self.status.can_transition_to(next) {
            return Err(Error::invalid_state(
                self.address,
                format!("cannot move from {} to {}", self.status, next),
            ));
        }
        let mut intent = self.clone();
        intent.status = next;
        intent.updated_at = now();
        Ok(intent)
    }

    /// Copy of this intent marked `Completed` with its result.
    pub fn completed(
        &self,
        result_hash: Hash256,
        result_uri: String,
        result_body: Option<String>,
        tokens_used: Option<u64>,
    ) -> Result<Intent> {
        let mut intent = self.transitioned(IntentStatus::Completed)?;
        intent.result_hash = Some(result_hash);
        intent.result_uri = Some(result_uri);
        intent.result_body = result_body;
        intent.tokens_used = tokens_used;
        Ok(intent)
    }

    /// Copy of this intent marked `Failed` with a reason.
    pub fn failed(&self, reason: impl Into<String>) -> Result<Intent> {
        let mut intent = self.transitioned(IntentStatus::Failed)?;
        intent.failure_reason = Some(reason.into());
        Ok(intent)
    }

    pub fn involves(&self, agent: &Address) -> bool {
        self.from_agent == *agent || self.to_agent == *agent
    }

    /// Check the record-level invariants.
    pub fn check_invariants(&self) -> Result<()> {
        let completed = self.status == IntentStatus::Completed;
        if completed != self.result_hash.is_some() {
            return Err(Error::invalid_state(
                self.address,
                format!(
                    "result digest presence does not match status {}",
                    self.status
                ),
            ));
        }
        if let Some(body) = &self.payload_body {
            let actual = crate::integrity::digest_bytes(body);
            if actual != self.payload_hash {
                return Err(Error::IntegrityViolation {
                    address: self.address,
                    expected: self.payload_hash,
                    actual,
                });
            }
        }
        Ok(())
    }
}
