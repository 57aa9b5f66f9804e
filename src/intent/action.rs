//! Agent actions and the executor boundary.
//!
//! Actions arrive as a kind string plus JSON parameters and are parsed into a
//! tagged [`AgentAction`] before any permission check or execution.

use crate::agent::{Agent, Permission};
use crate::core::{now, Address, Error, Result, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action kinds understood by [`AgentAction::parse`].
pub const ACTION_KINDS: [&str; 5] = ["swap", "transfer", "stake", "lend", "vote"];

/// A side-effecting action performed by an agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentAction {
    Swap {
        input_asset: String,
        output_asset: String,
        amount: u64,
    },
    Transfer {
        asset: String,
        recipient: String,
        amount: u64,
    },
    Stake {
        protocol: String,
        amount: u64,
    },
    Lend {
        protocol: String,
        asset: String,
        amount: u64,
    },
    Vote {
        proposal: String,
        choice: String,
    },
}

impl AgentAction {
    /// Parse `kind` and its parameters, attributing errors to `agent`.
    ///
    /// Unknown kinds fail with `UnsupportedAction`; malformed parameters with
    /// `InvalidArgument`.
    pub fn parse(agent: &Address, kind: &str, params: Value) -> Result<Self> {
        if !ACTION_KINDS.contains(&kind) {
            return Err(Error::UnsupportedAction {
                address: *agent,
                action: kind.to_string(),
            });
        }
        let Value::Object(mut fields) = params else {
            return Err(Error::invalid_argument(
                Some(*agent),
                format!("{kind} parameters must be an object"),
            ));
        };
        fields.insert("action".into(), Value::String(kind.to_string()));

        let action: AgentAction = serde_json::from_value(Value::Object(fields))
            .map_err(|e| Error::invalid_argument(Some(*agent), format!("{kind}: {e}")))?;
        action.validate(agent)?;
        Ok(action)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AgentAction::Swap { .. } => "swap",
            AgentAction::Transfer { .. } => "transfer",
            AgentAction::Stake { .. } => "stake",
            AgentAction::Lend { .. } => "lend",
            AgentAction::Vote { .. } => "vote",
        }
    }

    /// The permission an agent must hold to perform this action.
    pub fn required_permission(&self) -> Permission {
        match self {
            AgentAction::Swap { .. } => Permission::CAN_SWAP,
            AgentAction::Transfer { .. } => Permission::CAN_TRANSFER,
            AgentAction::Stake { .. } => Permission::CAN_STAKE,
            AgentAction::Lend { .. } => Permission::CAN_LEND,
            AgentAction::Vote { .. } => Permission::CAN_VOTE,
        }
    }

    fn validate(&self, agent: &Address) -> Result<()> {
        let reject = |reason: &str| Err(Error::invalid_argument(Some(*agent), reason));
        match self {
            AgentAction::Swap {
                input_asset,
                output_asset,
                amount,
            } => {
                if input_asset.is_empty() || output_asset.is_empty() {
                    return reject("swap assets must be non-empty");
                }
                if input_asset == output_asset {
                    return reject("swap input and output assets must differ");
                }
                require_amount(agent, *amount)
            }
            AgentAction::Transfer {
                asset,
                recipient,
                amount,
            } => {
                if asset.is_empty() || recipient.is_empty() {
                    return reject("transfer asset and recipient must be non-empty");
                }
                require_amount(agent, *amount)
            }
            AgentAction::Stake { protocol, amount } => {
                if protocol.is_empty() {
                    return reject("stake protocol must be non-empty");
                }
                require_amount(agent, *amount)
            }
            AgentAction::Lend {
                protocol,
                asset,
                amount,
            } => {
                if protocol.is_empty() || asset.is_empty() {
                    return reject("lend protocol and asset must be non-empty");
                }
                require_amount(agent, *amount)
            }
            AgentAction::Vote { proposal, choice } => {
                if proposal.is_empty() || choice.is_empty() {
                    return reject("vote proposal and choice must be non-empty");
                }
                Ok(())
            }
        }
    }
}

fn require_amount(agent: &Address, amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(Error::invalid_argument(Some(*agent), "amount must be positive"));
    }
    Ok(())
}

/// Outcome reported by an [`ActionExecutor`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReceipt {
    pub agent: Address,
    pub action: String,
    /// Venue-specific reference, e.g. a transaction signature
    pub reference: String,
    pub executed_at: Timestamp,
}

impl ActionReceipt {
    pub fn new(agent: Address, action: &AgentAction, reference: impl Into<String>) -> Self {
        Self {
            agent,
            action: action.kind().to_string(),
            reference: reference.into(),
            executed_at: now(),
        }
    }
}

/// External venue performing agent actions.
///
/// Only called after the agent's permission for the action has been checked.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, agent: &Agent, action: &AgentAction) -> Result<ActionReceipt>;
}
