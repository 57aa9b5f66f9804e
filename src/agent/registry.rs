//! Registry of agents and model profiles.
//!
//! Owner operations are read-modify-write under a single writer lock so two
//! updates to the same record never clobber each other's fields.

use crate::agent::profile::{ModelProfile, ModelProfileUpdate, NewModelProfile};
use crate::agent::record::{Agent, AgentUpdate, RegisterAgent};
use crate::core::{Address, Error, EventBus, Identity, MeshEvent, RecordKind, Result};
use crate::intent::{Intent, IntentStatus};
use crate::store::{Predicate, RecordStore};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Agent and model profile registry.
pub struct Registry {
    store: Arc<dyn RecordStore>,
    events: EventBus,
    writer: Mutex<()>,
}

impl Registry {
    pub fn new(store: Arc<dyn RecordStore>, events: EventBus) -> Self {
        Self {
            store,
            events,
            writer: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Hold off owner updates until the guard drops.
    ///
    /// Intents leaving `Pending` take this so the agent wallet lock check in
    /// `update_agent` cannot interleave with the transition.
    pub(crate) async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    // Agents

    /// Full-record replace.
    pub async fn put_agent(&self, agent: Agent) -> Result<()> {
        self.store.put_agent(agent).await
    }

    pub async fn get_agent(&self, address: &Address) -> Result<Agent> {
        self.store
            .get_agent(address)
            .await?
            .ok_or(Error::NotFound {
                kind: RecordKind::Agent,
                address: *address,
            })
    }

    pub async fn list_agents(&self, filter: Predicate<'_, Agent>) -> Result<Vec<Agent>> {
        self.store.list_agents(filter).await
    }

    /// Register the agent controlled by `owner`.
    pub async fn register_agent(&self, owner: Identity, params: RegisterAgent) -> Result<Agent> {
        if let Some(profile) = &params.model_profile {
            self.get_profile(profile).await?;
        }
        let agent = Agent::new(owner, params)?;
        self.store.insert_agent(agent.clone()).await?;

        info!(agent = %agent.address, permissions = %agent.permissions, "agent registered");
        self.events.publish(MeshEvent::AgentRegistered {
            agent: agent.address,
            owner: agent.owner_wallet,
            agent_wallet: agent.agent_wallet,
        });
        Ok(agent)
    }

    /// Apply an owner-authorized update.
    pub async fn update_agent(
        &self,
        address: &Address,
        caller: &Identity,
        update: AgentUpdate,
    ) -> Result<Agent> {
        let _guard = self.lock_writes().await;
        let current = self.get_agent(address).await?;
        if current.owner_wallet != *caller {
            warn!(agent = %address, "agent update by non-owner rejected");
            return Err(Error::permission_denied(*address, "caller is not the owner"));
        }

        if let Some(wallet) = update.agent_wallet {
            if wallet != current.agent_wallet && self.has_progressed_intents(address).await? {
                return Err(Error::invalid_state(
                    *address,
                    "agent wallet is locked by intents past pending",
                ));
            }
        }
        if let Some(Some(profile)) = &update.model_profile {
            self.get_profile(profile).await?;
        }

        let next = current.updated(&update)?;
        self.store.put_agent(next.clone()).await?;

        debug!(agent = %address, "agent updated");
        self.events.publish(MeshEvent::AgentUpdated {
            agent: next.address,
            updated_at: next.updated_at,
        });
        Ok(next)
    }

    async fn has_progressed_intents(&self, agent: &Address) -> Result<bool> {
        let agent = *agent;
        let progressed = self
            .store
            .list_intents(&move |i: &Intent| i.involves(&agent) && i.status != IntentStatus::Pending)
            .await?;
        Ok(!progressed.is_empty())
    }

    // Model profiles

    /// Full-record replace.
    pub async fn put_profile(&self, profile: ModelProfile) -> Result<()> {
        self.store.put_profile(profile).await
    }

    pub async fn get_profile(&self, address: &Address) -> Result<ModelProfile> {
        self.store
            .get_profile(address)
            .await?
            .ok_or(Error::NotFound {
                kind: RecordKind::ModelProfile,
                address: *address,
            })
    }

    pub async fn list_profiles(
        &self,
        filter: Predicate<'_, ModelProfile>,
    ) -> Result<Vec<ModelProfile>> {
        self.store.list_profiles(filter).await
    }

    /// Create a model profile owned by `owner`.
    pub async fn create_model_profile(
        &self,
        owner: Identity,
        params: NewModelProfile,
    ) -> Result<ModelProfile> {
        let profile = ModelProfile::new(owner, params)?;
        self.store.insert_profile(profile.clone()).await?;

        info!(profile = %profile.address, label = %profile.label, "model profile created");
        self.events.publish(MeshEvent::ModelProfileCreated {
            profile: profile.address,
            owner: profile.owner_wallet,
            label: profile.label.clone(),
        });
        Ok(profile)
    }

    /// Apply an owner-authorized update.
    pub async fn update_model_profile(
        &self,
        address: &Address,
        caller: &Identity,
        update: ModelProfileUpdate,
    ) -> Result<ModelProfile> {
        let _guard = self.lock_writes().await;
        let current = self.get_profile(address).await?;
        if current.owner_wallet != *caller {
            warn!(profile = %address, "profile update by non-owner rejected");
            return Err(Error::permission_denied(*address, "caller is not the owner"));
        }
        let next = current.updated(&update)?;
        self.store.put_profile(next.clone()).await?;

        self.events.publish(MeshEvent::ModelProfileUpdated {
            profile: next.address,
            updated_at: next.updated_at,
        });
        Ok(next)
    }

    /// The model profile configured for `agent`.
    ///
    /// Fails with `NoProviderConfigured` if none is set or it no longer exists.
    pub async fn profile_for(&self, agent: &Agent) -> Result<ModelProfile> {
        let missing = Error::NoProviderConfigured {
            address: agent.address,
        };
        let Some(profile) = agent.model_profile else {
            return Err(missing);
        };
        self.store.get_profile(&profile).await?.ok_or(missing)
    }
}
