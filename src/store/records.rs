//! Record store for agents, model profiles and intents.

use crate::agent::{Agent, ModelProfile};
use crate::core::{Address, Error, RecordKind, Result};
use crate::intent::{Intent, IntentStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Filter passed to `list_*` operations.
pub type Predicate<'a, T> = &'a (dyn Fn(&T) -> bool + Send + Sync);

/// Durable store boundary.
///
/// Implementations must make `insert_*` and `compare_and_set_intent` atomic
/// per record.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_agent(&self, address: &Address) -> Result<Option<Agent>>;

    /// Full-record replace.
    async fn put_agent(&self, agent: Agent) -> Result<()>;

    /// Insert, failing with `AlreadyExists` if the address is taken.
    async fn insert_agent(&self, agent: Agent) -> Result<()>;

    async fn list_agents(&self, filter: Predicate<'_, Agent>) -> Result<Vec<Agent>>;

    async fn get_profile(&self, address: &Address) -> Result<Option<ModelProfile>>;

    async fn put_profile(&self, profile: ModelProfile) -> Result<()>;

    async fn insert_profile(&self, profile: ModelProfile) -> Result<()>;

    async fn list_profiles(&self, filter: Predicate<'_, ModelProfile>)
        -> Result<Vec<ModelProfile>>;

    async fn get_intent(&self, address: &Address) -> Result<Option<Intent>>;

    /// Insert, failing with `AlreadyExists` if the address is taken.
    async fn insert_intent(&self, intent: Intent) -> Result<()>;

    /// Replace the intent only if its stored status equals `expected`.
    ///
    /// Fails with `NotFound` or `InvalidState`.
    async fn compare_and_set_intent(&self, expected: IntentStatus, intent: Intent) -> Result<()>;

    async fn list_intents(&self, filter: Predicate<'_, Intent>) -> Result<Vec<Intent>>;
}

/// In-memory [`RecordStore`].
#[derive(Default)]
pub struct MemoryStore {
    agents: RwLock<HashMap<Address, Agent>>,
    profiles: RwLock<HashMap<Address, ModelProfile>>,
    intents: RwLock<HashMap<Address, Intent>>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    agents: Vec<Agent>,
    profiles: Vec<ModelProfile>,
    intents: Vec<Intent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize every record with bincode.
    pub async fn export_snapshot(&self) -> Result<Vec<u8>> {
        let snapshot = Snapshot {
            agents: self.agents.read().await.values().cloned().collect(),
            profiles: self.profiles.read().await.values().cloned().collect(),
            intents: self.intents.read().await.values().cloned().collect(),
        };
        Ok(bincode::serialize(&snapshot)?)
    }

    /// Rebuild a store from [`MemoryStore::export_snapshot`] output.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self> {
        let snapshot: Snapshot = bincode::deserialize(bytes)?;
        Ok(Self {
            agents: RwLock::new(snapshot.agents.into_iter().map(|a| (a.address, a)).collect()),
            profiles: RwLock::new(
                snapshot
                    .profiles
                    .into_iter()
                    .map(|p| (p.address, p))
                    .collect(),
            ),
            intents: RwLock::new(
                snapshot
                    .intents
                    .into_iter()
                    .map(|i| (i.address, i))
                    .collect(),
            ),
        })
    }

    pub async fn intent_count(&self) -> usize {
        self.intents.read().await.len()
    }
}

fn insert_new<T>(
    map: &mut HashMap<Address, T>,
    address: Address,
    record: T,
    kind: RecordKind,
) -> Result<()> {
    if map.contains_key(&address) {
        return Err(Error::AlreadyExists { kind, address });
    }
    map.insert(address, record);
    Ok(())
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_agent(&self, address: &Address) -> Result<Option<Agent>> {
        Ok(self.agents.read().await.get(address).cloned())
    }

    async fn put_agent(&self, agent: Agent) -> Result<()> {
        self.agents.write().await.insert(agent.address, agent);
        Ok(())
    }

    async fn insert_agent(&self, agent: Agent) -> Result<()> {
        let mut agents = self.agents.write().await;
        insert_new(&mut agents, agent.address, agent, RecordKind::Agent)
    }

    async fn list_agents(&self, filter: Predicate<'_, Agent>) -> Result<Vec<Agent>> {
        Ok(self
            .agents
            .read()
            .await
            .values()
            .filter(|a| filter(*a))
            .cloned()
            .collect())
    }

    async fn get_profile(&self, address: &Address) -> Result<Option<ModelProfile>> {
        Ok(self.profiles.read().await.get(address).cloned())
    }

    async fn put_profile(&self, profile: ModelProfile) -> Result<()> {
        self.profiles.write().await.insert(profile.address, profile);
        Ok(())
    }

    async fn insert_profile(&self, profile: ModelProfile) -> Result<()> {
        let mut profiles = self.profiles.write().await;
        insert_new(&mut profiles, profile.address, profile, RecordKind::ModelProfile)
    }

    async fn list_profiles(
        &self,
        filter: Predicate<'_, ModelProfile>,
    ) -> Result<Vec<ModelProfile>> {
        Ok(self
            .profiles
            .read()
            .await
            .values()
            .filter(|p| filter(*p))
            .cloned()
            .collect())
    }

    async fn get_intent(&self, address: &Address) -> Result<Option<Intent>> {
        Ok(self.intents.read().await.get(address).cloned())
    }

    async fn insert_intent(&self, intent: Intent) -> Result<()> {
        let mut intents = self.intents.write().await;
        insert_new(&mut intents, intent.address, intent, RecordKind::Intent)
    }

    async fn compare_and_set_intent(&self, expected: IntentStatus, intent: Intent) -> Result<()> {
        let mut intents = self.intents.write().await;
        let current = intents.get_mut(&intent.address).ok_or(Error::NotFound {
            kind: RecordKind::Intent,
            address: intent.address,
        })?;
        if current.status != expected {
            return Err(Error::invalid_state(
                intent.address,
                format!("expected status {}, found {}", expected, current.status),
            ));
        }
        *current = intent;
        Ok(())
    }

    async fn list_intents(&self, filter: Predicate<'_, Intent>) -> Result<Vec<Intent>> {
        let mut intents: Vec<Intent> = self
            .intents
            .read()
            .await
            .values()
            .filter(|i| filter(*i))
            .cloned()
            .collect();
        intents.sort_by_key(|i| (i.created_at, i.nonce));
        Ok(intents)
    }
}
