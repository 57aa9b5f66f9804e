//! Intent Coordinator
//!
//! Drives intents through `Pending -> Accepted -> Completed | Failed`.
//! Every status change is a compare-and-set in the record store, so racing
//! callers observe exactly one winner.

use crate::agent::{Agent, Permission, Registry};
use crate::core::{
    now, Address, CoordinatorConfig, Error, EventBus, Hash256, Identity, MeshEvent, RecordKind,
    Result,
};
use crate::identity::intent_address;
use crate::intent::action::{ActionExecutor, ActionReceipt, AgentAction};
use crate::intent::record::{Intent, IntentStatus};
use crate::integrity::{digest_bytes, to_canonical_bytes};
use crate::provider::{BackendError, ProviderRouter, UsageMeter};
use crate::store::{BlobStore, Predicate, RecordStore};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Coordinates intents between agents.
pub struct IntentCoordinator {
    registry: Arc<Registry>,
    store: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    router: Arc<ProviderRouter>,
    executor: Arc<dyn ActionExecutor>,
    events: EventBus,
    config: CoordinatorConfig,
    usage: UsageMeter,
    /// Last nonce issued per (from, to) pair
    nonces: Mutex<HashMap<(Address, Address), u64>>,
    in_flight: Arc<SyncMutex<HashSet<Address>>>,
}

impl IntentCoordinator {
    /// Create a coordinator sharing the registry's store and event bus.
    pub fn new(
        registry: Arc<Registry>,
        blobs: Arc<dyn BlobStore>,
        router: Arc<ProviderRouter>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        Self {
            store: registry.store().clone(),
            events: registry.events().clone(),
            registry,
            blobs,
            router,
            executor,
            config: CoordinatorConfig::default(),
            usage: UsageMeter::new(),
            nonces: Mutex::new(HashMap::new()),
            in_flight: Arc::new(SyncMutex::new(HashSet::new())),
        }
    }

    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn router(&self) -> &Arc<ProviderRouter> {
        &self.router
    }

    pub fn usage(&self) -> &UsageMeter {
        &self.usage
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Create a `Pending` intent from `from` to `to`.
    pub async fn create_intent(
        &self,
        from: &Address,
        to: &Address,
        payload: Value,
        payment_amount: i64,
        payment_mint: Identity,
    ) -> Result<Intent> {
        if from == to {
            return Err(Error::invalid_argument(
                Some(*from),
                "source and destination agents must differ",
            ));
        }
        if is_empty_payload(&payload) {
            return Err(Error::invalid_argument(Some(*from), "payload is empty"));
        }
        let payment_amount = u64::try_from(payment_amount).map_err(|_| {
            Error::invalid_argument(
                Some(*from),
                format!("payment amount {payment_amount} is negative"),
            )
        })?;

        let source = self.registry.get_agent(from).await?;
        self.registry.get_agent(to).await?;
        if let Err(e) = source.require(Permission::CAN_CREATE_INTENT) {
            warn!(agent = %from, "intent creation rejected: missing permission");
            return Err(e);
        }

        let body = to_canonical_bytes(&payload);
        let payload_hash = digest_bytes(&body);
        let payload_uri = self.blobs.store(&body).await?;
        let created = self
            .insert_intent(
                &source,
                to,
                PayloadRef {
                    hash: payload_hash,
                    uri: payload_uri.clone(),
                    body,
                },
                payment_amount,
                payment_mint,
            )
            .await;
        if created.is_err() {
            self.discard_blob(&payload_uri).await;
        }
        created
    }

    /// Pick a nonce and insert a new intent, retrying on address collisions.
    async fn insert_intent(
        &self,
        source: &Agent,
        to: &Address,
        payload: PayloadRef,
        payment_amount: u64,
        payment_mint: Identity,
    ) -> Result<Intent> {
        let from = source.address;
        let mut nonces = self.nonces.lock().await;
        let last = nonces.get(&(from, *to)).copied();
        let millis = u64::try_from(now().timestamp_millis()).unwrap_or(0);
        let start = last.map_or(millis, |last| millis.max(last.saturating_add(1)));

        let mut collided = None;
        for attempt in 0..=u64::from(self.config.max_nonce_retries) {
            let nonce = start.saturating_add(attempt);
            let derived = intent_address(&from, to, nonce);
            let created = now();
            let intent = Intent {
                address: derived.address,
                from_agent: from,
                to_agent: *to,
                nonce,
                status: IntentStatus::Pending,
                payload_hash: payload.hash,
                payload_uri: payload.uri.clone(),
                payment_amount,
                payment_mint,
                result_hash: None,
                result_uri: None,
                payload_body: Some(payload.body.clone()),
                result_body: None,
                failure_reason: None,
                tokens_used: None,
                created_at: created,
                updated_at: created,
                bump: derived.bump,
            };
            match self.store.insert_intent(intent.clone()).await {
                Ok(()) => {
                    nonces.insert((from, *to), nonce);
                    info!(
                        intent = %intent.address,
                        from = %from,
                        to = %to,
                        nonce,
                        payment_amount,
                        "intent created"
                    );
                    self.events.publish(MeshEvent::IntentCreated {
                        intent: intent.address,
                        from_agent: from,
                        to_agent: *to,
                        payment_amount,
                    });
                    return Ok(intent);
                }
                Err(Error::AlreadyExists { address, .. }) => {
                    debug!(intent = %address, nonce, "intent address taken, trying next nonce");
                    collided = Some(address);
                }
                Err(e) => return Err(e),
            }
        }

        warn!(from = %from, to = %to, "no free intent nonce");
        Err(Error::AlreadyExists {
            kind: RecordKind::Intent,
            address: collided.unwrap_or_default(),
        })
    }

    /// Accept a `Pending` intent on behalf of its destination agent.
    pub async fn accept_intent(&self, intent: &Address, by: &Address) -> Result<Intent> {
        let current = self.get_intent(intent).await?;
        if current.to_agent != *by {
            warn!(intent = %intent, agent = %by, "accept by non-destination rejected");
            return Err(Error::permission_denied(
                *intent,
                "only the destination agent may accept",
            ));
        }
        let agent = self.registry.get_agent(by).await?;
        agent.require(Permission::CAN_ACCEPT_INTENT)?;

        let accepted = current.transitioned(IntentStatus::Accepted)?;
        self.commit(IntentStatus::Pending, accepted).await
    }

    /// Run an `Accepted` intent through the destination agent's backend.
    pub async fn process_intent(&self, intent: &Address) -> Result<Intent> {
        let _guard = InFlightGuard::claim(&self.in_flight, *intent)?;

        let current = self.get_intent(intent).await?;
        if current.status != IntentStatus::Accepted {
            return Err(Error::invalid_state(
                *intent,
                format!("cannot process a {} intent", current.status),
            ));
        }
        let body = self.verified_payload(&current).await?;

        let agent = self.registry.get_agent(&current.to_agent).await?;
        let profile = self.registry.profile_for(&agent).await?;
        let backend = self.router.resolve_profile(&profile).await?;
        if let Err(e) = self.usage.admit(&profile).await {
            warn!(intent = %intent, profile = %profile.address, error = %e, "usage cap reached");
            return Err(e);
        }

        let prompt = String::from_utf8_lossy(&body);
        let timeout = self.config.backend_timeout();
        debug!(intent = %intent, backend = backend.name(), "invoking backend");
        let outcome =
            tokio::time::timeout(timeout, backend.invoke(&prompt, &self.config.invocation)).await;

        match outcome {
            Ok(Ok(response)) => {
                if let Some(tokens) = response.tokens_used {
                    self.usage.record_tokens(&profile.address, tokens).await;
                    debug!(intent = %intent, tokens, cost = profile.cost_for(tokens), "backend usage");
                }
                let result_hash = digest_bytes(response.text.as_bytes());
                let result_uri = self.blobs.store(response.text.as_bytes()).await?;
                let committed = match current.completed(
                    result_hash,
                    result_uri.clone(),
                    Some(response.text),
                    response.tokens_used,
                ) {
                    Ok(completed) => self.commit(IntentStatus::Accepted, completed).await,
                    Err(e) => Err(e),
                };
                if committed.is_err() {
                    self.discard_blob(&result_uri).await;
                }
                committed
            }
            Ok(Err(BackendError::Unavailable(reason))) => {
                let failed = current.failed(format!("backend unavailable: {reason}"))?;
                self.commit(IntentStatus::Accepted, failed).await?;
                Err(Error::BackendUnavailable {
                    address: *intent,
                    reason,
                })
            }
            Ok(Err(BackendError::Timeout)) | Err(_) => {
                let after_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                let failed = current.failed(format!("backend timed out after {after_ms}ms"))?;
                self.commit(IntentStatus::Accepted, failed).await?;
                Err(Error::BackendTimeout {
                    address: *intent,
                    after_ms,
                })
            }
        }
    }

    /// Remove a blob written for a transition that did not commit.
    async fn discard_blob(&self, locator: &str) {
        if let Err(e) = self.blobs.remove(locator).await {
            warn!(locator, error = %e, "failed to discard orphaned blob");
        }
    }

    /// Fetch the payload body and check it against the recorded digest.
    async fn verified_payload(&self, intent: &Intent) -> Result<Vec<u8>> {
        let body = self.blobs.fetch(&intent.payload_uri).await?;
        let mut actual = digest_bytes(&body);
        if actual == intent.payload_hash {
            if let Some(cached) = &intent.payload_body {
                actual = digest_bytes(cached);
            }
        }
        if actual != intent.payload_hash {
            error!(
                intent = %intent.address,
                expected = %intent.payload_hash,
                actual = %actual,
                "payload integrity violation"
            );
            return Err(Error::IntegrityViolation {
                address: intent.address,
                expected: intent.payload_hash,
                actual,
            });
        }
        Ok(body)
    }

    /// Move a `Pending` or `Accepted` intent to `Failed`.
    ///
    /// Either party may fail an intent.
    pub async fn fail_intent(
        &self,
        intent: &Address,
        by: &Address,
        reason: &str,
    ) -> Result<Intent> {
        let current = self.get_intent(intent).await?;
        if !current.involves(by) {
            warn!(intent = %intent, agent = %by, "fail by unrelated agent rejected");
            return Err(Error::permission_denied(
                *intent,
                "only the source or destination agent may fail an intent",
            ));
        }
        let failed = current.failed(reason)?;
        self.commit(current.status, failed).await
    }

    /// Create a fresh `Pending` intent with the terms of a `Failed` one.
    pub async fn resubmit_intent(&self, failed: &Address, by: &Address) -> Result<Intent> {
        let previous = self.get_intent(failed).await?;
        if previous.from_agent != *by {
            return Err(Error::permission_denied(
                *failed,
                "only the source agent may resubmit",
            ));
        }
        if previous.status != IntentStatus::Failed {
            return Err(Error::invalid_state(
                *failed,
                format!("cannot resubmit a {} intent", previous.status),
            ));
        }
        let body = self.verified_payload(&previous).await?;
        let source = self.registry.get_agent(by).await?;
        self.registry.get_agent(&previous.to_agent).await?;
        source.require(Permission::CAN_CREATE_INTENT)?;

        info!(previous = %failed, "resubmitting failed intent");
        self.insert_intent(
            &source,
            &previous.to_agent,
            PayloadRef {
                hash: previous.payload_hash,
                uri: previous.payload_uri.clone(),
                body,
            },
            previous.payment_amount,
            previous.payment_mint,
        )
        .await
    }

    pub async fn get_intent(&self, intent: &Address) -> Result<Intent> {
        self.store
            .get_intent(intent)
            .await?
            .ok_or(Error::NotFound {
                kind: RecordKind::Intent,
                address: *intent,
            })
    }

    pub async fn list_intents(&self, filter: Predicate<'_, Intent>) -> Result<Vec<Intent>> {
        self.store.list_intents(filter).await
    }

    /// Intents involving `agent`, optionally restricted to one status.
    pub async fn intents_for(
        &self,
        agent: &Address,
        status: Option<IntentStatus>,
    ) -> Result<Vec<Intent>> {
        let agent = *agent;
        self.store
            .list_intents(&move |i: &Intent| {
                i.involves(&agent) && status.map_or(true, |s| i.status == s)
            })
            .await
    }

    /// Parse and run an action for `agent` after checking its permission.
    pub async fn execute_action(
        &self,
        agent: &Address,
        kind: &str,
        params: Value,
    ) -> Result<ActionReceipt> {
        let actor = self.registry.get_agent(agent).await?;
        let action = AgentAction::parse(agent, kind, params)?;
        if let Err(e) = actor.require(action.required_permission()) {
            warn!(agent = %agent, action = kind, "action rejected: missing permission");
            return Err(e);
        }
        let receipt = self.executor.execute(&actor, &action).await?;
        info!(agent = %agent, action = kind, reference = %receipt.reference, "action executed");
        Ok(receipt)
    }

    async fn commit(&self, expected: IntentStatus, next: Intent) -> Result<Intent> {
        // Leaving Pending locks both agents' wallets.
        let _writes = match expected {
            IntentStatus::Pending => Some(self.registry.lock_writes().await),
            _ => None,
        };
        self.store.compare_and_set_intent(expected, next.clone()).await?;
        info!(intent = %next.address, from = %expected, to = %next.status, "intent status updated");
        self.events.publish(MeshEvent::IntentStatusUpdated {
            intent: next.address,
            status: next.status,
        });
        Ok(next)
    }
}

struct PayloadRef {
    hash: Hash256,
    uri: String,
    body: Vec<u8>,
}

/// Marks an intent as being processed until dropped.
struct InFlightGuard {
    set: Arc<SyncMutex<HashSet<Address>>>,
    intent: Address,
}

impl InFlightGuard {
    fn claim(set: &Arc<SyncMutex<HashSet<Address>>>, intent: Address) -> Result<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(intent);
        if !inserted {
            return Err(Error::invalid_state(intent, "intent is already being processed"));
        }
        Ok(Self {
            set: set.clone(),
            intent,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.intent);
    }
}

fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentUpdate, ModelProfile, NewModelProfile, RegisterAgent};
    use crate::core::{BlobConfig, ErrorKind};
    use crate::identity::Keypair;
    use crate::provider::{BackendResponse, InvocationOptions, LlmBackend};
    use crate::store::{MemoryBlobStore, MemoryStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingExecutor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ActionExecutor for CountingExecutor {
        async fn execute(&self, agent: &Agent, action: &AgentAction) -> Result<ActionReceipt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ActionReceipt::new(agent.address, action, "tx-1"))
        }
    }

    struct FixedBackend(std::result::Result<&'static str, BackendError>);

    #[async_trait]
    impl LlmBackend for FixedBackend {
        async fn invoke(
            &self,
            _prompt: &str,
            _options: &InvocationOptions,
        ) -> std::result::Result<BackendResponse, BackendError> {
            self.0.clone().map(|text| BackendResponse {
                text: text.to_string(),
                tokens_used: Some(3),
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl LlmBackend for SlowBackend {
        async fn invoke(
            &self,
            _prompt: &str,
            _options: &InvocationOptions,
        ) -> std::result::Result<BackendResponse, BackendError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(BackendResponse::text("late"))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct YieldingBackend;

    #[async_trait]
    impl LlmBackend for YieldingBackend {
        async fn invoke(
            &self,
            _prompt: &str,
            _options: &InvocationOptions,
        ) -> std::result::Result<BackendResponse, BackendError> {
            tokio::task::yield_now().await;
            Ok(BackendResponse::text("late"))
        }

        fn name(&self) -> &str {
            "yielding"
        }
    }

    /// `MemoryStore` that yields inside `list_intents` and can refuse
    /// intent inserts.
    #[derive(Default)]
    struct ContendedStore {
        inner: MemoryStore,
        reject_inserts: bool,
    }

    #[async_trait]
    impl RecordStore for ContendedStore {
        async fn get_agent(&self, address: &Address) -> Result<Option<Agent>> {
            self.inner.get_agent(address).await
        }

        async fn put_agent(&self, agent: Agent) -> Result<()> {
            self.inner.put_agent(agent).await
        }

        async fn insert_agent(&self, agent: Agent) -> Result<()> {
            self.inner.insert_agent(agent).await
        }

        async fn list_agents(&self, filter: Predicate<'_, Agent>) -> Result<Vec<Agent>> {
            self.inner.list_agents(filter).await
        }

        async fn get_profile(&self, address: &Address) -> Result<Option<ModelProfile>> {
            self.inner.get_profile(address).await
        }

        async fn put_profile(&self, profile: ModelProfile) -> Result<()> {
            self.inner.put_profile(profile).await
        }

        async fn insert_profile(&self, profile: ModelProfile) -> Result<()> {
            self.inner.insert_profile(profile).await
        }

        async fn list_profiles(
            &self,
            filter: Predicate<'_, ModelProfile>,
        ) -> Result<Vec<ModelProfile>> {
            self.inner.list_profiles(filter).await
        }

        async fn get_intent(&self, address: &Address) -> Result<Option<Intent>> {
            self.inner.get_intent(address).await
        }

        async fn insert_intent(&self, intent: Intent) -> Result<()> {
            if self.reject_inserts {
                return Err(Error::Storage("disk full".into()));
            }
            self.inner.insert_intent(intent).await
        }

        async fn compare_and_set_intent(
            &self,
            expected: IntentStatus,
            intent: Intent,
        ) -> Result<()> {
            self.inner.compare_and_set_intent(expected, intent).await
        }

        async fn list_intents(&self, filter: Predicate<'_, Intent>) -> Result<Vec<Intent>> {
            tokio::task::yield_now().await;
            self.inner.list_intents(filter).await
        }
    }

    struct Mesh {
        coordinator: IntentCoordinator,
        blobs: Arc<MemoryBlobStore>,
        executor: Arc<CountingExecutor>,
        source: Agent,
        dest: Agent,
        profile: Address,
    }

    async fn mesh_with(dest_flags: &[Permission], limits: (u64, u64)) -> Mesh {
        mesh_on(Arc::new(MemoryStore::new()), dest_flags, limits).await
    }

    async fn mesh_on(
        store: Arc<dyn RecordStore>,
        dest_flags: &[Permission],
        limits: (u64, u64),
    ) -> Mesh {
        let registry = Arc::new(Registry::new(store, EventBus::default()));
        let blobs = Arc::new(MemoryBlobStore::new(&BlobConfig { inline_threshold: 0 }));
        let executor = Arc::new(CountingExecutor::default());

        let source = registry
            .register_agent(
                Keypair::generate().identity(),
                RegisterAgent::default().with_permissions(Permission::CAN_CREATE_INTENT),
            )
            .await
            .unwrap();
        let dest_owner = Keypair::generate().identity();
        let profile = registry
            .create_model_profile(
                dest_owner,
                NewModelProfile::new("p", "stub://").with_limits(limits.0, limits.1),
            )
            .await
            .unwrap();
        let dest = registry
            .register_agent(
                dest_owner,
                RegisterAgent::default()
                    .with_permissions(crate::agent::PermissionSet::of(dest_flags))
                    .with_model_profile(profile.address),
            )
            .await
            .unwrap();

        let coordinator = IntentCoordinator::new(
            registry,
            blobs.clone(),
            Arc::new(ProviderRouter::new()),
            executor.clone(),
        );
        Mesh {
            coordinator,
            blobs,
            executor,
            source,
            dest,
            profile: profile.address,
        }
    }

    async fn mesh() -> Mesh {
        mesh_with(&[Permission::CAN_ACCEPT_INTENT, Permission::CAN_SWAP], (0, 0)).await
    }

    impl Mesh {
        async fn bind(&self, backend: impl LlmBackend + 'static) {
            self.coordinator
                .router()
                .bind(self.profile, Arc::new(backend))
                .await;
        }

        async fn pending_intent(&self) -> Intent {
            self.coordinator
                .create_intent(
                    &self.source.address,
                    &self.dest.address,
                    json!({"action": "swap", "amount": 1}),
                    10,
                    Identity::zero(),
                )
                .await
                .unwrap()
        }

        async fn accepted_intent(&self) -> Intent {
            let intent = self.pending_intent().await;
            self.coordinator
                .accept_intent(&intent.address, &self.dest.address)
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_create_intent() {
        let mesh = mesh().await;
        let mut events = mesh.coordinator.events().subscribe();
        let intent = mesh
            .coordinator
            .create_intent(
                &mesh.source.address,
                &mesh.dest.address,
                json!({"b": 1, "a": 2}),
                10,
                Identity::zero(),
            )
            .await
            .unwrap();

        assert_eq!(intent.status, IntentStatus::Pending);
        assert_eq!(intent.payload_hash, crate::integrity::digest(&json!({"a": 2, "b": 1})));
        assert!(intent.check_invariants().is_ok());
        assert_eq!(
            intent.address,
            intent_address(&intent.from_agent, &intent.to_agent, intent.nonce).address
        );
        assert!(matches!(
            events.recv().await.unwrap(),
            MeshEvent::IntentCreated { payment_amount: 10, .. }
        ));
    }

    #[tokio::test]
    async fn test_create_intent_nonces_increase() {
        let mesh = mesh().await;
        let mut last = 0;
        for i in 0..5 {
            let intent = mesh
                .coordinator
                .create_intent(
                    &mesh.source.address,
                    &mesh.dest.address,
                    json!({"n": i}),
                    0,
                    Identity::zero(),
                )
                .await
                .unwrap();
            assert!(intent.nonce > last);
            last = intent.nonce;
        }
        let all = mesh
            .coordinator
            .intents_for(&mesh.source.address, Some(IntentStatus::Pending))
            .await
            .unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_addresses() {
        let mesh = mesh().await;
        let coordinator = &mesh.coordinator;
        let creates = (0..16).map(|i| {
            coordinator.create_intent(
                &mesh.source.address,
                &mesh.dest.address,
                json!({"i": i}),
                1,
                Identity::zero(),
            )
        });
        let intents: Vec<Intent> = futures::future::try_join_all(creates).await.unwrap();
        let addresses: HashSet<Address> = intents.iter().map(|i| i.address).collect();
        assert_eq!(addresses.len(), 16);
    }

    #[tokio::test]
    async fn test_create_intent_rejections() {
        let mesh = mesh().await;
        let (a, b) = (mesh.source.address, mesh.dest.address);
        let c = &mesh.coordinator;

        for payload in [json!(null), json!({}), json!([]), json!("")] {
            let err = c.create_intent(&a, &b, payload, 1, Identity::zero()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
        let err = c
            .create_intent(&a, &a, json!({"x": 1}), 1, Identity::zero())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = c
            .create_intent(&a, &Address::new([5u8; 32]), json!({"x": 1}), 1, Identity::zero())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // Destination lacks CAN_CREATE_INTENT.
        let err = c
            .create_intent(&b, &a, json!({"x": 1}), 1, Identity::zero())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(c.list_intents(&|_: &Intent| true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_accept_requires_destination() {
        let mesh = mesh().await;
        let intent = mesh
            .coordinator
            .create_intent(
                &mesh.source.address,
                &mesh.dest.address,
                json!({"x": 1}),
                1,
                Identity::zero(),
            )
            .await
            .unwrap();

        let err = mesh
            .coordinator
            .accept_intent(&intent.address, &mesh.source.address)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let accepted = mesh
            .coordinator
            .accept_intent(&intent.address, &mesh.dest.address)
            .await
            .unwrap();
        assert_eq!(accepted.status, IntentStatus::Accepted);

        let err = mesh
            .coordinator
            .accept_intent(&intent.address, &mesh.dest.address)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_accept_requires_permission() {
        let mesh = mesh_with(&[], (0, 0)).await;
        let intent = mesh
            .coordinator
            .create_intent(
                &mesh.source.address,
                &mesh.dest.address,
                json!({"x": 1}),
                1,
                Identity::zero(),
            )
            .await
            .unwrap();
        let err = mesh
            .coordinator
            .accept_intent(&intent.address, &mesh.dest.address)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_process_completes() {
        let mesh = mesh().await;
        mesh.bind(FixedBackend(Ok("ok"))).await;
        let intent = mesh.accepted_intent().await;

        let done = mesh.coordinator.process_intent(&intent.address).await.unwrap();
        assert_eq!(done.status, IntentStatus::Completed);
        assert_eq!(done.result_hash, Some(digest_bytes(b"ok")));
        assert_eq!(done.result_body.as_deref(), Some("ok"));
        assert_eq!(done.tokens_used, Some(3));
        let stored_result = mesh
            .blobs
            .fetch(done.result_uri.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(stored_result, b"ok");
        assert_eq!(mesh.coordinator.usage().usage(&mesh.profile).await, (1, 3));

        let err = mesh
            .coordinator
            .process_intent(&intent.address)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_process_pending_rejected() {
        let mesh = mesh().await;
        mesh.bind(FixedBackend(Ok("ok"))).await;
        let intent = mesh
            .coordinator
            .create_intent(
                &mesh.source.address,
                &mesh.dest.address,
                json!({"x": 1}),
                1,
                Identity::zero(),
            )
            .await
            .unwrap();
        let err = mesh
            .coordinator
            .process_intent(&intent.address)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_process_backend_unavailable() {
        let mesh = mesh().await;
        mesh.bind(FixedBackend(Err(BackendError::Unavailable("down".into()))))
            .await;
        let intent = mesh.accepted_intent().await;

        let err = mesh
            .coordinator
            .process_intent(&intent.address)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        let stored = mesh.coordinator.get_intent(&intent.address).await.unwrap();
        assert_eq!(stored.status, IntentStatus::Failed);
        assert!(stored.failure_reason.unwrap().contains("down"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_backend_timeout() {
        let mesh = mesh().await;
        mesh.bind(SlowBackend).await;
        let intent = mesh.accepted_intent().await;

        let err = mesh
            .coordinator
            .process_intent(&intent.address)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendTimeout);
        let stored = mesh.coordinator.get_intent(&intent.address).await.unwrap();
        assert_eq!(stored.status, IntentStatus::Failed);
    }

    #[tokio::test]
    async fn test_process_without_backend() {
        let mesh = mesh().await;
        let intent = mesh.accepted_intent().await;
        let err = mesh
            .coordinator
            .process_intent(&intent.address)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoProviderConfigured);
        let stored = mesh.coordinator.get_intent(&intent.address).await.unwrap();
        assert_eq!(stored.status, IntentStatus::Accepted);
    }

    #[tokio::test]
    async fn test_process_rate_limited() {
        let mesh = mesh_with(&[Permission::CAN_ACCEPT_INTENT], (0, 1)).await;
        mesh.bind(FixedBackend(Ok("ok"))).await;
        let first = mesh.accepted_intent().await;
        let second = mesh.accepted_intent().await;

        mesh.coordinator.process_intent(&first.address).await.unwrap();
        let err = mesh
            .coordinator
            .process_intent(&second.address)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        let stored = mesh.coordinator.get_intent(&second.address).await.unwrap();
        assert_eq!(stored.status, IntentStatus::Accepted);
    }

    #[tokio::test]
    async fn test_process_detects_tampered_payload() {
        let mesh = mesh().await;
        mesh.bind(FixedBackend(Ok("ok"))).await;
        let intent = mesh.accepted_intent().await;
        mesh.blobs
            .replace(&intent.payload_uri, br#"{"action":"drain"}"#)
            .await
            .unwrap();

        let err = mesh
            .coordinator
            .process_intent(&intent.address)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IntegrityViolation);
        let stored = mesh.coordinator.get_intent(&intent.address).await.unwrap();
        assert_eq!(stored.status, IntentStatus::Accepted);
    }

    #[tokio::test]
    async fn test_process_detects_stale_inline_cache() {
        let mesh = mesh().await;
        mesh.bind(FixedBackend(Ok("ok"))).await;
        let intent = mesh.accepted_intent().await;
        let mut tampered = intent.clone();
        tampered.payload_body = Some(b"{}".to_vec());
        mesh.coordinator
            .store
            .compare_and_set_intent(IntentStatus::Accepted, tampered)
            .await
            .unwrap();

        let err = mesh
            .coordinator
            .process_intent(&intent.address)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IntegrityViolation);
    }

    #[tokio::test]
    async fn test_lost_completion_discards_result_blob() {
        let mesh = mesh().await;
        mesh.bind(YieldingBackend).await;
        let intent = mesh.accepted_intent().await;
        let before = mesh.blobs.len().await;

        let (processed, failed) = tokio::join!(
            mesh.coordinator.process_intent(&intent.address),
            mesh.coordinator
                .fail_intent(&intent.address, &mesh.source.address, "cancel"),
        );
        assert_eq!(processed.unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(failed.unwrap().status, IntentStatus::Failed);

        let stored = mesh.coordinator.get_intent(&intent.address).await.unwrap();
        assert_eq!(stored.status, IntentStatus::Failed);
        assert!(stored.result_uri.is_none());
        assert_eq!(mesh.blobs.len().await, before);
    }

    #[tokio::test]
    async fn test_failed_create_discards_payload_blob() {
        let store = ContendedStore {
            reject_inserts: true,
            ..Default::default()
        };
        let mesh = mesh_on(
            Arc::new(store),
            &[Permission::CAN_ACCEPT_INTENT],
            (0, 0),
        )
        .await;

        let err = mesh
            .coordinator
            .create_intent(
                &mesh.source.address,
                &mesh.dest.address,
                json!({"action": "swap", "amount": 1}),
                1,
                Identity::zero(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(mesh.blobs.is_empty().await);
    }

    #[tokio::test]
    async fn test_wallet_update_and_accept_are_serialized() {
        let mesh = mesh_on(
            Arc::new(ContendedStore::default()),
            &[Permission::CAN_ACCEPT_INTENT],
            (0, 0),
        )
        .await;
        let intent = mesh.pending_intent().await;
        let registry = mesh.coordinator.registry();
        let owner = mesh.dest.owner_wallet;
        let new_wallet = Keypair::generate().identity();
        let mut events = mesh.coordinator.events().subscribe();

        let (updated, accepted) = tokio::join!(
            registry.update_agent(
                &mesh.dest.address,
                &owner,
                AgentUpdate {
                    agent_wallet: Some(new_wallet),
                    ..Default::default()
                },
            ),
            mesh.coordinator.accept_intent(&intent.address, &mesh.dest.address),
        );
        assert_eq!(accepted.unwrap().status, IntentStatus::Accepted);

        let mut order = Vec::new();
        while let Ok(event) = events.try_recv() {
            match event {
                MeshEvent::AgentUpdated { .. } => order.push("wallet"),
                MeshEvent::IntentStatusUpdated { .. } => order.push("accept"),
                _ => {}
            }
        }
        let agent = registry.get_agent(&mesh.dest.address).await.unwrap();
        match updated {
            Ok(_) => {
                assert_eq!(order, vec!["wallet", "accept"]);
                assert_eq!(agent.agent_wallet, new_wallet);
            }
            Err(e) => {
                assert_eq!(e.kind(), ErrorKind::InvalidState);
                assert_ne!(agent.agent_wallet, new_wallet);
            }
        }

        // The accepted intent now pins the wallet.
        let err = registry
            .update_agent(
                &mesh.dest.address,
                &owner,
                AgentUpdate {
                    agent_wallet: Some(Keypair::generate().identity()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_in_flight_guard() {
        let set = Arc::new(SyncMutex::new(HashSet::new()));
        let address = Address::new([1u8; 32]);
        let guard = InFlightGuard::claim(&set, address).unwrap();
        let err = InFlightGuard::claim(&set, address).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        drop(guard);
        assert!(InFlightGuard::claim(&set, address).is_ok());
    }

    #[tokio::test]
    async fn test_fail_and_resubmit() {
        let mesh = mesh().await;
        let intent = mesh.accepted_intent().await;

        let err = mesh
            .coordinator
            .fail_intent(&intent.address, &Address::new([8u8; 32]), "nope")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let failed = mesh
            .coordinator
            .fail_intent(&intent.address, &mesh.dest.address, "cannot serve")
            .await
            .unwrap();
        assert_eq!(failed.status, IntentStatus::Failed);

        let err = mesh
            .coordinator
            .fail_intent(&intent.address, &mesh.source.address, "again")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = mesh
            .coordinator
            .resubmit_intent(&intent.address, &mesh.dest.address)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let retry = mesh
            .coordinator
            .resubmit_intent(&intent.address, &mesh.source.address)
            .await
            .unwrap();
        assert_eq!(retry.status, IntentStatus::Pending);
        assert_ne!(retry.address, intent.address);
        assert!(retry.nonce > intent.nonce);
        assert_eq!(retry.payload_hash, intent.payload_hash);
        assert_eq!(retry.payment_amount, intent.payment_amount);
    }

    #[tokio::test]
    async fn test_resubmit_requires_failed() {
        let mesh = mesh().await;
        let intent = mesh.accepted_intent().await;
        let err = mesh
            .coordinator
            .resubmit_intent(&intent.address, &mesh.source.address)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_execute_action() {
        let mesh = mesh().await;
        let params = json!({"input_asset": "SOL", "output_asset": "USDC", "amount": 5});

        let receipt = mesh
            .coordinator
            .execute_action(&mesh.dest.address, "swap", params.clone())
            .await
            .unwrap();
        assert_eq!(receipt.action, "swap");

        let err = mesh
            .coordinator
            .execute_action(&mesh.source.address, "swap", params)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let err = mesh
            .coordinator
            .execute_action(&mesh.dest.address, "bridge", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedAction);
        assert_eq!(mesh.executor.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_payloads() {
        assert!(is_empty_payload(&json!(null)));
        assert!(is_empty_payload(&json!({})));
        assert!(is_empty_payload(&json!([])));
        assert!(is_empty_payload(&json!("")));
        assert!(!is_empty_payload(&json!(0)));
        assert!(!is_empty_payload(&json!(false)));
        assert!(!is_empty_payload(&json!({"a": null})));
    }
}
