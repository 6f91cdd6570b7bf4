//! Flow manager: keeps in-progress config flows and persists their results.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use homelink_domain::config_entry::{ConfigEntry, ConfigEntrySource};
use homelink_domain::discovery::ZeroconfInfo;
use homelink_domain::error::{HubError, NotFoundError, ValidationError};
use homelink_domain::event::{Event, EventType};
use homelink_domain::id::FlowId;
use homelink_domain::native_api::DOMAIN;

use crate::ports::{ConfigEntryRepository, DeviceApiClient, EventPublisher, LoadedEntries};
use crate::services::config_entry_service::ConfigEntryService;
use crate::services::config_flow::{
    AbortReason, FlowContext, FlowResult, FlowStep, NativeApiFlow, NewEntry,
};

/// Answer to starting or advancing a flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowResponse {
    pub flow_id: FlowId,
    pub handler: &'static str,
    pub result: FlowResult,
    /// The persisted entry, once the flow created one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<ConfigEntry>,
}

/// Summary of an in-progress flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowProgress {
    pub flow_id: FlowId,
    pub handler: &'static str,
    pub source: ConfigEntrySource,
    pub step_id: FlowStep,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

struct InProgress {
    flow: NativeApiFlow,
    last: FlowResult,
    /// A step of this flow is running.
    busy: bool,
}

#[derive(Default)]
struct FlowTable {
    flows: HashMap<FlowId, InProgress>,
    /// Unique ids of discoveries whose first step is running.
    claimed: HashSet<String>,
}

impl FlowTable {
    fn is_in_progress(&self, unique_id: &str) -> bool {
        self.claimed.contains(unique_id)
            || self
                .flows
                .values()
                .any(|progress| progress.flow.unique_id() == Some(unique_id))
    }
}

/// Drives native-API config flows on behalf of a front end.
///
/// A flow stays registered while one of its steps runs, so it remains
/// visible to [`get`](Self::get), [`list`](Self::list) and duplicate
/// discovery detection.
pub struct FlowManager<C, R, L, P> {
    client: C,
    entries: Arc<ConfigEntryService<R>>,
    loaded: L,
    publisher: P,
    table: Mutex<FlowTable>,
}

impl<C, R, L, P> FlowManager<C, R, L, P>
where
    C: DeviceApiClient + Send + Sync,
    R: ConfigEntryRepository + Send + Sync,
    L: LoadedEntries + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    pub fn new(client: C, entries: Arc<ConfigEntryService<R>>, loaded: L, publisher: P) -> Self {
        Self {
            client,
            entries,
            loaded,
            publisher,
            table: Mutex::new(FlowTable::default()),
        }
    }

    fn ctx(&self) -> FlowContext<'_, C, R, L> {
        FlowContext {
            client: &self.client,
            entries: &self.entries,
            loaded: &self.loaded,
        }
    }

    /// Start a flow.
    ///
    /// A user flow shows its first form. A zeroconf flow needs the
    /// announcement and aborts with `already_in_progress` when another flow
    /// already handles the same node.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when a zeroconf flow has no
    /// discovery info, or a storage error from the config entry service.
    #[tracing::instrument(skip(self, discovery))]
    pub async fn init(
        &self,
        source: ConfigEntrySource,
        discovery: Option<ZeroconfInfo>,
    ) -> Result<FlowResponse, HubError> {
        let flow_id = FlowId::new();
        let mut flow = NativeApiFlow::new(source);
        match source {
            ConfigEntrySource::User => {
                let result = flow.step_user(self.ctx(), None).await?;
                self.handle_result(flow_id, flow, result).await
            }
            ConfigEntrySource::Zeroconf => {
                let info = discovery.ok_or_else(|| {
                    ValidationError::InvalidInput("zeroconf flow needs discovery info".into())
                })?;
                let node_name = info.node_name().to_string();
                {
                    let mut table = self.table.lock().await;
                    if table.is_in_progress(&node_name) {
                        tracing::debug!(node = %node_name, "flow already in progress");
                        return Ok(FlowResponse {
                            flow_id,
                            handler: DOMAIN,
                            result: FlowResult::Abort {
                                reason: AbortReason::AlreadyInProgress,
                            },
                            entry: None,
                        });
                    }
                    table.claimed.insert(node_name.clone());
                }
                let outcome = match flow.step_zeroconf(self.ctx(), &info).await {
                    Ok(result) => self.handle_result(flow_id, flow, result).await,
                    Err(err) => Err(err),
                };
                self.table.lock().await.claimed.remove(&node_name);
                outcome
            }
        }
    }

    /// Submit input to the step a flow waits on.
    ///
    /// The flow stays registered while the step runs. When the step fails
    /// the flow is left where it was.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] for an unknown flow,
    /// [`HubError::Validation`] for malformed input or when another step of
    /// the flow is still running, or a storage error.
    #[tracing::instrument(skip(self, input))]
    pub async fn configure(
        &self,
        flow_id: FlowId,
        input: serde_json::Value,
    ) -> Result<FlowResponse, HubError> {
        let mut flow = {
            let mut table = self.table.lock().await;
            let progress = table
                .flows
                .get_mut(&flow_id)
                .ok_or_else(|| flow_not_found(flow_id))?;
            if progress.busy {
                return Err(
                    ValidationError::InvalidInput("flow step already running".into()).into(),
                );
            }
            progress.busy = true;
            progress.flow.clone()
        };
        match flow.submit(self.ctx(), input).await {
            Ok(result) => self.handle_result(flow_id, flow, result).await,
            Err(err) => {
                self.release(flow_id).await;
                Err(err)
            }
        }
    }

    /// The last result of an in-progress flow.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] for an unknown flow.
    pub async fn get(&self, flow_id: FlowId) -> Result<FlowResponse, HubError> {
        let table = self.table.lock().await;
        let progress = table
            .flows
            .get(&flow_id)
            .ok_or_else(|| flow_not_found(flow_id))?;
        Ok(FlowResponse {
            flow_id,
            handler: DOMAIN,
            result: progress.last.clone(),
            entry: None,
        })
    }

    /// Drop an in-progress flow.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] for an unknown flow.
    #[tracing::instrument(skip(self))]
    pub async fn abort(&self, flow_id: FlowId) -> Result<(), HubError> {
        self.table
            .lock()
            .await
            .flows
            .remove(&flow_id)
            .map(|_| ())
            .ok_or_else(|| flow_not_found(flow_id))
    }

    pub async fn list(&self) -> Vec<FlowProgress> {
        let table = self.table.lock().await;
        table
            .flows
            .iter()
            .map(|(flow_id, progress)| FlowProgress {
                flow_id: *flow_id,
                handler: DOMAIN,
                source: progress.flow.source(),
                step_id: progress.flow.step(),
                name: progress.flow.name().map(String::from),
            })
            .collect()
    }

    /// Mark a flow idle again, keeping its state from before the step.
    async fn release(&self, flow_id: FlowId) {
        if let Some(progress) = self.table.lock().await.flows.get_mut(&flow_id) {
            progress.busy = false;
        }
    }

    async fn finish(&self, flow_id: FlowId) {
        self.table.lock().await.flows.remove(&flow_id);
    }

    async fn handle_result(
        &self,
        flow_id: FlowId,
        flow: NativeApiFlow,
        result: FlowResult,
    ) -> Result<FlowResponse, HubError> {
        let (result, entry) = match result {
            FlowResult::Form(_) => {
                self.table.lock().await.flows.insert(
                    flow_id,
                    InProgress {
                        flow,
                        last: result.clone(),
                        busy: false,
                    },
                );
                (result, None)
            }
            FlowResult::CreateEntry(new_entry) => match self.persist(&new_entry).await {
                Ok(Some(entry)) => {
                    self.finish(flow_id).await;
                    (FlowResult::CreateEntry(new_entry), Some(entry))
                }
                Ok(None) => {
                    tracing::info!(unique_id = ?new_entry.unique_id, "entry created meanwhile");
                    self.finish(flow_id).await;
                    (FlowResult::abort(AbortReason::AlreadyConfigured), None)
                }
                Err(err) => {
                    self.release(flow_id).await;
                    return Err(err);
                }
            },
            FlowResult::Abort { reason } => {
                tracing::info!(?reason, "flow aborted");
                self.finish(flow_id).await;
                (result, None)
            }
        };
        Ok(FlowResponse {
            flow_id,
            handler: DOMAIN,
            result,
            entry,
        })
    }

    /// Store the entry a flow produced.
    ///
    /// Returns `None` when an entry with the same unique id exists, including
    /// one written by a concurrent flow while this one was being stored.
    async fn persist(&self, new_entry: &NewEntry) -> Result<Option<ConfigEntry>, HubError> {
        if self.is_configured(new_entry).await? {
            return Ok(None);
        }
        let entry = new_entry.clone().into_config_entry()?;
        let entry = match self.entries.create_entry(entry).await {
            Ok(entry) => entry,
            Err(err) => {
                if self.is_configured(new_entry).await? {
                    return Ok(None);
                }
                return Err(err);
            }
        };
        let event = Event::new(
            EventType::ConfigEntryCreated,
            None,
            serde_json::json!({
                "entry_id": entry.id,
                "domain": entry.domain,
                "title": entry.title,
            }),
        );
        if let Err(err) = self.publisher.publish(event).await {
            tracing::warn!(error = %err, "failed to publish config entry event");
        }
        Ok(Some(entry))
    }

    async fn is_configured(&self, new_entry: &NewEntry) -> Result<bool, HubError> {
        let Some(unique_id) = new_entry.unique_id.as_deref() else {
            return Ok(false);
        };
        Ok(self
            .entries
            .find_by_unique_id(DOMAIN, unique_id)
            .await?
            .is_some())
    }
}

fn flow_not_found(flow_id: FlowId) -> HubError {
    NotFoundError {
        entity: "Flow",
        id: flow_id.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use homelink_domain::id::ConfigEntryId;
    use homelink_domain::native_api::{ConnectionParams, DeviceInfo};
    use tokio::sync::Notify;

    use super::*;
    use crate::event_bus::InProcessEventBus;
    use crate::ports::ApiConnectionError;
    use crate::loaded_entries::LoadedEntryRegistry;
    use crate::services::config_entry_service::tests::InMemoryConfigEntryRepo;
    use crate::services::config_flow::FlowError;
    use crate::services::config_flow::tests::FakeDevice;

    type TestManager = FlowManager<
        FakeDevice,
        InMemoryConfigEntryRepo,
        LoadedEntryRegistry,
        Arc<InProcessEventBus>,
    >;

    fn make_manager(device: FakeDevice) -> (TestManager, Arc<InProcessEventBus>) {
        let bus = Arc::new(InProcessEventBus::new(16));
        let manager = FlowManager::new(
            device,
            Arc::new(ConfigEntryService::new(InMemoryConfigEntryRepo::default())),
            LoadedEntryRegistry::new(),
            Arc::clone(&bus),
        );
        (manager, bus)
    }

    fn discovery(hostname: &str) -> ZeroconfInfo {
        ZeroconfInfo {
            host: "192.168.43.183".to_string(),
            port: 6053,
            hostname: hostname.to_string(),
            properties: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn should_keep_user_flow_until_entry_created() {
        let (manager, bus) = make_manager(FakeDevice::new("test", false));
        let mut rx = bus.subscribe();

        let started = manager.init(ConfigEntrySource::User, None).await.unwrap();
        assert_eq!(started.result.step_id(), Some(FlowStep::User));
        assert_eq!(manager.list().await.len(), 1);

        let done = manager
            .configure(
                started.flow_id,
                serde_json::json!({"host": "127.0.0.1", "port": 80}),
            )
            .await
            .unwrap();

        let entry = done.entry.expect("entry persisted");
        assert_eq!(entry.title, "test");
        assert_eq!(entry.unique_id.as_deref(), Some("test"));
        assert!(manager.list().await.is_empty());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::ConfigEntryCreated);
        assert_eq!(event.data["title"], "test");
    }

    #[tokio::test]
    async fn should_keep_flow_when_input_is_invalid() {
        let (manager, _bus) = make_manager(FakeDevice::new("test", false));
        let started = manager.init(ConfigEntrySource::User, None).await.unwrap();

        let result = manager
            .configure(started.flow_id, serde_json::json!({"port": "nope"}))
            .await;

        assert!(matches!(result, Err(HubError::Validation(_))));
        let current = manager.get(started.flow_id).await.unwrap();
        assert_eq!(current.result.step_id(), Some(FlowStep::User));
    }

    #[tokio::test]
    async fn should_keep_flow_on_form_error() {
        let (manager, _bus) = make_manager(FakeDevice::new("test", true));
        let started = manager.init(ConfigEntrySource::User, None).await.unwrap();
        manager
            .configure(started.flow_id, serde_json::json!({"host": "127.0.0.1"}))
            .await
            .unwrap();

        let retried = manager
            .configure(started.flow_id, serde_json::json!({"password": "bad"}))
            .await
            .unwrap();

        assert_eq!(retried.result.error(), Some(FlowError::InvalidAuth));
        let current = manager.get(started.flow_id).await.unwrap();
        assert_eq!(current.result, retried.result);
    }

    #[tokio::test]
    async fn should_abort_second_discovery_of_same_node() {
        let (manager, _bus) = make_manager(FakeDevice::new("test8266", false));

        let first = manager
            .init(ConfigEntrySource::Zeroconf, Some(discovery("test8266.local.")))
            .await
            .unwrap();
        assert_eq!(first.result.step_id(), Some(FlowStep::DiscoveryConfirm));

        let second = manager
            .init(ConfigEntrySource::Zeroconf, Some(discovery("test8266.local.")))
            .await
            .unwrap();
        assert_eq!(
            second.result,
            FlowResult::Abort {
                reason: AbortReason::AlreadyInProgress
            }
        );
        assert_eq!(manager.list().await.len(), 1);
    }

    #[tokio::test]
    async fn should_require_discovery_info_for_zeroconf_flow() {
        let (manager, _bus) = make_manager(FakeDevice::new("test", false));
        let result = manager.init(ConfigEntrySource::Zeroconf, None).await;
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::InvalidInput(_)))
        ));
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_flow() {
        let (manager, _bus) = make_manager(FakeDevice::new("test", false));
        let unknown = FlowId::new();
        assert!(matches!(
            manager.configure(unknown, serde_json::json!({})).await,
            Err(HubError::NotFound(_))
        ));
        assert!(matches!(
            manager.get(unknown).await,
            Err(HubError::NotFound(_))
        ));
        assert!(matches!(
            manager.abort(unknown).await,
            Err(HubError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn should_forget_aborted_flow() {
        let (manager, _bus) = make_manager(FakeDevice::new("test", false));
        let started = manager.init(ConfigEntrySource::User, None).await.unwrap();

        manager.abort(started.flow_id).await.unwrap();

        assert!(manager.list().await.is_empty());
    }

    #[tokio::test]
    async fn should_drop_flow_that_aborted_as_already_configured() {
        let (manager, _bus) = make_manager(FakeDevice::new("test", false));
        let first = manager.init(ConfigEntrySource::User, None).await.unwrap();
        manager
            .configure(first.flow_id, serde_json::json!({"host": "127.0.0.1"}))
            .await
            .unwrap();

        let second = manager.init(ConfigEntrySource::User, None).await.unwrap();
        let result = manager
            .configure(second.flow_id, serde_json::json!({"host": "127.0.0.2"}))
            .await
            .unwrap();

        assert_eq!(
            result.result,
            FlowResult::Abort {
                reason: AbortReason::AlreadyConfigured
            }
        );
        assert!(result.entry.is_none());
        assert!(manager.list().await.is_empty());
    }

    fn manager_with<C, R>(
        client: C,
        repo: R,
    ) -> FlowManager<C, R, LoadedEntryRegistry, Arc<InProcessEventBus>>
    where
        C: DeviceApiClient + Send + Sync,
        R: ConfigEntryRepository + Send + Sync,
    {
        FlowManager::new(
            client,
            Arc::new(ConfigEntryService::new(repo)),
            LoadedEntryRegistry::new(),
            Arc::new(InProcessEventBus::new(16)),
        )
    }

    /// Answers `device_info` only once the gate is opened.
    #[derive(Default)]
    struct GatedDevice {
        gate: Notify,
        started: AtomicUsize,
    }

    impl DeviceApiClient for GatedDevice {
        fn device_info(
            &self,
            _params: &ConnectionParams,
        ) -> impl Future<Output = Result<DeviceInfo, ApiConnectionError>> + Send {
            self.started.fetch_add(1, Ordering::SeqCst);
            let info = DeviceInfo {
                name: "test8266".to_string(),
                ..DeviceInfo::default()
            };
            async move {
                self.gate.notified().await;
                Ok(info)
            }
        }

        fn login(
            &self,
            _params: &ConnectionParams,
        ) -> impl Future<Output = Result<(), ApiConnectionError>> + Send {
            async { Ok(()) }
        }
    }

    /// Fails every insert. With `lose_race`, another writer stores an entry
    /// with the same unique id first.
    #[derive(Default)]
    struct ConflictingRepo {
        inner: InMemoryConfigEntryRepo,
        lose_race: bool,
    }

    impl ConfigEntryRepository for ConflictingRepo {
        fn create(
            &self,
            entry: ConfigEntry,
        ) -> impl Future<Output = Result<ConfigEntry, HubError>> + Send {
            let winner = self.lose_race.then(|| {
                let mut other = entry.clone();
                other.id = ConfigEntryId::new();
                self.inner.create(other)
            });
            async move {
                if let Some(winner) = winner {
                    winner.await?;
                }
                Err(HubError::Storage(
                    "UNIQUE constraint failed: config_entries.unique_id".into(),
                ))
            }
        }

        fn get_by_id(
            &self,
            id: ConfigEntryId,
        ) -> impl Future<Output = Result<Option<ConfigEntry>, HubError>> + Send {
            self.inner.get_by_id(id)
        }

        fn get_all(&self) -> impl Future<Output = Result<Vec<ConfigEntry>, HubError>> + Send {
            self.inner.get_all()
        }

        fn find_by_domain(
            &self,
            domain: &str,
        ) -> impl Future<Output = Result<Vec<ConfigEntry>, HubError>> + Send {
            self.inner.find_by_domain(domain)
        }

        fn update(
            &self,
            entry: ConfigEntry,
        ) -> impl Future<Output = Result<ConfigEntry, HubError>> + Send {
            self.inner.update(entry)
        }

        fn delete(&self, id: ConfigEntryId) -> impl Future<Output = Result<(), HubError>> + Send {
            self.inner.delete(id)
        }
    }

    #[tokio::test]
    async fn should_keep_flow_visible_while_step_runs() {
        let device = Arc::new(GatedDevice::default());
        let manager = Arc::new(manager_with(
            Arc::clone(&device),
            InMemoryConfigEntryRepo::default(),
        ));
        let first = manager
            .init(ConfigEntrySource::Zeroconf, Some(discovery("test8266.local.")))
            .await
            .unwrap();

        let pending = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move {
                manager
                    .configure(first.flow_id, serde_json::json!({}))
                    .await
            }
        });
        while device.started.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let current = manager.get(first.flow_id).await.unwrap();
        assert_eq!(current.result.step_id(), Some(FlowStep::DiscoveryConfirm));
        assert_eq!(manager.list().await.len(), 1);
        let second = manager
            .init(ConfigEntrySource::Zeroconf, Some(discovery("test8266.local.")))
            .await
            .unwrap();
        assert_eq!(
            second.result,
            FlowResult::Abort {
                reason: AbortReason::AlreadyInProgress
            }
        );
        assert!(matches!(
            manager.configure(first.flow_id, serde_json::json!({})).await,
            Err(HubError::Validation(ValidationError::InvalidInput(_)))
        ));

        device.gate.notify_one();
        let done = pending.await.unwrap().unwrap();
        assert_eq!(done.entry.unwrap().unique_id.as_deref(), Some("test8266"));
        assert!(manager.list().await.is_empty());
    }

    #[tokio::test]
    async fn should_keep_flow_when_entry_cannot_be_stored() {
        let manager = manager_with(FakeDevice::new("test", false), ConflictingRepo::default());
        let started = manager.init(ConfigEntrySource::User, None).await.unwrap();

        let result = manager
            .configure(started.flow_id, serde_json::json!({"host": "127.0.0.1"}))
            .await;

        assert!(matches!(result, Err(HubError::Storage(_))));
        let current = manager.get(started.flow_id).await.unwrap();
        assert_eq!(current.result.step_id(), Some(FlowStep::User));
        let retried = manager
            .configure(started.flow_id, serde_json::json!({"host": "127.0.0.1"}))
            .await;
        assert!(matches!(retried, Err(HubError::Storage(_))));
    }

    #[tokio::test]
    async fn should_abort_when_entry_was_stored_by_concurrent_flow() {
        let repo = ConflictingRepo {
            lose_race: true,
            ..ConflictingRepo::default()
        };
        let manager = manager_with(FakeDevice::new("test", false), repo);
        let started = manager.init(ConfigEntrySource::User, None).await.unwrap();

        let result = manager
            .configure(started.flow_id, serde_json::json!({"host": "127.0.0.1"}))
            .await
            .unwrap();

        assert_eq!(
            result.result,
            FlowResult::Abort {
                reason: AbortReason::AlreadyConfigured
            }
        );
        assert!(result.entry.is_none());
        assert!(manager.list().await.is_empty());
    }
}
