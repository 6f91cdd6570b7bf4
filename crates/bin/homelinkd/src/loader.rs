//! Startup loading of persisted native API entries.
//!
//! Every stored entry of the native API domain is contacted once; the entries
//! whose device answers are marked loaded so config flows can tell a
//! reachable node from a stale one. Each node also gets a
//! `binary_sensor.<node>_status` entity, `on` when it answered and
//! `unavailable` otherwise.

use homelink_app::loaded_entries::LoadedEntryRegistry;
use homelink_app::ports::{ConfigEntryRepository, DeviceApiClient, EventPublisher};
use homelink_app::services::config_entry_service::ConfigEntryService;
use homelink_app::services::state_machine::StateMachine;
use homelink_domain::config_entry::ConfigEntry;
use homelink_domain::entity::{AttributeValue, Entity, EntityState};
use homelink_domain::error::HubError;
use homelink_domain::native_api::{ConnectionParams, DOMAIN, DeviceInfo, EntryData};

/// Load all native API entries and return how many answered.
///
/// An entry with unreadable data or an unreachable device is logged and
/// skipped.
///
/// # Errors
///
/// Returns a storage error if the entries cannot be listed.
pub async fn load_native_api_entries<C, R, P>(
    client: &C,
    entries: &ConfigEntryService<R>,
    registry: &LoadedEntryRegistry,
    states: &StateMachine<P>,
) -> Result<usize, HubError>
where
    C: DeviceApiClient + Sync,
    R: ConfigEntryRepository + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    let mut loaded = 0;
    for entry in entries.list_by_domain(DOMAIN).await? {
        let data: EntryData = match serde_json::from_value(entry.data.clone()) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(entry_id = %entry.id, error = %err, "invalid entry data");
                continue;
            }
        };
        let params = ConnectionParams::from(&data);
        let info = match client.device_info(&params).await {
            Ok(info) => {
                tracing::info!(entry_id = %entry.id, name = %info.name, "entry loaded");
                registry.insert(entry.id, info.clone());
                loaded += 1;
                Some(info)
            }
            Err(err) => {
                tracing::warn!(
                    entry_id = %entry.id,
                    host = %data.host,
                    error = %err,
                    "device unreachable"
                );
                None
            }
        };
        let status = match status_entity(&entry, &data, info.as_ref()) {
            Ok(entity) => states.insert(entity).await,
            Err(err) => Err(err),
        };
        if let Err(err) = status {
            tracing::warn!(entry_id = %entry.id, error = %err, "unable to set node status");
        }
    }
    Ok(loaded)
}

/// Connectivity entity of a node, named after its unique id or title.
fn status_entity(
    entry: &ConfigEntry,
    data: &EntryData,
    info: Option<&DeviceInfo>,
) -> Result<Entity, HubError> {
    let name = entry.unique_id.as_deref().unwrap_or(entry.title.as_str());
    let mut builder = Entity::builder()
        .entity_id(format!("binary_sensor.{}_status", object_id(name)))
        .friendly_name(format!("{} status", entry.title))
        .attribute("host", AttributeValue::String(data.host.clone()))
        .attribute("port", AttributeValue::Int(i64::from(data.port)));
    builder = match info {
        Some(info) => builder
            .state(EntityState::On)
            .attribute("version", AttributeValue::String(info.version.clone()))
            .attribute("model", AttributeValue::String(info.model.clone())),
        None => builder.state(EntityState::Unavailable),
    };
    builder.build()
}

/// Lowercase, `_`-separated object id.
fn object_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            id.push(c.to_ascii_lowercase());
        } else if !id.is_empty() && !id.ends_with('_') {
            id.push('_');
        }
    }
    while id.ends_with('_') {
        id.pop();
    }
    id
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use homelink_adapter_storage_sqlite_sqlx::SqliteConfigEntryRepository;
    use homelink_app::event_bus::InProcessEventBus;
    use homelink_app::ports::{ApiConnectionError, LoadedEntries};

    use super::*;

    /// Answers for one host only.
    struct OnlineHost(&'static str);

    impl DeviceApiClient for OnlineHost {
        async fn device_info(
            &self,
            params: &ConnectionParams,
        ) -> Result<DeviceInfo, ApiConnectionError> {
            if params.host == self.0 {
                Ok(DeviceInfo {
                    name: "kitchen".to_string(),
                    uses_password: false,
                    mac_address: String::new(),
                    version: "2024.6.0".to_string(),
                    model: "esp01_1m".to_string(),
                })
            } else {
                Err(ApiConnectionError::Timeout)
            }
        }

        async fn login(&self, _params: &ConnectionParams) -> Result<(), ApiConnectionError> {
            Ok(())
        }
    }

    async fn service() -> ConfigEntryService<SqliteConfigEntryRepository> {
        let db = homelink_adapter_storage_sqlite_sqlx::Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        ConfigEntryService::new(SqliteConfigEntryRepository::new(db.pool().clone()))
    }

    fn states() -> StateMachine<Arc<InProcessEventBus>> {
        StateMachine::new(Arc::new(InProcessEventBus::new(16)))
    }

    fn entry(domain: &str, title: &str, data: serde_json::Value) -> ConfigEntry {
        ConfigEntry::builder()
            .domain(domain)
            .title(title)
            .data(data)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_only_mark_reachable_entries_as_loaded() {
        let entries = service().await;
        let online = entries
            .create_entry(entry(
                DOMAIN,
                "kitchen",
                serde_json::json!({"host": "10.0.0.1", "port": 6053, "password": ""}),
            ))
            .await
            .unwrap();
        let offline = entries
            .create_entry(entry(
                DOMAIN,
                "garage",
                serde_json::json!({"host": "10.0.0.2", "port": 6053, "password": ""}),
            ))
            .await
            .unwrap();
        let registry = LoadedEntryRegistry::new();
        let states = states();

        let loaded =
            load_native_api_entries(&OnlineHost("10.0.0.1"), &entries, &registry, &states)
                .await
                .unwrap();

        assert_eq!(loaded, 1);
        assert_eq!(registry.device_info(online.id).unwrap().name, "kitchen");
        assert!(!registry.is_loaded(offline.id));

        let kitchen = states.get("binary_sensor.kitchen_status").await.unwrap();
        assert_eq!(kitchen.state, EntityState::On);
        assert_eq!(
            kitchen.get_attribute("version"),
            Some(&AttributeValue::String("2024.6.0".to_string()))
        );
        let garage = states.get("binary_sensor.garage_status").await.unwrap();
        assert_eq!(garage.state, EntityState::Unavailable);
    }

    #[tokio::test]
    async fn should_name_status_entity_after_unique_id() {
        let entries = service().await;
        entries
            .create_entry(
                ConfigEntry::builder()
                    .domain(DOMAIN)
                    .title("Kitchen Light")
                    .unique_id("kitchen-light")
                    .data(serde_json::json!({"host": "10.0.0.1", "port": 6053}))
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        let states = states();

        load_native_api_entries(
            &OnlineHost("10.0.0.1"),
            &entries,
            &LoadedEntryRegistry::new(),
            &states,
        )
        .await
        .unwrap();

        let status = states
            .get("binary_sensor.kitchen_light_status")
            .await
            .unwrap();
        assert_eq!(status.friendly_name, "Kitchen Light status");
    }

    #[tokio::test]
    async fn should_skip_entries_of_other_domains_and_bad_data() {
        let entries = service().await;
        entries
            .create_entry(entry(
                "mysensors",
                "gateway",
                serde_json::json!({"host": "10.0.0.1", "port": 6053}),
            ))
            .await
            .unwrap();
        entries
            .create_entry(entry(DOMAIN, "broken", serde_json::json!({"port": "nope"})))
            .await
            .unwrap();
        let registry = LoadedEntryRegistry::new();
        let states = states();

        let loaded =
            load_native_api_entries(&OnlineHost("10.0.0.1"), &entries, &registry, &states)
                .await
                .unwrap();

        assert_eq!(loaded, 0);
        assert!(states.all().await.is_empty());
    }
}
