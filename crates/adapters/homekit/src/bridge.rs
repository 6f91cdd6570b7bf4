//! Accessory bridge: routes controller writes to the platform and mirrors
//! platform state back into the accessories.

use std::collections::BTreeMap;

use serde::Deserialize;
use tokio::sync::{Mutex, broadcast};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use homelink_app::ports::{EventPublisher, ServiceCaller};
use homelink_domain::entity::Entity;
use homelink_domain::event::{Event, EventType};

use crate::characteristic::CharValue;
use crate::error::HomekitError;
use crate::light::{LightAccessory, LightCommand};

/// Body of a HAP `PUT /characteristics` request.
#[derive(Debug, Deserialize)]
struct WriteRequest {
    characteristics: Vec<CharacteristicWrite>,
}

#[derive(Debug, Deserialize)]
struct CharacteristicWrite {
    aid: u64,
    iid: u64,
    /// Absent when the controller only toggles event notifications.
    #[serde(default)]
    value: Option<serde_json::Value>,
}

/// Holds the accessories exposed to controllers, keyed by aid.
pub struct AccessoryBridge<S, P> {
    accessories: Mutex<BTreeMap<u64, LightAccessory>>,
    caller: S,
    publisher: P,
}

impl<S, P> AccessoryBridge<S, P>
where
    S: ServiceCaller + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    pub fn new(caller: S, publisher: P) -> Self {
        Self {
            accessories: Mutex::new(BTreeMap::new()),
            caller,
            publisher,
        }
    }

    /// Register an accessory.
    ///
    /// # Errors
    ///
    /// Returns [`HomekitError::DuplicateAccessory`] when the aid is taken.
    pub async fn add_accessory(&self, accessory: LightAccessory) -> Result<(), HomekitError> {
        let mut accessories = self.accessories.lock().await;
        let aid = accessory.aid();
        if accessories.contains_key(&aid) {
            return Err(HomekitError::DuplicateAccessory(aid));
        }
        tracing::debug!(aid, entity_id = accessory.entity_id(), "accessory added");
        accessories.insert(aid, accessory);
        Ok(())
    }

    /// Snapshot of a registered accessory.
    pub async fn accessory(&self, aid: u64) -> Option<LightAccessory> {
        self.accessories.lock().await.get(&aid).cloned()
    }

    /// HAP `/accessories` document.
    pub async fn accessories_json(&self) -> serde_json::Value {
        let accessories = self.accessories.lock().await;
        serde_json::json!({
            "accessories": accessories
                .values()
                .map(|accessory| accessory.accessory().to_json())
                .collect::<Vec<_>>(),
        })
    }

    /// Apply a characteristic write request, returning how many service calls
    /// it produced.
    ///
    /// Writes to unknown accessories or characteristics are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`HomekitError::Decode`] for a malformed body, or
    /// [`HomekitError::Domain`] when a service call or event publish fails.
    #[tracing::instrument(skip_all)]
    pub async fn set_characteristics(&self, body: &[u8]) -> Result<usize, HomekitError> {
        let request: WriteRequest = serde_json::from_slice(body)?;

        let mut grouped: BTreeMap<u64, Vec<(u64, i64)>> = BTreeMap::new();
        for write in request.characteristics {
            let Some(value) = write.value else {
                continue;
            };
            let Some(value) = CharValue::numeric_from_json(&value) else {
                tracing::warn!(aid = write.aid, iid = write.iid, %value, "unsupported value");
                continue;
            };
            grouped.entry(write.aid).or_default().push((write.iid, value));
        }

        let pending = {
            let mut accessories = self.accessories.lock().await;
            let mut pending = Vec::new();
            for (aid, writes) in grouped {
                let Some(accessory) = accessories.get_mut(&aid) else {
                    tracing::warn!(aid, "write to unknown accessory");
                    continue;
                };
                for command in accessory.write(&writes) {
                    pending.push((
                        accessory.entity_id().to_string(),
                        accessory.display_name().to_string(),
                        command,
                    ));
                }
            }
            pending
        };

        let count = pending.len();
        for (entity_id, display_name, command) in pending {
            self.dispatch(entity_id, display_name, command).await?;
        }
        Ok(count)
    }

    async fn dispatch(
        &self,
        entity_id: String,
        display_name: String,
        command: LightCommand,
    ) -> Result<(), HomekitError> {
        tracing::info!(%entity_id, service = %command.call, "{}", command.description);
        let service = command.call.service.clone();
        self.caller
            .call(command.call)
            .await
            .map_err(HomekitError::Domain)?;
        let data = serde_json::json!({
            "entity_id": entity_id,
            "display_name": display_name,
            "service": service,
            "value": command.description,
        });
        self.publisher
            .publish(Event::new(
                EventType::AccessoryStateChange,
                Some(entity_id),
                data,
            ))
            .await
            .map_err(HomekitError::Domain)
    }

    /// Mirror a `state_changed` event into the accessories of its entity.
    /// Other events are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`HomekitError::Decode`] when the new state can't be read.
    pub async fn handle_event(&self, event: &Event) -> Result<(), HomekitError> {
        if event.event_type != EventType::StateChanged {
            return Ok(());
        }
        let Some(entity_id) = event
            .entity_id
            .as_deref()
            .or_else(|| event.data.get("entity_id").and_then(serde_json::Value::as_str))
        else {
            return Ok(());
        };
        let new_state: Option<Entity> = match event.data.get("new_state") {
            Some(value) => serde_json::from_value(value.clone())?,
            None => None,
        };

        let mut accessories = self.accessories.lock().await;
        for accessory in accessories
            .values_mut()
            .filter(|accessory| accessory.entity_id() == entity_id)
        {
            tracing::trace!(aid = accessory.aid(), entity_id, "updating accessory");
            accessory.update_state(new_state.as_ref());
        }
        Ok(())
    }

    /// Consume the event bus until it closes.
    pub async fn run(&self, events: broadcast::Receiver<Event>) {
        let mut stream = BroadcastStream::new(events);
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    if let Err(err) = self.handle_event(&event).await {
                        tracing::warn!(error = %err, "unable to mirror event");
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(count)) => {
                    tracing::warn!(count, "accessory bridge lagging, events skipped");
                }
            }
        }
        tracing::debug!("event bus closed");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::Arc;

    use homelink_app::event_bus::InProcessEventBus;
    use homelink_app::services::state_machine::StateMachine;
    use homelink_domain::entity::{AttributeValue, EntityState};
    use homelink_domain::error::HubError;
    use homelink_domain::service::ServiceCall;

    use super::*;
    use crate::light::LightChar;

    #[derive(Default)]
    struct RecordingCaller {
        calls: std::sync::Mutex<Vec<ServiceCall>>,
    }

    impl RecordingCaller {
        fn calls(&self) -> Vec<ServiceCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ServiceCaller for RecordingCaller {
        fn call(&self, call: ServiceCall) -> impl Future<Output = Result<(), HubError>> + Send {
            self.calls.lock().unwrap().push(call);
            async { Ok(()) }
        }
    }

    fn brightness_light(aid: u64, entity_id: &str) -> LightAccessory {
        let capabilities = serde_json::json!({"supported_color_modes": ["brightness"]});
        LightAccessory::new(aid, "Light", entity_id, None, Some(&capabilities))
    }

    fn setup() -> (
        AccessoryBridge<Arc<RecordingCaller>, Arc<InProcessEventBus>>,
        Arc<RecordingCaller>,
        Arc<InProcessEventBus>,
    ) {
        let caller = Arc::new(RecordingCaller::default());
        let bus = Arc::new(InProcessEventBus::new(16));
        (
            AccessoryBridge::new(Arc::clone(&caller), Arc::clone(&bus)),
            caller,
            bus,
        )
    }

    #[tokio::test]
    async fn should_reject_duplicate_aid() {
        let (bridge, _, _) = setup();
        bridge.add_accessory(brightness_light(2, "light.a")).await.unwrap();

        let result = bridge.add_accessory(brightness_light(2, "light.b")).await;

        assert!(matches!(result, Err(HomekitError::DuplicateAccessory(2))));
    }

    #[tokio::test]
    async fn should_dispatch_write_and_publish_event() {
        let (bridge, caller, bus) = setup();
        let light = brightness_light(2, "light.demo");
        let on = light.iid(LightChar::OnPrimary).unwrap();
        let brightness = light.iid(LightChar::BrightnessPrimary).unwrap();
        bridge.add_accessory(light).await.unwrap();
        let mut rx = bus.subscribe();

        let body = serde_json::json!({"characteristics": [
            {"aid": 2, "iid": on, "value": true},
            {"aid": 2, "iid": brightness, "value": 20},
        ]});
        let count = bridge
            .set_characteristics(body.to_string().as_bytes())
            .await
            .unwrap();

        assert_eq!(count, 1);
        let calls = caller.calls();
        assert_eq!(calls[0].to_string(), "light.turn_on");
        assert_eq!(
            calls[0].data,
            serde_json::json!({"entity_id": "light.demo", "brightness_pct": 20})
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::AccessoryStateChange);
        assert_eq!(
            event.data,
            serde_json::json!({
                "entity_id": "light.demo",
                "display_name": "Light",
                "service": "turn_on",
                "value": "Set state to 1, brightness at 20%",
            })
        );
    }

    #[tokio::test]
    async fn should_skip_unknown_accessory_and_event_only_writes() {
        let (bridge, caller, _) = setup();
        let light = brightness_light(2, "light.demo");
        let on = light.iid(LightChar::OnPrimary).unwrap();
        bridge.add_accessory(light).await.unwrap();

        let body = serde_json::json!({"characteristics": [
            {"aid": 7, "iid": on, "value": 1},
            {"aid": 2, "iid": on, "ev": true},
            {"aid": 2, "iid": 999, "value": 1},
        ]});
        let count = bridge
            .set_characteristics(body.to_string().as_bytes())
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert!(caller.calls().is_empty());
    }

    #[tokio::test]
    async fn should_reject_malformed_body() {
        let (bridge, _, _) = setup();
        let result = bridge.set_characteristics(b"{not json").await;
        assert!(matches!(result, Err(HomekitError::Decode(_))));
    }

    #[tokio::test]
    async fn should_mirror_state_changes_from_state_machine() {
        let (bridge, _, bus) = setup();
        bridge
            .add_accessory(brightness_light(2, "light.demo"))
            .await
            .unwrap();
        let states = StateMachine::new(Arc::clone(&bus));
        let mut rx = bus.subscribe();

        let attributes = HashMap::from([("brightness".to_string(), AttributeValue::Int(102))]);
        states
            .set("light.demo", EntityState::On, attributes)
            .await
            .unwrap();
        bridge.handle_event(&rx.recv().await.unwrap()).await.unwrap();

        let light = bridge.accessory(2).await.unwrap();
        assert_eq!(light.value(LightChar::OnPrimary), Some(1));
        assert_eq!(light.value(LightChar::BrightnessPrimary), Some(40));

        states.remove("light.demo").await.unwrap();
        bridge.handle_event(&rx.recv().await.unwrap()).await.unwrap();

        let light = bridge.accessory(2).await.unwrap();
        assert_eq!(light.value(LightChar::OnPrimary), Some(0));
    }

    #[tokio::test]
    async fn should_run_until_bus_closes() {
        let (bridge, _, _) = setup();
        bridge
            .add_accessory(brightness_light(2, "light.demo"))
            .await
            .unwrap();
        let bus = InProcessEventBus::new(16);
        let rx = bus.subscribe();

        let entity = Entity::builder()
            .entity_id("light.demo")
            .state(EntityState::On)
            .build()
            .unwrap();
        bus.publish(Event::new(
            EventType::StateChanged,
            Some("light.demo".to_string()),
            serde_json::json!({"entity_id": "light.demo", "old_state": null, "new_state": entity}),
        ))
        .await
        .unwrap();
        drop(bus);

        bridge.run(rx).await;

        let light = bridge.accessory(2).await.unwrap();
        assert_eq!(light.value(LightChar::OnPrimary), Some(1));
    }

    #[tokio::test]
    async fn should_list_accessories_as_hap_json() {
        let (bridge, _, _) = setup();
        bridge
            .add_accessory(brightness_light(2, "light.demo"))
            .await
            .unwrap();

        let json = bridge.accessories_json().await;

        assert_eq!(json["accessories"][0]["aid"], 2);
        assert_eq!(json["accessories"][0]["services"][1]["type"], "43");
    }
}
