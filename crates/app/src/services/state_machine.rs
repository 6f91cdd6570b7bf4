//! State machine: the current state of every entity, in memory.
//!
//! Each write publishes a `state_changed` event carrying the previous and
//! the new entity (`null` when the entity was created or removed).

use std::collections::HashMap;

use tokio::sync::RwLock;

use homelink_domain::entity::{AttributeValue, Entity, EntityState};
use homelink_domain::error::HubError;
use homelink_domain::event::{Event, EventType};
use homelink_domain::time::now;

use crate::ports::EventPublisher;

pub struct StateMachine<P> {
    states: RwLock<HashMap<String, Entity>>,
    publisher: P,
}

impl<P: EventPublisher + Send + Sync> StateMachine<P> {
    pub fn new(publisher: P) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            publisher,
        }
    }

    /// Set the state and attributes of `entity_id`, creating it if needed.
    ///
    /// Attributes replace the previous ones.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] for a malformed entity id, or an
    /// error from the event publisher.
    #[tracing::instrument(skip(self, attributes))]
    pub async fn set(
        &self,
        entity_id: &str,
        state: EntityState,
        attributes: HashMap<String, AttributeValue>,
    ) -> Result<Entity, HubError> {
        let (old, new) = {
            let mut states = self.states.write().await;
            let old = states.get(entity_id).cloned();
            let new = match &old {
                Some(previous) => {
                    let mut entity = previous.clone();
                    entity.update_state(state, now());
                    entity.attributes = attributes;
                    entity
                }
                None => Entity::builder()
                    .entity_id(entity_id)
                    .state(state)
                    .attributes(attributes)
                    .build()?,
            };
            states.insert(new.entity_id.clone(), new.clone());
            (old, new)
        };
        self.publish_change(&new.entity_id, old.as_ref(), Some(&new))
            .await?;
        Ok(new)
    }

    /// Store a whole entity, e.g. one reported by an integration.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] for an invalid entity, or an error
    /// from the event publisher.
    pub async fn insert(&self, entity: Entity) -> Result<Entity, HubError> {
        entity.validate()?;
        let old = self
            .states
            .write()
            .await
            .insert(entity.entity_id.clone(), entity.clone());
        self.publish_change(&entity.entity_id, old.as_ref(), Some(&entity))
            .await?;
        Ok(entity)
    }

    pub async fn get(&self, entity_id: &str) -> Option<Entity> {
        self.states.read().await.get(entity_id).cloned()
    }

    /// All entities, sorted by entity id.
    pub async fn all(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.states.read().await.values().cloned().collect();
        entities.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        entities
    }

    /// Remove an entity, returning it when it existed.
    ///
    /// # Errors
    ///
    /// Returns an error from the event publisher.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, entity_id: &str) -> Result<Option<Entity>, HubError> {
        let old = self.states.write().await.remove(entity_id);
        if let Some(old) = &old {
            self.publish_change(entity_id, Some(old), None).await?;
        }
        Ok(old)
    }

    async fn publish_change(
        &self,
        entity_id: &str,
        old: Option<&Entity>,
        new: Option<&Entity>,
    ) -> Result<(), HubError> {
        let data = serde_json::json!({
            "entity_id": entity_id,
            "old_state": old,
            "new_state": new,
        });
        self.publisher
            .publish(Event::new(
                EventType::StateChanged,
                Some(entity_id.to_string()),
                data,
            ))
            .await
    }
}
