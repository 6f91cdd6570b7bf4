//! Entity: the central state-holding concept.
//!
//! An entity represents a single observable/controllable aspect of a device
//! (e.g., a light's on/off state and colour, a power sensor's reading).

mod attribute_value;
mod state;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use attribute_value::AttributeValue;
pub use state::EntityState;

use crate::error::{HubError, ValidationError};
use crate::id::{DeviceId, EntityId};
use crate::time::{Timestamp, now};

/// A state holder addressed by a `<domain>.<object_id>` entity id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub device_id: Option<DeviceId>,
    /// Platform-facing identifier, e.g. `light.living_room`.
    pub entity_id: String,
    pub friendly_name: String,
    pub state: EntityState,
    pub attributes: HashMap<String, AttributeValue>,
    pub last_changed: Timestamp,
    pub last_updated: Timestamp,
}

impl Entity {
    /// Start building a new entity.
    #[must_use]
    pub fn builder() -> EntityBuilder {
        EntityBuilder::default()
    }

    /// The domain part of the entity id (`light` for `light.demo`).
    #[must_use]
    pub fn domain(&self) -> &str {
        split_entity_id(&self.entity_id).map_or("", |(domain, _)| domain)
    }

    /// Look up a single attribute.
    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Set or replace a single attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(key.into(), value);
    }

    /// Replace the state, bumping `last_changed` only when it differs.
    pub fn update_state(&mut self, state: EntityState, at: Timestamp) {
        if self.state != state {
            self.state = state;
            self.last_changed = at;
        }
        self.last_updated = at;
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidEntityId`] when the entity id is not
    /// `<domain>.<object_id>`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if split_entity_id(&self.entity_id).is_none() {
            return Err(ValidationError::InvalidEntityId(self.entity_id.clone()));
        }
        Ok(())
    }
}

/// Split `light.demo` into `("light", "demo")`.
#[must_use]
pub fn split_entity_id(entity_id: &str) -> Option<(&str, &str)> {
    let (domain, object_id) = entity_id.split_once('.')?;
    let valid = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    };
    (valid(domain) && valid(object_id)).then_some((domain, object_id))
}

/// Builder for [`Entity`].
#[derive(Debug, Default)]
pub struct EntityBuilder {
    id: Option<EntityId>,
    device_id: Option<DeviceId>,
    entity_id: Option<String>,
    friendly_name: Option<String>,
    state: EntityState,
    attributes: HashMap<String, AttributeValue>,
}

impl EntityBuilder {
    #[must_use]
    pub fn id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn device_id(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    #[must_use]
    pub fn entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn state(mut self, state: EntityState) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn attributes(mut self, attributes: HashMap<String, AttributeValue>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Build the entity, defaulting the friendly name to the object id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when the entity id is missing or
    /// malformed.
    pub fn build(self) -> Result<Entity, HubError> {
        let entity_id = self.entity_id.unwrap_or_default();
        let friendly_name = match self.friendly_name {
            Some(name) => name,
            None => split_entity_id(&entity_id)
                .map(|(_, object_id)| object_id.replace('_', " "))
                .unwrap_or_default(),
        };
        let ts = now();
        let entity = Entity {
            id: self.id.unwrap_or_default(),
            device_id: self.device_id,
            entity_id,
            friendly_name,
            state: self.state,
            attributes: self.attributes,
            last_changed: ts,
            last_updated: ts,
        };
        entity.validate()?;
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_entity_with_defaults() {
        let entity = Entity::builder().entity_id("light.demo").build().unwrap();
        assert_eq!(entity.domain(), "light");
        assert_eq!(entity.friendly_name, "demo");
        assert_eq!(entity.state, EntityState::Unknown);
        assert!(entity.attributes.is_empty());
    }

    #[test]
    fn should_reject_entity_id_without_domain() {
        let result = Entity::builder().entity_id("demo").build();
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::InvalidEntityId(_)))
        ));
    }

    #[test]
    fn should_reject_entity_id_with_uppercase() {
        assert!(split_entity_id("Light.Demo").is_none());
        assert!(split_entity_id("light.").is_none());
    }

    #[test]
    fn should_only_bump_last_changed_when_state_differs() {
        let mut entity = Entity::builder()
            .entity_id("light.demo")
            .state(EntityState::On)
            .build()
            .unwrap();
        let changed = entity.last_changed;

        let later = changed + chrono::Duration::seconds(5);
        entity.update_state(EntityState::On, later);
        assert_eq!(entity.last_changed, changed);
        assert_eq!(entity.last_updated, later);

        let even_later = later + chrono::Duration::seconds(5);
        entity.update_state(EntityState::Off, even_later);
        assert_eq!(entity.last_changed, even_later);
    }

    #[test]
    fn should_store_and_read_attributes() {
        let entity = Entity::builder()
            .entity_id("sensor.power")
            .attribute("unit_of_measurement", AttributeValue::String("W".into()))
            .build()
            .unwrap();
        assert_eq!(
            entity.get_attribute("unit_of_measurement"),
            Some(&AttributeValue::String("W".into()))
        );
        assert_eq!(entity.get_attribute("missing"), None);
    }
}
