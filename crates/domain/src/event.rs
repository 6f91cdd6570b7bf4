//! Event: an immutable record of something that happened.
//!
//! Events are produced when entity state changes, services are called,
//! accessories are written to, config entries are created, or a gateway
//! connects.

use serde::{Deserialize, Serialize};

use crate::id::EventId;
use crate::time::{Timestamp, now};

/// Kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StateChanged,
    ServiceCalled,
    AccessoryStateChange,
    ConfigEntryCreated,
    GatewayConnected,
}

impl EventType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StateChanged => "state_changed",
            Self::ServiceCalled => "service_called",
            Self::AccessoryStateChange => "accessory_state_change",
            Self::ConfigEntryCreated => "config_entry_created",
            Self::GatewayConnected => "gateway_connected",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    /// Entity the event is about (`light.bedroom`), if any.
    pub entity_id: Option<String>,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Event {
    /// Create a new event stamped with the current time.
    #[must_use]
    pub fn new(event_type: EventType, entity_id: Option<String>, data: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            entity_id,
            data,
            timestamp: now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_event_type_as_snake_case() {
        let json = serde_json::to_value(EventType::AccessoryStateChange).unwrap();
        assert_eq!(json, "accessory_state_change");
        assert_eq!(EventType::StateChanged.to_string(), "state_changed");
    }

    #[test]
    fn should_create_events_with_distinct_ids() {
        let a = Event::new(EventType::GatewayConnected, None, serde_json::json!({}));
        let b = Event::new(EventType::GatewayConnected, None, serde_json::json!({}));
        assert_ne!(a.id, b.id);
    }
}
