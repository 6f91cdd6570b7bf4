//! Service calls: commands addressed to an integration domain
//! (`light.turn_on`, `light.turn_off`, …).

use serde::{Deserialize, Serialize};

/// Service data key carrying the targeted entity id.
pub const ATTR_ENTITY_ID: &str = "entity_id";

/// A request to run `domain.service` with the given data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub data: serde_json::Value,
}

impl ServiceCall {
    /// Create a call targeting a single entity.
    #[must_use]
    pub fn for_entity(
        domain: impl Into<String>,
        service: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        let mut data = serde_json::Map::new();
        data.insert(
            ATTR_ENTITY_ID.to_string(),
            serde_json::Value::String(entity_id.into()),
        );
        Self {
            domain: domain.into(),
            service: service.into(),
            data: serde_json::Value::Object(data),
        }
    }

    /// Add a data field, replacing any previous value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        if let serde_json::Value::Object(data) = &mut self.data {
            data.insert(key.into(), value.into());
        } else {
            let mut data = serde_json::Map::new();
            data.insert(key.into(), value.into());
            self.data = serde_json::Value::Object(data);
        }
        self
    }

    /// The targeted entity id, if any.
    #[must_use]
    pub fn entity_id(&self) -> Option<&str> {
        self.data
            .get(ATTR_ENTITY_ID)
            .and_then(serde_json::Value::as_str)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}

impl std::fmt::Display for ServiceCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.domain, self.service)
    }
}
