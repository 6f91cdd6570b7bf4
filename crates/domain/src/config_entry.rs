//! Config entry: a persisted, user-approved setup of one integration
//! instance (e.g. one native-API device).

use serde::{Deserialize, Serialize};

use crate::error::{HubError, ValidationError};
use crate::id::ConfigEntryId;
use crate::time::{Timestamp, now};

/// How a config entry came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigEntrySource {
    #[default]
    User,
    Zeroconf,
}

impl ConfigEntrySource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Zeroconf => "zeroconf",
        }
    }
}

impl std::str::FromStr for ConfigEntrySource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "zeroconf" => Ok(Self::Zeroconf),
            other => Err(ValidationError::InvalidId(other.to_string())),
        }
    }
}

/// A persisted integration setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub id: ConfigEntryId,
    /// Integration domain owning the entry (e.g. `native_api`).
    pub domain: String,
    pub title: String,
    /// Stable device identifier; `None` for entries created before devices
    /// were keyed.
    pub unique_id: Option<String>,
    pub source: ConfigEntrySource,
    /// Integration-specific payload.
    pub data: serde_json::Value,
    pub created_at: Timestamp,
}

impl ConfigEntry {
    /// Start building a new config entry.
    #[must_use]
    pub fn builder() -> ConfigEntryBuilder {
        ConfigEntryBuilder::default()
    }

    /// The `host` field of the entry data, when present.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.data.get("host").and_then(serde_json::Value::as_str)
    }

    /// Merge `updates` into the entry data, overwriting existing keys.
    pub fn merge_data(&mut self, updates: serde_json::Map<String, serde_json::Value>) {
        match &mut self.data {
            serde_json::Value::Object(data) => data.extend(updates),
            other => *other = serde_json::Value::Object(updates),
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the domain or title is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.domain.trim().is_empty() {
            return Err(ValidationError::EmptyDomain);
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }
}

/// Builder for [`ConfigEntry`].
#[derive(Debug, Default)]
pub struct ConfigEntryBuilder {
    id: Option<ConfigEntryId>,
    domain: Option<String>,
    title: Option<String>,
    unique_id: Option<String>,
    source: ConfigEntrySource,
    data: Option<serde_json::Value>,
}

impl ConfigEntryBuilder {
    #[must_use]
    pub fn id(mut self, id: ConfigEntryId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    #[must_use]
    pub fn source(mut self, source: ConfigEntrySource) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Build and validate the entry.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when invariants fail.
    pub fn build(self) -> Result<ConfigEntry, HubError> {
        let entry = ConfigEntry {
            id: self.id.unwrap_or_default(),
            domain: self.domain.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            unique_id: self.unique_id,
            source: self.source,
            data: self
                .data
                .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
            created_at: now(),
        };
        entry.validate()?;
        Ok(entry)
    }
}
