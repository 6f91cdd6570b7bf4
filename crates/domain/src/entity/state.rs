//! Entity state: the current operational state of an entity.

use serde::{Deserialize, Serialize};

/// Discrete operational state of an entity.
///
/// Sensors report free-form readings through [`Value`](Self::Value); every
/// other state serialises to its lowercase name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityState {
    On,
    Off,
    #[default]
    Unknown,
    Unavailable,
    Value(String),
}

impl EntityState {
    /// Whether the entity is reachable (anything but [`Unavailable`](Self::Unavailable)).
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }

    /// Whether the entity reports `on`.
    #[must_use]
    pub fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }
}

impl From<String> for EntityState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "on" => Self::On,
            "off" => Self::Off,
            "unknown" => Self::Unknown,
            "unavailable" => Self::Unavailable,
            _ => Self::Value(value),
        }
    }
}

impl From<&str> for EntityState {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<EntityState> for String {
    fn from(state: EntityState) -> Self {
        state.to_string()
    }
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
            Self::Unknown => f.write_str("unknown"),
            Self::Unavailable => f.write_str("unavailable"),
            Self::Value(value) => f.write_str(value),
        }
    }
}
