//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`HubError`]
//! via `From` when crossing a port boundary.

/// Top-level error returned by domain and application operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The requested item does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// A persistence or IO adapter failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A name or title was empty.
    #[error("name must not be empty")]
    EmptyName,

    /// An entity id was not of the form `<domain>.<object_id>`.
    #[error("invalid entity id {0:?}")]
    InvalidEntityId(String),

    /// A config entry domain was empty.
    #[error("domain must not be empty")]
    EmptyDomain,

    /// A host was empty.
    #[error("host must not be empty")]
    EmptyHost,

    /// A port was zero.
    #[error("port must be non-zero")]
    InvalidPort,

    /// An identifier could not be parsed.
    #[error("invalid identifier {0:?}")]
    InvalidId(String),

    /// Submitted form input did not match the expected fields.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Lookup miss for a typed item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Kind of item that was looked up (e.g. `"ConfigEntry"`).
    pub entity: &'static str,
    /// Identifier that was looked up.
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_validation_error_into_hub_error() {
        let err: HubError = ValidationError::EmptyName.into();
        assert!(matches!(err, HubError::Validation(ValidationError::EmptyName)));
    }

    #[test]
    fn should_display_not_found_with_kind_and_id() {
        let err = NotFoundError {
            entity: "ConfigEntry",
            id: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "ConfigEntry abc not found");
    }

    #[test]
    fn should_display_invalid_entity_id_with_value() {
        let err = ValidationError::InvalidEntityId("demo".to_string());
        assert_eq!(err.to_string(), "invalid entity id \"demo\"");
    }
}
