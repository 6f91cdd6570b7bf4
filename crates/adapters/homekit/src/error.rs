//! HomeKit adapter error types.

use homelink_domain::error::HubError;

/// Errors specific to the HomeKit adapter.
#[derive(Debug, thiserror::Error)]
pub enum HomekitError {
    /// A characteristic write request or event payload wasn't valid JSON.
    #[error("malformed payload")]
    Decode(#[from] serde_json::Error),

    /// An accessory with the same aid is already registered.
    #[error("accessory {0} already registered")]
    DuplicateAccessory(u64),

    /// A domain-level error, e.g. from the service caller.
    #[error("domain error")]
    Domain(#[source] HubError),
}

impl HomekitError {
    /// Convert into a [`HubError`] for propagation across port boundaries.
    pub fn into_domain(self) -> HubError {
        match self {
            Self::Domain(err) => err,
            other => HubError::Storage(Box::new(other)),
        }
    }
}

impl From<HomekitError> for HubError {
    fn from(err: HomekitError) -> Self {
        err.into_domain()
    }
}
