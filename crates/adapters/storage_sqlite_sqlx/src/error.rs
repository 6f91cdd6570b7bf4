//! Storage-specific error type wrapping sqlx errors.

use homelink_domain::error::HubError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to serialize entry data.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for HubError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_wrap_storage_error_as_hub_storage_error() {
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: HubError = StorageError::from(json).into();
        assert!(matches!(err, HubError::Storage(_)));
    }
}
