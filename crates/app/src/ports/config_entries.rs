//! Config entry repository port.

use std::future::Future;

use homelink_domain::config_entry::ConfigEntry;
use homelink_domain::error::HubError;
use homelink_domain::id::ConfigEntryId;

/// Persistence for [`ConfigEntry`] records.
pub trait ConfigEntryRepository {
    /// Insert a new entry.
    fn create(
        &self,
        entry: ConfigEntry,
    ) -> impl Future<Output = Result<ConfigEntry, HubError>> + Send;

    fn get_by_id(
        &self,
        id: ConfigEntryId,
    ) -> impl Future<Output = Result<Option<ConfigEntry>, HubError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<ConfigEntry>, HubError>> + Send;

    /// All entries belonging to an integration domain.
    fn find_by_domain(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<ConfigEntry>, HubError>> + Send;

    /// Replace an existing entry.
    ///
    /// Implementations return [`HubError::NotFound`] when the entry is missing.
    fn update(
        &self,
        entry: ConfigEntry,
    ) -> impl Future<Output = Result<ConfigEntry, HubError>> + Send;

    fn delete(&self, id: ConfigEntryId) -> impl Future<Output = Result<(), HubError>> + Send;
}

impl<T: ConfigEntryRepository + Send + Sync> ConfigEntryRepository for std::sync::Arc<T> {
    fn create(
        &self,
        entry: ConfigEntry,
    ) -> impl Future<Output = Result<ConfigEntry, HubError>> + Send {
        (**self).create(entry)
    }

    fn get_by_id(
        &self,
        id: ConfigEntryId,
    ) -> impl Future<Output = Result<Option<ConfigEntry>, HubError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<ConfigEntry>, HubError>> + Send {
        (**self).get_all()
    }

    fn find_by_domain(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<ConfigEntry>, HubError>> + Send {
        (**self).find_by_domain(domain)
    }

    fn update(
        &self,
        entry: ConfigEntry,
    ) -> impl Future<Output = Result<ConfigEntry, HubError>> + Send {
        (**self).update(entry)
    }

    fn delete(&self, id: ConfigEntryId) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).delete(id)
    }
}
