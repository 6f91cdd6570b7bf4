//! Config entry service: use-cases for managing config entries.

use homelink_domain::config_entry::ConfigEntry;
use homelink_domain::error::{HubError, NotFoundError};
use homelink_domain::id::ConfigEntryId;

use crate::ports::ConfigEntryRepository;

/// Application service for config entry CRUD.
pub struct ConfigEntryService<R> {
    repo: R,
}

impl<R: ConfigEntryRepository + Send + Sync> ConfigEntryService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Persist a new entry after validating domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self, entry), fields(domain = %entry.domain, title = %entry.title))]
    pub async fn create_entry(&self, entry: ConfigEntry) -> Result<ConfigEntry, HubError> {
        entry.validate()?;
        let entry = self.repo.create(entry).await?;
        tracing::info!(entry_id = %entry.id, "config entry created");
        Ok(entry)
    }

    /// Look up an entry by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no entry with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_entry(&self, id: ConfigEntryId) -> Result<ConfigEntry, HubError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "ConfigEntry",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all entries.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_entries(&self) -> Result<Vec<ConfigEntry>, HubError> {
        self.repo.get_all().await
    }

    /// List the entries of one integration domain.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_by_domain(&self, domain: &str) -> Result<Vec<ConfigEntry>, HubError> {
        self.repo.find_by_domain(domain).await
    }

    /// Find the entry of `domain` keyed by `unique_id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn find_by_unique_id(
        &self,
        domain: &str,
        unique_id: &str,
    ) -> Result<Option<ConfigEntry>, HubError> {
        let entries = self.repo.find_by_domain(domain).await?;
        Ok(entries
            .into_iter()
            .find(|entry| entry.unique_id.as_deref() == Some(unique_id)))
    }

    /// Store changes made to an existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if invariants fail, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self, entry), fields(entry_id = %entry.id))]
    pub async fn update_entry(&self, entry: ConfigEntry) -> Result<ConfigEntry, HubError> {
        entry.validate()?;
        self.repo.update(entry).await
    }

    /// Delete an entry by id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the entry does not exist, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_entry(&self, id: ConfigEntryId) -> Result<(), HubError> {
        self.get_entry(id).await?;
        self.repo.delete(id).await
    }
}
