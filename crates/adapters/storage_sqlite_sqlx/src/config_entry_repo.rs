//! `SQLite` implementation of [`ConfigEntryRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use homelink_app::ports::ConfigEntryRepository;
use homelink_domain::config_entry::{ConfigEntry, ConfigEntrySource};
use homelink_domain::error::{HubError, NotFoundError};
use homelink_domain::id::ConfigEntryId;

use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`ConfigEntry`].
struct Wrapper(ConfigEntry);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<ConfigEntry> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let domain: String = row.try_get("domain")?;
        let title: String = row.try_get("title")?;
        let unique_id: Option<String> = row.try_get("unique_id")?;
        let source: String = row.try_get("source")?;
        let data: String = row.try_get("data")?;
        let created_at: String = row.try_get("created_at")?;

        let id =
            ConfigEntryId::from_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let source = ConfigEntrySource::from_str(&source)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let data: serde_json::Value =
            serde_json::from_str(&data).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();

        Ok(Self(ConfigEntry {
            id,
            domain,
            title,
            unique_id,
            source,
            data,
            created_at,
        }))
    }
}

const INSERT: &str = "INSERT INTO config_entries (id, domain, title, unique_id, source, data, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT * FROM config_entries WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM config_entries ORDER BY created_at";
const SELECT_BY_DOMAIN: &str =
    "SELECT * FROM config_entries WHERE domain = ? ORDER BY created_at";
const UPDATE: &str =
    "UPDATE config_entries SET title = ?, unique_id = ?, source = ?, data = ? WHERE id = ?";
const DELETE_BY_ID: &str = "DELETE FROM config_entries WHERE id = ?";

/// `SQLite`-backed config entry repository.
pub struct SqliteConfigEntryRepository {
    pool: SqlitePool,
}

impl SqliteConfigEntryRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ConfigEntryRepository for SqliteConfigEntryRepository {
    fn create(
        &self,
        entry: ConfigEntry,
    ) -> impl Future<Output = Result<ConfigEntry, HubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let data = serde_json::to_string(&entry.data).map_err(StorageError::from)?;
            sqlx::query(INSERT)
                .bind(entry.id.to_string())
                .bind(&entry.domain)
                .bind(&entry.title)
                .bind(&entry.unique_id)
                .bind(entry.source.as_str())
                .bind(&data)
                .bind(entry.created_at.to_rfc3339())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(entry)
        }
    }

    fn get_by_id(
        &self,
        id: ConfigEntryId,
    ) -> impl Future<Output = Result<Option<ConfigEntry>, HubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<ConfigEntry>, HubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn find_by_domain(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<ConfigEntry>, HubError>> + Send {
        let pool = self.pool.clone();
        let domain = domain.to_string();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_DOMAIN)
                .bind(domain)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn update(
        &self,
        entry: ConfigEntry,
    ) -> impl Future<Output = Result<ConfigEntry, HubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let data = serde_json::to_string(&entry.data).map_err(StorageError::from)?;
            let result = sqlx::query(UPDATE)
                .bind(&entry.title)
                .bind(&entry.unique_id)
                .bind(entry.source.as_str())
                .bind(&data)
                .bind(entry.id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            if result.rows_affected() == 0 {
                return Err(NotFoundError {
                    entity: "ConfigEntry",
                    id: entry.id.to_string(),
                }
                .into());
            }
            Ok(entry)
        }
    }

    fn delete(&self, id: ConfigEntryId) -> impl Future<Output = Result<(), HubError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(DELETE_BY_ID)
                .bind(id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }
}
