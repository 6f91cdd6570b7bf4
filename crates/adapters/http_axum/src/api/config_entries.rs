//! JSON handlers for config entries.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use homelink_app::ports::{ConfigEntryRepository, DeviceApiClient, EventPublisher, LoadedEntries};
use homelink_domain::config_entry::ConfigEntry;
use homelink_domain::id::ConfigEntryId;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Only entries of this integration domain.
    pub domain: Option<String>,
}

/// `GET /api/config_entries`
pub async fn list<C, R, L, P>(
    State(state): State<AppState<C, R, L, P>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ConfigEntry>>, ApiError>
where
    C: DeviceApiClient + Send + Sync + 'static,
    R: ConfigEntryRepository + Send + Sync + 'static,
    L: LoadedEntries + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let entries = match query.domain {
        Some(domain) => state.config_entries.list_by_domain(&domain).await?,
        None => state.config_entries.list_entries().await?,
    };
    Ok(Json(entries))
}

/// `GET /api/config_entries/{id}`
pub async fn get<C, R, L, P>(
    State(state): State<AppState<C, R, L, P>>,
    Path(id): Path<String>,
) -> Result<Json<ConfigEntry>, ApiError>
where
    C: DeviceApiClient + Send + Sync + 'static,
    R: ConfigEntryRepository + Send + Sync + 'static,
    L: LoadedEntries + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let id = ConfigEntryId::from_str(&id).map_err(|_| ApiError::invalid_id(&id))?;
    let entry = state.config_entries.get_entry(id).await?;
    Ok(Json(entry))
}

/// `DELETE /api/config_entries/{id}`
pub async fn delete<C, R, L, P>(
    State(state): State<AppState<C, R, L, P>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    C: DeviceApiClient + Send + Sync + 'static,
    R: ConfigEntryRepository + Send + Sync + 'static,
    L: LoadedEntries + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let id = ConfigEntryId::from_str(&id).map_err(|_| ApiError::invalid_id(&id))?;
    state.config_entries.delete_entry(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
