//! JSON handlers for current entity states.

use axum::Json;
use axum::extract::{Path, State};

use homelink_app::ports::{ConfigEntryRepository, DeviceApiClient, EventPublisher, LoadedEntries};
use homelink_domain::entity::Entity;
use homelink_domain::error::{HubError, NotFoundError};

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/states`
pub async fn list<C, R, L, P>(State(state): State<AppState<C, R, L, P>>) -> Json<Vec<Entity>>
where
    C: DeviceApiClient + Send + Sync + 'static,
    R: ConfigEntryRepository + Send + Sync + 'static,
    L: LoadedEntries + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    Json(state.states.all().await)
}

/// `GET /api/states/{entity_id}`
pub async fn get<C, R, L, P>(
    State(state): State<AppState<C, R, L, P>>,
    Path(entity_id): Path<String>,
) -> Result<Json<Entity>, ApiError>
where
    C: DeviceApiClient + Send + Sync + 'static,
    R: ConfigEntryRepository + Send + Sync + 'static,
    L: LoadedEntries + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    state.states.get(&entity_id).await.map(Json).ok_or_else(|| {
        ApiError::from(HubError::NotFound(NotFoundError {
            entity: "Entity",
            id: entity_id,
        }))
    })
}
