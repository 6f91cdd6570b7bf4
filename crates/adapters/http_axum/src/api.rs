//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod config_entries;
#[allow(clippy::missing_errors_doc)]
pub mod flows;
pub mod sse;
#[allow(clippy::missing_errors_doc)]
pub mod states;

use axum::Router;
use axum::routing::get;

use homelink_app::ports::{ConfigEntryRepository, DeviceApiClient, EventPublisher, LoadedEntries};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<C, R, L, P>() -> Router<AppState<C, R, L, P>>
where
    C: DeviceApiClient + Send + Sync + 'static,
    R: ConfigEntryRepository + Send + Sync + 'static,
    L: LoadedEntries + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    Router::new()
        // Config entries
        .route("/config_entries", get(config_entries::list::<C, R, L, P>))
        .route(
            "/config_entries/{id}",
            get(config_entries::get::<C, R, L, P>).delete(config_entries::delete::<C, R, L, P>),
        )
        // Config flows
        .route(
            "/flows",
            get(flows::list::<C, R, L, P>).post(flows::init::<C, R, L, P>),
        )
        .route(
            "/flows/{flow_id}",
            get(flows::get::<C, R, L, P>)
                .post(flows::configure::<C, R, L, P>)
                .delete(flows::abort::<C, R, L, P>),
        )
        // Entity states
        .route("/states", get(states::list::<C, R, L, P>))
        .route("/states/{entity_id}", get(states::get::<C, R, L, P>))
        // Events
        .route("/events/stream", get(sse::stream::<C, R, L, P>))
}
