//! Server-Sent Events stream of domain events.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use homelink_app::ports::{ConfigEntryRepository, DeviceApiClient, EventPublisher, LoadedEntries};

use crate::state::AppState;

/// `GET /api/events/stream`
///
/// Each domain event is sent as a JSON `data:` frame named after its type.
/// The stream runs until the client disconnects or the bus closes.
pub async fn stream<C, R, L, P>(
    State(state): State<AppState<C, R, L, P>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>
where
    C: DeviceApiClient + Send + Sync + 'static,
    R: ConfigEntryRepository + Send + Sync + 'static,
    L: LoadedEntries + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let events = BroadcastStream::new(state.event_bus.subscribe()).filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok::<_, Infallible>(
                Event::default().event(event.event_type.as_str()).data(json),
            )),
            Err(err) => {
                tracing::warn!(%err, "unable to serialize event for SSE");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE subscriber lagged, events dropped");
            None
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
