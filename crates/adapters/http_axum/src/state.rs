//! Shared application state for axum handlers.

use std::sync::Arc;

use homelink_app::event_bus::InProcessEventBus;
use homelink_app::services::config_entry_service::ConfigEntryService;
use homelink_app::services::flow_manager::FlowManager;
use homelink_app::services::state_machine::StateMachine;

/// Application state shared across all axum handlers.
///
/// Generic over the device client (`C`), config entry repository (`R`),
/// loaded-entry registry (`L`) and event publisher (`P`). `Clone` is
/// implemented manually so only the `Arc` wrappers are cloned.
pub struct AppState<C, R, L, P> {
    pub flow_manager: Arc<FlowManager<C, R, L, P>>,
    pub config_entries: Arc<ConfigEntryService<R>>,
    pub states: Arc<StateMachine<P>>,
    /// Source of the SSE event stream.
    pub event_bus: Arc<InProcessEventBus>,
}

impl<C, R, L, P> Clone for AppState<C, R, L, P> {
    fn clone(&self) -> Self {
        Self {
            flow_manager: Arc::clone(&self.flow_manager),
            config_entries: Arc::clone(&self.config_entries),
            states: Arc::clone(&self.states),
            event_bus: Arc::clone(&self.event_bus),
        }
    }
}

impl<C, R, L, P> AppState<C, R, L, P> {
    /// Create the state from services already shared with background tasks.
    pub fn new(
        flow_manager: Arc<FlowManager<C, R, L, P>>,
        config_entries: Arc<ConfigEntryService<R>>,
        states: Arc<StateMachine<P>>,
        event_bus: Arc<InProcessEventBus>,
    ) -> Self {
        Self {
            flow_manager,
            config_entries,
            states,
            event_bus,
        }
    }
}
