//! JSON handlers for config flows.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

use homelink_app::ports::{ConfigEntryRepository, DeviceApiClient, EventPublisher, LoadedEntries};
use homelink_app::services::flow_manager::{FlowProgress, FlowResponse};
use homelink_domain::config_entry::ConfigEntrySource;
use homelink_domain::discovery::ZeroconfInfo;
use homelink_domain::id::FlowId;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for starting a flow.
#[derive(Debug, Deserialize)]
pub struct InitFlowRequest {
    #[serde(default)]
    pub source: ConfigEntrySource,
    /// Required for `zeroconf` flows.
    pub discovery: Option<ZeroconfInfo>,
}

fn parse_flow_id(id: &str) -> Result<FlowId, ApiError> {
    FlowId::from_str(id).map_err(|_| ApiError::invalid_id(id))
}

/// `GET /api/flows`
pub async fn list<C, R, L, P>(
    State(state): State<AppState<C, R, L, P>>,
) -> Json<Vec<FlowProgress>>
where
    C: DeviceApiClient + Send + Sync + 'static,
    R: ConfigEntryRepository + Send + Sync + 'static,
    L: LoadedEntries + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    Json(state.flow_manager.list().await)
}

/// `POST /api/flows`
pub async fn init<C, R, L, P>(
    State(state): State<AppState<C, R, L, P>>,
    Json(req): Json<InitFlowRequest>,
) -> Result<Json<FlowResponse>, ApiError>
where
    C: DeviceApiClient + Send + Sync + 'static,
    R: ConfigEntryRepository + Send + Sync + 'static,
    L: LoadedEntries + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let response = state.flow_manager.init(req.source, req.discovery).await?;
    Ok(Json(response))
}

/// `GET /api/flows/{flow_id}`
pub async fn get<C, R, L, P>(
    State(state): State<AppState<C, R, L, P>>,
    Path(flow_id): Path<String>,
) -> Result<Json<FlowResponse>, ApiError>
where
    C: DeviceApiClient + Send + Sync + 'static,
    R: ConfigEntryRepository + Send + Sync + 'static,
    L: LoadedEntries + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let flow_id = parse_flow_id(&flow_id)?;
    Ok(Json(state.flow_manager.get(flow_id).await?))
}

/// `POST /api/flows/{flow_id}` with the step's form data.
pub async fn configure<C, R, L, P>(
    State(state): State<AppState<C, R, L, P>>,
    Path(flow_id): Path<String>,
    Json(input): Json<serde_json::Value>,
) -> Result<Json<FlowResponse>, ApiError>
where
    C: DeviceApiClient + Send + Sync + 'static,
    R: ConfigEntryRepository + Send + Sync + 'static,
    L: LoadedEntries + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let flow_id = parse_flow_id(&flow_id)?;
    Ok(Json(state.flow_manager.configure(flow_id, input).await?))
}

/// `DELETE /api/flows/{flow_id}`
pub async fn abort<C, R, L, P>(
    State(state): State<AppState<C, R, L, P>>,
    Path(flow_id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    C: DeviceApiClient + Send + Sync + 'static,
    R: ConfigEntryRepository + Send + Sync + 'static,
    L: LoadedEntries + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let flow_id = parse_flow_id(&flow_id)?;
    state.flow_manager.abort(flow_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
