//! Config flow for native-API devices.
//!
//! A flow is a small state machine driven by form submissions:
//!
//! ```text
//! user ───────────────┐
//!                     ├─> fetch device info ─┬─> authenticate ─> create entry
//! zeroconf ─> confirm ┘                      └─────────────────> create entry
//! ```
//!
//! Every step either shows a form (possibly with an error), aborts, or
//! produces the data of a new config entry. Persisting that entry is left to
//! the [`FlowManager`](super::flow_manager::FlowManager).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use homelink_domain::config_entry::{ConfigEntry, ConfigEntrySource};
use homelink_domain::discovery::ZeroconfInfo;
use homelink_domain::error::{HubError, ValidationError};
use homelink_domain::native_api::{ConnectionParams, DEFAULT_PORT, DOMAIN, EntryData};

use crate::ports::{ConfigEntryRepository, DeviceApiClient, LoadedEntries};
use crate::services::config_entry_service::ConfigEntryService;

const FIELD_HOST: &str = "host";
const FIELD_PORT: &str = "port";
const FIELD_PASSWORD: &str = "password";
const PLACEHOLDER_NAME: &str = "name";
const ERROR_BASE: &str = "base";

/// Step a flow is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    User,
    DiscoveryConfirm,
    Authenticate,
}

/// Error shown on a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowError {
    /// The host name could not be resolved.
    ResolveError,
    /// Any other failure to reach the device.
    ConnectionError,
    /// The password was rejected.
    InvalidAuth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    AlreadyConfigured,
    AlreadyInProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Integer,
    Password,
}

/// One input of a form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

/// A form to show to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowForm {
    pub step_id: FlowStep,
    pub data_schema: Vec<FormField>,
    pub errors: BTreeMap<&'static str, FlowError>,
    pub description_placeholders: BTreeMap<&'static str, String>,
}

/// Data of the config entry a finished flow produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEntry {
    pub title: String,
    pub data: EntryData,
    pub unique_id: Option<String>,
    pub source: ConfigEntrySource,
}

impl NewEntry {
    /// Turn the flow output into a config entry ready to persist.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when the title is empty.
    pub fn into_config_entry(self) -> Result<ConfigEntry, HubError> {
        let mut builder = ConfigEntry::builder()
            .domain(DOMAIN)
            .title(self.title)
            .source(self.source)
            .data(self.data.to_json());
        if let Some(unique_id) = self.unique_id {
            builder = builder.unique_id(unique_id);
        }
        builder.build()
    }
}

/// Outcome of a flow step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    Form(FlowForm),
    CreateEntry(NewEntry),
    Abort { reason: AbortReason },
}

impl FlowResult {
    pub(crate) fn abort(reason: AbortReason) -> Self {
        Self::Abort { reason }
    }

    /// Step of the form, if this result is a form.
    #[must_use]
    pub fn step_id(&self) -> Option<FlowStep> {
        match self {
            Self::Form(form) => Some(form.step_id),
            _ => None,
        }
    }

    /// The `base` error of the form, if any.
    #[must_use]
    pub fn error(&self) -> Option<FlowError> {
        match self {
            Self::Form(form) => form.errors.get(ERROR_BASE).copied(),
            _ => None,
        }
    }

    /// Whether the flow is over.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Form(_))
    }
}

/// Submission of the `user` form.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInput {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Submission of the `authenticate` form.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticateInput {
    pub password: String,
}

/// What a step needs from the rest of the application.
pub struct FlowContext<'a, C, R, L> {
    pub client: &'a C,
    pub entries: &'a ConfigEntryService<R>,
    pub loaded: &'a L,
}

impl<C, R, L> Clone for FlowContext<'_, C, R, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, R, L> Copy for FlowContext<'_, C, R, L> {}

/// A single native-API config flow.
#[derive(Debug, Clone)]
pub struct NativeApiFlow {
    source: ConfigEntrySource,
    step: FlowStep,
    host: Option<String>,
    port: Option<u16>,
    password: Option<String>,
    name: Option<String>,
    unique_id: Option<String>,
}

impl NativeApiFlow {
    #[must_use]
    pub fn new(source: ConfigEntrySource) -> Self {
        Self {
            source,
            step: FlowStep::User,
            host: None,
            port: None,
            password: None,
            name: None,
            unique_id: None,
        }
    }

    #[must_use]
    pub fn source(&self) -> ConfigEntrySource {
        self.source
    }

    /// Step the flow currently waits on.
    #[must_use]
    pub fn step(&self) -> FlowStep {
        self.step
    }

    /// Device name shown in the flow title.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    /// Dispatch a form submission to the step the flow waits on.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when the input does not match the
    /// step's form, or a storage error from the config entry service.
    pub async fn submit<C, R, L>(
        &mut self,
        ctx: FlowContext<'_, C, R, L>,
        input: serde_json::Value,
    ) -> Result<FlowResult, HubError>
    where
        C: DeviceApiClient + Sync,
        R: ConfigEntryRepository + Send + Sync,
        L: LoadedEntries + Sync,
    {
        match self.step {
            FlowStep::User => {
                let input: UserInput = parse_input(input)?;
                self.step_user(ctx, Some(input)).await
            }
            FlowStep::DiscoveryConfirm => self.step_discovery_confirm(ctx, true).await,
            FlowStep::Authenticate => {
                let input: AuthenticateInput = parse_input(input)?;
                self.step_authenticate(ctx, Some(input)).await
            }
        }
    }

    /// Flow started by the user: show the host form, or try the submitted one.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] for an empty host or a zero port, or a
    /// storage error from the config entry service.
    pub async fn step_user<C, R, L>(
        &mut self,
        ctx: FlowContext<'_, C, R, L>,
        input: Option<UserInput>,
    ) -> Result<FlowResult, HubError>
    where
        C: DeviceApiClient + Sync,
        R: ConfigEntryRepository + Send + Sync,
        L: LoadedEntries + Sync,
    {
        let Some(input) = input else {
            return Ok(self.show_user_form(None));
        };
        ConnectionParams::new(input.host.clone(), input.port).validate()?;
        self.host = Some(input.host);
        self.port = Some(input.port);
        self.authenticate_or_add(ctx).await
    }

    /// Flow started by a zeroconf announcement.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the config entry service.
    #[tracing::instrument(skip_all, fields(hostname = %info.hostname))]
    pub async fn step_zeroconf<C, R, L>(
        &mut self,
        ctx: FlowContext<'_, C, R, L>,
        info: &ZeroconfInfo,
    ) -> Result<FlowResult, HubError>
    where
        C: DeviceApiClient + Sync,
        R: ConfigEntryRepository + Send + Sync,
        L: LoadedEntries + Sync,
    {
        let node_name = info.node_name().to_string();
        let address = info.address();

        self.unique_id = Some(node_name.clone());
        let mut updates = serde_json::Map::new();
        updates.insert(FIELD_HOST.to_string(), info.host.clone().into());
        if let Some(abort) = self.abort_if_unique_id_configured(ctx, updates).await? {
            return Ok(abort);
        }

        for mut entry in ctx.entries.list_by_domain(DOMAIN).await? {
            let already_configured = match entry.host() {
                Some(host) if host == address || host == info.host => true,
                _ => ctx
                    .loaded
                    .device_info(entry.id)
                    .is_some_and(|device| device.name == node_name),
            };
            if !already_configured {
                continue;
            }
            if entry.unique_id.is_none() {
                tracing::info!(
                    entry_id = %entry.id,
                    unique_id = %node_name,
                    "backfilling unique id"
                );
                let mut updates = serde_json::Map::new();
                updates.insert(FIELD_HOST.to_string(), info.host.clone().into());
                entry.merge_data(updates);
                entry.unique_id = Some(node_name);
                ctx.entries.update_entry(entry).await?;
            }
            return Ok(FlowResult::abort(AbortReason::AlreadyConfigured));
        }

        self.host = Some(info.host.clone());
        self.port = Some(info.port);
        self.name = Some(node_name);
        self.step_discovery_confirm(ctx, false).await
    }

    /// Ask the user to confirm a discovered device.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the config entry service.
    pub async fn step_discovery_confirm<C, R, L>(
        &mut self,
        ctx: FlowContext<'_, C, R, L>,
        confirmed: bool,
    ) -> Result<FlowResult, HubError>
    where
        C: DeviceApiClient + Sync,
        R: ConfigEntryRepository + Send + Sync,
        L: LoadedEntries + Sync,
    {
        if confirmed {
            return self.authenticate_or_add(ctx).await;
        }
        self.step = FlowStep::DiscoveryConfirm;
        Ok(FlowResult::Form(FlowForm {
            step_id: FlowStep::DiscoveryConfirm,
            data_schema: Vec::new(),
            errors: BTreeMap::new(),
            description_placeholders: self.name_placeholder(),
        }))
    }

    /// Ask for the password, or check the submitted one.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when the flow has no host yet.
    pub async fn step_authenticate<C, R, L>(
        &mut self,
        ctx: FlowContext<'_, C, R, L>,
        input: Option<AuthenticateInput>,
    ) -> Result<FlowResult, HubError>
    where
        C: DeviceApiClient + Sync,
        R: ConfigEntryRepository + Send + Sync,
        L: LoadedEntries + Sync,
    {
        let Some(input) = input else {
            return Ok(self.show_authenticate_form(None));
        };
        self.password = Some(input.password);
        let params = self.connection_params()?;
        if let Err(err) = ctx.client.login(&params).await {
            tracing::debug!(error = %err, host = %params.host, "login failed");
            return Ok(self.show_authenticate_form(Some(FlowError::InvalidAuth)));
        }
        self.create_entry()
    }

    async fn authenticate_or_add<C, R, L>(
        &mut self,
        ctx: FlowContext<'_, C, R, L>,
    ) -> Result<FlowResult, HubError>
    where
        C: DeviceApiClient + Sync,
        R: ConfigEntryRepository + Send + Sync,
        L: LoadedEntries + Sync,
    {
        let params = ConnectionParams::new(self.host.clone().unwrap_or_default(), self.port())
            .with_password("");
        let info = match ctx.client.device_info(&params).await {
            Ok(info) => info,
            Err(err) => {
                tracing::debug!(error = %err, host = %params.host, "fetching device info failed");
                let error = if err.is_resolve() {
                    FlowError::ResolveError
                } else {
                    FlowError::ConnectionError
                };
                return Ok(self.show_user_form(Some(error)));
            }
        };

        self.name = Some(info.name.clone());
        if self.unique_id.is_none() {
            self.unique_id = Some(info.name.clone());
        }
        let mut updates = serde_json::Map::new();
        updates.insert(FIELD_HOST.to_string(), params.host.clone().into());
        updates.insert(FIELD_PORT.to_string(), params.port.into());
        if let Some(abort) = self.abort_if_unique_id_configured(ctx, updates).await? {
            return Ok(abort);
        }

        if info.uses_password {
            return Ok(self.show_authenticate_form(None));
        }
        self.create_entry()
    }

    async fn abort_if_unique_id_configured<C, R, L>(
        &self,
        ctx: FlowContext<'_, C, R, L>,
        updates: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Option<FlowResult>, HubError>
    where
        R: ConfigEntryRepository + Send + Sync,
    {
        let Some(unique_id) = self.unique_id.as_deref() else {
            return Ok(None);
        };
        let Some(mut entry) = ctx.entries.find_by_unique_id(DOMAIN, unique_id).await? else {
            return Ok(None);
        };
        let changed = updates
            .iter()
            .any(|(key, value)| entry.data.get(key) != Some(value));
        if changed {
            tracing::info!(entry_id = %entry.id, "updating connection data of configured entry");
            entry.merge_data(updates);
            ctx.entries.update_entry(entry).await?;
        }
        Ok(Some(FlowResult::abort(AbortReason::AlreadyConfigured)))
    }

    fn show_user_form(&mut self, error: Option<FlowError>) -> FlowResult {
        self.step = FlowStep::User;
        let data_schema = vec![
            FormField {
                name: FIELD_HOST,
                kind: FieldKind::String,
                required: true,
                default: self.host.clone().map(serde_json::Value::from),
            },
            FormField {
                name: FIELD_PORT,
                kind: FieldKind::Integer,
                required: false,
                default: Some(self.port().into()),
            },
        ];
        FlowResult::Form(FlowForm {
            step_id: FlowStep::User,
            data_schema,
            errors: base_error(error),
            description_placeholders: BTreeMap::new(),
        })
    }

    fn show_authenticate_form(&mut self, error: Option<FlowError>) -> FlowResult {
        self.step = FlowStep::Authenticate;
        FlowResult::Form(FlowForm {
            step_id: FlowStep::Authenticate,
            data_schema: vec![FormField {
                name: FIELD_PASSWORD,
                kind: FieldKind::Password,
                required: true,
                default: None,
            }],
            errors: base_error(error),
            description_placeholders: self.name_placeholder(),
        })
    }

    fn create_entry(&self) -> Result<FlowResult, HubError> {
        let title = self
            .name
            .clone()
            .ok_or(HubError::Validation(ValidationError::EmptyName))?;
        let params = self.connection_params()?;
        Ok(FlowResult::CreateEntry(NewEntry {
            title,
            data: EntryData {
                host: params.host,
                port: params.port,
                password: params.password,
            },
            unique_id: self.unique_id.clone(),
            source: self.source,
        }))
    }

    fn connection_params(&self) -> Result<ConnectionParams, HubError> {
        let host = self
            .host
            .clone()
            .ok_or(HubError::Validation(ValidationError::EmptyHost))?;
        Ok(ConnectionParams::new(host, self.port())
            .with_password(self.password.clone().unwrap_or_default()))
    }

    fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    fn name_placeholder(&self) -> BTreeMap<&'static str, String> {
        self.name
            .iter()
            .map(|name| (PLACEHOLDER_NAME, name.clone()))
            .collect()
    }
}

fn base_error(error: Option<FlowError>) -> BTreeMap<&'static str, FlowError> {
    error.map(|error| (ERROR_BASE, error)).into_iter().collect()
}

fn parse_input<T: serde::de::DeserializeOwned>(input: serde_json::Value) -> Result<T, HubError> {
    serde_json::from_value(input)
        .map_err(|err| ValidationError::InvalidInput(err.to_string()).into())
}
