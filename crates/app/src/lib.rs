//! # homelink-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceApiClient`: talk to a native-API device (device info, login)
//!   - `ConfigEntryRepository`: CRUD for config entries
//!   - `LoadedEntries`: runtime data of config entries that are set up
//!   - `EventPublisher`: broadcast domain events
//!   - `ServiceCaller`: run `light.turn_on` and friends
//!   - `Integration`: lifecycle of a device integration
//! - Define **driving/inbound ports** as use-case structs:
//!   - `NativeApiFlow`: the discover → confirm → authenticate → create wizard
//!   - `FlowManager`: keeps in-progress flows and persists their results
//!   - `ConfigEntryService`: list, get, update, delete config entries
//!   - `StateMachine`: current entity states, publishing `state_changed`
//! - Provide **in-process infrastructure** (event bus, loaded-entry registry)
//!   that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `homelink-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod loaded_entries;
pub mod ports;
pub mod services;
