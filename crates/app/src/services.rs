//! Application services: use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod config_entry_service;
pub mod config_flow;
pub mod flow_manager;
pub mod state_machine;
