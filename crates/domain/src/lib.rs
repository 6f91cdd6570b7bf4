//! # homelink-domain
//!
//! Pure domain model for the homelink bridge.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Entities** (state holders such as lights and sensors) and their
//!   typed attributes
//! - Define the **light colour model**: colour modes, capabilities, and the
//!   conversions between platform units and accessory characteristic units
//! - Define **Config entries** (persisted integration setups) and the
//!   native-API connection descriptors they store
//! - Define **Discovery** descriptors (zeroconf announcements)
//! - Define **Services** (commands: `turn_on`, `turn_off`, …), **Events**,
//!   and **Devices**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod config_entry;
pub mod device;
pub mod discovery;
pub mod entity;
pub mod event;
pub mod light;
pub mod native_api;
pub mod service;
