//! # homelink-adapter-homekit
//!
//! Exposes platform entities as HomeKit accessories.
//!
//! ## Responsibilities
//! - Model accessories, services and characteristics with their instance ids
//! - Map a light entity onto a lightbulb accessory and back
//! - Bridge characteristic writes to platform service calls, and mirror
//!   `state_changed` events into the registered accessories
//!
//! The HAP network layer (pairing, encrypted sessions, mDNS) is out of
//! scope: writes reach the bridge already decoded into JSON.

mod accessory;
mod bridge;
mod characteristic;
mod error;
mod light;

pub use accessory::{Accessory, AccessoryBuilder, Category, Service, ServiceKind};
pub use bridge::AccessoryBridge;
pub use characteristic::{CharKind, CharValue, Characteristic};
pub use error::HomekitError;
pub use light::{LightAccessory, LightChar, LightCommand, LightService};
