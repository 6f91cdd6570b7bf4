//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod config_entries;
pub mod device_api;
pub mod event_bus;
pub mod integration;
pub mod loaded_entries;
pub mod service_caller;

pub use config_entries::ConfigEntryRepository;
pub use device_api::{ApiConnectionError, DeviceApiClient};
pub use event_bus::EventPublisher;
pub use integration::{DiscoveredDevice, Integration};
pub use loaded_entries::LoadedEntries;
pub use service_caller::ServiceCaller;
