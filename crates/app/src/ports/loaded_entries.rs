//! Loaded-entries port: runtime data of config entries that are set up.

use homelink_domain::id::ConfigEntryId;
use homelink_domain::native_api::DeviceInfo;

/// Read access to what a loaded entry learned from its device.
pub trait LoadedEntries {
    /// Device info of a loaded entry; `None` when the entry is not loaded or
    /// the device has not answered yet.
    fn device_info(&self, entry_id: ConfigEntryId) -> Option<DeviceInfo>;
}

impl<T: LoadedEntries> LoadedEntries for std::sync::Arc<T> {
    fn device_info(&self, entry_id: ConfigEntryId) -> Option<DeviceInfo> {
        (**self).device_info(entry_id)
    }
}
