//! In-memory registry of loaded config entries.

use std::collections::HashMap;
use std::sync::RwLock;

use homelink_domain::id::ConfigEntryId;
use homelink_domain::native_api::DeviceInfo;

use crate::ports::LoadedEntries;

/// Registry filled when an entry is set up and its device answered.
#[derive(Debug, Default)]
pub struct LoadedEntryRegistry {
    entries: RwLock<HashMap<ConfigEntryId, DeviceInfo>>,
}

impl LoadedEntryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an entry as loaded with the info its device reported.
    pub fn insert(&self, entry_id: ConfigEntryId, info: DeviceInfo) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(entry_id, info);
    }

    /// Forget an entry, e.g. after it was removed.
    pub fn remove(&self, entry_id: ConfigEntryId) -> Option<DeviceInfo> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.remove(&entry_id)
    }

    #[must_use]
    pub fn is_loaded(&self, entry_id: ConfigEntryId) -> bool {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(&entry_id)
    }
}

impl LoadedEntries for LoadedEntryRegistry {
    fn device_info(&self, entry_id: ConfigEntryId) -> Option<DeviceInfo> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&entry_id)
            .cloned()
    }
}
