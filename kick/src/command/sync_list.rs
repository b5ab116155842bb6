//! Destination sync snapshot shared with the firmware.

use parking_lot::Mutex;

use super::layout::DeviceSyncObject;

#[derive(Debug, Default)]
struct SyncListData {
    num_sync_objects: u32,
    entries: Vec<DeviceSyncObject>,
}

/// GPU-visible snapshot of destination sync state, written on the first kick
/// of a frame.
#[derive(Debug)]
pub struct HwSyncList {
    capacity: usize,
    data: Mutex<SyncListData>,
}

impl HwSyncList {
    /// Create a list with room for `capacity` destination entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            data: Mutex::new(SyncListData {
                num_sync_objects: 0,
                entries: vec![DeviceSyncObject::default(); capacity],
            }),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries written by the last snapshot.
    pub fn num_sync_objects(&self) -> u32 {
        self.data.lock().num_sync_objects
    }

    /// Entry at `index` of the last snapshot.
    pub fn entry(&self, index: usize) -> Option<DeviceSyncObject> {
        let data = self.data.lock();
        if index < data.num_sync_objects as usize {
            data.entries.get(index).copied()
        } else {
            None
        }
    }

    /// All entries of the last snapshot.
    pub fn entries(&self) -> Vec<DeviceSyncObject> {
        let data = self.data.lock();
        data.entries[..data.num_sync_objects as usize].to_vec()
    }

    /// Replace the snapshot. `entries` must fit in the list.
    pub(crate) fn write(&self, entries: &[DeviceSyncObject]) {
        debug_assert!(entries.len() <= self.capacity);
        let count = entries.len().min(self.capacity);
        let mut data = self.data.lock();
        data.entries[..count].copy_from_slice(&entries[..count]);
        data.num_sync_objects = count as u32;
    }
}
