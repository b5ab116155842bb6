//! Allocation of sync objects and their GPU-visible addresses.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::object::{DevVAddr, SyncAddresses, SyncId, SyncObject};

/// Creates sync objects and tracks the ones still alive.
///
/// Each object gets a fixed-size block of GPU-visible sync memory starting at
/// the store's base address. The block holds the three completion counters
/// the firmware polls.
pub struct SyncObjectStore {
    base: DevVAddr,
    next_id: AtomicU64,
    objects: RwLock<Vec<Weak<SyncObject>>>,
}

impl SyncObjectStore {
    /// Bytes of sync memory reserved per object.
    pub const STRIDE: u32 = 0x20;

    const READ_COMPLETE_OFFSET: u32 = 0x04;
    const WRITE_COMPLETE_OFFSET: u32 = 0x0c;
    const READ2_COMPLETE_OFFSET: u32 = 0x14;

    /// Create a store whose sync memory starts at `base`.
    pub fn new(base: DevVAddr) -> Self {
        Self {
            base,
            next_id: AtomicU64::new(0),
            objects: RwLock::new(Vec::new()),
        }
    }

    /// Base address of the sync memory.
    pub fn base(&self) -> DevVAddr {
        self.base
    }

    /// Create a new sync object with all counters at zero.
    pub fn create(&self, label: Option<&str>) -> Arc<SyncObject> {
        let index = self.next_id.fetch_add(1, Ordering::Relaxed);
        let block = self.base.offset((index as u32).wrapping_mul(Self::STRIDE));
        let addresses = SyncAddresses {
            read_ops_complete: block.offset(Self::READ_COMPLETE_OFFSET),
            write_ops_complete: block.offset(Self::WRITE_COMPLETE_OFFSET),
            read_ops2_complete: block.offset(Self::READ2_COMPLETE_OFFSET),
        };

        let label = label.map(str::to_owned);
        let object = Arc::new(SyncObject::new(SyncId(index), label, addresses));
        log::trace!(
            "SyncObjectStore: created sync {:?} ({:?}) at {:#x}",
            object.id(),
            object.label(),
            block.0
        );

        let mut objects = self.objects.write();
        objects.retain(|weak| weak.strong_count() > 0);
        objects.push(Arc::downgrade(&object));
        object
    }

    /// Number of sync objects that are still referenced somewhere.
    pub fn live_count(&self) -> usize {
        self.objects
            .read()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Live sync objects that still have unretired operations.
    pub fn busy_objects(&self) -> Vec<Arc<SyncObject>> {
        self.objects
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|sync| !sync.is_idle())
            .collect()
    }
}

impl std::fmt::Debug for SyncObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncObjectStore")
            .field("base", &self.base)
            .field("live", &self.live_count())
            .finish()
    }
}
