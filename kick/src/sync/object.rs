//! Sync objects and their GPU-visible progress counters.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// A 32-bit GPU device virtual address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(transparent)]
pub struct DevVAddr(pub u32);

impl DevVAddr {
    /// The null device address.
    pub const NULL: Self = Self(0);

    /// Whether this is the null address.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Address `bytes` past this one.
    pub fn offset(self, bytes: u32) -> Self {
        Self(self.0.wrapping_add(bytes))
    }
}

/// Unique identifier of a sync object within its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyncId(pub(crate) u64);

impl SyncId {
    /// Raw identifier value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Which progress channel of a sync object a ticket refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncChannel {
    /// Primary read channel.
    Read,
    /// Write channel.
    Write,
    /// Secondary read channel (display-class consumers).
    Read2,
}

/// GPU-visible completion addresses of a sync object.
///
/// Assigned once by the [`SyncObjectStore`](super::SyncObjectStore) and
/// never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncAddresses {
    /// Address of the read-complete counter.
    pub read_ops_complete: DevVAddr,
    /// Address of the write-complete counter.
    pub write_ops_complete: DevVAddr,
    /// Address of the secondary read-complete counter.
    pub read_ops2_complete: DevVAddr,
}

/// Progress counters shared with the GPU firmware.
///
/// Pending counters are only written by the host while holding the device
/// kick lock. Complete counters are written by the firmware (or by emulated
/// completion). Counters wrap at 32 bits like the firmware's.
#[derive(Debug, Default)]
struct SyncData {
    read_ops_pending: AtomicU32,
    read_ops_complete: AtomicU32,
    write_ops_pending: AtomicU32,
    write_ops_complete: AtomicU32,
    read_ops2_pending: AtomicU32,
    read_ops2_complete: AtomicU32,
    last_write_kick: AtomicU64,
}

/// Completion state of one trackable resource.
///
/// Owned by the resource it synchronizes (usually behind an `Arc`) and
/// referenced by kicks while they are being built.
#[derive(Debug)]
pub struct SyncObject {
    id: SyncId,
    label: Option<String>,
    addresses: SyncAddresses,
    data: SyncData,
}

impl SyncObject {
    pub(crate) fn new(id: SyncId, label: Option<String>, addresses: SyncAddresses) -> Self {
        Self {
            id,
            label,
            addresses,
            data: SyncData::default(),
        }
    }

    /// Identifier of this object.
    pub fn id(&self) -> SyncId {
        self.id
    }

    /// Debug label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// GPU-visible completion addresses.
    pub fn addresses(&self) -> SyncAddresses {
        self.addresses
    }

    /// Current number of requested read operations.
    pub fn read_ops_pending(&self) -> u32 {
        self.data.read_ops_pending.load(Ordering::Acquire)
    }

    /// Number of read operations the GPU has retired.
    pub fn read_ops_complete(&self) -> u32 {
        self.data.read_ops_complete.load(Ordering::Acquire)
    }

    /// Current number of requested write operations.
    pub fn write_ops_pending(&self) -> u32 {
        self.data.write_ops_pending.load(Ordering::Acquire)
    }

    /// Number of write operations the GPU has retired.
    pub fn write_ops_complete(&self) -> u32 {
        self.data.write_ops_complete.load(Ordering::Acquire)
    }

    /// Current number of requested secondary read operations.
    pub fn read_ops2_pending(&self) -> u32 {
        self.data.read_ops2_pending.load(Ordering::Acquire)
    }

    /// Number of secondary read operations the GPU has retired.
    pub fn read_ops2_complete(&self) -> u32 {
        self.data.read_ops2_complete.load(Ordering::Acquire)
    }

    /// Device kick index of the last kick that took a destination write
    /// ticket on this object.
    pub fn last_write_kick(&self) -> u64 {
        self.data.last_write_kick.load(Ordering::Acquire)
    }

    /// Whether all requested reads and writes have been retired.
    pub fn is_idle(&self) -> bool {
        self.read_ops_complete() == self.read_ops_pending()
            && self.write_ops_complete() == self.write_ops_pending()
            && self.read_ops2_complete() == self.read_ops2_pending()
    }

    /// Take a read ticket: returns the pending count, then increments it.
    pub fn take_read_op(&self) -> u32 {
        self.data.read_ops_pending.fetch_add(1, Ordering::AcqRel)
    }

    /// Take a write ticket: returns the pending count, then increments it.
    pub fn take_write_op(&self) -> u32 {
        self.data.write_ops_pending.fetch_add(1, Ordering::AcqRel)
    }

    /// Take a secondary read ticket.
    pub fn take_read2_op(&self) -> u32 {
        self.data.read_ops2_pending.fetch_add(1, Ordering::AcqRel)
    }

    /// Give back one read ticket.
    pub fn rollback_read_op(&self) {
        self.data.read_ops_pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// Give back one write ticket.
    pub fn rollback_write_op(&self) {
        self.data.write_ops_pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// Give back one secondary read ticket.
    pub fn rollback_read2_op(&self) {
        self.data.read_ops2_pending.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn take_op(&self, channel: SyncChannel) -> u32 {
        match channel {
            SyncChannel::Read => self.take_read_op(),
            SyncChannel::Write => self.take_write_op(),
            SyncChannel::Read2 => self.take_read2_op(),
        }
    }

    pub(crate) fn rollback_op(&self, channel: SyncChannel) {
        match channel {
            SyncChannel::Read => self.rollback_read_op(),
            SyncChannel::Write => self.rollback_write_op(),
            SyncChannel::Read2 => self.rollback_read2_op(),
        }
    }

    pub(crate) fn set_last_write_kick(&self, kick: u64) {
        self.data.last_write_kick.store(kick, Ordering::Release);
    }

    /// Retire reads up to `value`. Used by firmware emulation and by status
    /// updates published through the read channel.
    pub fn set_read_ops_complete(&self, value: u32) {
        self.data.read_ops_complete.store(value, Ordering::Release);
    }

    /// Retire writes up to `value`.
    pub fn set_write_ops_complete(&self, value: u32) {
        self.data.write_ops_complete.store(value, Ordering::Release);
    }

    /// Retire secondary reads up to `value`.
    pub fn set_read_ops2_complete(&self, value: u32) {
        self.data.read_ops2_complete.store(value, Ordering::Release);
    }

    /// Mark every outstanding read retired.
    pub(crate) fn complete_reads(&self) {
        self.set_read_ops_complete(self.read_ops_pending());
    }

    /// Mark every outstanding write retired.
    pub(crate) fn complete_writes(&self) {
        self.set_write_ops_complete(self.write_ops_pending());
    }
}

static_assertions::assert_impl_all!(SyncObject: Send, Sync);
