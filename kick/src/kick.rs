//! Kick requests and command assembly.
//!
//! A [`KickDescriptor`] describes one unit of geometry-stage work and the
//! resources it depends on. [`KickBuilder`] validates it, takes every ticket
//! the command needs through the kick's [`KickTransaction`], and publishes
//! the finished record into the command buffer.
//!
//! Tickets are taken in this order, which rollback reverses:
//!
//! 1. cross-stage write (only when it is a real dependency)
//! 2. chained sync read
//! 3. peer sync read
//! 4. source reads, through the fence adapter
//! 5. destination writes (first kick of a frame only)

use std::sync::Arc;

use bitflags::bitflags;

use crate::capture::CaptureEvent;
use crate::command::{
    CommandBuffer, CommandFlags, CommandSlot, CtlStatus, DeviceSyncObject, HwSyncList,
    ReadyCommand, StageSyncSnapshot, StagedCommand, StatusMemory, MAX_GEOMETRY_STATUS_VALS,
    MAX_RENDER_STATUS_VALS, MAX_SRC_SYNCS,
};
use crate::error::{KickError, KickResult};
use crate::fence::{FenceAdapter, SourceSync};
use crate::gateway::ContextHandle;
use crate::rollback::KickTransaction;
use crate::sync::{DevVAddr, SyncObject, TicketLedger, TicketSlot};

bitflags! {
    /// Client-side flags of a kick.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KickFlags: u32 {
        /// First kick of the frame. Destination syncs are only considered
        /// when this is set.
        const FIRST_KICK = 1 << 0;
        /// Last kick of the scene.
        const LAST_IN_SCENE = 1 << 1;
        /// Terminate or abort the scene.
        const TERMINATE = 1 << 2;
    }
}

impl KickFlags {
    /// The matching command control flags, without READY.
    pub fn command_flags(self) -> CommandFlags {
        let mut flags = CommandFlags::empty();
        flags.set(CommandFlags::FIRST_KICK, self.contains(Self::FIRST_KICK));
        flags.set(CommandFlags::LAST_IN_SCENE, self.contains(Self::LAST_IN_SCENE));
        flags.set(CommandFlags::TERMINATE, self.contains(Self::TERMINATE));
        flags
    }
}

/// Ordering against work of the other processing stage.
#[derive(Debug, Clone)]
pub struct CrossStage {
    /// The sync shared by both stages.
    pub sync: Arc<SyncObject>,
    /// Whether the kick really depends on it. Informational references only
    /// snapshot the pending value.
    pub is_dependency: bool,
}

/// A value published when the stage finishes.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    /// Write `value` to `addr`, which must lie inside `memory`.
    Direct {
        memory: Arc<StatusMemory>,
        addr: DevVAddr,
        value: u32,
    },
    /// Publish the sync's current read pending value through its
    /// read-completion counter.
    SyncRead(Arc<SyncObject>),
}

impl StatusUpdate {
    fn to_ctl_status(&self) -> CtlStatus {
        match self {
            Self::Direct { addr, value, .. } => CtlStatus {
                status_addr: *addr,
                status_value: *value,
            },
            Self::SyncRead(sync) => CtlStatus {
                status_addr: sync.addresses().read_ops_complete,
                status_value: sync.read_ops_pending(),
            },
        }
    }

    /// Apply the update the way the firmware does when the stage finishes.
    pub(crate) fn resolve(&self, status: CtlStatus) {
        match self {
            Self::Direct { memory, .. } => {
                memory.write(status.status_addr, status.status_value);
            }
            Self::SyncRead(sync) => sync.set_read_ops_complete(status.status_value),
        }
    }
}

/// One client request to submit geometry-stage work.
#[derive(Debug, Clone)]
pub struct KickDescriptor {
    command_buffer: Arc<CommandBuffer>,
    offset: u32,
    context: ContextHandle,
    frame_num: u32,
    flags: KickFlags,
    cross_stage: Option<CrossStage>,
    chained_sync: Option<Arc<SyncObject>>,
    peer_sync: Option<Arc<SyncObject>>,
    sources: Vec<SourceSync>,
    destinations: Vec<Option<Arc<SyncObject>>>,
    geometry_status: Vec<StatusUpdate>,
    render_status: Vec<StatusUpdate>,
    hw_sync_list: Option<Arc<HwSyncList>>,
}

impl KickDescriptor {
    /// Describe a kick whose command goes to `offset` of `command_buffer`.
    pub fn new(command_buffer: Arc<CommandBuffer>, offset: u32) -> Self {
        Self {
            command_buffer,
            offset,
            context: ContextHandle::default(),
            frame_num: 0,
            flags: KickFlags::empty(),
            cross_stage: None,
            chained_sync: None,
            peer_sync: None,
            sources: Vec::new(),
            destinations: Vec::new(),
            geometry_status: Vec::new(),
            render_status: Vec::new(),
            hw_sync_list: None,
        }
    }

    /// Set the render context the scheduler queues the kick on.
    pub fn with_context(mut self, context: ContextHandle) -> Self {
        self.context = context;
        self
    }

    /// Set the frame number written into the command.
    pub fn with_frame_num(mut self, frame_num: u32) -> Self {
        self.frame_num = frame_num;
        self
    }

    /// Set the kick flags.
    pub fn with_flags(mut self, flags: KickFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the cross-stage sync. `is_dependency` decides whether a write
    /// ticket is taken on it.
    pub fn with_cross_stage(mut self, sync: Arc<SyncObject>, is_dependency: bool) -> Self {
        self.cross_stage = Some(CrossStage {
            sync,
            is_dependency,
        });
        self
    }

    /// Set the sync chaining this kick after the previous one on the stage.
    pub fn with_chained_sync(mut self, sync: Arc<SyncObject>) -> Self {
        self.chained_sync = Some(sync);
        self
    }

    /// Set the sync of the paired render stage.
    pub fn with_peer_sync(mut self, sync: Arc<SyncObject>) -> Self {
        self.peer_sync = Some(sync);
        self
    }

    /// Append a source the kick reads from.
    pub fn with_source(mut self, source: impl Into<SourceSync>) -> Self {
        self.sources.push(source.into());
        self
    }

    /// Append several sources.
    pub fn with_sources(mut self, sources: impl IntoIterator<Item = SourceSync>) -> Self {
        self.sources.extend(sources);
        self
    }

    /// Append a destination entry. `None` leaves a zeroed slot in the
    /// destination snapshot.
    pub fn with_destination(mut self, destination: Option<Arc<SyncObject>>) -> Self {
        self.destinations.push(destination);
        self
    }

    /// Append a status update resolved when geometry work completes.
    pub fn with_geometry_status(mut self, update: StatusUpdate) -> Self {
        self.geometry_status.push(update);
        self
    }

    /// Append a status update resolved when the scene is rendered.
    pub fn with_render_status(mut self, update: StatusUpdate) -> Self {
        self.render_status.push(update);
        self
    }

    /// Set the HW sync list that receives the destination snapshot.
    pub fn with_hw_sync_list(mut self, list: Arc<HwSyncList>) -> Self {
        self.hw_sync_list = Some(list);
        self
    }

    /// Command buffer the command is published to.
    pub fn command_buffer(&self) -> &Arc<CommandBuffer> {
        &self.command_buffer
    }

    /// Byte offset of the command in the command buffer.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Render context handle.
    pub fn context(&self) -> ContextHandle {
        self.context
    }

    /// Frame number.
    pub fn frame_num(&self) -> u32 {
        self.frame_num
    }

    /// Kick flags.
    pub fn flags(&self) -> KickFlags {
        self.flags
    }

    /// Cross-stage dependency, if any.
    pub fn cross_stage(&self) -> Option<&CrossStage> {
        self.cross_stage.as_ref()
    }

    /// Chained sync, if any.
    pub fn chained_sync(&self) -> Option<&Arc<SyncObject>> {
        self.chained_sync.as_ref()
    }

    /// Peer sync, if any.
    pub fn peer_sync(&self) -> Option<&Arc<SyncObject>> {
        self.peer_sync.as_ref()
    }

    /// Sources in submission order.
    pub fn sources(&self) -> &[SourceSync] {
        &self.sources
    }

    /// Destination entries, including unbound ones.
    pub fn destinations(&self) -> &[Option<Arc<SyncObject>>] {
        &self.destinations
    }

    /// Geometry status updates.
    pub fn geometry_status(&self) -> &[StatusUpdate] {
        &self.geometry_status
    }

    /// Render status updates.
    pub fn render_status(&self) -> &[StatusUpdate] {
        &self.render_status
    }

    /// HW sync list for the destination snapshot, if any.
    pub fn hw_sync_list(&self) -> Option<&Arc<HwSyncList>> {
        self.hw_sync_list.as_ref()
    }

    /// Whether the destination snapshot is written for this kick.
    pub fn snapshots_destinations(&self) -> bool {
        self.flags.contains(KickFlags::FIRST_KICK) && !self.destinations.is_empty()
    }
}

/// Turns a [`KickDescriptor`] into a published command.
#[derive(Debug)]
pub struct KickBuilder<'a> {
    descriptor: &'a KickDescriptor,
    fences: &'a FenceAdapter,
}

impl<'a> KickBuilder<'a> {
    /// Builder for `descriptor`, resolving source fences through `fences`.
    pub fn new(descriptor: &'a KickDescriptor, fences: &'a FenceAdapter) -> Self {
        Self { descriptor, fences }
    }

    /// Check everything that can be checked without taking a ticket.
    pub fn validate(&self) -> KickResult<CommandSlot> {
        let d = self.descriptor;
        let slot = d.command_buffer.slot(d.offset)?;

        if d.sources.len() > MAX_SRC_SYNCS {
            return Err(KickError::InvalidParams(format!(
                "{} source syncs exceed the limit of {}",
                d.sources.len(),
                MAX_SRC_SYNCS
            )));
        }
        if d.geometry_status.len() > MAX_GEOMETRY_STATUS_VALS {
            return Err(KickError::InvalidParams(format!(
                "{} geometry status values exceed the limit of {}",
                d.geometry_status.len(),
                MAX_GEOMETRY_STATUS_VALS
            )));
        }
        if d.render_status.len() > MAX_RENDER_STATUS_VALS {
            return Err(KickError::InvalidParams(format!(
                "{} render status values exceed the limit of {}",
                d.render_status.len(),
                MAX_RENDER_STATUS_VALS
            )));
        }

        for update in d.geometry_status.iter().chain(&d.render_status) {
            if let StatusUpdate::Direct { memory, addr, .. } = update {
                if !memory.contains(*addr) {
                    return Err(KickError::InvalidParams(format!(
                        "status address {:#x} outside status memory {:?}",
                        addr.0, memory
                    )));
                }
            }
        }

        if d.snapshots_destinations() {
            let Some(list) = &d.hw_sync_list else {
                return Err(KickError::InvalidParams(
                    "destination syncs given without a HW sync list".to_string(),
                ));
            };
            if list.capacity() < d.destinations.len() {
                return Err(KickError::InvalidParams(format!(
                    "{} destination syncs exceed HW sync list capacity {}",
                    d.destinations.len(),
                    list.capacity()
                )));
            }
        }

        Ok(slot)
    }

    /// Validate, take tickets, and publish the command.
    ///
    /// On success the transaction is `Ready`. On a fence failure every
    /// ticket of this kick has been given back and the transaction is
    /// `RolledBack`.
    pub fn build(&self, txn: &mut KickTransaction<'_>) -> KickResult<ReadyCommand> {
        let d = self.descriptor;
        let slot = self.validate()?;

        let mut staged = StagedCommand::new();
        let command = staged.command_mut();
        command.frame_num = d.frame_num;
        command.ctrl_flags = d.flags.command_flags().bits();

        let ledger = txn.ledger_mut();

        if let Some(cross) = &d.cross_stage {
            command.cross_stage.write_ops_complete_addr =
                cross.sync.addresses().write_ops_complete;
            command.cross_stage.write_ops_pending_val = if cross.is_dependency {
                ledger.take_write(&cross.sync, TicketSlot::CrossStage)
            } else {
                cross.sync.write_ops_pending()
            };
        }

        if let Some(sync) = &d.chained_sync {
            command.chained_sync = stage_snapshot(ledger, sync, TicketSlot::ChainedSync);
        }
        if let Some(sync) = &d.peer_sync {
            command.peer_sync = stage_snapshot(ledger, sync, TicketSlot::PeerSync);
        }

        for (entry, update) in command.geometry_status.iter_mut().zip(&d.geometry_status) {
            *entry = update.to_ctl_status();
        }
        command.num_geometry_status_vals = d.geometry_status.len() as u32;
        for (entry, update) in command.render_status.iter_mut().zip(&d.render_status) {
            *entry = update.to_ctl_status();
        }
        command.num_render_status_vals = d.render_status.len() as u32;

        let fence_destinations: Vec<Arc<SyncObject>> = if d.flags.contains(KickFlags::FIRST_KICK) {
            d.destinations.iter().flatten().cloned().collect()
        } else {
            Vec::new()
        };
        let sources = match self
            .fences
            .take_source_tickets(ledger, &d.sources, &fence_destinations)
        {
            Ok(sources) => sources,
            Err(failure) => {
                log::error!(
                    "fence resolution failed after {} source tickets: {}",
                    failure.tickets_taken,
                    failure.error
                );
                let rolled_back = txn.roll_back();
                return Err(KickError::FenceResolution {
                    source: failure.error,
                    tickets_taken: failure.tickets_taken,
                    rolled_back,
                });
            }
        };
        command.src_syncs[..sources.snapshots.len()].copy_from_slice(&sources.snapshots);
        command.num_src_syncs = sources.snapshots.len() as u32;

        if d.snapshots_destinations() {
            self.snapshot_destinations(txn)?;
        }

        let capture = txn.capture();
        let ready = d.command_buffer.publish(slot, staged, capture);
        txn.mark_ready(Arc::clone(&d.command_buffer), slot, sources.fences);
        Ok(ready)
    }

    fn snapshot_destinations(&self, txn: &mut KickTransaction<'_>) -> KickResult<()> {
        let d = self.descriptor;
        let list = d.hw_sync_list.as_ref().ok_or_else(|| {
            KickError::InvalidParams("destination syncs given without a HW sync list".to_string())
        })?;

        let capture = txn.capture();
        let ledger = txn.ledger_mut();
        let mut entries = Vec::with_capacity(d.destinations.len());
        for (index, destination) in d.destinations.iter().enumerate() {
            let entry = match destination {
                Some(sync) => {
                    let addresses = sync.addresses();
                    let write_ops_pending_val =
                        ledger.take_write(sync, TicketSlot::Destination(index));
                    DeviceSyncObject {
                        read_ops_pending_val: sync.read_ops_pending(),
                        write_ops_pending_val,
                        read_ops2_pending_val: sync.read_ops2_pending(),
                        read_ops_complete_addr: addresses.read_ops_complete,
                        write_ops_complete_addr: addresses.write_ops_complete,
                        read_ops2_complete_addr: addresses.read_ops2_complete,
                    }
                }
                None => DeviceSyncObject::default(),
            };
            capture.record(CaptureEvent::SyncListEntryWritten {
                index,
                bound: destination.is_some(),
            });
            entries.push(entry);
        }
        list.write(&entries);
        Ok(())
    }
}

fn stage_snapshot(
    ledger: &mut TicketLedger<'_>,
    sync: &Arc<SyncObject>,
    slot: TicketSlot,
) -> StageSyncSnapshot {
    let addresses = sync.addresses();
    StageSyncSnapshot {
        read_ops_complete_addr: addresses.read_ops_complete,
        write_ops_complete_addr: addresses.write_ops_complete,
        read_ops_pending_val: ledger.take_read(sync, slot),
        write_ops_pending_val: sync.write_ops_pending(),
    }
}
