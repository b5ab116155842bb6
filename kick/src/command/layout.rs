//! GPU-visible record layouts.
//!
//! These records are read by the GPU firmware, so their layout is fixed:
//! `#[repr(C)]`, 32-bit fields only, no padding. Any change to a record
//! must bump [`TA_COMMAND_LAYOUT_VERSION`].

use std::mem::{offset_of, size_of};

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::sync::DevVAddr;

/// Version of the record layouts in this module.
pub const TA_COMMAND_LAYOUT_VERSION: u32 = 1;

/// Maximum number of source syncs embedded in one command.
pub const MAX_SRC_SYNCS: usize = 32;

/// Maximum number of geometry-stage status updates in one command.
pub const MAX_GEOMETRY_STATUS_VALS: usize = 32;

/// Maximum number of render-stage status updates in one command.
pub const MAX_RENDER_STATUS_VALS: usize = 4;

bitflags! {
    /// Control flags of a command record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommandFlags: u32 {
        /// The record is complete and may be processed by the firmware.
        const READY = 1 << 0;
        /// First kick of the frame (or resume after a context switch).
        const FIRST_KICK = 1 << 1;
        /// Last kick of the scene.
        const LAST_IN_SCENE = 1 << 2;
        /// Terminate or abort the scene.
        const TERMINATE = 1 << 3;
    }
}

/// Snapshot of one sync object as seen by the firmware.
///
/// Used both for source syncs inside a command and for destination entries of
/// the [`HwSyncList`](super::HwSyncList).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DeviceSyncObject {
    pub read_ops_pending_val: u32,
    pub write_ops_pending_val: u32,
    pub read_ops2_pending_val: u32,
    pub read_ops_complete_addr: DevVAddr,
    pub write_ops_complete_addr: DevVAddr,
    pub read_ops2_complete_addr: DevVAddr,
}

/// Ordering constraint against another processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct CrossStageDependency {
    pub write_ops_complete_addr: DevVAddr,
    pub write_ops_pending_val: u32,
}

/// Read dependency on a stage's own work queue (chained or peer sync).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct StageSyncSnapshot {
    pub read_ops_complete_addr: DevVAddr,
    pub write_ops_complete_addr: DevVAddr,
    pub read_ops_pending_val: u32,
    pub write_ops_pending_val: u32,
}

/// A value the firmware publishes to `status_addr` when the stage finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct CtlStatus {
    pub status_addr: DevVAddr,
    pub status_value: u32,
}

/// The shared part of a geometry-stage (tile accelerator) command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct TaCommand {
    pub ctrl_flags: u32,
    pub frame_num: u32,
    pub cross_stage: CrossStageDependency,
    pub chained_sync: StageSyncSnapshot,
    pub peer_sync: StageSyncSnapshot,
    pub num_geometry_status_vals: u32,
    pub num_render_status_vals: u32,
    pub geometry_status: [CtlStatus; MAX_GEOMETRY_STATUS_VALS],
    pub render_status: [CtlStatus; MAX_RENDER_STATUS_VALS],
    pub num_src_syncs: u32,
    pub src_syncs: [DeviceSyncObject; MAX_SRC_SYNCS],
}

impl TaCommand {
    /// Byte offset of the control word.
    pub const CTRL_FLAGS_OFFSET: usize = offset_of!(TaCommand, ctrl_flags);
    /// Byte offset of the source sync array.
    pub const SRC_SYNCS_OFFSET: usize = offset_of!(TaCommand, src_syncs);
    /// Size of the record in bytes.
    pub const SIZE: usize = size_of::<TaCommand>();
    /// Size of the record in 32-bit words.
    pub const WORDS: usize = Self::SIZE / 4;

    /// Control flags, ignoring unknown bits.
    pub fn flags(&self) -> CommandFlags {
        CommandFlags::from_bits_truncate(self.ctrl_flags)
    }

    /// Whether the READY bit is set.
    pub fn is_ready(&self) -> bool {
        self.flags().contains(CommandFlags::READY)
    }

    /// Source syncs actually in use.
    pub fn src_syncs(&self) -> &[DeviceSyncObject] {
        let count = (self.num_src_syncs as usize).min(MAX_SRC_SYNCS);
        &self.src_syncs[..count]
    }

    /// Geometry-stage status updates actually in use.
    pub fn geometry_status(&self) -> &[CtlStatus] {
        let count = (self.num_geometry_status_vals as usize).min(MAX_GEOMETRY_STATUS_VALS);
        &self.geometry_status[..count]
    }

    /// Render-stage status updates actually in use.
    pub fn render_status(&self) -> &[CtlStatus] {
        let count = (self.num_render_status_vals as usize).min(MAX_RENDER_STATUS_VALS);
        &self.render_status[..count]
    }
}

static_assertions::const_assert_eq!(size_of::<DeviceSyncObject>(), 24);
static_assertions::const_assert_eq!(size_of::<CtlStatus>(), 8);
static_assertions::const_assert_eq!(TaCommand::CTRL_FLAGS_OFFSET, 0);
static_assertions::const_assert_eq!(TaCommand::SRC_SYNCS_OFFSET, 348);
static_assertions::const_assert_eq!(TaCommand::SIZE, 1116);
static_assertions::const_assert_eq!(TaCommand::SIZE % 4, 0);
