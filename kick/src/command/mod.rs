//! Firmware-visible command memory.
//!
//! # Module Contents
//!
//! - [`TaCommand`] and friends - Fixed record layouts read by the firmware
//! - [`CommandBuffer`] - Command memory with two-phase publishing
//! - [`HwSyncList`] - Per-frame destination sync snapshot
//! - [`StatusMemory`] - Targets for direct status updates

mod buffer;
mod layout;
mod status;
mod sync_list;

pub use buffer::{CommandBuffer, CommandSlot, ReadyCommand, StagedCommand};
pub use layout::{
    CommandFlags, CrossStageDependency, CtlStatus, DeviceSyncObject, StageSyncSnapshot,
    TaCommand, MAX_GEOMETRY_STATUS_VALS, MAX_RENDER_STATUS_VALS, MAX_SRC_SYNCS,
    TA_COMMAND_LAYOUT_VERSION,
};
pub use status::StatusMemory;
pub use sync_list::HwSyncList;
