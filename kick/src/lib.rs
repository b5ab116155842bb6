//! # Ember Kick
//!
//! Command submission and dependency synchronization for GPU kicks.
//!
//! ## Overview
//!
//! A kick turns a client's request for geometry work into a command the GPU
//! firmware can consume. Every producer/consumer ordering the work depends on
//! is expressed as a ticket: a snapshot of a sync object's pending counter
//! that the firmware waits on.
//!
//! This crate provides:
//! - [`SyncObject`] and [`SyncObjectStore`] - Per-resource progress counters
//! - [`TicketLedger`] - Ticket take/rollback bookkeeping for one kick
//! - [`FenceAdapter`] - Native window and reservation fence integration
//! - [`KickDescriptor`] and [`KickBuilder`] - Command assembly
//! - [`KickTransaction`] - Kick state machine and retry rollback
//! - [`SubmissionGateway`] - Scheduler hand-off and emulated completion
//! - [`DeviceContext`] - Per-device configuration and kick lock
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ember_kick::{CommandBuffer, DeviceConfig, DeviceContext, KickDescriptor, KickFlags};
//!
//! let ctx = DeviceContext::new(DeviceConfig::default(), scheduler);
//! let texture = ctx.create_sync(Some("texture"));
//! let buffer = Arc::new(CommandBuffer::new(64 * 1024));
//!
//! let kick = KickDescriptor::new(buffer, 0)
//!     .with_flags(KickFlags::LAST_IN_SCENE)
//!     .with_source(texture);
//! match ctx.kick(&kick) {
//!     Err(err) if err.is_retry() => { /* resubmit later */ }
//!     result => { result?; }
//! }
//! ```

pub mod capture;
pub mod command;
pub mod context;
pub mod error;
pub mod fence;
pub mod gateway;
pub mod kick;
pub mod rollback;
pub mod sync;

// Re-export main types for convenience
pub use capture::{CaptureEvent, CaptureLog, CaptureSink, NullCapture};
pub use command::{
    CommandBuffer, CommandFlags, CommandSlot, CtlStatus, DeviceSyncObject, HwSyncList,
    ReadyCommand, StatusMemory, TaCommand, TA_COMMAND_LAYOUT_VERSION,
};
pub use context::{CompletionMode, DeviceConfig, DeviceContext, KickReport};
pub use error::{FenceError, KickError, KickResult, ScheduleError};
pub use fence::{
    FenceAdapter, FenceBatch, FenceHandle, FenceTag, NativeFenceBackend, ReservationFenceBackend,
    SourceSync,
};
pub use gateway::{
    CommandKind, ContextHandle, DeviceHandle, PriorityClass, Scheduler, SubmissionGateway,
    SubmitOutcome,
};
pub use kick::{KickBuilder, KickDescriptor, KickFlags, StatusUpdate};
pub use rollback::{KickState, KickTransaction};
pub use sync::{
    DevVAddr, SyncAddresses, SyncChannel, SyncId, SyncObject, SyncObjectStore, Ticket,
    TicketLedger, TicketSlot,
};

/// Kick library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the kick subsystem.
///
/// Only logs the library and command layout versions.
pub fn init() {
    log::info!(
        "Ember Kick v{} initialized (command layout v{})",
        VERSION,
        TA_COMMAND_LAYOUT_VERSION
    );
}
