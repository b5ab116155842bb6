//! Hand-off to the command scheduler.
//!
//! The scheduler itself lives outside this crate and is reached through the
//! [`Scheduler`] trait. [`SubmissionGateway`] calls it once per kick and
//! classifies the result; [`emulate_completion`] stands in for the firmware
//! on devices without hardware.

use crate::command::{CommandFlags, ReadyCommand, TaCommand};
use crate::error::ScheduleError;
use crate::kick::KickDescriptor;
use crate::sync::{Ticket, TicketSlot};

/// Device the scheduler should queue work on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceHandle(pub u32);

/// Render context the kick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContextHandle(pub u64);

/// Kind of command handed to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Geometry (tile accelerator) kick.
    Ta,
    /// Render (3D) kick.
    Render,
    /// Transfer kick.
    Transfer,
}

/// Scheduling priority of a device's work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum PriorityClass {
    Low,
    #[default]
    Normal,
    High,
}

/// External command scheduler.
pub trait Scheduler: Send + Sync {
    /// Queue `command` for the firmware.
    fn submit_command(
        &self,
        device: DeviceHandle,
        kind: CommandKind,
        command: &TaCommand,
        priority: PriorityClass,
        context: ContextHandle,
        last_in_scene: bool,
    ) -> Result<(), ScheduleError>;
}

/// Classified scheduler result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmitOutcome {
    /// The command is queued.
    Accepted,
    /// The queue is full; roll back and try again later.
    Retry,
    /// Any other failure.
    Fatal(u32),
}

impl From<Result<(), ScheduleError>> for SubmitOutcome {
    fn from(result: Result<(), ScheduleError>) -> Self {
        match result {
            Ok(()) => Self::Accepted,
            Err(ScheduleError::Retry) => Self::Retry,
            Err(ScheduleError::Failed(code)) => Self::Fatal(code),
        }
    }
}

/// Submits ready commands for one device.
pub struct SubmissionGateway<'a> {
    scheduler: &'a dyn Scheduler,
    device: DeviceHandle,
    priority: PriorityClass,
}

impl<'a> SubmissionGateway<'a> {
    /// Gateway queuing on `device` at `priority`.
    pub fn new(scheduler: &'a dyn Scheduler, device: DeviceHandle, priority: PriorityClass) -> Self {
        Self {
            scheduler,
            device,
            priority,
        }
    }

    /// Hand `command` to the scheduler as a geometry kick.
    pub fn submit(&self, command: &ReadyCommand, context: ContextHandle) -> SubmitOutcome {
        let last_in_scene = command
            .command()
            .flags()
            .contains(CommandFlags::LAST_IN_SCENE);
        let outcome: SubmitOutcome = self
            .scheduler
            .submit_command(
                self.device,
                CommandKind::Ta,
                command.command(),
                self.priority,
                context,
                last_in_scene,
            )
            .into();

        match outcome {
            SubmitOutcome::Accepted => log::trace!(
                "command at {:#x} accepted by scheduler",
                command.slot().offset()
            ),
            SubmitOutcome::Retry => log::warn!(
                "scheduler queue full for command at {:#x}",
                command.slot().offset()
            ),
            SubmitOutcome::Fatal(code) => log::error!(
                "scheduler rejected command at {:#x} with code {}",
                command.slot().offset(),
                code
            ),
        }
        outcome
    }
}

impl std::fmt::Debug for SubmissionGateway<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionGateway")
            .field("device", &self.device)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Complete an accepted kick immediately, as the firmware would.
///
/// Read tickets and real cross-stage writes retire at their pending value
/// and geometry status updates resolve. Destination writes and render status
/// updates only complete when the kick terminates the scene. Destinations
/// complete at their HW sync list snapshot plus one, so a terminating kick
/// retires the writes taken by the frame's first kick.
pub fn emulate_completion(command: &ReadyCommand, tickets: &[Ticket], descriptor: &KickDescriptor) {
    let terminate = command.command().flags().contains(CommandFlags::TERMINATE);

    for ticket in tickets {
        let sync = ticket.sync();
        match ticket.slot() {
            TicketSlot::CrossStage => sync.complete_writes(),
            TicketSlot::ChainedSync | TicketSlot::PeerSync | TicketSlot::Source(_) => {
                sync.complete_reads()
            }
            TicketSlot::Destination(_) => {}
        }
    }

    if terminate {
        if let Some(list) = descriptor.hw_sync_list() {
            for (index, sync) in descriptor.destinations().iter().enumerate() {
                if let (Some(sync), Some(entry)) = (sync, list.entry(index)) {
                    sync.set_write_ops_complete(entry.write_ops_pending_val.wrapping_add(1));
                }
            }
        }
    }

    for (update, status) in descriptor
        .geometry_status()
        .iter()
        .zip(command.command().geometry_status())
    {
        update.resolve(*status);
    }
    if terminate {
        for (update, status) in descriptor
            .render_status()
            .iter()
            .zip(command.command().render_status())
        {
            update.resolve(*status);
        }
    }

    log::trace!(
        "emulated completion of command at {:#x} ({} tickets)",
        command.slot().offset(),
        tickets.len()
    );
}
