//! Ticket bookkeeping for a single kick.
//!
//! Every ticket a kick takes goes through a [`TicketLedger`], which remembers
//! the object, channel and command field it was taken for. Rolling back walks
//! the ledger in reverse, so exactly the tickets that were taken are given
//! back, newest first, and nothing else.
//!
//! A ledger only exists inside the device kick lock, which is what makes the
//! take/rollback pairs atomic with respect to other kicks.

use std::sync::Arc;

use crate::capture::{CaptureEvent, CaptureSink};

use super::object::{SyncChannel, SyncObject};

/// The command field a ticket was taken for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketSlot {
    /// Write ticket on the cross-stage dependency.
    CrossStage,
    /// Read ticket on the same-stage chained sync.
    ChainedSync,
    /// Read ticket on the peer-stage sync.
    PeerSync,
    /// Read ticket for the source sync at this index.
    Source(usize),
    /// Write ticket for the destination sync at this index.
    Destination(usize),
}

/// A ticket that has been taken on a sync object.
#[derive(Debug, Clone)]
pub struct Ticket {
    sync: Arc<SyncObject>,
    channel: SyncChannel,
    slot: TicketSlot,
    value: u32,
}

impl Ticket {
    /// The sync object the ticket was taken on.
    pub fn sync(&self) -> &Arc<SyncObject> {
        &self.sync
    }

    /// The counter channel.
    pub fn channel(&self) -> SyncChannel {
        self.channel
    }

    /// The command field the ticket belongs to.
    pub fn slot(&self) -> TicketSlot {
        self.slot
    }

    /// The pending value snapshotted when the ticket was taken.
    pub fn value(&self) -> u32 {
        self.value
    }
}

/// Ordered record of the tickets taken by one kick.
pub struct TicketLedger<'a> {
    tickets: Vec<Ticket>,
    capture: &'a dyn CaptureSink,
}

impl<'a> TicketLedger<'a> {
    pub(crate) fn new(capture: &'a dyn CaptureSink) -> Self {
        Self {
            tickets: Vec::new(),
            capture,
        }
    }

    /// Take a ticket on `channel` of `sync` and record it.
    ///
    /// Returns the pending value before the increment.
    pub fn take(
        &mut self,
        sync: &Arc<SyncObject>,
        channel: SyncChannel,
        slot: TicketSlot,
    ) -> u32 {
        let value = sync.take_op(channel);
        log::trace!(
            "take {:?} ticket on sync {:?} for {:?}: {}",
            channel,
            sync.id(),
            slot,
            value
        );
        self.capture.record(CaptureEvent::TicketTaken {
            sync: sync.id(),
            channel,
            value,
        });
        self.tickets.push(Ticket {
            sync: Arc::clone(sync),
            channel,
            slot,
            value,
        });
        value
    }

    /// Take a read ticket.
    pub fn take_read(&mut self, sync: &Arc<SyncObject>, slot: TicketSlot) -> u32 {
        self.take(sync, SyncChannel::Read, slot)
    }

    /// Take a write ticket.
    pub fn take_write(&mut self, sync: &Arc<SyncObject>, slot: TicketSlot) -> u32 {
        self.take(sync, SyncChannel::Write, slot)
    }

    /// Tickets taken so far, in take order.
    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    /// Number of tickets taken so far.
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// Whether no ticket has been taken.
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Number of tickets taken for source syncs.
    pub fn source_count(&self) -> usize {
        self.tickets
            .iter()
            .filter(|ticket| matches!(ticket.slot, TicketSlot::Source(_)))
            .count()
    }

    /// Give back every recorded ticket, newest first.
    ///
    /// Returns the number of tickets rolled back. The ledger is empty
    /// afterwards.
    pub fn rollback_all(&mut self) -> usize {
        let count = self.tickets.len();
        while let Some(ticket) = self.tickets.pop() {
            ticket.sync.rollback_op(ticket.channel);
            log::trace!(
                "rollback {:?} ticket on sync {:?} for {:?}",
                ticket.channel,
                ticket.sync.id(),
                ticket.slot
            );
            self.capture.record(CaptureEvent::TicketRolledBack {
                sync: ticket.sync.id(),
                channel: ticket.channel,
            });
        }
        count
    }

    /// Stop tracking the recorded tickets, leaving them taken.
    pub fn commit(&mut self) -> Vec<Ticket> {
        std::mem::take(&mut self.tickets)
    }
}

impl std::fmt::Debug for TicketLedger<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketLedger")
            .field("tickets", &self.tickets)
            .finish_non_exhaustive()
    }
}
