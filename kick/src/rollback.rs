//! Kick lifecycle and retry rollback.
//!
//! A [`KickTransaction`] owns the ticket ledger of one kick and walks the
//! state machine
//!
//! ```text
//! Building -> Ready -> Accepted
//!                   -> RolledBack
//!                   -> Fatal
//! Building -> RolledBack          (fence failure)
//! ```
//!
//! Rolling back retracts the published command, releases blocking fences and
//! gives back every ticket in reverse take order. A fatal submission leaves
//! every ticket taken.

use std::sync::Arc;

use crate::capture::CaptureSink;
use crate::command::{CommandBuffer, CommandSlot};
use crate::fence::{FenceAdapter, PendingFences};
use crate::sync::{Ticket, TicketLedger, TicketSlot};

/// Lifecycle state of a kick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KickState {
    /// Tickets are being taken and the command assembled.
    Building,
    /// The command is published with READY set.
    Ready,
    /// The scheduler queued the command.
    Accepted,
    /// Every ticket was given back.
    RolledBack,
    /// The scheduler rejected the command; tickets stay taken.
    Fatal,
}

impl KickState {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::RolledBack | Self::Fatal)
    }

    fn can_transition_to(self, next: KickState) -> bool {
        matches!(
            (self, next),
            (Self::Building, Self::Ready)
                | (Self::Building, Self::RolledBack)
                | (Self::Ready, Self::Accepted)
                | (Self::Ready, Self::RolledBack)
                | (Self::Ready, Self::Fatal)
        )
    }
}

/// What an accepted kick leaves behind.
#[derive(Debug)]
pub struct AcceptedKick {
    /// Tickets taken for the kick, in take order.
    pub tickets: Vec<Ticket>,
    /// Non-blocking reservation fences still to be processed.
    pub deferred_fences: Option<PendingFences>,
}

/// Bookkeeping for one kick from the first ticket to a terminal state.
pub struct KickTransaction<'a> {
    state: KickState,
    ledger: TicketLedger<'a>,
    fences: &'a FenceAdapter,
    capture: &'a dyn CaptureSink,
    published: Option<(Arc<CommandBuffer>, CommandSlot)>,
    pending_fences: Option<PendingFences>,
}

impl<'a> KickTransaction<'a> {
    /// Start a kick in the `Building` state.
    pub fn new(capture: &'a dyn CaptureSink, fences: &'a FenceAdapter) -> Self {
        Self {
            state: KickState::Building,
            ledger: TicketLedger::new(capture),
            fences,
            capture,
            published: None,
            pending_fences: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> KickState {
        self.state
    }

    /// Tickets recorded so far.
    pub fn tickets(&self) -> &[Ticket] {
        self.ledger.tickets()
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut TicketLedger<'a> {
        &mut self.ledger
    }

    pub(crate) fn capture(&self) -> &'a dyn CaptureSink {
        self.capture
    }

    fn transition(&mut self, next: KickState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid kick transition {:?} -> {:?}",
            self.state,
            next
        );
        log::debug!("kick {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Record that the command was published at `slot` of `buffer`.
    pub(crate) fn mark_ready(
        &mut self,
        buffer: Arc<CommandBuffer>,
        slot: CommandSlot,
        fences: Option<PendingFences>,
    ) {
        self.transition(KickState::Ready);
        self.published = Some((buffer, slot));
        self.pending_fences = fences;
    }

    /// The scheduler queued the command as device kick `kick_index`.
    /// Tickets stay taken, and every destination records the kick as its
    /// last write.
    pub fn accept(&mut self, kick_index: u64) -> AcceptedKick {
        self.transition(KickState::Accepted);
        let deferred_fences = self
            .pending_fences
            .take()
            .filter(|fences| !fences.is_processed());
        let tickets = self.ledger.commit();
        for ticket in &tickets {
            if let TicketSlot::Destination(_) = ticket.slot() {
                ticket.sync().set_last_write_kick(kick_index);
            }
        }
        AcceptedKick {
            tickets,
            deferred_fences,
        }
    }

    /// Undo the kick. Returns the number of tickets given back.
    pub fn roll_back(&mut self) -> usize {
        self.transition(KickState::RolledBack);

        if let Some((buffer, slot)) = self.published.take() {
            buffer.retract(slot, self.capture);
        }
        if let Some(fences) = self.pending_fences.take() {
            self.fences.release(&fences);
        }

        let count = self.ledger.rollback_all();
        log::debug!("kick rolled back {} tickets", count);
        count
    }

    /// The scheduler rejected the command for good. Tickets are left taken
    /// so every snapshot already handed to the firmware stays reachable.
    pub fn abandon(&mut self, code: u32) -> Vec<Ticket> {
        self.transition(KickState::Fatal);
        self.pending_fences = None;
        let tickets = self.ledger.commit();
        log::debug!(
            "kick abandoned with code {} leaving {} tickets taken",
            code,
            tickets.len()
        );
        tickets
    }
}

impl Drop for KickTransaction<'_> {
    fn drop(&mut self) {
        let has_effects = !self.ledger.is_empty() || self.published.is_some();
        if !self.state.is_terminal() && has_effects {
            log::warn!(
                "kick dropped in state {:?}, rolling back {} tickets",
                self.state,
                self.ledger.len()
            );
            self.roll_back();
        }
    }
}

impl std::fmt::Debug for KickTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KickTransaction")
            .field("state", &self.state)
            .field("ledger", &self.ledger)
            .field("published", &self.published.as_ref().map(|(_, slot)| slot))
            .finish_non_exhaustive()
    }
}
