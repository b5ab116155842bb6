//! Sync objects and the ticketing protocol.
//!
//! # Module Contents
//!
//! - [`SyncObject`] - Read/write progress counters of one resource
//! - [`SyncObjectStore`] - Creates sync objects and assigns GPU addresses
//! - [`TicketLedger`] - Ordered take/rollback record for one kick

mod object;
mod store;
mod ticket;

pub use object::{DevVAddr, SyncAddresses, SyncChannel, SyncId, SyncObject};
pub use store::SyncObjectStore;
pub use ticket::{Ticket, TicketLedger, TicketSlot};
