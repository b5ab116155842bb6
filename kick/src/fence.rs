//! External fence integration.
//!
//! Source dependencies of a kick can come from outside the driver: fences
//! handed over by a native windowing system, or fences attached to shared
//! buffers through reservation objects. The [`FenceAdapter`] turns them into
//! source read tickets, and is selected once in the device configuration.
//!
//! # Backends
//!
//! - [`FenceAdapter::None`]: no external fences; every source must already be
//!   a sync object
//! - [`FenceAdapter::NativeWindow`]: fence handles are translated to the sync
//!   object that tracks them
//! - [`FenceAdapter::Reservation`]: the combined fence set of all sources and
//!   destinations is classified as blocking or not. Blocking sets are
//!   resolved while the kick is built; non-blocking sets after submission

use std::sync::Arc;

use crate::command::DeviceSyncObject;
use crate::error::FenceError;
use crate::sync::{SyncObject, TicketLedger, TicketSlot};

/// Opaque handle of an external fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceHandle(pub u64);

/// Backend-issued tag identifying one resolved fence set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceTag(pub u32);

/// A classified reservation fence set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceBatch {
    /// Whether the GPU must not start before the fences are resolved.
    pub blocking: bool,
    /// Backend tag for processing or releasing the set.
    pub tag: FenceTag,
}

/// One source dependency of a kick.
#[derive(Debug, Clone)]
pub enum SourceSync {
    /// A resource already tracked by a sync object.
    Sync(Arc<SyncObject>),
    /// An external fence to be translated by the fence backend.
    Fence(FenceHandle),
}

impl From<Arc<SyncObject>> for SourceSync {
    fn from(sync: Arc<SyncObject>) -> Self {
        Self::Sync(sync)
    }
}

/// Backend for fences coming from a native windowing system.
pub trait NativeFenceBackend: Send + Sync {
    /// Sync object that completes when `fence` signals.
    fn sync_for_fence(&self, fence: FenceHandle) -> Result<Arc<SyncObject>, FenceError>;
}

/// Backend for fences attached to shared buffers.
pub trait ReservationFenceBackend: Send + Sync {
    /// Gather the fences of all reservation objects behind `sources` and
    /// `destinations`. Returns `None` when no reservation object is involved.
    fn resolve_fences(
        &self,
        sources: &[Arc<SyncObject>],
        destinations: &[Arc<SyncObject>],
    ) -> Result<Option<FenceBatch>, FenceError>;

    /// Wait for or merge the fences of `batch`.
    fn process_fences(
        &self,
        batch: FenceBatch,
        sources: &[Arc<SyncObject>],
        destinations: &[Arc<SyncObject>],
    ) -> Result<(), FenceError>;

    /// Give back backend resources tied to `batch`.
    fn release_fences(
        &self,
        batch: FenceBatch,
        sources: &[Arc<SyncObject>],
        destinations: &[Arc<SyncObject>],
    );

    /// Signal every fence whose sync objects have completed. Called after
    /// emulated completion.
    fn check_all(&self) {}
}

/// Fence backend selected for a device.
#[derive(Clone, Default)]
pub enum FenceAdapter {
    /// No external fence support.
    #[default]
    None,
    /// Native window fences.
    NativeWindow(Arc<dyn NativeFenceBackend>),
    /// Buffer reservation fences.
    Reservation(Arc<dyn ReservationFenceBackend>),
}

impl std::fmt::Debug for FenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "FenceAdapter::None"),
            Self::NativeWindow(_) => write!(f, "FenceAdapter::NativeWindow"),
            Self::Reservation(_) => write!(f, "FenceAdapter::Reservation"),
        }
    }
}

/// Failure to turn sources into tickets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenceFailure {
    /// Backend error.
    pub error: FenceError,
    /// Source read tickets taken before the failure. They are still recorded
    /// in the kick's ledger.
    pub tickets_taken: usize,
}

/// Reservation fences that still need processing or releasing.
#[derive(Debug, Clone)]
pub struct PendingFences {
    batch: FenceBatch,
    processed: bool,
    sources: Vec<Arc<SyncObject>>,
    destinations: Vec<Arc<SyncObject>>,
}

impl PendingFences {
    /// The classified fence set.
    pub fn batch(&self) -> FenceBatch {
        self.batch
    }

    /// Whether the set was resolved during the build.
    pub fn is_processed(&self) -> bool {
        self.processed
    }
}

/// Source snapshots produced by [`FenceAdapter::take_source_tickets`].
#[derive(Debug, Default)]
pub struct SourceTickets {
    /// One snapshot per source, in source order.
    pub snapshots: Vec<DeviceSyncObject>,
    /// Reservation fences tied to this kick.
    pub fences: Option<PendingFences>,
}

impl FenceAdapter {
    /// Whether a backend is configured.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Resolve `sources` to sync objects and take one read ticket on each.
    ///
    /// `destinations` are the bound destination syncs of a first kick; they
    /// only matter to reservation backends. On failure, the returned
    /// [`FenceFailure`] says how many source tickets had been taken.
    pub fn take_source_tickets(
        &self,
        ledger: &mut TicketLedger<'_>,
        sources: &[SourceSync],
        destinations: &[Arc<SyncObject>],
    ) -> Result<SourceTickets, FenceFailure> {
        match self {
            Self::None => {
                let snapshots = take_each(ledger, sources, |fence| {
                    log::error!("fence {:?} submitted without a fence backend", fence);
                    Err(FenceError::Unsupported)
                })?;
                Ok(SourceTickets {
                    snapshots,
                    fences: None,
                })
            }
            Self::NativeWindow(backend) => {
                let snapshots = take_each(ledger, sources, |fence| backend.sync_for_fence(fence))?;
                Ok(SourceTickets {
                    snapshots,
                    fences: None,
                })
            }
            Self::Reservation(backend) => {
                let syncs = sources
                    .iter()
                    .map(|source| match source {
                        SourceSync::Sync(sync) => Ok(Arc::clone(sync)),
                        SourceSync::Fence(_) => Err(FenceError::Unsupported),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|error| FenceFailure {
                        error,
                        tickets_taken: 0,
                    })?;

                let fences = prepare_reservation(backend.as_ref(), syncs, destinations)
                    .map_err(|error| FenceFailure {
                        error,
                        tickets_taken: 0,
                    })?;

                let snapshots = take_each(ledger, sources, |_| Err(FenceError::Unsupported))?;
                Ok(SourceTickets { snapshots, fences })
            }
        }
    }

    /// Undo fence work of a kick that is being rolled back.
    pub fn release(&self, fences: &PendingFences) {
        if let Self::Reservation(backend) = self {
            if fences.processed {
                log::trace!("releasing fence set {:?}", fences.batch.tag);
                backend.release_fences(fences.batch, &fences.sources, &fences.destinations);
            }
        }
    }

    /// Resolve a non-blocking fence set after its kick was accepted.
    pub fn process_deferred(&self, fences: &PendingFences) -> Result<(), FenceError> {
        match self {
            Self::Reservation(backend) if !fences.processed => {
                log::trace!("processing deferred fence set {:?}", fences.batch.tag);
                backend.process_fences(fences.batch, &fences.sources, &fences.destinations)
            }
            _ => Ok(()),
        }
    }

    /// Let the backend signal fences whose work has completed.
    pub fn check_all(&self) {
        if let Self::Reservation(backend) = self {
            backend.check_all();
        }
    }
}

fn prepare_reservation(
    backend: &dyn ReservationFenceBackend,
    sources: Vec<Arc<SyncObject>>,
    destinations: &[Arc<SyncObject>],
) -> Result<Option<PendingFences>, FenceError> {
    let Some(batch) = backend.resolve_fences(&sources, destinations)? else {
        return Ok(None);
    };

    let destinations = destinations.to_vec();
    if batch.blocking {
        log::trace!("resolving blocking fence set {:?} before kick", batch.tag);
        backend.process_fences(batch, &sources, &destinations)?;
    }

    Ok(Some(PendingFences {
        batch,
        processed: batch.blocking,
        sources,
        destinations,
    }))
}

fn take_each(
    ledger: &mut TicketLedger<'_>,
    sources: &[SourceSync],
    mut translate: impl FnMut(FenceHandle) -> Result<Arc<SyncObject>, FenceError>,
) -> Result<Vec<DeviceSyncObject>, FenceFailure> {
    let mut snapshots = Vec::with_capacity(sources.len());
    for (index, source) in sources.iter().enumerate() {
        let sync = match source {
            SourceSync::Sync(sync) => Arc::clone(sync),
            SourceSync::Fence(fence) => translate(*fence).map_err(|error| FenceFailure {
                error,
                tickets_taken: index,
            })?,
        };

        let addresses = sync.addresses();
        let read_ops_pending_val = ledger.take_read(&sync, TicketSlot::Source(index));
        snapshots.push(DeviceSyncObject {
            read_ops_pending_val,
            write_ops_pending_val: sync.write_ops_pending(),
            read_ops_complete_addr: addresses.read_ops_complete,
            write_ops_complete_addr: addresses.write_ops_complete,
            ..Default::default()
        });
    }
    Ok(snapshots)
}
