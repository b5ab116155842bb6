//! Per-device kick context.
//!
//! The [`DeviceContext`] owns everything one device's kicks share: the
//! configuration, the sync object store, the scheduler and the coarse kick
//! lock. Every kick takes the lock for the whole of build, submit and
//! rollback, so ticket sequences of two kicks never interleave.
//!
//! # Thread Safety
//!
//! `DeviceContext` is `Send + Sync`; kicks may be issued from any number of
//! threads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::capture::{CaptureSink, NullCapture};
use crate::error::{KickError, KickResult};
use crate::fence::FenceAdapter;
use crate::gateway::{
    emulate_completion, DeviceHandle, PriorityClass, Scheduler, SubmissionGateway, SubmitOutcome,
};
use crate::kick::{KickBuilder, KickDescriptor};
use crate::rollback::KickTransaction;
use crate::sync::{DevVAddr, SyncObject, SyncObjectStore};

/// How submitted work completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompletionMode {
    /// Firmware completes work asynchronously.
    #[default]
    Hardware,
    /// No hardware: accepted kicks complete immediately.
    Emulated,
}

/// Configuration of a [`DeviceContext`].
#[derive(Clone)]
pub struct DeviceConfig {
    /// How accepted kicks complete.
    pub completion: CompletionMode,
    /// Fence integration used for source syncs.
    pub fences: FenceAdapter,
    /// Scheduling priority of every kick.
    pub priority: PriorityClass,
    /// Device the scheduler queues kicks on.
    pub device: DeviceHandle,
    /// Base of GPU-visible sync memory.
    pub sync_base: DevVAddr,
    /// Observer of ticket and command memory writes.
    pub capture: Arc<dyn CaptureSink>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            completion: CompletionMode::default(),
            fences: FenceAdapter::None,
            priority: PriorityClass::default(),
            device: DeviceHandle::default(),
            sync_base: DevVAddr(0x0010_0000),
            capture: Arc::new(NullCapture),
        }
    }
}

impl DeviceConfig {
    /// Default configuration: hardware completion, no fences.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the completion mode.
    pub fn with_completion(mut self, completion: CompletionMode) -> Self {
        self.completion = completion;
        self
    }

    /// Set the fence adapter.
    pub fn with_fences(mut self, fences: FenceAdapter) -> Self {
        self.fences = fences;
        self
    }

    /// Set the scheduling priority.
    pub fn with_priority(mut self, priority: PriorityClass) -> Self {
        self.priority = priority;
        self
    }

    /// Set the device handle.
    pub fn with_device(mut self, device: DeviceHandle) -> Self {
        self.device = device;
        self
    }

    /// Set the base address of sync memory.
    pub fn with_sync_base(mut self, sync_base: DevVAddr) -> Self {
        self.sync_base = sync_base;
        self
    }

    /// Set the capture observer.
    pub fn with_capture(mut self, capture: Arc<dyn CaptureSink>) -> Self {
        self.capture = capture;
        self
    }
}

impl std::fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("completion", &self.completion)
            .field("fences", &self.fences)
            .field("priority", &self.priority)
            .field("device", &self.device)
            .field("sync_base", &self.sync_base)
            .finish_non_exhaustive()
    }
}

/// Summary of an accepted kick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KickReport {
    /// Command buffer offset of the published command.
    pub offset: u32,
    /// Device kick counter value assigned to this kick.
    pub kick_index: u64,
    /// Number of tickets taken.
    pub tickets: usize,
    /// Whether non-blocking fences were processed after submission.
    pub fences_deferred: bool,
}

/// Kick state shared by every submission to one device.
pub struct DeviceContext {
    config: DeviceConfig,
    scheduler: Arc<dyn Scheduler>,
    store: SyncObjectStore,
    kick_lock: Mutex<()>,
    kick_count: AtomicU64,
}

impl DeviceContext {
    /// Create a context submitting through `scheduler`.
    pub fn new(config: DeviceConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        log::debug!("creating kick context for {:?}", config.device);
        let store = SyncObjectStore::new(config.sync_base);
        Self {
            config,
            scheduler,
            store,
            kick_lock: Mutex::new(()),
            kick_count: AtomicU64::new(0),
        }
    }

    /// The configuration the context was created with.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// The store that allocates this device's sync objects.
    pub fn sync_store(&self) -> &SyncObjectStore {
        &self.store
    }

    /// Create a sync object in this device's sync memory.
    pub fn create_sync(&self, label: Option<&str>) -> Arc<SyncObject> {
        self.store.create(label)
    }

    /// Number of kicks accepted so far.
    pub fn kick_count(&self) -> u64 {
        self.kick_count.load(Ordering::Acquire)
    }

    /// Build, publish and submit one kick.
    ///
    /// # Errors
    ///
    /// - [`KickError::InvalidParams`]: nothing was touched
    /// - [`KickError::FenceResolution`]: every ticket of the kick was given back
    /// - [`KickError::Retry`]: everything was rolled back; resubmit later
    /// - [`KickError::Fatal`]: tickets are left taken
    /// - [`KickError::DeferredFence`]: the kick is queued but its deferred
    ///   fences failed
    pub fn kick(&self, descriptor: &KickDescriptor) -> KickResult<KickReport> {
        let capture = self.config.capture.as_ref();
        let fences = &self.config.fences;

        let emulated = self.config.completion == CompletionMode::Emulated;
        let (report, deferred) = {
            let _guard = self.kick_lock.lock();
            let kick_index = self.kick_count.load(Ordering::Acquire) + 1;

            let mut txn = KickTransaction::new(capture, fences);
            let ready = KickBuilder::new(descriptor, fences).build(&mut txn)?;

            let gateway = SubmissionGateway::new(
                self.scheduler.as_ref(),
                self.config.device,
                self.config.priority,
            );
            match gateway.submit(&ready, descriptor.context()) {
                SubmitOutcome::Accepted => {
                    self.kick_count.store(kick_index, Ordering::Release);
                    let accepted = txn.accept(kick_index);
                    if emulated {
                        emulate_completion(&ready, &accepted.tickets, descriptor);
                    }
                    let report = KickReport {
                        offset: ready.slot().offset(),
                        kick_index,
                        tickets: accepted.tickets.len(),
                        fences_deferred: accepted.deferred_fences.is_some(),
                    };
                    (report, accepted.deferred_fences)
                }
                SubmitOutcome::Retry => {
                    txn.roll_back();
                    return Err(KickError::Retry);
                }
                SubmitOutcome::Fatal(code) => {
                    txn.abandon(code);
                    fences.check_all();
                    return Err(KickError::Fatal { code });
                }
            }
        };

        // Fences attached by deferred processing are signalled by check_all.
        let processed = match deferred {
            Some(deferred) => fences.process_deferred(&deferred).map_err(|err| {
                log::error!("deferred fence processing failed: {}", err);
                KickError::DeferredFence(err)
            }),
            None => Ok(()),
        };
        if emulated {
            fences.check_all();
        }
        processed?;

        Ok(report)
    }
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("kick_count", &self.kick_count())
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(DeviceContext: Send, Sync);
