//! Common utilities for kick integration tests.
//!
//! Provides a scripted scheduler standing in for the firmware command queue
//! and a [`TestContext`] bundling a device context with its command buffer.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use ember_kick::{
    CaptureLog, CommandBuffer, CommandKind, CompletionMode, ContextHandle, DeviceConfig,
    DeviceContext, DeviceHandle, FenceAdapter, PriorityClass, ScheduleError, Scheduler,
    SyncObject, TaCommand,
};

/// Enable test logging. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Scheduler
// ============================================================================

/// Scheduler that replays scripted results, then accepts everything.
#[derive(Default)]
pub struct ScriptedScheduler {
    script: Mutex<VecDeque<Result<(), ScheduleError>>>,
    submitted: Mutex<Vec<TaCommand>>,
}

impl ScriptedScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue results for the next submissions.
    pub fn script(&self, results: impl IntoIterator<Item = Result<(), ScheduleError>>) {
        self.script.lock().extend(results);
    }

    /// Commands the scheduler was handed, accepted or not.
    pub fn submitted(&self) -> Vec<TaCommand> {
        self.submitted.lock().clone()
    }
}

impl Scheduler for ScriptedScheduler {
    fn submit_command(
        &self,
        _device: DeviceHandle,
        kind: CommandKind,
        command: &TaCommand,
        _priority: PriorityClass,
        _context: ContextHandle,
        _last_in_scene: bool,
    ) -> Result<(), ScheduleError> {
        assert_eq!(kind, CommandKind::Ta);
        assert!(command.is_ready(), "scheduler handed a command without READY");
        self.submitted.lock().push(*command);
        self.script.lock().pop_front().unwrap_or(Ok(()))
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// Number of command slots in the test command buffer.
pub const COMMAND_SLOTS: u32 = 8;

/// Device context plus everything a test needs to drive it.
pub struct TestContext {
    pub ctx: Arc<DeviceContext>,
    pub scheduler: Arc<ScriptedScheduler>,
    pub buffer: Arc<CommandBuffer>,
    pub capture: Arc<CaptureLog>,
}

impl TestContext {
    pub fn new(mode: CompletionMode) -> Self {
        Self::with_fences(mode, FenceAdapter::None)
    }

    pub fn with_fences(mode: CompletionMode, fences: FenceAdapter) -> Self {
        init_logging();

        let scheduler = Arc::new(ScriptedScheduler::new());
        let capture = Arc::new(CaptureLog::new());
        let config = DeviceConfig::new()
            .with_completion(mode)
            .with_fences(fences)
            .with_capture(capture.clone());
        let ctx = Arc::new(DeviceContext::new(config, scheduler.clone()));
        let buffer = Arc::new(
            CommandBuffer::new(TaCommand::SIZE as u32 * COMMAND_SLOTS).with_label("test ccb"),
        );

        Self {
            ctx,
            scheduler,
            buffer,
            capture,
        }
    }

    /// Byte offset of command slot `index`.
    pub fn slot_offset(index: u32) -> u32 {
        index * TaCommand::SIZE as u32
    }

    /// Create `count` sync objects.
    pub fn create_syncs(&self, count: usize) -> Vec<Arc<SyncObject>> {
        (0..count)
            .map(|i| self.ctx.create_sync(Some(&format!("sync_{i}"))))
            .collect()
    }
}

/// Pending and complete counters of every channel, for before/after checks.
pub fn counters(sync: &SyncObject) -> [u32; 6] {
    [
        sync.read_ops_pending(),
        sync.read_ops_complete(),
        sync.write_ops_pending(),
        sync.write_ops_complete(),
        sync.read_ops2_pending(),
        sync.read_ops2_complete(),
    ]
}
