//! Integration tests for the kick path.
//!
//! Every test runs against both completion modes using `rstest`. Hardware
//! mode leaves completion counters alone; emulated mode completes accepted
//! kicks immediately.
//!
//! # Test Categories
//!
//! - **Ticketing**: take/rollback arithmetic on sync objects
//! - **Retry**: rollback restores every counter and withdraws the command
//! - **Destinations**: HW sync list snapshots on the first kick of a frame
//! - **Dependencies**: cross-stage and source tickets embedded in commands
//! - **Failures**: fence failures and fatal scheduler results
//! - **Concurrency**: kicks from several threads

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use rstest::rstest;

use common::{counters, TestContext};
use ember_kick::{
    CaptureEvent, CommandFlags, CompletionMode, DevVAddr, DeviceSyncObject, FenceAdapter,
    FenceBatch, FenceError, FenceHandle, FenceTag, HwSyncList, KickDescriptor, KickError,
    KickFlags, NativeFenceBackend, ReservationFenceBackend, ScheduleError, SourceSync,
    StatusMemory, StatusUpdate, SyncObject,
};

// ============================================================================
// Ticketing
// ============================================================================

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_ticket_round_trip(#[case] mode: CompletionMode) {
    let ctx = TestContext::new(mode);
    let sync = ctx.ctx.create_sync(Some("round trip"));
    for _ in 0..3 {
        sync.take_read_op();
        sync.take_write_op();
    }

    assert_eq!(sync.take_read_op(), 3);
    assert_eq!(sync.read_ops_pending(), 4);
    sync.rollback_read_op();
    assert_eq!(sync.read_ops_pending(), 3);

    assert_eq!(sync.take_write_op(), 3);
    assert_eq!(sync.write_ops_pending(), 4);
    sync.rollback_write_op();
    assert_eq!(sync.write_ops_pending(), 3);

    assert_eq!(sync.take_read2_op(), 0);
    sync.rollback_read2_op();
    assert_eq!(sync.read_ops2_pending(), 0);
}

// ============================================================================
// Retry
// ============================================================================

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_retry_rolls_back_sources(#[case] mode: CompletionMode) {
    let ctx = TestContext::new(mode);
    let sources = ctx.create_syncs(3);
    ctx.scheduler.script([Err(ScheduleError::Retry)]);

    let descriptor = sources
        .iter()
        .fold(KickDescriptor::new(ctx.buffer.clone(), 0), |kick, sync| {
            kick.with_source(sync.clone())
        });
    let err = ctx.ctx.kick(&descriptor).unwrap_err();

    assert_eq!(err, KickError::Retry);
    for sync in &sources {
        assert_eq!(sync.read_ops_pending(), 0);
        assert_eq!(sync.read_ops_complete(), 0);
    }
    assert!(ctx.buffer.read_ready(0).is_none());
    assert!(ctx
        .capture
        .events()
        .contains(&CaptureEvent::CommandRetracted { offset: 0 }));
    assert_eq!(ctx.ctx.kick_count(), 0);
}

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_retry_restores_every_counter(#[case] mode: CompletionMode) {
    let ctx = TestContext::new(mode);
    let syncs = ctx.create_syncs(5);
    for sync in &syncs {
        sync.take_read_op();
        sync.take_write_op();
        sync.take_write_op();
    }
    let before: Vec<_> = syncs.iter().map(|sync| counters(sync)).collect();

    let list = Arc::new(HwSyncList::new(2));
    let descriptor = KickDescriptor::new(ctx.buffer.clone(), 0)
        .with_flags(KickFlags::FIRST_KICK | KickFlags::TERMINATE)
        .with_cross_stage(syncs[0].clone(), true)
        .with_chained_sync(syncs[1].clone())
        .with_peer_sync(syncs[2].clone())
        .with_source(syncs[3].clone())
        .with_destination(Some(syncs[4].clone()))
        .with_destination(None)
        .with_hw_sync_list(list);

    ctx.scheduler.script([Err(ScheduleError::Retry)]);
    assert!(ctx.ctx.kick(&descriptor).unwrap_err().is_retry());

    let after: Vec<_> = syncs.iter().map(|sync| counters(sync)).collect();
    assert_eq!(before, after);

    // Rollback events come out newest first.
    let rolled_back: Vec<_> = ctx
        .capture
        .events()
        .into_iter()
        .filter_map(|event| match event {
            CaptureEvent::TicketRolledBack { sync, .. } => Some(sync),
            _ => None,
        })
        .collect();
    let expected: Vec<_> = [4, 3, 2, 1, 0].iter().map(|&i| syncs[i].id()).collect();
    assert_eq!(rolled_back, expected);
}

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_resubmit_after_retry_reuses_ticket_values(#[case] mode: CompletionMode) {
    let ctx = TestContext::new(mode);
    let source = ctx.ctx.create_sync(Some("source"));
    source.take_read_op();

    let descriptor = KickDescriptor::new(ctx.buffer.clone(), 0).with_source(source.clone());
    ctx.scheduler.script([Err(ScheduleError::Retry)]);
    assert!(ctx.ctx.kick(&descriptor).is_err());

    let report = ctx.ctx.kick(&descriptor).unwrap();
    assert_eq!(report.kick_index, 1);

    let submitted = ctx.scheduler.submitted();
    assert_eq!(submitted.len(), 2);
    assert_eq!(
        submitted[0].src_syncs()[0].read_ops_pending_val,
        submitted[1].src_syncs()[0].read_ops_pending_val
    );
    assert_eq!(source.read_ops_pending(), 2);
}

// ============================================================================
// Destinations
// ============================================================================

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_no_destination_snapshot_without_first_kick(#[case] mode: CompletionMode) {
    let ctx = TestContext::new(mode);
    let destinations = ctx.create_syncs(3);
    let list = Arc::new(HwSyncList::new(4));

    let descriptor = destinations
        .iter()
        .fold(
            KickDescriptor::new(ctx.buffer.clone(), 0).with_hw_sync_list(list.clone()),
            |kick, sync| kick.with_destination(Some(sync.clone())),
        )
        .with_flags(KickFlags::TERMINATE);
    ctx.ctx.kick(&descriptor).unwrap();

    assert_eq!(list.num_sync_objects(), 0);
    for sync in &destinations {
        assert_eq!(sync.write_ops_pending(), 0);
        assert_eq!(sync.last_write_kick(), 0);
    }
    assert!(!ctx
        .capture
        .events()
        .iter()
        .any(|event| matches!(event, CaptureEvent::SyncListEntryWritten { .. })));
}

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_unbound_destination_is_zeroed(#[case] mode: CompletionMode) {
    let ctx = TestContext::new(mode);
    let bound = ctx.ctx.create_sync(Some("render target"));
    bound.take_write_op();
    bound.take_read_op();
    let list = Arc::new(HwSyncList::new(2));

    let descriptor = KickDescriptor::new(ctx.buffer.clone(), 0)
        .with_flags(KickFlags::FIRST_KICK)
        .with_destination(Some(bound.clone()))
        .with_destination(None)
        .with_hw_sync_list(list.clone());
    let report = ctx.ctx.kick(&descriptor).unwrap();

    let addresses = bound.addresses();
    assert_eq!(list.num_sync_objects(), 2);
    assert_eq!(
        list.entry(0),
        Some(DeviceSyncObject {
            read_ops_pending_val: 1,
            write_ops_pending_val: 1,
            read_ops2_pending_val: 0,
            read_ops_complete_addr: addresses.read_ops_complete,
            write_ops_complete_addr: addresses.write_ops_complete,
            read_ops2_complete_addr: addresses.read_ops2_complete,
        })
    );
    assert_eq!(list.entry(1), Some(DeviceSyncObject::default()));
    assert_eq!(bound.write_ops_pending(), 2);
    assert_eq!(bound.last_write_kick(), report.kick_index);
}

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_terminate_after_first_kick_completes_destinations(#[case] mode: CompletionMode) {
    let ctx = TestContext::new(mode);
    let target = ctx.ctx.create_sync(Some("render target"));
    let list = Arc::new(HwSyncList::new(1));

    let first = KickDescriptor::new(ctx.buffer.clone(), TestContext::slot_offset(0))
        .with_flags(KickFlags::FIRST_KICK)
        .with_destination(Some(target.clone()))
        .with_hw_sync_list(list.clone());
    ctx.ctx.kick(&first).unwrap();
    assert_eq!(target.write_ops_complete(), 0);

    let last = KickDescriptor::new(ctx.buffer.clone(), TestContext::slot_offset(1))
        .with_flags(KickFlags::TERMINATE)
        .with_destination(Some(target.clone()))
        .with_hw_sync_list(list);
    ctx.ctx.kick(&last).unwrap();

    assert_eq!(target.write_ops_pending(), 1);
    match mode {
        CompletionMode::Hardware => assert_eq!(target.write_ops_complete(), 0),
        CompletionMode::Emulated => {
            assert_eq!(target.write_ops_complete(), 1);
            assert!(target.is_idle());
        }
    }
}

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_last_write_kick_recorded_only_when_accepted(#[case] mode: CompletionMode) {
    let ctx = TestContext::new(mode);
    let target = ctx.ctx.create_sync(Some("render target"));
    let descriptor = KickDescriptor::new(ctx.buffer.clone(), 0)
        .with_flags(KickFlags::FIRST_KICK)
        .with_destination(Some(target.clone()))
        .with_hw_sync_list(Arc::new(HwSyncList::new(1)));

    ctx.scheduler.script([Err(ScheduleError::Retry)]);
    assert!(ctx.ctx.kick(&descriptor).unwrap_err().is_retry());
    assert_eq!(target.last_write_kick(), 0);

    ctx.scheduler.script([Err(ScheduleError::Failed(5))]);
    assert!(ctx.ctx.kick(&descriptor).is_err());
    assert_eq!(target.last_write_kick(), 0);

    let report = ctx.ctx.kick(&descriptor).unwrap();
    assert_eq!(report.kick_index, 1);
    assert_eq!(target.last_write_kick(), 1);
}

// ============================================================================
// Dependencies
// ============================================================================

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_cross_stage_dependency_end_to_end(#[case] mode: CompletionMode) {
    let ctx = TestContext::new(mode);
    let render = ctx.ctx.create_sync(Some("3d"));
    for _ in 0..5 {
        render.take_write_op();
    }

    let descriptor =
        KickDescriptor::new(ctx.buffer.clone(), 0).with_cross_stage(render.clone(), true);
    ctx.ctx.kick(&descriptor).unwrap();

    let command = ctx.buffer.read_ready(0).expect("accepted command is ready");
    assert_eq!(command.cross_stage.write_ops_pending_val, 5);
    assert_eq!(
        command.cross_stage.write_ops_complete_addr,
        render.addresses().write_ops_complete
    );
    assert_eq!(render.write_ops_pending(), 6);

    match mode {
        CompletionMode::Hardware => assert_eq!(render.write_ops_complete(), 0),
        CompletionMode::Emulated => assert_eq!(render.write_ops_complete(), 6),
    }
}

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_consecutive_kicks_chain_tickets(#[case] mode: CompletionMode) {
    let ctx = TestContext::new(mode);
    let ta = ctx.ctx.create_sync(Some("ta"));
    let texture = ctx.ctx.create_sync(Some("texture"));

    for index in 0..3 {
        let descriptor = KickDescriptor::new(ctx.buffer.clone(), TestContext::slot_offset(index))
            .with_frame_num(index)
            .with_chained_sync(ta.clone())
            .with_source(texture.clone());
        let report = ctx.ctx.kick(&descriptor).unwrap();
        assert_eq!(report.kick_index, index as u64 + 1);
        assert_eq!(report.tickets, 2);
    }

    let values: Vec<_> = ctx
        .scheduler
        .submitted()
        .iter()
        .map(|command| {
            (
                command.chained_sync.read_ops_pending_val,
                command.src_syncs()[0].read_ops_pending_val,
            )
        })
        .collect();
    assert_eq!(values, vec![(0, 0), (1, 1), (2, 2)]);
    assert_eq!(ta.read_ops_pending(), 3);
    assert_eq!(texture.read_ops_pending(), 3);
}

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_status_updates(#[case] mode: CompletionMode) {
    let ctx = TestContext::new(mode);
    let memory = Arc::new(StatusMemory::new(DevVAddr(0x0020_0000), 4));
    let sync = ctx.ctx.create_sync(Some("status"));
    sync.take_read_op();

    let descriptor = KickDescriptor::new(ctx.buffer.clone(), 0)
        .with_flags(KickFlags::TERMINATE)
        .with_geometry_status(StatusUpdate::Direct {
            memory: memory.clone(),
            addr: DevVAddr(0x0020_0008),
            value: 0xabcd,
        })
        .with_render_status(StatusUpdate::SyncRead(sync.clone()));
    ctx.ctx.kick(&descriptor).unwrap();

    let command = ctx.buffer.read_ready(0).expect("accepted command is ready");
    assert_eq!(command.geometry_status().len(), 1);
    assert_eq!(command.render_status()[0].status_value, 1);
    assert!(command.flags().contains(CommandFlags::TERMINATE));

    match mode {
        CompletionMode::Hardware => {
            assert_eq!(memory.read(DevVAddr(0x0020_0008)), Some(0));
            assert_eq!(sync.read_ops_complete(), 0);
        }
        CompletionMode::Emulated => {
            assert_eq!(memory.read(DevVAddr(0x0020_0008)), Some(0xabcd));
            assert_eq!(sync.read_ops_complete(), 1);
        }
    }
}

// ============================================================================
// Failures
// ============================================================================

struct WindowFences {
    fences: HashMap<FenceHandle, Arc<SyncObject>>,
}

impl NativeFenceBackend for WindowFences {
    fn sync_for_fence(&self, fence: FenceHandle) -> Result<Arc<SyncObject>, FenceError> {
        self.fences
            .get(&fence)
            .cloned()
            .ok_or(FenceError::UnknownFence(fence))
    }
}

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_fence_failure_rolls_back_only_taken_tickets(#[case] mode: CompletionMode) {
    let window_device = TestContext::new(mode);
    let window = window_device.ctx.create_sync(Some("window"));
    let backend = WindowFences {
        fences: HashMap::from([(FenceHandle(1), window.clone())]),
    };
    let ctx = TestContext::with_fences(mode, FenceAdapter::NativeWindow(Arc::new(backend)));

    let chained = ctx.ctx.create_sync(Some("chained"));
    let texture = ctx.ctx.create_sync(Some("texture"));
    let untouched = ctx.ctx.create_sync(Some("after failure"));

    let descriptor = KickDescriptor::new(ctx.buffer.clone(), 0)
        .with_chained_sync(chained.clone())
        .with_source(texture.clone())
        .with_source(SourceSync::Fence(FenceHandle(1)))
        .with_source(SourceSync::Fence(FenceHandle(2)))
        .with_source(untouched.clone());
    let err = ctx.ctx.kick(&descriptor).unwrap_err();

    assert_eq!(
        err,
        KickError::FenceResolution {
            source: FenceError::UnknownFence(FenceHandle(2)),
            tickets_taken: 2,
            rolled_back: 3,
        }
    );
    for sync in [&chained, &texture, &window, &untouched] {
        assert_eq!(sync.read_ops_pending(), 0);
    }
    assert!(ctx.scheduler.submitted().is_empty());
    assert!(ctx.buffer.read_ready(0).is_none());
}

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_fatal_leaves_tickets_taken(#[case] mode: CompletionMode) {
    let ctx = TestContext::new(mode);
    let cross = ctx.ctx.create_sync(Some("cross"));
    let source = ctx.ctx.create_sync(Some("source"));
    ctx.scheduler.script([Err(ScheduleError::Failed(14))]);

    let descriptor = KickDescriptor::new(ctx.buffer.clone(), 0)
        .with_cross_stage(cross.clone(), true)
        .with_source(source.clone());
    let err = ctx.ctx.kick(&descriptor).unwrap_err();

    assert_eq!(err, KickError::Fatal { code: 14 });
    assert!(!err.is_retry());
    assert_eq!(cross.write_ops_pending(), 1);
    assert_eq!(source.read_ops_pending(), 1);
    assert_eq!(cross.write_ops_complete(), 0);
    assert_eq!(source.read_ops_complete(), 0);
    assert_eq!(ctx.ctx.kick_count(), 0);
    assert!(!ctx
        .capture
        .events()
        .iter()
        .any(|event| matches!(event, CaptureEvent::TicketRolledBack { .. })));
}

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_invalid_offset_mutates_nothing(#[case] mode: CompletionMode) {
    let ctx = TestContext::new(mode);
    let source = ctx.ctx.create_sync(None);
    let offset = TestContext::slot_offset(common::COMMAND_SLOTS);

    let err = ctx
        .ctx
        .kick(&KickDescriptor::new(ctx.buffer.clone(), offset).with_source(source.clone()))
        .unwrap_err();

    assert!(matches!(err, KickError::InvalidParams(_)));
    assert_eq!(source.read_ops_pending(), 0);
    assert!(ctx.capture.is_empty());
    assert!(ctx.scheduler.submitted().is_empty());
}

// ============================================================================
// Reservation fences
// ============================================================================

#[derive(Default)]
struct ReservationLog {
    blocking: bool,
    fail_processing: bool,
    calls: Mutex<Vec<(&'static str, usize, usize)>>,
}

impl ReservationFenceBackend for ReservationLog {
    fn resolve_fences(
        &self,
        sources: &[Arc<SyncObject>],
        destinations: &[Arc<SyncObject>],
    ) -> Result<Option<FenceBatch>, FenceError> {
        self.calls
            .lock()
            .push(("resolve", sources.len(), destinations.len()));
        Ok(Some(FenceBatch {
            blocking: self.blocking,
            tag: FenceTag(1),
        }))
    }

    fn process_fences(
        &self,
        _batch: FenceBatch,
        sources: &[Arc<SyncObject>],
        destinations: &[Arc<SyncObject>],
    ) -> Result<(), FenceError> {
        self.calls
            .lock()
            .push(("process", sources.len(), destinations.len()));
        if self.fail_processing {
            return Err(FenceError::Backend("merge failed".to_string()));
        }
        Ok(())
    }

    fn release_fences(
        &self,
        _batch: FenceBatch,
        sources: &[Arc<SyncObject>],
        destinations: &[Arc<SyncObject>],
    ) {
        self.calls
            .lock()
            .push(("release", sources.len(), destinations.len()));
    }

    fn check_all(&self) {
        self.calls.lock().push(("check_all", 0, 0));
    }
}

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_blocking_reservation_fences_released_on_retry(#[case] mode: CompletionMode) {
    let backend = Arc::new(ReservationLog {
        blocking: true,
        ..Default::default()
    });
    let ctx = TestContext::with_fences(mode, FenceAdapter::Reservation(backend.clone()));
    let source = ctx.ctx.create_sync(None);
    let target = ctx.ctx.create_sync(None);

    let descriptor = KickDescriptor::new(ctx.buffer.clone(), 0)
        .with_flags(KickFlags::FIRST_KICK)
        .with_source(source.clone())
        .with_destination(Some(target.clone()))
        .with_hw_sync_list(Arc::new(HwSyncList::new(1)));
    ctx.scheduler.script([Err(ScheduleError::Retry)]);
    assert!(ctx.ctx.kick(&descriptor).unwrap_err().is_retry());

    assert_eq!(
        *backend.calls.lock(),
        vec![("resolve", 1, 1), ("process", 1, 1), ("release", 1, 1)]
    );
    assert_eq!(source.read_ops_pending(), 0);
    assert_eq!(target.write_ops_pending(), 0);
}

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_non_blocking_reservation_fences_deferred(#[case] mode: CompletionMode) {
    let backend = Arc::new(ReservationLog::default());
    let ctx = TestContext::with_fences(mode, FenceAdapter::Reservation(backend.clone()));
    let source = ctx.ctx.create_sync(None);
    let target = ctx.ctx.create_sync(None);

    // Destinations only count for the first kick of a frame.
    let descriptor = KickDescriptor::new(ctx.buffer.clone(), 0)
        .with_source(source.clone())
        .with_destination(Some(target));
    let report = ctx.ctx.kick(&descriptor).unwrap();
    assert!(report.fences_deferred);

    let expected = match mode {
        CompletionMode::Hardware => vec![("resolve", 1, 0), ("process", 1, 0)],
        CompletionMode::Emulated => {
            vec![("resolve", 1, 0), ("process", 1, 0), ("check_all", 0, 0)]
        }
    };
    assert_eq!(*backend.calls.lock(), expected);
}

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_deferred_fence_failure_keeps_kick(#[case] mode: CompletionMode) {
    let backend = Arc::new(ReservationLog {
        fail_processing: true,
        ..Default::default()
    });
    let ctx = TestContext::with_fences(mode, FenceAdapter::Reservation(backend));
    let source = ctx.ctx.create_sync(None);

    let err = ctx
        .ctx
        .kick(&KickDescriptor::new(ctx.buffer.clone(), 0).with_source(source.clone()))
        .unwrap_err();

    assert_eq!(
        err,
        KickError::DeferredFence(FenceError::Backend("merge failed".to_string()))
    );
    assert_eq!(source.read_ops_pending(), 1);
    assert_eq!(ctx.ctx.kick_count(), 1);
    assert!(ctx.buffer.is_ready(0));
}

// ============================================================================
// Concurrency
// ============================================================================

#[rstest]
#[case::hardware(CompletionMode::Hardware)]
#[case::emulated(CompletionMode::Emulated)]
fn test_concurrent_kicks_on_disjoint_syncs(#[case] mode: CompletionMode) {
    const KICKS_PER_THREAD: u32 = 50;

    let ctx = TestContext::new(mode);
    let sets: Vec<Vec<Arc<SyncObject>>> = (0..2).map(|_| ctx.create_syncs(3)).collect();

    let handles: Vec<_> = sets
        .iter()
        .enumerate()
        .map(|(thread_index, syncs)| {
            let device = ctx.ctx.clone();
            let buffer = ctx.buffer.clone();
            let syncs = syncs.clone();
            let offset = TestContext::slot_offset(thread_index as u32);
            thread::spawn(move || {
                for kick in 0..KICKS_PER_THREAD {
                    let descriptor = KickDescriptor::new(buffer.clone(), offset)
                        .with_frame_num(kick)
                        .with_cross_stage(syncs[0].clone(), true)
                        .with_chained_sync(syncs[1].clone())
                        .with_source(syncs[2].clone());
                    device.kick(&descriptor).expect("kick should be accepted");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("kick thread panicked");
    }

    assert_eq!(ctx.ctx.kick_count(), 2 * KICKS_PER_THREAD as u64);
    for syncs in &sets {
        assert_eq!(syncs[0].write_ops_pending(), KICKS_PER_THREAD);
        assert_eq!(syncs[1].read_ops_pending(), KICKS_PER_THREAD);
        assert_eq!(syncs[2].read_ops_pending(), KICKS_PER_THREAD);
        if mode == CompletionMode::Emulated {
            assert!(syncs.iter().all(|sync| sync.is_idle()));
        }
    }
}
