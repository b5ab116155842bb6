use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ember_kick::{
    CommandBuffer, CommandKind, CompletionMode, ContextHandle, DeviceConfig, DeviceContext,
    DeviceHandle, HwSyncList, KickDescriptor, KickFlags, PriorityClass, ScheduleError, Scheduler,
    SyncObject, TaCommand,
};

struct AcceptAll;

impl Scheduler for AcceptAll {
    fn submit_command(
        &self,
        _device: DeviceHandle,
        _kind: CommandKind,
        _command: &TaCommand,
        _priority: PriorityClass,
        _context: ContextHandle,
        _last_in_scene: bool,
    ) -> Result<(), ScheduleError> {
        Ok(())
    }
}

struct AlwaysRetry;

impl Scheduler for AlwaysRetry {
    fn submit_command(
        &self,
        _device: DeviceHandle,
        _kind: CommandKind,
        _command: &TaCommand,
        _priority: PriorityClass,
        _context: ContextHandle,
        _last_in_scene: bool,
    ) -> Result<(), ScheduleError> {
        Err(ScheduleError::Retry)
    }
}

fn emulated_context(scheduler: Arc<dyn Scheduler>) -> DeviceContext {
    DeviceContext::new(
        DeviceConfig::new().with_completion(CompletionMode::Emulated),
        scheduler,
    )
}

fn full_kick(ctx: &DeviceContext, sources: usize) -> (KickDescriptor, Vec<Arc<SyncObject>>) {
    let syncs: Vec<_> = (0..sources + 3).map(|_| ctx.create_sync(None)).collect();
    let buffer = Arc::new(CommandBuffer::new(TaCommand::SIZE as u32));
    let descriptor = syncs[3..].iter().fold(
        KickDescriptor::new(buffer, 0)
            .with_flags(KickFlags::FIRST_KICK | KickFlags::TERMINATE)
            .with_cross_stage(syncs[0].clone(), true)
            .with_chained_sync(syncs[1].clone())
            .with_destination(Some(syncs[2].clone()))
            .with_hw_sync_list(Arc::new(HwSyncList::new(1))),
        |kick, sync| kick.with_source(sync.clone()),
    );
    (descriptor, syncs)
}

// ---------------------------------------------------------------------------
// Ticketing
// ---------------------------------------------------------------------------

fn bench_ticket_take_rollback(c: &mut Criterion) {
    let ctx = emulated_context(Arc::new(AcceptAll));
    let sync = ctx.create_sync(Some("bench"));
    c.bench_function("ticket_take_rollback_read", |b| {
        b.iter(|| {
            black_box(sync.take_read_op());
            sync.rollback_read_op();
        });
    });
}

// ---------------------------------------------------------------------------
// Full kicks
// ---------------------------------------------------------------------------

fn bench_kick_accepted(c: &mut Criterion) {
    let ctx = emulated_context(Arc::new(AcceptAll));
    let (descriptor, _syncs) = full_kick(&ctx, 8);
    c.bench_function("kick_accepted_8_sources", |b| {
        b.iter(|| black_box(ctx.kick(&descriptor)));
    });
}

fn bench_kick_retry(c: &mut Criterion) {
    let ctx = emulated_context(Arc::new(AlwaysRetry));
    let (descriptor, _syncs) = full_kick(&ctx, 32);
    c.bench_function("kick_retry_rollback_32_sources", |b| {
        b.iter(|| black_box(ctx.kick(&descriptor)));
    });
}

criterion_group!(
    benches,
    bench_ticket_take_rollback,
    bench_kick_accepted,
    bench_kick_retry,
);
criterion_main!(benches);
