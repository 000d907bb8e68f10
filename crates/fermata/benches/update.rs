//! Benchmarks for the per-packet delay update path.

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use fermata::{DelayManager, DelayManagerConfig, TickTimer};

const SAMPLE_RATE_HZ: i32 = 8000;
/// 20 ms of media time at 8 kHz.
const TIMESTAMP_STEP: u32 = 160;

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("delay_manager");

    group.bench_function("update_steady", |b| {
        let tick_timer = Arc::new(TickTimer::default());
        let mut delay_manager =
            DelayManager::new(DelayManagerConfig::default(), Arc::clone(&tick_timer));
        let mut timestamp = 0u32;
        b.iter(|| {
            tick_timer.increment_by(2);
            timestamp = timestamp.wrapping_add(TIMESTAMP_STEP);
            black_box(delay_manager.update(black_box(timestamp), SAMPLE_RATE_HZ, false));
        });
    });

    group.bench_function("update_jittery", |b| {
        let tick_timer = Arc::new(TickTimer::default());
        let mut delay_manager =
            DelayManager::new(DelayManagerConfig::default(), Arc::clone(&tick_timer));
        let mut timestamp = 0u32;
        // Deterministic xorshift jitter of 0..15 extra ticks per packet.
        let mut state = 0x2545_f491u32;
        b.iter(|| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            tick_timer.increment_by(2 + u64::from(state % 16));
            timestamp = timestamp.wrapping_add(TIMESTAMP_STEP);
            black_box(delay_manager.update(black_box(timestamp), SAMPLE_RATE_HZ, false));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_update);
criterion_main!(benches);
