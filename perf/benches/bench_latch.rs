use baton_latch::{SharedLatch, SpinBudget};
use baton_perf::{spawn_responder, temp_shm_path};
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Instant;

fn bench_state_load(c: &mut Criterion) {
    let latch = SharedLatch::new().expect("failed to map latch");

    let mut group = c.benchmark_group("latch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("state", |b| {
        b.iter(|| black_box(latch.state()));
    });

    group.finish();
}

fn bench_round_trip(c: &mut Criterion, label: &str, latch: Arc<SharedLatch>) {
    let mut group = c.benchmark_group("latch");
    group.throughput(Throughput::Elements(1));

    group.bench_function(label, |b| {
        b.iter_custom(|iters| {
            let responder = spawn_responder(latch.clone(), iters);
            let start = Instant::now();
            for _ in 0..iters {
                latch.await_turn();
            }
            let elapsed = start.elapsed();
            responder.join().expect("responder panicked");
            elapsed
        });
    });

    group.finish();
}

fn bench_anon_round_trip(c: &mut Criterion) {
    let latch = Arc::new(SharedLatch::new().expect("failed to map latch"));
    bench_round_trip(c, "round_trip (anon)", latch);
}

fn bench_file_round_trip(c: &mut Criterion) {
    let path = temp_shm_path("crit_latch");
    let latch = Arc::new(SharedLatch::create(&path).expect("failed to create latch file"));
    bench_round_trip(c, "round_trip (file)", latch);
    let _ = std::fs::remove_file(&path);
}

fn bench_bounded_round_trip(c: &mut Criterion) {
    let latch = Arc::new(SharedLatch::new().expect("failed to map latch"));
    let budget = SpinBudget::spins(u64::MAX >> 1);

    let mut group = c.benchmark_group("latch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("round_trip (bounded)", |b| {
        b.iter_custom(|iters| {
            let responder = spawn_responder(latch.clone(), iters);
            let start = Instant::now();
            for _ in 0..iters {
                latch.await_turn_within(&budget).expect("spin budget exhausted");
            }
            let elapsed = start.elapsed();
            responder.join().expect("responder panicked");
            elapsed
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_state_load,
    bench_anon_round_trip,
    bench_file_round_trip,
    bench_bounded_round_trip
);
criterion_main!(benches);
