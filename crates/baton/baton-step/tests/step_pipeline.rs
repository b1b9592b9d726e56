//! Producer and consumer steps driving one shared buffer through the latch.
//!
//! Each step the producer publishes positions, the consumer projects them, checks
//! every field, writes 3-component "forces" back in place, and hands the buffer back.
//! The producer then reads the forces through its own view before the next publish.

use baton_latch::{LatchState, SharedLatch, SpinBudget};
use baton_records::{RecordView, Vec4};
use baton_step::{ProjectionStep, PublishStep, StepConfig, WriteBackStep};
use std::thread;
use std::time::Duration;

const RECORDS: usize = 1000;
const STEPS: usize = 200;

fn position(step: usize, i: usize) -> [f32; 4] {
    [i as f32, step as f32, -(i as f32), (step * 3 + i) as f32]
}

fn force(step: usize, i: usize) -> [f32; 3] {
    [(i * 2) as f32, step as f32, 1.0]
}

#[test]
fn lock_step_pipeline_preserves_every_field() {
    let mut shared = vec![Vec4::<f32>::default(); RECORDS];
    let cfg = StepConfig::new(RECORDS, shared.as_mut_ptr() as u64);
    let latch = SharedLatch::new().unwrap();
    let budget = SpinBudget::timeout(Duration::from_secs(20));

    // SAFETY: `shared` outlives both threads and the latch serializes all access.
    let mut publish = unsafe { PublishStep::<f32>::new(&cfg) }.unwrap();
    let producer_view = unsafe { RecordView::<f32>::vec4(cfg.address, RECORDS) }.unwrap();
    let mut project = unsafe { ProjectionStep::<f32>::new(&cfg) }.unwrap();
    let mut write_back = unsafe { WriteBackStep::<f32>::new(&cfg) }.unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            for step in 0..STEPS {
                latch.start_within(&budget).unwrap();
                let out = project.compute().unwrap();
                assert_eq!(out.shape(), (RECORDS, 4));
                for i in 0..RECORDS {
                    assert_eq!(out.row(i).unwrap(), &position(step, i), "step {step} record {i}");
                }

                let forces: Vec<f32> = (0..RECORDS).flat_map(|i| force(step, i)).collect();
                write_back.write_rows(&forces, 3).unwrap();
                latch.end();
            }
        });

        let mut batch = Vec::with_capacity(RECORDS * 4);
        for step in 0..STEPS {
            batch.clear();
            batch.extend((0..RECORDS).flat_map(|i| position(step, i)));
            publish.publish_within(&latch, &batch, 4, &budget).unwrap();

            assert_eq!(latch.state().unwrap(), LatchState::ProducerRunning);
            for i in 0..RECORDS {
                let [fx, fy, fz] = force(step, i);
                assert_eq!(producer_view.vec4_at(i), Some(Vec4::new(fx, fy, fz, 0.0)));
            }
        }
    });

    assert_eq!(shared[RECORDS - 1].w, 0.0);
}

#[test]
fn run_turn_hands_the_buffer_back_each_time() {
    let shared: Vec<Vec4<f64>> = (0..16).map(|i| Vec4::new(i as f64, 0.0, 0.0, 1.0)).collect();
    let cfg = StepConfig::new(shared.len(), shared.as_ptr() as u64);
    let latch = SharedLatch::new().unwrap();
    let mut project = unsafe { ProjectionStep::<f64>::new(&cfg) }.unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..1_000 {
                let out = project.run_turn(&latch).unwrap();
                assert_eq!(out.row(15).unwrap(), &[15.0, 0.0, 0.0, 1.0]);
            }
        });
        for _ in 0..1_000 {
            latch.await_turn();
        }
    });
}

#[test]
fn malformed_batch_never_touches_the_latch() {
    let mut shared = vec![Vec4::<f32>::default(); 4];
    let cfg = StepConfig::new(4, shared.as_mut_ptr() as u64);
    let latch = SharedLatch::new().unwrap();
    let mut publish = unsafe { PublishStep::<f32>::new(&cfg) }.unwrap();

    let err = publish.publish(&latch, &[1.0; 15], 4).unwrap_err();
    assert!(err.is_argument());
    assert_eq!(latch.state().unwrap(), LatchState::ProducerRunning);
}
