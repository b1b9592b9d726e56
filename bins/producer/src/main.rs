//! Publishes one batch of particle positions per step and integrates the forces the
//! consumer writes back.
//!
//! Usage: `producer [config.toml]`

use anyhow::Context;
use baton_config::ExchangeConfig;
use baton_latch::{SharedLatch, SpinBudget};
use baton_mmap::MmapFileMut;
use baton_records::RecordView;
use baton_step::{PublishStep, StepConfig};
use std::time::{Duration, Instant};
use tracing_subscriber::{EnvFilter, fmt};

const DT: f32 = 1e-3;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> anyhow::Result<()> {
    let cfg = ExchangeConfig::load_or_default(std::env::args_os().nth(1))?;
    init_tracing(&cfg.log_level);

    let len = cfg.buffer_len()?;
    let bytes = cfg.buffer_bytes()? as u64;

    // Data first: once the latch file exists the consumer assumes the records do too.
    let mut data = MmapFileMut::create_rw(&cfg.data_path, bytes)
        .with_context(|| format!("failed to create record file '{}'", cfg.data_path))?;
    let latch = SharedLatch::create(&cfg.latch_path)
        .with_context(|| format!("failed to create latch file '{}'", cfg.latch_path))?;

    let step_cfg = StepConfig::new(cfg.records, data.as_mut_ptr() as u64).with_fields(cfg.fields);
    // SAFETY: `data` outlives both handles and we only touch it while owning the latch.
    let mut publish = unsafe { PublishStep::<f32>::new(&step_cfg)? };
    let forces = unsafe { RecordView::<f32>::from_raw(step_cfg.address, cfg.records, step_cfg.layout::<f32>()?)? };

    let budget = match cfg.spin_timeout() {
        Some(t) => SpinBudget::timeout(t),
        None => SpinBudget::unbounded(),
    };

    let mut pos: Vec<f32> = (0..len).map(|i| ((i % 97) as f32 - 48.0) * 0.01).collect();
    let mut vel = vec![0f32; len];
    let mut force = vec![0f32; len];

    tracing::info!(
        records = cfg.records,
        fields = cfg.fields,
        steps = cfg.steps,
        latch = %cfg.latch_path,
        data = %cfg.data_path,
        "producer publishing"
    );

    let mut last = Instant::now();
    let mut count: u64 = 0;

    for step in 0..cfg.steps {
        publish
            .publish_within(&latch, &pos, cfg.fields, &budget)
            .with_context(|| format!("step {step}"))?;

        forces.project_into(&mut force)?;
        for ((x, v), f) in pos.iter_mut().zip(vel.iter_mut()).zip(&force) {
            *v += f * DT;
            *x += *v * DT;
        }

        count += 1;
        if last.elapsed() >= Duration::from_secs(1) {
            tracing::info!(step, rate = count, "producer step rate (steps/s)");
            count = 0;
            last = Instant::now();
        }
    }

    let energy: f32 = vel.iter().map(|v| 0.5 * v * v).sum();
    tracing::info!(steps = cfg.steps, kinetic_energy = energy, "producer finished");
    Ok(())
}
