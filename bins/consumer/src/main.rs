//! Waits for the producer's files, then on every turn projects the shared particle
//! positions and writes a spring force back in their place.
//!
//! Usage: `consumer [config.toml]`

use anyhow::{Context, bail};
use baton_config::ExchangeConfig;
use baton_latch::{SharedLatch, SpinBudget};
use baton_mmap::MmapFileMut;
use baton_records::Projection;
use baton_step::{ProjectionStep, StepConfig, StepError, WriteBackStep};
use std::io;
use std::time::{Duration, Instant};
use tracing_subscriber::{EnvFilter, fmt};

const STIFFNESS: f32 = 4.0;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Retries `open` until it succeeds or `timeout` elapses.
fn open_with_retry<T>(what: &str, timeout: Duration, mut open: impl FnMut() -> io::Result<T>) -> anyhow::Result<T> {
    let deadline = Instant::now() + timeout;
    loop {
        match open() {
            Ok(v) => return Ok(v),
            Err(e) if Instant::now() < deadline => {
                tracing::debug!(error = %e, what, "not ready, retrying");
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => return Err(e).with_context(|| format!("failed to open {what}")),
        }
    }
}

fn consume(
    project: &mut ProjectionStep<f32>,
    write_back: &mut WriteBackStep<f32>,
    force: &mut Vec<f32>,
) -> Result<Projection<f32>, StepError> {
    let positions = project.compute()?;
    force.clear();
    force.extend(positions.as_slice().iter().map(|x| -STIFFNESS * x));
    write_back.write_rows(force, positions.cols())?;
    Ok(positions)
}

fn main() -> anyhow::Result<()> {
    let cfg = ExchangeConfig::load_or_default(std::env::args_os().nth(1))?;
    init_tracing(&cfg.log_level);

    let latch = open_with_retry("latch", cfg.open_timeout(), || SharedLatch::open(&cfg.latch_path))?;
    let mut data = open_with_retry("records", cfg.open_timeout(), || MmapFileMut::open_rw(&cfg.data_path))?;

    let needed = cfg.buffer_bytes()?;
    if data.len() < needed {
        bail!(
            "record file '{}' holds {} bytes, need {needed} for {} x {}",
            cfg.data_path,
            data.len(),
            cfg.records,
            cfg.fields
        );
    }

    let step_cfg = StepConfig::new(cfg.records, data.as_mut_ptr() as u64).with_fields(cfg.fields);
    // SAFETY: `data` outlives both steps and they only run between start and end.
    let mut project = unsafe { ProjectionStep::<f32>::new(&step_cfg)? };
    let mut write_back = unsafe { WriteBackStep::<f32>::new(&step_cfg)? };

    let budget = match cfg.spin_timeout() {
        Some(t) => SpinBudget::timeout(t),
        None => SpinBudget::unbounded(),
    };

    let mut force = Vec::with_capacity(cfg.buffer_len()?);
    let mut last = Instant::now();
    let mut count: u64 = 0;

    for step in 0..cfg.steps {
        latch
            .start_within(&budget)
            .with_context(|| format!("producer stalled at step {step}"))?;
        let turn = consume(&mut project, &mut write_back, &mut force);
        latch.end();
        let positions = turn?;

        count += 1;
        if last.elapsed() >= Duration::from_secs(1) {
            let spread = positions.as_slice().iter().map(|x| x.abs()).fold(0f32, f32::max);
            tracing::info!(step, rate = count, spread, "consumer step rate (steps/s)");
            count = 0;
            last = Instant::now();
        }
    }

    tracing::info!(steps = cfg.steps, "consumer finished");
    Ok(())
}
