use baton_latch::SharedLatch;
use baton_records::Vec4;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

pub mod report;

// ─── Statistics ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub stddev: f64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub count: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BenchResult {
    pub name: String,
    pub unit: String,
    pub stats: Stats,
}

/// Sorts `samples` in place. `None` when there is nothing to summarize.
pub fn compute_stats(samples: &mut [u64]) -> Option<Stats> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_unstable();

    let count = samples.len();
    let mean = samples.iter().map(|&x| x as f64).sum::<f64>() / count as f64;
    let variance = samples
        .iter()
        .map(|&x| {
            let diff = x as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / count as f64;

    Some(Stats {
        min: samples[0],
        max: samples[count - 1],
        mean,
        stddev: variance.sqrt(),
        p50: percentile_sorted(samples, 50.0),
        p90: percentile_sorted(samples, 90.0),
        p99: percentile_sorted(samples, 99.0),
        p999: percentile_sorted(samples, 99.9),
        count,
    })
}

fn percentile_sorted(sorted: &[u64], pct: f64) -> u64 {
    let len = sorted.len();
    if len == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0 * len as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(len - 1)]
}

// ─── Measurement Harness ────────────────────────────────────────────────────

/// Times `batches` batches of `batch_size` calls and reports the per-call cost.
pub fn measure_batched<F: FnMut()>(
    name: &str,
    batches: usize,
    batch_size: usize,
    warmup: usize,
    mut f: F,
) -> Option<BenchResult> {
    for _ in 0..warmup * batch_size {
        f();
    }

    let mut samples = Vec::with_capacity(batches);
    for _ in 0..batches {
        let start = Instant::now();
        for _ in 0..batch_size {
            f();
        }
        let total = start.elapsed().as_nanos();
        let per_op = ((total + (batch_size as u128 / 2)) / batch_size.max(1) as u128) as u64;
        samples.push(per_op.max(1));
    }

    Some(BenchResult {
        name: name.to_string(),
        unit: "ns/op".to_string(),
        stats: compute_stats(&mut samples)?,
    })
}

/// Consumer thread that answers exactly `turns` handoffs on `latch`, then exits.
pub fn spawn_responder(latch: Arc<SharedLatch>, turns: u64) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for _ in 0..turns {
            latch.start();
            latch.end();
        }
    })
}

// ─── Resource Usage ─────────────────────────────────────────────────────────

/// `getrusage(RUSAGE_SELF)` counters. Subtract two snapshots with [`since`](Self::since).
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct ResourceSnapshot {
    pub max_rss_bytes: i64,
    pub minor_faults: i64,
    pub major_faults: i64,
    pub vol_ctx_switches: i64,
    pub invol_ctx_switches: i64,
    pub user_time_us: i64,
    pub sys_time_us: i64,
}

impl ResourceSnapshot {
    pub fn capture() -> Self {
        // SAFETY: rusage is plain data and getrusage only writes into it.
        let usage = unsafe {
            let mut usage: libc::rusage = std::mem::zeroed();
            libc::getrusage(libc::RUSAGE_SELF, &mut usage);
            usage
        };
        let micros = |tv: libc::timeval| tv.tv_sec * 1_000_000 + tv.tv_usec as i64;
        // Linux reports KiB, macOS bytes.
        let rss_unit = if cfg!(target_os = "linux") { 1024 } else { 1 };
        Self {
            max_rss_bytes: usage.ru_maxrss * rss_unit,
            minor_faults: usage.ru_minflt,
            major_faults: usage.ru_majflt,
            vol_ctx_switches: usage.ru_nvcsw,
            invol_ctx_switches: usage.ru_nivcsw,
            user_time_us: micros(usage.ru_utime),
            sys_time_us: micros(usage.ru_stime),
        }
    }

    /// Counters accumulated since `earlier`. Peak RSS is carried over, not subtracted.
    pub fn since(&self, earlier: &Self) -> Self {
        Self {
            max_rss_bytes: self.max_rss_bytes,
            minor_faults: self.minor_faults.saturating_sub(earlier.minor_faults),
            major_faults: self.major_faults.saturating_sub(earlier.major_faults),
            vol_ctx_switches: self.vol_ctx_switches.saturating_sub(earlier.vol_ctx_switches),
            invol_ctx_switches: self.invol_ctx_switches.saturating_sub(earlier.invol_ctx_switches),
            user_time_us: self.user_time_us.saturating_sub(earlier.user_time_us),
            sys_time_us: self.sys_time_us.saturating_sub(earlier.sys_time_us),
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

pub fn temp_shm_path(label: &str) -> String {
    let pid = std::process::id();
    format!("/tmp/baton_bench_{label}_{pid}")
}

/// `n` records with distinct, exactly representable fields.
pub fn make_records(n: usize) -> Vec<Vec4<f32>> {
    (0..n)
        .map(|i| {
            let x = (i % 4096) as f32;
            Vec4::new(x, -x, x * 0.5, 1.0)
        })
        .collect()
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = None;
    for u in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = Some(u);
    }
    match unit {
        Some(u) => format!("{value:.1} {u}"),
        None => format!("{bytes} B"),
    }
}

pub fn format_ns(ns: f64) -> String {
    let abs = ns.abs();
    if abs >= 1_000_000.0 {
        format!("{:.1} ms", ns / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.1} us", ns / 1_000.0)
    } else {
        format!("{:.0} ns", ns)
    }
}

pub fn print_result_row(r: &BenchResult) {
    println!(
        "  {:<34} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}  {}",
        r.name, r.stats.min, r.stats.p50, r.stats.p90, r.stats.p99, r.stats.p999, r.stats.max, r.unit,
    );
}

pub fn print_table_header() {
    println!(
        "  {:<34} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}  unit",
        "Benchmark", "min", "p50", "p90", "p99", "p99.9", "max",
    );
    println!("  {}", "─".repeat(96));
}

pub fn section_header(title: &str) {
    println!("\n{}", "─".repeat(90));
    println!("  {title}");
    println!("{}\n", "─".repeat(90));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_on_known_samples() {
        let mut samples: Vec<u64> = (1..=100).rev().collect();
        let s = compute_stats(&mut samples).unwrap();
        assert_eq!((s.min, s.max, s.count), (1, 100, 100));
        assert_eq!(s.p50, 50);
        assert_eq!(s.p99, 99);
        assert_eq!(s.mean, 50.5);
        assert!(compute_stats(&mut []).is_none());
    }

    #[test]
    fn single_sample_percentiles() {
        let s = compute_stats(&mut [7]).unwrap();
        assert_eq!((s.p50, s.p999, s.stddev), (7, 7, 0.0));
    }

    #[test]
    fn responder_answers_every_turn() {
        let latch = Arc::new(SharedLatch::new().unwrap());
        let h = spawn_responder(latch.clone(), 100);
        for _ in 0..100 {
            latch.await_turn();
        }
        h.join().unwrap();
    }

    #[test]
    fn resource_delta_subtracts_counters() {
        let a = ResourceSnapshot {
            minor_faults: 10,
            user_time_us: 5,
            max_rss_bytes: 100,
            ..Default::default()
        };
        let b = ResourceSnapshot {
            minor_faults: 25,
            user_time_us: 9,
            max_rss_bytes: 300,
            ..Default::default()
        };
        let d = b.since(&a);
        assert_eq!((d.minor_faults, d.user_time_us, d.max_rss_bytes), (15, 4, 300));
        assert!(ResourceSnapshot::capture().user_time_us >= 0);
    }

    #[test]
    fn formatting() {
        assert_eq!(format_ns(12.0), "12 ns");
        assert_eq!(format_ns(1_500.0), "1.5 us");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 << 30), "3.0 GB");
        assert_eq!(format_bytes(12), "12 B");
        assert_eq!(make_records(3)[2], Vec4::new(2.0, -2.0, 1.0, 1.0));
    }
}
