use crate::{BenchResult, compute_stats};
use baton_perf_recorder::{ALL_STAGES, PerfRecorder, PerfStage};

/// Producer side of one handoff.
pub const PRODUCER_STAGES: [PerfStage; 3] =
    [PerfStage::WriteBack, PerfStage::Await, PerfStage::ProducerStep];

/// Consumer side of one handoff.
pub const CONSUMER_STAGES: [PerfStage; 4] = [
    PerfStage::Start,
    PerfStage::Project,
    PerfStage::End,
    PerfStage::ConsumerStep,
];

/// Every stage with samples, as `BenchResult`s.
pub fn stage_results(prefix: &str, recorder: &PerfRecorder) -> Vec<BenchResult> {
    ALL_STAGES
        .iter()
        .filter_map(|&stage| {
            let mut samples = recorder.samples(stage).to_vec();
            let stats = compute_stats(&mut samples)?;
            Some(BenchResult {
                name: format!("{prefix}.{}", stage.name()),
                unit: "ns".to_string(),
                stats,
            })
        })
        .collect()
}

fn p50_of(recorder: &PerfRecorder, stage: PerfStage) -> u64 {
    let mut v = recorder.samples(stage).to_vec();
    compute_stats(&mut v).map_or(0, |s| s.p50)
}

pub fn print_stage_table(recorder: &PerfRecorder, stages: &[PerfStage], total_stage: PerfStage) {
    println!(
        "  {:<20} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}  {:>6}",
        "Stage", "p50", "p90", "p99", "p99.9", "max", "count", "% tot"
    );
    println!("  {}", "\u{2500}".repeat(88));

    let total_p50 = p50_of(recorder, total_stage);

    for &stage in stages {
        let mut v = recorder.samples(stage).to_vec();
        let Some(stats) = compute_stats(&mut v) else {
            continue;
        };
        let pct = if stage == total_stage {
            "100%".to_string()
        } else if total_p50 > 0 {
            format!("{:.0}%", stats.p50 as f64 / total_p50 as f64 * 100.0)
        } else {
            "-".to_string()
        };
        println!(
            "  {:<20} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}  {:>6}",
            stage.name(),
            stats.p50,
            stats.p90,
            stats.p99,
            stats.p999,
            stats.max,
            stats.count,
            pct
        );
    }
}

pub fn print_producer_report(recorder: &PerfRecorder) {
    println!("\n  Producer Per-Stage Timing:\n");
    print_stage_table(recorder, &PRODUCER_STAGES, PerfStage::ProducerStep);
}

pub fn print_consumer_report(recorder: &PerfRecorder) {
    println!("\n  Consumer Per-Stage Timing:\n");
    print_stage_table(recorder, &CONSUMER_STAGES, PerfStage::ConsumerStep);
}

/// Splits the producer's wait into consumer work and pure handoff overhead.
pub fn print_analysis(producer: &PerfRecorder, consumer: &PerfRecorder) {
    println!("\n  Handoff Analysis:\n");

    let wait = p50_of(producer, PerfStage::Await);
    let project = p50_of(consumer, PerfStage::Project);
    let consumer_total = p50_of(consumer, PerfStage::ConsumerStep);

    if wait == 0 {
        println!("    No producer samples recorded.");
        return;
    }
    println!("    Producer await p50: {wait} ns (consumer step p50={consumer_total} ns, project={project} ns)");
    println!(
        "    -> Latch overhead per round trip: ~{} ns",
        wait.saturating_sub(consumer_total)
    );
}
