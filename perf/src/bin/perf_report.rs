use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use baton_latch::SharedLatch;
use baton_perf::report::{print_analysis, print_consumer_report, print_producer_report, stage_results};
use baton_perf::*;
use baton_perf_recorder::now_ns;
use baton_records::{DEFAULT_MAX_ELEMENTS, RecordView, Vec4};
use baton_step::{ProjectionStep, PublishStep, StepConfig};

const ROUND_TRIPS: usize = 200_000;
const PIPELINE_RECORDS: usize = 1024;
const PIPELINE_STEPS: usize = 50_000;

fn main() {
    let json = std::env::args().skip(1).any(|a| a == "--json");
    let rusage_start = ResourceSnapshot::capture();
    let mut results: Vec<BenchResult> = Vec::new();

    print_banner();
    section_layout();
    section_clock(&mut results);
    section_round_trip(&mut results);
    section_projection(&mut results);
    section_pipeline(&mut results);

    let rusage_end = ResourceSnapshot::capture();
    section_resources(&rusage_start, &rusage_end);

    if json {
        save_results(&results, &rusage_start, &rusage_end);
    }
}

fn print_banner() {
    let bar = "\u{2550}".repeat(90);
    println!("\n{bar}");
    println!("  BATON PERFORMANCE REPORT");
    println!("  latch round trip + projection + lock-step pipeline");
    println!("{bar}\n");

    let ncpu = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(0);
    let os = run_cmd("uname", &["-srm"]).unwrap_or_else(|| "unknown".into());
    println!("  CPUs:    {ncpu}");
    println!("  OS:      {}", os.trim());
}

fn section_layout() {
    section_header("RECORD LAYOUT");
    println!("  {:<20} {:>8} {:>8}", "Type", "Size", "Align");
    println!("  {}", "\u{2500}".repeat(40));
    let types: &[(&str, usize, usize)] = &[
        ("Vec4<f32>", size_of::<Vec4<f32>>(), align_of::<Vec4<f32>>()),
        ("Vec4<f64>", size_of::<Vec4<f64>>(), align_of::<Vec4<f64>>()),
        ("latch state", 1, 1),
    ];
    for &(name, size, align) in types {
        println!("  {:<20} {:>6} B {:>6} B", name, size, align);
    }
    println!(
        "\n  * {PIPELINE_RECORDS} Vec4<f32> records span {}",
        format_bytes((PIPELINE_RECORDS * size_of::<Vec4<f32>>()) as u64)
    );
}

fn section_clock(results: &mut Vec<BenchResult>) {
    section_header("CLOCK CALIBRATION");
    print_table_header();

    let rows = [
        measure_batched("perf now_ns()", 1000, 10_000, 100, || {
            black_box(now_ns());
        }),
        measure_batched("Instant::now()", 1000, 10_000, 100, || {
            black_box(Instant::now());
        }),
    ];
    for r in rows.into_iter().flatten() {
        print_result_row(&r);
        results.push(r);
    }
}

fn section_round_trip(results: &mut Vec<BenchResult>) {
    section_header("LATCH ROUND TRIP (await_turn -> start/end -> back)");

    let latch = Arc::new(SharedLatch::new().expect("map latch"));
    let responder = spawn_responder(latch.clone(), (ROUND_TRIPS + 1000) as u64);

    for _ in 0..1000 {
        latch.await_turn();
    }
    let mut samples = Vec::with_capacity(ROUND_TRIPS);
    for _ in 0..ROUND_TRIPS {
        let t0 = now_ns();
        latch.await_turn();
        samples.push(now_ns().saturating_sub(t0));
    }
    responder.join().expect("responder panicked");

    let Some(stats) = compute_stats(&mut samples) else {
        println!("  WARNING: no round-trip samples.");
        return;
    };
    let r = BenchResult {
        name: "round trip (anon latch)".into(),
        unit: "ns".into(),
        stats,
    };
    print_table_header();
    print_result_row(&r);
    println!("\n  * {}K handoffs, each one full producer -> consumer -> producer cycle", ROUND_TRIPS / 1000);
    results.push(r);
}

fn section_projection(results: &mut Vec<BenchResult>) {
    section_header("PROJECTION (single thread)");
    print_table_header();

    for n in [1usize, 1024, 65_536] {
        let records = make_records(n);
        let view = unsafe { RecordView::<f32>::vec4(records.as_ptr() as u64, n) }.expect("valid records");
        let mut out = vec![0f32; n * 4];
        let batch = (1 << 20) / n.max(1);

        if let Some(r) = measure_batched(&format!("project_into n={n}"), 200, batch.clamp(1, 10_000), 10, || {
            let _ = view.project_into(black_box(&mut out));
        }) {
            print_result_row(&r);
            results.push(r);
        }
        if let Some(r) = measure_batched(&format!("project n={n}"), 200, batch.clamp(1, 10_000), 10, || {
            black_box(view.project(DEFAULT_MAX_ELEMENTS).ok());
        }) {
            print_result_row(&r);
            results.push(r);
        }
    }
}

fn section_pipeline(results: &mut Vec<BenchResult>) {
    section_header("LOCK-STEP PIPELINE (PublishStep thread <-> ProjectionStep thread)");

    let mut shared = vec![Vec4::<f32>::default(); PIPELINE_RECORDS];
    let cfg = StepConfig::new(PIPELINE_RECORDS, shared.as_mut_ptr() as u64);
    let latch = SharedLatch::new().expect("map latch");
    let batch: Vec<f32> = make_records(PIPELINE_RECORDS)
        .iter()
        .flat_map(|v| v.to_array())
        .collect();

    // SAFETY: `shared` outlives the scope and the latch serializes access.
    let mut publish = unsafe { PublishStep::<f32>::new(&cfg) }.expect("publish step");
    let mut project = unsafe { ProjectionStep::<f32>::new(&cfg) }.expect("projection step");

    let start = Instant::now();
    std::thread::scope(|s| {
        s.spawn(|| {
            set_thread_affinity(1);
            for _ in 0..PIPELINE_STEPS {
                black_box(project.run_turn(&latch).ok());
            }
        });
        set_thread_affinity(0);
        for _ in 0..PIPELINE_STEPS {
            publish.publish(&latch, &batch, 4).expect("publish");
        }
    });
    let elapsed = start.elapsed();

    println!(
        "  {} steps x {} records in {:.3}s  ({:.0} steps/s)",
        PIPELINE_STEPS,
        PIPELINE_RECORDS,
        elapsed.as_secs_f64(),
        PIPELINE_STEPS as f64 / elapsed.as_secs_f64()
    );

    print_producer_report(publish.recorder());
    print_consumer_report(project.recorder());
    print_analysis(publish.recorder(), project.recorder());

    results.extend(stage_results("producer", publish.recorder()));
    results.extend(stage_results("consumer", project.recorder()));
}

fn section_resources(start: &ResourceSnapshot, end: &ResourceSnapshot) {
    section_header("RESOURCE USAGE");

    let d = end.since(start);
    println!("  Peak RSS:                    {}", format_bytes(d.max_rss_bytes as u64));
    println!("  Minor page faults:           {}", d.minor_faults);
    println!("  Major page faults:           {}", d.major_faults);
    println!("  Voluntary ctx switches:      {}", d.vol_ctx_switches);
    println!("  Involuntary ctx switches:    {}", d.invol_ctx_switches);
    println!("  User CPU time:               {:.3}s", d.user_time_us as f64 / 1e6);
    println!("  System CPU time:             {:.3}s", d.sys_time_us as f64 / 1e6);
}

fn save_results(results: &[BenchResult], rusage_start: &ResourceSnapshot, rusage_end: &ResourceSnapshot) {
    let timestamp = run_cmd("date", &["+%Y%m%d_%H%M%S"])
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".into());

    let results_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/results");
    let _ = std::fs::create_dir_all(results_dir);
    let json_path = format!("{results_dir}/{timestamp}_report.json");

    let output = serde_json::json!({
        "report_type": "baton",
        "timestamp": timestamp,
        "pipeline": { "records": PIPELINE_RECORDS, "steps": PIPELINE_STEPS },
        "benchmarks": results,
        "resources": { "start": rusage_start, "end": rusage_end, "delta": rusage_end.since(rusage_start) },
    });

    let written = serde_json::to_string_pretty(&output)
        .map_err(std::io::Error::other)
        .and_then(|s| std::fs::write(&json_path, s));
    match written {
        Ok(()) => println!("\n  Results saved to: {json_path}\n"),
        Err(e) => eprintln!("\n  [failed to save results: {e}]\n"),
    }
}

/// Pins the calling thread to core `tag` where the OS allows it.
fn set_thread_affinity(tag: usize) {
    #[cfg(target_os = "linux")]
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(tag, &mut set);
        libc::sched_setaffinity(0, size_of::<libc::cpu_set_t>(), &set);
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = tag;
    }
}

fn run_cmd(cmd: &str, args: &[&str]) -> Option<String> {
    std::process::Command::new(cmd)
        .args(args)
        .output()
        .ok()
        .and_then(|o| if o.status.success() { String::from_utf8(o.stdout).ok() } else { None })
}
