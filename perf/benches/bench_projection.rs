use baton_perf::make_records;
use baton_records::{DEFAULT_MAX_ELEMENTS, RecordSink, RecordView};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

const SIZES: [usize; 3] = [1, 1024, 65_536];

fn bench_validate(c: &mut Criterion) {
    let records = make_records(1024);
    let addr = records.as_ptr() as u64;

    let mut group = c.benchmark_group("records");
    group.bench_function("validate", |b| {
        b.iter(|| black_box(unsafe { RecordView::<f32>::vec4(black_box(addr), 1024) }.is_ok()));
    });
    group.finish();
}

fn bench_project(c: &mut Criterion) {
    let mut group = c.benchmark_group("records");

    for n in SIZES {
        let records = make_records(n);
        let view = unsafe { RecordView::<f32>::vec4(records.as_ptr() as u64, n) }.expect("valid records");
        let mut out = vec![0f32; n * 4];

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("project", n), &n, |b, _| {
            b.iter(|| black_box(view.project(DEFAULT_MAX_ELEMENTS)));
        });
        group.bench_with_input(BenchmarkId::new("project_into", n), &n, |b, _| {
            b.iter(|| view.project_into(black_box(&mut out)));
        });
    }

    group.finish();
}

fn bench_write_back(c: &mut Criterion) {
    let mut group = c.benchmark_group("records");

    for n in SIZES {
        let mut records = make_records(n);
        let mut sink =
            unsafe { RecordSink::<f32>::vec4(records.as_mut_ptr() as u64, n) }.expect("valid records");
        let forces = vec![0.25f32; n * 3];

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("write_rows (3 of 4)", n), &n, |b, _| {
            b.iter(|| sink.write_rows(black_box(&forces), 3));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_validate, bench_project, bench_write_back);
criterion_main!(benches);
