use criterion::{black_box, criterion_group, criterion_main, Criterion};
use msflagstats::{
    assemble_report,
    counter::GroupedCounter,
    global::global_stat,
    test_common::get_synthetic_table,
    ReportContext, ReportContextBuilder,
};

const NUM_ANTS: usize = 32;
const NUM_SCANS: usize = 4;
const NUM_CHANS: usize = 64;
const NUM_CORRS: usize = 4;

fn bench_group_by_synthetic(crt: &mut Criterion) {
    let table = get_synthetic_table(NUM_ANTS, NUM_SCANS, NUM_CHANS, NUM_CORRS);
    let counter = GroupedCounter::new(&table);
    crt.bench_function("per_baseline - synthetic", |bch| {
        bch.iter(|| black_box(counter.per_baseline().unwrap()))
    });
    crt.bench_function("per_data_description - synthetic", |bch| {
        bch.iter(|| black_box(counter.per_data_description().unwrap()))
    });
    crt.bench_function("global_stat - synthetic", |bch| {
        bch.iter(|| black_box(global_stat(&table).unwrap()))
    });
}

fn bench_assemble_report_synthetic(crt: &mut Criterion) {
    let table = get_synthetic_table(NUM_ANTS, NUM_SCANS, NUM_CHANS, NUM_CORRS);
    crt.bench_function("assemble_report - synthetic", |bch| {
        bch.iter(|| black_box(assemble_report(&table, &ReportContext::default()).unwrap()))
    });
    let parallel_ctx = ReportContextBuilder::default()
        .parallel_stages(true)
        .build()
        .unwrap();
    crt.bench_function("assemble_report - synthetic, parallel stages", |bch| {
        bch.iter(|| black_box(assemble_report(&table, &parallel_ctx).unwrap()))
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets =
        bench_group_by_synthetic,
        bench_assemble_report_synthetic,
);
criterion_main!(benches);
