use std::io::Write;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use data_cube::collection::{aggregate_field, count, AggregateOp, RecordTable, Records};
use data_cube::config::CsvConfig;
use data_cube::cube::{Cube, DimensionSpec};
use jemallocator::Jemalloc;
use rand::Rng;
use tempfile::NamedTempFile;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const ROWS: usize = 200_000;

fn write_sales_csv() -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    writeln!(tmp, "id,amount,category,region,date").unwrap();

    let mut rng = rand::rng();
    for i in 0..ROWS {
        writeln!(
            tmp,
            "{},{},{},{},2021-{:02}-{:02}",
            i,
            rng.random_range(1..1000),
            ["A", "B", "C", "D"][rng.random_range(0..4)],
            ["US", "EU", "ASIA", "AFRICA", "AUSTRALIA", "SOUTH AMERICA"][rng.random_range(0..6)],
            rng.random_range(1..13),
            rng.random_range(1..29),
        )
        .unwrap();
    }
    tmp
}

fn load(tmp: &NamedTempFile) -> Records {
    let mut table = RecordTable::new("sale");
    table.load_csv(tmp.path(), &CsvConfig::default()).unwrap();
    Arc::new(table).records()
}

fn decomposition(c: &mut Criterion) {
    let tmp = write_sales_csv();

    let mut group = c.benchmark_group("Cube");
    group.sample_size(10);
    group.throughput(Throughput::Elements(ROWS as u64));

    group.bench_function("load_csv", |b| b.iter(|| load(&tmp)));

    let records = load(&tmp);
    let counted = Cube::new(records.clone(), count)
        .with_dimensions(&["category", "region"])
        .with_dimension("month", DimensionSpec::field("date__month"));

    group.bench_function("measure_list category x region", |b| {
        b.iter(|| counted.measure_list(&["category", "region"]).unwrap())
    });

    group.bench_function("measure_dict category x region x month", |b| {
        b.iter(|| counted.measure_dict(&["category", "region", "month"], false).unwrap())
    });

    let summed = Cube::new(records, aggregate_field("amount", AggregateOp::Sum))
        .with_dimensions(&["category", "region"]);

    group.bench_function("table region x category (sum)", |b| {
        b.iter(|| summed.table("region", "category").unwrap())
    });

    group.finish();
}

criterion_group!(benches, decomposition);
criterion_main!(benches);
