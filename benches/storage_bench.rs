//! Benchmarks for batchspool storage operations

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use batchspool::clock::SystemDateProvider;
use batchspool::feature::{FileWriter, Writer};
use batchspool::storage::{Directory, FilesOrchestrator, Orchestrator, ReadableFile};
use batchspool::telemetry::NopTelemetry;
use batchspool::tlv::{decode_blocks, encode_blocks, Block, EventGenerator};
use batchspool::PerformancePreset;
use tempfile::TempDir;

const MAX_BLOCK: u64 = 10 * 1024 * 1024;

fn sample_blocks(events: usize, size: usize) -> Vec<Block> {
    (0..events)
        .flat_map(|i| {
            [
                Block::metadata(format!("{{\"seq\":{}}}", i).into_bytes()),
                Block::event(vec![b'x'; size]),
            ]
        })
        .collect()
}

fn tlv_benchmarks(c: &mut Criterion) {
    let blocks = sample_blocks(500, 256);
    let encoded = encode_blocks(&blocks, MAX_BLOCK).unwrap();

    let mut group = c.benchmark_group("tlv");
    group.throughput(Throughput::Bytes(encoded.len() as u64));

    group.bench_function("encode_500_events", |b| {
        b.iter(|| encode_blocks(black_box(&blocks), MAX_BLOCK).unwrap())
    });

    let encoded = Bytes::from(encoded);
    group.bench_function("decode_500_events", |b| {
        b.iter(|| decode_blocks(black_box(encoded.clone()), MAX_BLOCK))
    });

    group.bench_function("reconstruct_500_events", |b| {
        b.iter(|| EventGenerator::new(black_box(&blocks)).count())
    });

    group.finish();
}

fn writer_benchmarks(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let orchestrator: Arc<dyn Orchestrator> = Arc::new(FilesOrchestrator::new(
        Directory::open(temp_dir.path()).unwrap(),
        PerformancePreset::default(),
        Arc::new(SystemDateProvider),
        Arc::new(NopTelemetry),
        None,
    ));
    let writer = FileWriter::new(
        Arc::clone(&orchestrator),
        false,
        None,
        Arc::new(NopTelemetry),
        MAX_BLOCK,
    );
    let event = Bytes::from(vec![b'x'; 512]);

    c.bench_function("write_512b_event", |b| {
        b.iter_batched(
            || event.clone(),
            |event| writer.write(event, None).unwrap(),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("list_readable_files", |b| {
        orchestrator.set_ignore_files_age_when_reading(true);
        b.iter(|| {
            let files: Vec<Arc<dyn ReadableFile>> =
                orchestrator.get_readable_files(&HashSet::new(), usize::MAX);
            black_box(files.len())
        })
    });
}

criterion_group!(benches, tlv_benchmarks, writer_benchmarks);
criterion_main!(benches);
