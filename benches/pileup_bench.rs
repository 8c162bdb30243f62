//! Column throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pileup_engine::genomics::{parse_cigar, AlignedRead};
use pileup_engine::store::InMemoryStore;
use pileup_engine::{render_pileup, PileupConfig, PileupEngine};

const REFERENCE_LEN: usize = 20_000;
const READ_LEN: u64 = 100;

/// Deterministic store with `coverage`-fold depth and periodic indels.
fn synthetic_store(coverage: u64) -> InMemoryStore {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let reference: Vec<u8> = (0..REFERENCE_LEN)
        .map(|_| b"ACGT"[(next() % 4) as usize])
        .collect();

    let count = REFERENCE_LEN as u64 * coverage / READ_LEN;
    let reads = (0..count).map(|idx| {
        let pos = next() % (REFERENCE_LEN as u64 - READ_LEN - 4);
        let cigar = match idx % 10 {
            0 => "40M2D60M",
            1 => "50M3I47M",
            _ => "100M",
        };
        let ops = parse_cigar(cigar).expect("valid CIGAR");
        let len: usize = ops
            .iter()
            .filter(|op| op.kind.consumes_read())
            .map(|op| op.len as usize)
            .sum();
        let sequence: Vec<u8> = (0..len).map(|_| b"ACGT"[(next() % 4) as usize]).collect();
        AlignedRead::new(format!("BENCH.PA.{idx}"), "chrB", pos, 60, ops, sequence, idx % 2 == 1)
    });

    InMemoryStore::builder()
        .reference("chrB", reference)
        .alignments(reads.collect::<Vec<_>>())
        .build()
        .expect("synthetic store builds")
}

fn benchmark_columns(c: &mut Criterion) {
    let mut group = c.benchmark_group("pileup_columns");
    group.throughput(Throughput::Elements(REFERENCE_LEN as u64));

    for coverage in [5u64, 30] {
        let engine = PileupEngine::new(synthetic_store(coverage), PileupConfig::default());
        group.bench_with_input(BenchmarkId::new("iterate", coverage), &engine, |b, engine| {
            b.iter(|| {
                let events: usize = engine
                    .pileups("chrB")
                    .expect("pileup opens")
                    .map(|c| c.expect("column builds").events.len())
                    .sum();
                black_box(events)
            });
        });
        group.bench_with_input(BenchmarkId::new("render", coverage), &engine, |b, engine| {
            b.iter(|| {
                let mut pileup = engine.pileups("chrB").expect("pileup opens");
                black_box(render_pileup(&mut pileup).expect("rendering succeeds").len())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_columns);
criterion_main!(benches);
