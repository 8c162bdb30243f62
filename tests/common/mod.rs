//! Shared fixtures and snapshot assertions for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use pileup_engine::genomics::{parse_cigar, AlignedRead, AlignmentCategory};
use pileup_engine::store::InMemoryStore;

/// Canonical name of the mixed fixture reference.
pub const MIXED_CANONICAL: &str = "gi|218511148|ref|NC_011752.1|";

/// Bases of the mixed fixture reference.
pub const MIXED_REFERENCE: &[u8] = b"GATCACAGGTCTATCACCCTATTA";

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("PILEUP_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set PILEUP_UPDATE_SNAPSHOTS=1 to regenerate.\n\
             Expected:\n{}\nActual:\n{}",
            path,
            expected,
            actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n")
}

/// Alignment from a CIGAR string, with uniform qualities.
pub fn read(
    id: &str,
    chrom: &str,
    pos: u64,
    mapq: u8,
    cigar: &str,
    seq: &str,
    reverse: bool,
) -> AlignedRead {
    AlignedRead::new(
        id,
        chrom,
        pos,
        mapq,
        parse_cigar(cigar).expect("fixture CIGAR parses"),
        seq.as_bytes().to_vec(),
        reverse,
    )
}

/// Six alignments over a 24 base reference exercising matches, mismatches,
/// both strands, a deletion, an insertion, a reference skip on a secondary
/// alignment, soft clipping, mapping quality clamping and a zero-depth gap.
pub fn mixed_reads() -> Vec<AlignedRead> {
    vec![
        read("SRR1.PA.1", "chrM", 0, 60, "8M", "GATCACAG", false),
        read("SRR1.PA.2", "chrM", 2, 37, "3M1D4M", "TCAAGCT", true),
        read("SRR1.PA.3", "chrM", 4, 20, "2M2I3M", "ACTTAGG", false),
        read("SRR1.SA.4", "chrM", 6, 3, "2M5N3M", "AGTCA", true)
            .with_category(AlignmentCategory::Secondary),
        read("SRR1.PA.5", "chrM", 10, 99, "3S4M", "GGGCGAT", false),
        read("SRR1.PA.6", "chrM", 17, 0, "2M1D3M", "CCATT", false),
    ]
}

pub fn mixed_store() -> InMemoryStore {
    InMemoryStore::builder()
        .named_reference("chrM", MIXED_CANONICAL, MIXED_REFERENCE)
        .alignments(mixed_reads())
        .build()
        .expect("fixture store builds")
}

/// Store with random-looking but fixed alignments for property tests.
pub fn store_from(reference: &[u8], reads: Vec<AlignedRead>) -> InMemoryStore {
    InMemoryStore::builder()
        .reference("chrP", reference)
        .alignments(reads)
        .build()
        .expect("property store builds")
}
