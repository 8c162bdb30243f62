#[path = "common/mod.rs"]
mod common;

use common::store_from;
use pileup_engine::genomics::{AlignedRead, CigarOp, CigarOpKind, PileupColumn};
use pileup_engine::store::InMemoryStore;
use pileup_engine::{PileupConfig, PileupEngine};
use proptest::prelude::*;

fn base() -> impl Strategy<Value = u8> {
    prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')]
}

fn inner_op() -> impl Strategy<Value = CigarOp> {
    (
        prop_oneof![
            3 => Just(CigarOpKind::Match),
            1 => Just(CigarOpKind::Insertion),
            1 => Just(CigarOpKind::Deletion),
            1 => Just(CigarOpKind::Skip),
        ],
        1u32..4,
    )
        .prop_map(|(kind, len)| CigarOp::new(kind, len))
}

/// Alignment descriptions: start, CIGAR, strand, mapping quality and bases.
fn alignment_fields() -> impl Strategy<Value = (u64, Vec<CigarOp>, bool, u8, Vec<u8>)> {
    (
        0u64..48,
        1u32..6,
        proptest::collection::vec(inner_op(), 0..3),
        1u32..6,
        any::<bool>(),
        0u8..70,
        proptest::collection::vec(base(), 40),
    )
        .prop_map(|(pos, head, inner, tail, reverse, mapq, pool)| {
            let mut cigar = vec![CigarOp::new(CigarOpKind::Match, head)];
            cigar.extend(inner);
            cigar.push(CigarOp::new(CigarOpKind::Match, tail));
            let len: usize = cigar
                .iter()
                .filter(|op| op.kind.consumes_read())
                .map(|op| op.len as usize)
                .sum();
            (pos, cigar, reverse, mapq, pool[..len].to_vec())
        })
}

fn scenario() -> impl Strategy<Value = (Vec<u8>, Vec<AlignedRead>)> {
    (
        proptest::collection::vec(base(), 24..64),
        proptest::collection::vec(alignment_fields(), 0..24),
    )
        .prop_map(|(reference, fields)| {
            let reads = fields
                .into_iter()
                .enumerate()
                .map(|(idx, (pos, cigar, reverse, mapq, seq))| {
                    let id = format!("SRRP.PA.{idx}");
                    AlignedRead::new(id, "chrP", pos, mapq, cigar, seq, reverse)
                })
                .filter(|read| read.end() <= reference.len() as u64)
                .collect();
            (reference, reads)
        })
}

/// Event content without slot numbers, which are local to one window.
type Projection = Vec<(String, u32, u8, u32, bool, u32, Vec<u8>)>;

fn project(column: &PileupColumn) -> (u64, u32, Projection) {
    let events = column
        .events
        .iter()
        .map(|e| {
            (
                e.alignment_id.to_string(),
                e.event_type.bits(),
                e.alignment_base,
                e.repeat_count,
                e.deletion_after_this_position,
                e.next_repeat_count,
                e.deferred_insertion_bases.clone(),
            )
        })
        .collect();
    (column.position, column.depth, events)
}

fn columns(
    store: &InMemoryStore,
    config: PileupConfig,
    slice: Option<(u64, u64)>,
) -> Vec<PileupColumn> {
    let engine = PileupEngine::new(store, config);
    let pileup = match slice {
        Some((start, length)) => engine.pileup_slice("chrP", start, length),
        None => engine.pileups("chrP"),
    }
    .expect("pileup opens");
    pileup.collect::<Result<Vec<_>, _>>().expect("pileup completes")
}

proptest! {
    #[test]
    fn slices_agree_with_whole_reference(
        (reference, reads) in scenario(),
        start_frac in 0.0f64..1.0,
        len_frac in 0.0f64..1.0,
    ) {
        let store = store_from(&reference, reads);
        let total = reference.len() as u64;
        let start = ((total as f64) * start_frac) as u64;
        let length = (((total - start) as f64) * len_frac) as u64;

        let whole = columns(&store, PileupConfig::default(), None);
        let lookahead = columns(
            &store,
            PileupConfig::default().with_trailing_lookahead(true),
            Some((start, length)),
        );
        let plain = columns(&store, PileupConfig::default(), Some((start, length)));

        prop_assert_eq!(lookahead.len() as u64, length);
        prop_assert_eq!(plain.len() as u64, length);
        for (offset, column) in lookahead.iter().enumerate() {
            prop_assert_eq!(project(column), project(&whole[start as usize + offset]));
        }
        // Without lookahead only the last line may miss its deferred annotations.
        for (offset, column) in plain.iter().enumerate() {
            let expected = &whole[start as usize + offset];
            prop_assert_eq!(column.depth, expected.depth);
            prop_assert_eq!(column.events.len(), expected.events.len());
            if (offset as u64) + 1 < length {
                prop_assert_eq!(project(column), project(expected));
            }
        }
    }

    #[test]
    fn depth_counts_covering_alignments((reference, reads) in scenario()) {
        let spans: Vec<(u64, u64)> = reads.iter().map(|r| (r.pos, r.end())).collect();
        let store = store_from(&reference, reads);
        for column in columns(&store, PileupConfig::default(), None) {
            let covering = spans
                .iter()
                .filter(|(start, end)| *start <= column.position && column.position < *end)
                .count() as u32;
            prop_assert_eq!(column.depth, covering);
            prop_assert_eq!(column.events.len() as u32, covering);
        }
    }

    #[test]
    fn slots_are_monotonic((reference, reads) in scenario()) {
        let store = store_from(&reference, reads);
        let cols = columns(&store, PileupConfig::default(), None);
        for column in &cols {
            let slots: Vec<u64> = column.slots().map(|s| s.0).collect();
            prop_assert!(slots.windows(2).all(|w| w[0] < w[1]));
        }
        for pair in cols.windows(2) {
            let before: Vec<u64> = pair[0].slots().map(|s| s.0).collect();
            let after: Vec<u64> = pair[1].slots().map(|s| s.0).collect();
            let max_before = before.iter().copied().max();
            let (kept, fresh): (Vec<u64>, Vec<u64>) =
                after.iter().copied().partition(|s| before.contains(s));
            let survivors: Vec<u64> =
                before.iter().copied().filter(|s| kept.contains(s)).collect();
            prop_assert_eq!(&survivors, &kept);
            prop_assert!(fresh.iter().all(|s| max_before.map_or(true, |m| *s > m)));
            // Surviving slots keep their relative order and precede new ones.
            prop_assert_eq!(&after[..kept.len()], &kept[..]);
        }
    }
}
