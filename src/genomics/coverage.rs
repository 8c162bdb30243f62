use std::fmt;
use std::io::Write;

use crate::genomics::{EventKind, IndelKind, PileupColumn, PileupIterator};
use crate::store::AlignmentStore;
use crate::PileupError;

fn base_index(base: u8) -> Option<usize> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

/// Per-position coverage counts derived from one annotated column.
///
/// Read and reference bases outside `ACGT` (such as `N`) still count towards
/// `depth` but add nothing to `mismatches` or `insertions`. The `ref_cover`
/// tool files them under `A` instead, so its A counts can be higher.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CoverageSummary {
    /// 0-based reference position.
    pub position: u64,
    /// Reference base at the position.
    pub reference_base: u8,
    /// Covering alignments, reference skips excluded.
    pub depth: u32,
    /// Mismatching read bases, indexed A, C, G, T.
    pub mismatches: [u32; 4],
    /// Insertions following this position, indexed by the base of the event
    /// that carries them.
    pub insertions: [u32; 4],
    /// Normal deletions covering the position.
    pub deletions: u32,
}

impl CoverageSummary {
    /// Summarise `column`, or `None` when nothing but reference skips covers it.
    pub fn from_column(column: &PileupColumn) -> Option<Self> {
        let mut summary = Self {
            position: column.position,
            reference_base: column.reference_base,
            depth: 0,
            mismatches: [0; 4],
            insertions: [0; 4],
            deletions: 0,
        };

        for event in &column.events {
            match event.kind() {
                EventKind::Match => {
                    summary.depth += 1;
                    if event.event_type.is_insertion() {
                        if let Some(idx) = base_index(column.reference_base) {
                            summary.insertions[idx] += 1;
                        }
                    }
                }
                EventKind::Mismatch => {
                    summary.depth += 1;
                    if let Some(idx) = base_index(event.alignment_base) {
                        summary.mismatches[idx] += 1;
                        if event.event_type.is_insertion() {
                            summary.insertions[idx] += 1;
                        }
                    }
                }
                EventKind::Deletion => match event.indel_kind {
                    IndelKind::Normal => {
                        summary.depth += 1;
                        summary.deletions += 1;
                    }
                    IndelKind::Other => {}
                },
            }
        }

        (summary.depth != 0).then_some(summary)
    }
}

impl fmt::Display for CoverageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, c, g, t] = self.mismatches;
        let [ia, ic, ig, it] = self.insertions;
        write!(
            f,
            "{}\t{}\t{}\t{{{a},{c},{g},{t}}}\t{{{ia},{ic},{ig},{it}}}\t{}",
            self.position + 1,
            self.reference_base as char,
            self.depth,
            self.deletions
        )
    }
}

/// Write one coverage line per covered position:
/// `<run>\t<reference>\t<pos+1>\t<base>\t<depth>\t{A,C,G,T}\t{A,C,G,T}\t<deletions>`.
///
/// Positions covered only by reference skips, or not at all, are left out.
pub fn write_coverage<W: Write, S: AlignmentStore + ?Sized>(
    writer: &mut W,
    run_name: &str,
    pileup: &mut PileupIterator<'_, S>,
) -> Result<usize, PileupError> {
    let reference = pileup.reference_name().to_string();
    let mut lines = 0;
    while pileup.advance_column()? {
        let Some(summary) = pileup.column().and_then(CoverageSummary::from_column) else {
            continue;
        };
        writeln!(writer, "{run_name}\t{reference}\t{summary}")?;
        lines += 1;
    }
    writer.flush()?;
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::genomics::{PileupEvent, PileupEventType, SlotId};

    fn event(event_type: PileupEventType, base: u8, indel_kind: IndelKind) -> PileupEvent {
        PileupEvent {
            alignment_id: Arc::from("SRR0.PA.1"),
            slot: SlotId(0),
            event_type,
            alignment_base: base,
            quality: 30,
            repeat_count: 1,
            indel_kind,
            mapping_quality: 60,
            insertion_bases: Vec::new(),
            insertion_qualities: Vec::new(),
            first_position: 0,
            last_position: 10,
            deletion_after_this_position: false,
            next_repeat_count: 0,
            deferred_insertion_bases: Vec::new(),
        }
    }

    #[test]
    fn counts_mismatches_insertions_and_deletions() {
        let column = PileupColumn {
            position: 99,
            reference_base: b'G',
            depth: 6,
            events: vec![
                event(PileupEventType::MATCH, b'G', IndelKind::Normal),
                event(
                    PileupEventType::MATCH | PileupEventType::INSERTION,
                    b'G',
                    IndelKind::Normal,
                ),
                event(
                    PileupEventType::MISMATCH | PileupEventType::INSERTION,
                    b'T',
                    IndelKind::Normal,
                ),
                event(PileupEventType::MISMATCH, b'a', IndelKind::Normal),
                event(PileupEventType::DELETION, b'-', IndelKind::Normal),
                event(PileupEventType::DELETION, b'-', IndelKind::Other),
            ],
        };
        let summary = CoverageSummary::from_column(&column).unwrap();
        assert_eq!(summary.depth, 5);
        assert_eq!(summary.mismatches, [1, 0, 0, 1]);
        assert_eq!(summary.insertions, [0, 0, 1, 1]);
        assert_eq!(summary.deletions, 1);
        assert_eq!(summary.to_string(), "100\tG\t5\t{1,0,0,1}\t{0,0,1,1}\t1");
    }

    #[test]
    fn skip_only_columns_are_dropped() {
        let column = PileupColumn {
            position: 4,
            reference_base: b'A',
            depth: 1,
            events: vec![event(PileupEventType::DELETION, b'-', IndelKind::Other)],
        };
        assert!(CoverageSummary::from_column(&column).is_none());
        let empty = PileupColumn {
            position: 5,
            reference_base: b'A',
            depth: 0,
            events: Vec::new(),
        };
        assert!(CoverageSummary::from_column(&empty).is_none());
    }

    #[test]
    fn unknown_bases_count_towards_depth_only() {
        let column = PileupColumn {
            position: 7,
            reference_base: b'N',
            depth: 3,
            events: vec![
                event(PileupEventType::MISMATCH, b'N', IndelKind::Normal),
                event(
                    PileupEventType::MISMATCH | PileupEventType::INSERTION,
                    b'n',
                    IndelKind::Normal,
                ),
                event(
                    PileupEventType::MATCH | PileupEventType::INSERTION,
                    b'N',
                    IndelKind::Normal,
                ),
            ],
        };
        let summary = CoverageSummary::from_column(&column).unwrap();
        assert_eq!(summary.depth, 3);
        assert_eq!(summary.mismatches, [0; 4]);
        assert_eq!(summary.insertions, [0; 4]);
        assert_eq!(summary.to_string(), "8\tN\t3\t{0,0,0,0}\t{0,0,0,0}\t0");
    }
}
