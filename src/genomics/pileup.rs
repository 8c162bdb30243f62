use tracing::trace;

use crate::genomics::{AlignmentCursor, AlignmentOverlapSet, PileupEvent, SlotId};
use crate::{DepthPolicy, PileupError};

/// All alignments covering one reference position.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PileupColumn {
    /// Genomic coordinate (0-based) of the pileup position.
    pub position: u64,
    /// Reference base at this position.
    pub reference_base: u8,
    /// Number of alignments covering this position under the depth policy.
    pub depth: u32,
    /// One event per covering alignment, in slot order.
    pub events: Vec<PileupEvent>,
}

impl PileupColumn {
    pub(crate) fn new(position: u64, reference_base: u8) -> Self {
        Self {
            position,
            reference_base,
            depth: 0,
            events: Vec::new(),
        }
    }

    /// Depth with reference skips and other synthetic gaps left out.
    pub fn coverage_depth(&self) -> u32 {
        self.events.iter().filter(|e| !e.is_synthetic_gap()).count() as u32
    }

    /// Slots present in this column, in order.
    pub fn slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.events.iter().map(|e| e.slot)
    }

    /// Longest deletion announced on this column by the annotator.
    pub fn longest_pending_deletion(&self) -> u32 {
        self.events
            .iter()
            .filter(|e| e.deletion_after_this_position)
            .map(|e| e.next_repeat_count)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug)]
struct LiveSlot {
    slot: SlotId,
    cursor: AlignmentCursor,
}

/// Builds consecutive [`PileupColumn`]s with a stable slot order.
///
/// An alignment receives a slot the first time it covers a built position and
/// keeps it until the position after its last covered base. New slots are only
/// ever appended, so between two adjacent columns the event list changes by
/// dropping stopped alignments and appending started ones.
#[derive(Debug)]
pub struct PileupColumnBuilder<'a> {
    overlaps: AlignmentOverlapSet<'a>,
    live: Vec<LiveSlot>,
    next_slot: u64,
    depth_policy: DepthPolicy,
    last_position: Option<u64>,
}

impl<'a> PileupColumnBuilder<'a> {
    /// Builder drawing alignments from `overlaps`.
    pub fn new(overlaps: AlignmentOverlapSet<'a>, depth_policy: DepthPolicy) -> Self {
        Self {
            overlaps,
            live: Vec::new(),
            next_slot: 0,
            depth_policy,
            last_position: None,
        }
    }

    /// Build the column at `position`. Positions must be consecutive.
    pub fn build(
        &mut self,
        position: u64,
        reference_base: u8,
    ) -> Result<PileupColumn, PileupError> {
        debug_assert!(
            self.last_position.map_or(true, |last| last + 1 == position),
            "column positions must be consecutive"
        );
        self.last_position = Some(position);

        self.live.retain(|live| live.cursor.end() > position);

        while let Some(read) = self.overlaps.next_entering(position) {
            let read = read?;
            let slot = SlotId(self.next_slot);
            self.next_slot += 1;
            trace!(id = %read.id, slot = slot.0, position, "alignment entered pileup");
            self.live.push(LiveSlot {
                slot,
                cursor: AlignmentCursor::new(read),
            });
        }

        let mut column = PileupColumn::new(position, reference_base);
        column.events.reserve(self.live.len());
        for live in &mut self.live {
            let event = live.cursor.event_at(position, reference_base, live.slot);
            debug_assert!(
                event.is_some(),
                "live slot {} has no event at {}",
                live.slot.0,
                position
            );
            column.events.extend(event);
        }

        column.depth = match self.depth_policy {
            DepthPolicy::Raw => column.events.len() as u32,
            DepthPolicy::ExcludeReferenceSkips => column.coverage_depth(),
        };
        Ok(column)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::genomics::{parse_cigar, AlignedRead, CategoryFilter, ReferenceWindow};
    use crate::store::InMemoryStore;

    fn read(id: &str, pos: u64, cigar: &str, reverse: bool) -> AlignedRead {
        let ops = parse_cigar(cigar).unwrap();
        let len = ops
            .iter()
            .filter(|op| op.kind.consumes_read())
            .map(|op| op.len as usize)
            .sum();
        AlignedRead::new(id, "chr1", pos, 60, ops, vec![b'A'; len], reverse)
    }

    fn columns(
        store: &InMemoryStore,
        start: u64,
        len: u64,
        policy: DepthPolicy,
    ) -> Vec<PileupColumn> {
        let window = ReferenceWindow {
            name: Arc::from("chr1"),
            canonical_name: Arc::from("chr1"),
            start,
            length: len,
            reference_length: 32,
            clamped: false,
        };
        let overlaps =
            AlignmentOverlapSet::open(store, &window, start..start + len, CategoryFilter::All)
                .unwrap();
        let mut builder = PileupColumnBuilder::new(overlaps, policy);
        (start..start + len)
            .map(|p| builder.build(p, b'A').unwrap())
            .collect()
    }

    fn store() -> InMemoryStore {
        InMemoryStore::builder()
            .reference("chr1", vec![b'A'; 32])
            .alignments([
                read("a", 0, "4M", false),
                read("b", 1, "2M", true),
                read("c", 2, "1M3N1M", false),
                read("d", 3, "3M", false),
            ])
            .build()
            .unwrap()
    }

    #[test]
    fn slots_are_appended_and_released() {
        let cols = columns(&store(), 0, 7, DepthPolicy::Raw);
        let slots: Vec<Vec<u64>> = cols
            .iter()
            .map(|c| c.slots().map(|s| s.0).collect())
            .collect();
        assert_eq!(
            slots,
            vec![
                vec![0],
                vec![0, 1],
                vec![0, 1, 2],
                vec![0, 2, 3],
                vec![2, 3],
                vec![2, 3],
                vec![2],
            ]
        );
        assert!(cols[2].events[1].event_type.is_stop());
        assert!(cols[3].events[2].event_type.is_start());
        assert_eq!(cols[3].depth, 3);
    }

    #[test]
    fn depth_policy_controls_reference_skips() {
        let raw = columns(&store(), 3, 2, DepthPolicy::Raw);
        let coverage = columns(&store(), 3, 2, DepthPolicy::ExcludeReferenceSkips);
        assert_eq!(raw[0].depth, 3);
        assert_eq!(coverage[0].depth, 2);
        assert_eq!(raw[1].coverage_depth(), 1);
    }

    #[test]
    fn slice_assigns_slots_in_enumeration_order() {
        let cols = columns(&store(), 3, 1, DepthPolicy::Raw);
        let ids: Vec<&str> = cols[0].events.iter().map(|e| &*e.alignment_id).collect();
        assert_eq!(ids, vec!["a", "c", "d"]);
        assert!(!cols[0].events[0].event_type.is_start());
    }
}
