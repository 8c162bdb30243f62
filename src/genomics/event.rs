//! Per-alignment pileup events.
//!
//! The type mask uses the same bit layout as the NGS `PileupEvent` API so
//! that values compare directly against recorded fixtures: the low three bits
//! hold the base event (match, mismatch, deletion) and the remaining bits are
//! independent flags.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

/// Base event carried in the low bits of a [`PileupEventType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EventKind {
    /// Read base equals the reference base.
    Match,
    /// Read base differs from the reference base.
    Mismatch,
    /// Reference base is absent from the read.
    Deletion,
}

/// Bit mask describing what an alignment does at one reference position.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PileupEventType(u32);

impl PileupEventType {
    /// Base event: match.
    pub const MATCH: Self = Self(0x00);
    /// Base event: mismatch.
    pub const MISMATCH: Self = Self(0x01);
    /// Base event: deletion.
    pub const DELETION: Self = Self(0x02);
    /// Flag: bases were inserted before this position.
    pub const INSERTION: Self = Self(0x08);
    /// Flag: alignment lies on the minus strand.
    pub const MINUS_STRAND: Self = Self(0x20);
    /// Flag: last reference position covered by the alignment.
    pub const ALIGNMENT_STOP: Self = Self(0x40);
    /// Flag: first reference position covered by the alignment.
    pub const ALIGNMENT_START: Self = Self(0x80);

    const KIND_MASK: u32 = 0x07;

    /// Mask holding only the given base event.
    pub fn new(kind: EventKind) -> Self {
        match kind {
            EventKind::Match => Self::MATCH,
            EventKind::Mismatch => Self::MISMATCH,
            EventKind::Deletion => Self::DELETION,
        }
    }

    /// Raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Base event in the low bits.
    pub fn kind(self) -> EventKind {
        match self.0 & Self::KIND_MASK {
            0x01 => EventKind::Mismatch,
            0x02 => EventKind::Deletion,
            _ => EventKind::Match,
        }
    }

    /// Whether every flag bit of `flag` is set. Base-event bits are ignored.
    pub fn has(self, flag: Self) -> bool {
        let flag = flag.0 & !Self::KIND_MASK;
        flag != 0 && self.0 & flag == flag
    }

    /// Mask with the given flag bits added.
    pub fn with(self, flag: Self) -> Self {
        Self(self.0 | (flag.0 & !Self::KIND_MASK))
    }

    /// Base event is a deletion.
    pub fn is_deletion(self) -> bool {
        self.kind() == EventKind::Deletion
    }

    /// Insertion flag set.
    pub fn is_insertion(self) -> bool {
        self.has(Self::INSERTION)
    }

    /// Minus-strand flag set.
    pub fn is_minus_strand(self) -> bool {
        self.has(Self::MINUS_STRAND)
    }

    /// Alignment-start flag set.
    pub fn is_start(self) -> bool {
        self.has(Self::ALIGNMENT_START)
    }

    /// Alignment-stop flag set.
    pub fn is_stop(self) -> bool {
        self.has(Self::ALIGNMENT_STOP)
    }
}

impl BitOr for PileupEventType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for PileupEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind())?;
        for (flag, name) in [
            (Self::INSERTION, "INSERTION"),
            (Self::MINUS_STRAND, "MINUS_STRAND"),
            (Self::ALIGNMENT_STOP, "ALIGNMENT_STOP"),
            (Self::ALIGNMENT_START, "ALIGNMENT_START"),
        ] {
            if self.has(flag) {
                write!(f, "|{name}")?;
            }
        }
        Ok(())
    }
}

/// Classification of a deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum IndelKind {
    /// Ordinary deletion (`D`).
    #[default]
    Normal,
    /// Synthetic gap such as a reference skip (`N`); not real coverage.
    Other,
}

/// Stable identity of an alignment within one pileup window.
///
/// Slots are handed out in increasing order as alignments enter the window
/// and are never reassigned, so ordering events by slot reproduces the
/// append-only column layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SlotId(pub u64);

/// What a single alignment contributes to a pileup column.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PileupEvent {
    /// Identifier of the contributing alignment.
    pub alignment_id: Arc<str>,
    /// Slot the alignment occupies in this window.
    pub slot: SlotId,
    /// Event type mask.
    pub event_type: PileupEventType,
    /// Read base at this position; `-` for deletions.
    pub alignment_base: u8,
    /// Phred base quality; 0 for deletions.
    pub quality: u8,
    /// Deletion length for deletions, insertion length for pure insertions.
    pub repeat_count: u32,
    /// Deletion classification (meaningful for deletions only).
    pub indel_kind: IndelKind,
    /// Mapping quality of the alignment.
    pub mapping_quality: u8,
    /// Bases inserted before this position.
    pub insertion_bases: Vec<u8>,
    /// Qualities of the inserted bases.
    pub insertion_qualities: Vec<u8>,
    /// First reference position covered by the alignment.
    pub first_position: u64,
    /// Last reference position covered by the alignment.
    pub last_position: u64,
    /// Set by the annotator when this alignment deletes the next position.
    pub deletion_after_this_position: bool,
    /// Length of the deletion that follows this position.
    pub next_repeat_count: u32,
    /// Insertion bases that follow this position, moved back by the annotator.
    pub deferred_insertion_bases: Vec<u8>,
}

impl PileupEvent {
    /// Base event kind.
    pub fn kind(&self) -> EventKind {
        self.event_type.kind()
    }

    /// Whether the alignment lies on the minus strand.
    pub fn is_reverse(&self) -> bool {
        self.event_type.is_minus_strand()
    }

    /// Deletion of kind [`IndelKind::Other`]: present in the column but not real coverage.
    pub fn is_synthetic_gap(&self) -> bool {
        self.event_type.is_deletion() && self.indel_kind == IndelKind::Other
    }
}
