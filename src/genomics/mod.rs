//! Pileup construction over aligned reads.
//!
//! Alignments enter through an [`AlignmentOverlapSet`], are walked position by
//! position by [`AlignmentCursor`]s, grouped into [`PileupColumn`]s by the
//! [`PileupColumnBuilder`], annotated with deferred indels and finally
//! rendered as text or summarised as coverage.

mod annotator;
mod coverage;
mod cursor;
mod event;
mod iterator;
mod overlap;
mod pileup;
mod render;
mod types;
mod window;

pub use annotator::{AnnotatedColumns, DeletionInsertionAnnotator};
pub use coverage::{write_coverage, CoverageSummary};
pub use cursor::AlignmentCursor;
pub use event::{EventKind, IndelKind, PileupEvent, PileupEventType, SlotId};
pub use iterator::{PileupEventIterator, PileupIterator};
pub use overlap::AlignmentOverlapSet;
pub use pileup::{PileupColumn, PileupColumnBuilder};
pub use render::{event_string, render_pileup, write_pileup, PileupTextRenderer};
pub use types::{
    parse_cigar, AlignedRead, AlignmentCategory, CategoryFilter, CigarError, CigarOp, CigarOpKind,
};
pub use window::{ReferenceWindow, ReferenceWindowResolver};
