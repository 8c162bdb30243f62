use std::iter::Peekable;
use std::ops::Range;
use std::sync::Arc;

use tracing::trace;

use crate::genomics::{AlignedRead, CategoryFilter, ReferenceWindow};
use crate::store::{AlignmentStream, AlignmentStore};
use crate::PileupError;

/// Lazily consumed, start-ordered alignments overlapping a pileup range.
///
/// The overlap set only hands an alignment out once the column builder
/// reaches the alignment's first position inside the range, so the store is
/// read strictly front to back.
pub struct AlignmentOverlapSet<'a> {
    stream: Peekable<AlignmentStream<'a>>,
    range: Range<u64>,
    last_start: u64,
    yielded: usize,
}

impl std::fmt::Debug for AlignmentOverlapSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignmentOverlapSet")
            .field("range", &self.range)
            .field("last_start", &self.last_start)
            .field("yielded", &self.yielded)
            .finish_non_exhaustive()
    }
}

impl<'a> AlignmentOverlapSet<'a> {
    /// Query `store` for alignments overlapping `range` on the window's reference.
    ///
    /// `range` usually equals the window; it extends one position further
    /// when trailing lookahead is enabled.
    pub fn open<S: AlignmentStore + ?Sized>(
        store: &'a S,
        window: &ReferenceWindow,
        range: Range<u64>,
        filter: CategoryFilter,
    ) -> Result<Self, PileupError> {
        let stream = store.overlapping(&window.name, range.clone(), filter)?;
        Ok(Self {
            stream: stream.peekable(),
            last_start: range.start,
            range,
            yielded: 0,
        })
    }

    /// Number of alignments handed out so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Next alignment whose first in-range position is at or before `position`.
    ///
    /// Alignments that end before `position` are skipped; they can only
    /// appear when the store returns records that do not overlap the range.
    pub fn next_entering(
        &mut self,
        position: u64,
    ) -> Option<Result<Arc<AlignedRead>, PileupError>> {
        loop {
            let entry = match self.stream.peek()? {
                Ok(read) => read.pos.max(self.range.start),
                Err(_) => {
                    let err = self.stream.next()?.err()?;
                    return Some(Err(err.into()));
                }
            };
            if entry > position {
                return None;
            }

            let read = match self.stream.next()? {
                Ok(read) => read,
                Err(err) => return Some(Err(err.into())),
            };
            if entry < self.last_start {
                return Some(Err(PileupError::StorageUnavailable(format!(
                    "alignment {} starts at {} after an alignment starting at {}",
                    read.id, read.pos, self.last_start
                ))));
            }
            self.last_start = entry;

            if read.end() <= position || !read.overlaps(self.range.start, self.range.end) {
                trace!(id = %read.id, "skipping alignment outside pileup range");
                continue;
            }

            self.yielded += 1;
            return Some(Ok(read));
        }
    }
}
