//! Deferred indel annotation.
//!
//! `sra-pileup` reports an upcoming deletion (`-<len><bases>`) or insertion
//! (`+<len><bases>`) on the position *before* the indel, while alignments
//! only reveal the indel once the next position is reached. The annotator is
//! a pipeline stage that holds one column back, lets its successor write the
//! indel information into it, and only then releases it.

use std::collections::HashMap;

use tracing::trace;

use crate::genomics::{PileupColumn, PileupEvent, SlotId};
use crate::PileupError;

/// Two-column sliding window that backfills indel annotations.
///
/// Correspondence between the two columns is tracked by slot identity, so
/// alignments stopping or starting between them cannot shift annotations onto
/// the wrong event.
#[derive(Debug, Default)]
pub struct DeletionInsertionAnnotator {
    previous: Option<PileupColumn>,
    previous_slots: HashMap<SlotId, usize>,
}

impl DeletionInsertionAnnotator {
    /// Empty annotator holding no column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the next raw column and release the previous one, now complete.
    ///
    /// The first column of a window is only held, so this returns `None`.
    pub fn push(&mut self, current: PileupColumn) -> Option<PileupColumn> {
        let current_slots: HashMap<SlotId, usize> = current
            .events
            .iter()
            .enumerate()
            .map(|(idx, event)| (event.slot, idx))
            .collect();

        if let Some(previous) = self.previous.as_mut() {
            debug_assert_eq!(
                previous.position + 1,
                current.position,
                "annotator fed non-adjacent columns"
            );
            for event in &current.events {
                if !event.event_type.is_deletion() && !event.event_type.is_insertion() {
                    continue;
                }
                match self.previous_slots.get(&event.slot) {
                    Some(&idx) => annotate(&mut previous.events[idx], event),
                    None => debug_assert!(
                        event.event_type.is_start(),
                        "slot {} at {} has no predecessor",
                        event.slot.0,
                        current.position
                    ),
                }
            }
        }

        self.previous_slots = current_slots;
        let released = self.previous.replace(current);
        if let Some(column) = &released {
            trace!(position = column.position, depth = column.depth, "column annotated");
        }
        released
    }

    /// Release the held column without successor annotation (end of window).
    pub fn finish(&mut self) -> Option<PileupColumn> {
        self.previous_slots.clear();
        self.previous.take()
    }
}

fn annotate(previous: &mut PileupEvent, current: &PileupEvent) {
    if current.event_type.is_deletion() && !previous.event_type.is_deletion() {
        previous.deletion_after_this_position = true;
        previous.next_repeat_count = current.repeat_count;
    }
    if current.event_type.is_insertion() {
        previous.deferred_insertion_bases = current.insertion_bases.clone();
    }
}

/// Iterator adapter emitting annotated columns one position behind its source.
#[derive(Debug)]
pub struct AnnotatedColumns<I> {
    source: I,
    annotator: DeletionInsertionAnnotator,
    finished: bool,
}

impl<I> AnnotatedColumns<I>
where
    I: Iterator<Item = Result<PileupColumn, PileupError>>,
{
    /// Wrap a stream of raw columns.
    pub fn new(source: I) -> Self {
        Self {
            source,
            annotator: DeletionInsertionAnnotator::new(),
            finished: false,
        }
    }
}

impl<I> Iterator for AnnotatedColumns<I>
where
    I: Iterator<Item = Result<PileupColumn, PileupError>>,
{
    type Item = Result<PileupColumn, PileupError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            match self.source.next() {
                Some(Ok(column)) => {
                    if let Some(done) = self.annotator.push(column) {
                        return Some(Ok(done));
                    }
                }
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                None => {
                    self.finished = true;
                    return self.annotator.finish().map(Ok);
                }
            }
        }
        None
    }
}
