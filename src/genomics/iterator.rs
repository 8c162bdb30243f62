use std::borrow::Cow;
use std::sync::Arc;

use tracing::debug;

use crate::genomics::{
    AlignmentOverlapSet, AnnotatedColumns, PileupColumn, PileupColumnBuilder, PileupEvent,
    ReferenceWindow, ReferenceWindowResolver,
};
use crate::store::AlignmentStore;
use crate::{PileupConfig, PileupError};

/// Raw, unannotated columns for consecutive positions of the build range.
#[derive(Debug)]
struct RawColumns<'a> {
    builder: PileupColumnBuilder<'a>,
    bases: Arc<[u8]>,
    start: u64,
    next: u64,
    end: u64,
}

impl Iterator for RawColumns<'_> {
    type Item = Result<PileupColumn, PileupError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let position = self.next;
        self.next += 1;
        let base = self
            .bases
            .get((position - self.start) as usize)
            .copied()
            .unwrap_or(b'N');
        Some(self.builder.build(position, base))
    }
}

/// Pull-based pileup over one [`ReferenceWindow`].
///
/// Starts before the first column. Each [`advance_column`](Self::advance_column)
/// moves to the next annotated column; inside a column,
/// [`advance_event`](Self::advance_event) walks its events and
/// [`reset_event`](Self::reset_event) rewinds to before the first one.
///
/// The iterator owns the current column while the annotator holds the one
/// after it, so two columns are alive at a time.
pub struct PileupIterator<'a, S: AlignmentStore + ?Sized> {
    store: &'a S,
    window: ReferenceWindow,
    bases: Arc<[u8]>,
    columns: AnnotatedColumns<RawColumns<'a>>,
    current: Option<PileupColumn>,
    event_cursor: Option<usize>,
    exhausted: bool,
}

impl<S: AlignmentStore + ?Sized> std::fmt::Debug for PileupIterator<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PileupIterator")
            .field("window", &self.window)
            .field("position", &self.reference_position())
            .field("event_cursor", &self.event_cursor)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl<'a, S: AlignmentStore + ?Sized> PileupIterator<'a, S> {
    /// Open a pileup on `name`, over `slice = (start, length)` or the whole
    /// reference when `None`.
    pub fn open(
        store: &'a S,
        name: &str,
        slice: Option<(u64, u64)>,
        config: &PileupConfig,
    ) -> Result<Self, PileupError> {
        let (window, mut bases) =
            ReferenceWindowResolver::new(store, config.bounds).resolve(name, slice)?;

        let mut build_end = window.end();
        if config.trailing_lookahead && build_end < window.reference_length {
            let extra = store.reference_bases(&window.name, build_end..build_end + 1)?;
            if extra.len() == 1 {
                bases.extend_from_slice(&extra);
                build_end += 1;
            }
        }
        let bases: Arc<[u8]> = Arc::from(bases);

        let overlaps =
            AlignmentOverlapSet::open(store, &window, window.start..build_end, config.category)?;
        let raw = RawColumns {
            builder: PileupColumnBuilder::new(overlaps, config.depth),
            bases: Arc::clone(&bases),
            start: window.start,
            next: window.start,
            end: build_end,
        };

        debug!(
            reference = %window.canonical_name,
            start = window.start,
            length = window.length,
            lookahead = build_end > window.end(),
            category = ?config.category,
            "opened pileup iterator"
        );

        Ok(Self {
            store,
            window,
            bases,
            columns: AnnotatedColumns::new(raw),
            current: None,
            event_cursor: None,
            exhausted: false,
        })
    }

    /// Move to the next column. Returns `false` once the window is consumed.
    pub fn advance_column(&mut self) -> Result<bool, PileupError> {
        self.event_cursor = None;
        self.current = None;
        if self.exhausted {
            return Ok(false);
        }
        match self.columns.next() {
            Some(Ok(column)) if self.window.contains(column.position) => {
                self.current = Some(column);
                Ok(true)
            }
            // The lookahead column only exists to annotate the last line.
            Some(Ok(_)) | None => {
                self.exhausted = true;
                Ok(false)
            }
            Some(Err(err)) => {
                self.exhausted = true;
                Err(err)
            }
        }
    }

    /// Move to the next event of the current column.
    pub fn advance_event(&mut self) -> bool {
        let Some(column) = &self.current else {
            return false;
        };
        let next = self.event_cursor.map_or(0, |idx| idx + 1);
        if next < column.events.len() {
            self.event_cursor = Some(next);
            true
        } else {
            self.event_cursor = Some(column.events.len());
            false
        }
    }

    /// Rewind to before the first event of the current column.
    pub fn reset_event(&mut self) {
        self.event_cursor = None;
    }

    /// Event under the event cursor.
    pub fn event(&self) -> Option<&PileupEvent> {
        let column = self.current.as_ref()?;
        column.events.get(self.event_cursor?)
    }

    /// Independent cursor over the current column's events.
    pub fn events(&self) -> PileupEventIterator<'_> {
        let events = self
            .current
            .as_ref()
            .map(|c| c.events.as_slice())
            .unwrap_or(&[]);
        PileupEventIterator::new(events)
    }

    /// Resolved window.
    pub fn window(&self) -> &ReferenceWindow {
        &self.window
    }

    /// Canonical name of the reference.
    pub fn reference_name(&self) -> &str {
        &self.window.canonical_name
    }

    /// Current column.
    pub fn column(&self) -> Option<&PileupColumn> {
        self.current.as_ref()
    }

    /// 0-based position of the current column.
    pub fn reference_position(&self) -> Option<u64> {
        self.current.as_ref().map(|c| c.position)
    }

    /// Depth of the current column.
    pub fn depth(&self) -> Option<u32> {
        self.current.as_ref().map(|c| c.depth)
    }

    /// Reference base of the current column.
    pub fn reference_base(&self) -> Option<u8> {
        self.current.as_ref().map(|c| c.reference_base)
    }

    /// Reference bases in `start..start + length`, clipped to the reference.
    ///
    /// Served from the window when possible; a deletion running past the
    /// window end falls back to the store.
    pub fn reference_bases(&self, start: u64, length: u64) -> Result<Cow<'_, [u8]>, PileupError> {
        let end = start.saturating_add(length).min(self.window.reference_length);
        if start >= end {
            return Ok(Cow::Borrowed(&[]));
        }
        let cached_start = self.window.start;
        let cached_end = cached_start + self.bases.len() as u64;
        if start >= cached_start && end <= cached_end {
            let from = (start - cached_start) as usize;
            let to = (end - cached_start) as usize;
            return Ok(Cow::Borrowed(&self.bases[from..to]));
        }
        Ok(Cow::Owned(self.store.reference_bases(&self.window.name, start..end)?))
    }
}

impl<S: AlignmentStore + ?Sized> Iterator for PileupIterator<'_, S> {
    type Item = Result<PileupColumn, PileupError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance_column() {
            Ok(true) => self.current.take().map(Ok),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Re-scannable cursor over the events of one column.
#[derive(Debug, Clone)]
pub struct PileupEventIterator<'c> {
    events: &'c [PileupEvent],
    cursor: Option<usize>,
}

impl<'c> PileupEventIterator<'c> {
    /// Cursor positioned before the first of `events`.
    pub fn new(events: &'c [PileupEvent]) -> Self {
        Self { events, cursor: None }
    }

    /// Move to the next event.
    pub fn advance_event(&mut self) -> bool {
        let next = self.cursor.map_or(0, |idx| idx + 1);
        self.cursor = Some(next.min(self.events.len()));
        next < self.events.len()
    }

    /// Rewind to before the first event.
    pub fn reset_event(&mut self) {
        self.cursor = None;
    }

    /// Event under the cursor.
    pub fn event(&self) -> Option<&'c PileupEvent> {
        self.events.get(self.cursor?)
    }
}

impl<'c> Iterator for PileupEventIterator<'c> {
    type Item = &'c PileupEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.advance_event() {
            self.event()
        } else {
            None
        }
    }
}
