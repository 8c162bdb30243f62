use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::genomics::{AlignedRead, CategoryFilter};
use crate::store::{AlignmentStream, AlignmentStore, ReferenceRecord, StoreError};

#[derive(Debug)]
struct StoredReference {
    record: ReferenceRecord,
    bases: Arc<[u8]>,
    /// Sorted by start; ties keep insertion order.
    alignments: Vec<Arc<AlignedRead>>,
}

/// Alignment store held entirely in memory.
///
/// Built through [`InMemoryStore::builder`]. Failure injection switches let
/// callers exercise the engine's handling of an unavailable backend.
#[derive(Debug)]
pub struct InMemoryStore {
    references: Vec<StoredReference>,
    unavailable: AtomicBool,
    /// `usize::MAX` disables mid-stream failure.
    fail_stream_after: AtomicUsize,
}

impl InMemoryStore {
    /// Create fluent builder
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::new()
    }

    /// Make every subsequent query fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make alignment streams fail after yielding `items` alignments.
    pub fn fail_stream_after(&self, items: Option<usize>) {
        self.fail_stream_after
            .store(items.unwrap_or(usize::MAX), Ordering::SeqCst);
    }

    /// Records of every stored reference, in insertion order.
    pub fn references(&self) -> impl Iterator<Item = &ReferenceRecord> {
        self.references.iter().map(|r| &r.record)
    }

    /// Number of alignments passing `filter` across all references.
    pub fn alignment_count(&self, filter: CategoryFilter) -> usize {
        self.references
            .iter()
            .flat_map(|r| r.alignments.iter())
            .filter(|a| filter.matches(a.category))
            .count()
    }

    fn find(&self, name: &str) -> Result<&StoredReference, StoreError> {
        self.references
            .iter()
            .find(|r| &*r.record.common_name == name || &*r.record.canonical_name == name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl AlignmentStore for InMemoryStore {
    fn reference(&self, name: &str) -> Result<ReferenceRecord, StoreError> {
        self.check_available()?;
        self.find(name).map(|r| r.record.clone())
    }

    fn reference_bases(&self, name: &str, range: Range<u64>) -> Result<Vec<u8>, StoreError> {
        self.check_available()?;
        let reference = self.find(name)?;
        let len = reference.bases.len();
        let start = (range.start as usize).min(len);
        let end = (range.end as usize).clamp(start, len);
        Ok(reference.bases[start..end].to_vec())
    }

    fn overlapping<'a>(
        &'a self,
        name: &str,
        range: Range<u64>,
        filter: CategoryFilter,
    ) -> Result<AlignmentStream<'a>, StoreError> {
        self.check_available()?;
        let reference = self.find(name)?;
        debug!(
            reference = %reference.record.canonical_name,
            start = range.start,
            end = range.end,
            ?filter,
            "querying overlapping alignments"
        );

        let fail_after = self.fail_stream_after.load(Ordering::SeqCst);
        let Range { start, end } = range;
        let matching = reference
            .alignments
            .iter()
            .take_while(move |a| a.pos < end)
            .filter(move |a| a.overlaps(start, end) && filter.matches(a.category))
            .map(|a| Ok(Arc::clone(a)));

        let stream = matching.enumerate().map(move |(idx, item)| {
            if idx >= fail_after {
                Err(StoreError::Unavailable(format!(
                    "alignment stream interrupted after {idx} records"
                )))
            } else {
                item
            }
        });
        Ok(Box::new(stream))
    }
}

/// Builder for in-memory stores (fluent API)
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    references: Vec<StoredReference>,
    pending: Vec<AlignedRead>,
}

impl InMemoryStoreBuilder {
    /// Create new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reference whose canonical name equals its common name.
    pub fn reference(self, name: &str, bases: impl AsRef<[u8]>) -> Self {
        self.named_reference(name, name, bases)
    }

    /// Add a reference with distinct common and canonical names.
    pub fn named_reference(
        mut self,
        common_name: &str,
        canonical_name: &str,
        bases: impl AsRef<[u8]>,
    ) -> Self {
        let bases: Arc<[u8]> = Arc::from(bases.as_ref());
        self.references.push(StoredReference {
            record: ReferenceRecord {
                common_name: Arc::from(common_name),
                canonical_name: Arc::from(canonical_name),
                length: bases.len() as u64,
            },
            bases,
            alignments: Vec::new(),
        });
        self
    }

    /// Queue an alignment; its `chrom` must name a reference added to this builder.
    pub fn alignment(mut self, read: AlignedRead) -> Self {
        self.pending.push(read);
        self
    }

    /// Queue several alignments.
    pub fn alignments(mut self, reads: impl IntoIterator<Item = AlignedRead>) -> Self {
        self.pending.extend(reads);
        self
    }

    /// Validate and build the store.
    pub fn build(mut self) -> Result<InMemoryStore, StoreError> {
        for read in std::mem::take(&mut self.pending) {
            let reference = self
                .references
                .iter_mut()
                .find(|r| {
                    r.record.common_name == read.chrom || r.record.canonical_name == read.chrom
                })
                .ok_or_else(|| StoreError::NotFound(read.chrom.to_string()))?;
            reference.alignments.push(Arc::new(read));
        }

        for reference in &mut self.references {
            reference.alignments.sort_by_key(|a| a.pos);
        }

        Ok(InMemoryStore {
            references: self.references,
            unavailable: AtomicBool::new(false),
            fail_stream_after: AtomicUsize::new(usize::MAX),
        })
    }
}
