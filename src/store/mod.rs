//! Read-only access to references and alignments.
//!
//! The pileup engine never owns alignment storage. It consumes three
//! primitives from an [`AlignmentStore`]: reference metadata, reference
//! bases for a range, and a start-ordered enumeration of the alignments
//! overlapping a range.

mod memory;

pub use memory::{InMemoryStore, InMemoryStoreBuilder};

use std::ops::Range;
use std::sync::Arc;

use thiserror::Error;

use crate::genomics::{AlignedRead, CategoryFilter};

/// Failures reported by a backing store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Reference or accession unknown to the store.
    #[error("reference '{0}' not found")]
    NotFound(String),
    /// Backend could not answer the query.
    #[error("alignment store unavailable: {0}")]
    Unavailable(String),
}

/// Metadata describing one reference sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRecord {
    /// Name the reference was registered under.
    pub common_name: Arc<str>,
    /// Name printed in pileup output.
    pub canonical_name: Arc<str>,
    /// Length in bases.
    pub length: u64,
}

/// Lazily produced alignments, ordered by start position.
pub type AlignmentStream<'a> = Box<dyn Iterator<Item = Result<Arc<AlignedRead>, StoreError>> + 'a>;

/// Source of references and alignments consumed by the pileup engine.
///
/// Implementations are shared read-only; two pileups opened over the same
/// store must not observe each other.
pub trait AlignmentStore: Send + Sync {
    /// Look up a reference by common or canonical name.
    fn reference(&self, name: &str) -> Result<ReferenceRecord, StoreError>;

    /// Bases of `name` in the half-open `range`, clipped to the reference end.
    fn reference_bases(&self, name: &str, range: Range<u64>) -> Result<Vec<u8>, StoreError>;

    /// Alignments of `name` overlapping `range` whose category passes
    /// `filter`, ordered by start position. Alignments that begin before
    /// `range.start` and reach into it are included.
    fn overlapping<'a>(
        &'a self,
        name: &str,
        range: Range<u64>,
        filter: CategoryFilter,
    ) -> Result<AlignmentStream<'a>, StoreError>;
}

impl<T: AlignmentStore + ?Sized> AlignmentStore for &T {
    fn reference(&self, name: &str) -> Result<ReferenceRecord, StoreError> {
        (**self).reference(name)
    }

    fn reference_bases(&self, name: &str, range: Range<u64>) -> Result<Vec<u8>, StoreError> {
        (**self).reference_bases(name, range)
    }

    fn overlapping<'a>(
        &'a self,
        name: &str,
        range: Range<u64>,
        filter: CategoryFilter,
    ) -> Result<AlignmentStream<'a>, StoreError> {
        (**self).overlapping(name, range, filter)
    }
}

impl<T: AlignmentStore + ?Sized> AlignmentStore for Arc<T> {
    fn reference(&self, name: &str) -> Result<ReferenceRecord, StoreError> {
        (**self).reference(name)
    }

    fn reference_bases(&self, name: &str, range: Range<u64>) -> Result<Vec<u8>, StoreError> {
        (**self).reference_bases(name, range)
    }

    fn overlapping<'a>(
        &'a self,
        name: &str,
        range: Range<u64>,
        filter: CategoryFilter,
    ) -> Result<AlignmentStream<'a>, StoreError> {
        (**self).overlapping(name, range, filter)
    }
}
