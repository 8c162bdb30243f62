//! # Pileup columns with deferred indel annotation
//!
//! This library turns a reference sequence and the alignments against it into
//! per-position pileup columns, and renders those columns in the single-line
//! text format produced by `sra-pileup -s -n`.
//!
//! ## Pipeline
//!
//! 1. **Window resolution**: reference name plus optional slice → absolute range and bases
//! 2. **Overlap set**: start-ordered alignments intersecting the range
//! 3. **Column builder**: per-position depth and events in stable slot order
//! 4. **Annotator**: moves deletion lengths and insertion bases back one position
//! 5. **Renderer**: one text line per annotated column
//!
//! Iterating a whole reference and iterating any slice of it yield identical
//! depth and events for the shared positions.
//!
//! ## Usage Example
//!
//! ```
//! use pileup_engine::{PileupConfig, PileupEngine};
//! use pileup_engine::genomics::{AlignedRead, CigarOp, CigarOpKind};
//! use pileup_engine::store::InMemoryStore;
//!
//! let store = InMemoryStore::builder()
//!     .reference("chr1", b"ACGT")
//!     .alignment(AlignedRead::new(
//!         "run.PA.1",
//!         "chr1",
//!         0,
//!         60,
//!         vec![CigarOp::new(CigarOpKind::Match, 2)],
//!         b"AC".to_vec(),
//!         false,
//!     ))
//!     .build()?;
//!
//! let engine = PileupEngine::new(store, PileupConfig::default());
//! let text = engine.render_slice("chr1", 0, 2)?;
//! assert_eq!(text, "chr1\t1\tA\t1\t^].\nchr1\t2\tC\t1\t.$\n");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod genomics; // Columns, events, annotation and rendering
pub mod store; // Collaborator interface and in-memory store

pub use genomics::{
    render_pileup, write_pileup, AnnotatedColumns, CategoryFilter, CoverageSummary,
    PileupColumn, PileupEvent, PileupEventIterator, PileupEventType, PileupIterator,
    PileupTextRenderer, ReferenceWindow,
};
pub use store::{AlignmentStore, InMemoryStore, StoreError};

use thiserror::Error;
use tracing::debug;

/// How requests reaching past the reference end are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundsPolicy {
    /// Fail with [`PileupError::OutOfRange`].
    #[default]
    Strict,
    /// Shrink the window to the reference and flag it as clamped.
    Clamp,
}

/// Which events count toward a column's reported depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthPolicy {
    /// Every alignment covering the position, reference skips included.
    #[default]
    Raw,
    /// Leave out deletions of kind [`genomics::IndelKind::Other`].
    ExcludeReferenceSkips,
}

/// Configuration parameters for opening pileups
#[derive(Debug, Clone, Default)]
pub struct PileupConfig {
    /// Alignment categories contributing to the pileup.
    pub category: CategoryFilter,

    /// Handling of out-of-bounds slices.
    pub bounds: BoundsPolicy,

    /// Depth reporting policy.
    pub depth: DepthPolicy,

    /// Build one position past the slice so its last line receives indel
    /// annotations. Off by default to match `sra-pileup` slice output.
    pub trailing_lookahead: bool,
}

impl PileupConfig {
    /// Default configuration: all categories, strict bounds, raw depth.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict alignment categories.
    pub fn with_category(mut self, category: CategoryFilter) -> Self {
        self.category = category;
        self
    }

    /// Set the bounds policy.
    pub fn with_bounds(mut self, bounds: BoundsPolicy) -> Self {
        self.bounds = bounds;
        self
    }

    /// Set the depth policy.
    pub fn with_depth_policy(mut self, depth: DepthPolicy) -> Self {
        self.depth = depth;
        self
    }

    /// Enable or disable the trailing lookahead position.
    pub fn with_trailing_lookahead(mut self, enabled: bool) -> Self {
        self.trailing_lookahead = enabled;
        self
    }
}

/// Errors that can occur while computing or rendering a pileup
#[derive(Error, Debug)]
pub enum PileupError {
    /// Unknown reference or accession
    #[error("reference not found: {0}")]
    ReferenceNotFound(String),

    /// Backing store could not be queried
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Requested window lies partly or fully outside the reference
    #[error("window {start}+{length} out of range for '{reference}' (length {reference_length})")]
    OutOfRange {
        /// Reference name as requested
        reference: String,
        /// Requested 0-based start
        start: u64,
        /// Requested length
        length: u64,
        /// Actual reference length
        reference_length: u64,
    },

    /// Configuration value could not be interpreted
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Writing rendered output failed
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for PileupError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(name) => PileupError::ReferenceNotFound(name),
            StoreError::Unavailable(msg) => PileupError::StorageUnavailable(msg),
        }
    }
}

/// Entry point pairing a store with a pileup configuration
#[derive(Debug)]
pub struct PileupEngine<S> {
    store: S,
    config: PileupConfig,
}

impl<S: AlignmentStore> PileupEngine<S> {
    /// Create new engine
    pub fn new(store: S, config: PileupConfig) -> Self {
        Self { store, config }
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Active configuration.
    pub fn config(&self) -> &PileupConfig {
        &self.config
    }

    /// Pileup over the entire reference.
    pub fn pileups(&self, reference: &str) -> Result<PileupIterator<'_, S>, PileupError> {
        debug!(reference, "opening whole-reference pileup");
        PileupIterator::open(&self.store, reference, None, &self.config)
    }

    /// Pileup over `length` positions starting at 0-based `start`.
    pub fn pileup_slice(
        &self,
        reference: &str,
        start: u64,
        length: u64,
    ) -> Result<PileupIterator<'_, S>, PileupError> {
        debug!(reference, start, length, "opening pileup slice");
        PileupIterator::open(&self.store, reference, Some((start, length)), &self.config)
    }

    /// Render a slice in `sra-pileup` text form.
    pub fn render_slice(
        &self,
        reference: &str,
        start: u64,
        length: u64,
    ) -> Result<String, PileupError> {
        let mut pileup = self.pileup_slice(reference, start, length)?;
        render_pileup(&mut pileup)
    }
}
