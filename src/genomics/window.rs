use std::sync::Arc;

use tracing::{debug, warn};

use crate::store::AlignmentStore;
use crate::{BoundsPolicy, PileupError};

/// Resolved, immutable coordinate range on one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceWindow {
    /// Name the caller asked for.
    pub name: Arc<str>,
    /// Name printed in pileup output.
    pub canonical_name: Arc<str>,
    /// 0-based first position.
    pub start: u64,
    /// Number of positions.
    pub length: u64,
    /// Length of the whole reference.
    pub reference_length: u64,
    /// Whether the request was shrunk to fit the reference.
    pub clamped: bool,
}

impl ReferenceWindow {
    /// Half-open end of the window.
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Whether `position` falls inside the window.
    pub fn contains(&self, position: u64) -> bool {
        position >= self.start && position < self.end()
    }

    /// Whether the window spans the whole reference.
    pub fn is_entire_reference(&self) -> bool {
        self.start == 0 && self.length == self.reference_length
    }
}

/// Turns a reference name and optional slice into a [`ReferenceWindow`] and
/// the bases it covers.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceWindowResolver<'s, S: ?Sized> {
    store: &'s S,
    bounds: BoundsPolicy,
}

impl<'s, S: AlignmentStore + ?Sized> ReferenceWindowResolver<'s, S> {
    /// Resolver reading from `store` under the given bounds policy.
    pub fn new(store: &'s S, bounds: BoundsPolicy) -> Self {
        Self { store, bounds }
    }

    /// Resolve `slice = (start, length)`, or the entire reference when `None`.
    pub fn resolve(
        &self,
        name: &str,
        slice: Option<(u64, u64)>,
    ) -> Result<(ReferenceWindow, Vec<u8>), PileupError> {
        let record = self.store.reference(name)?;
        let reference_length = record.length;
        let (requested_start, requested_length) = slice.unwrap_or((0, reference_length));

        let requested_end = requested_start.checked_add(requested_length);
        let in_bounds = matches!(requested_end, Some(end) if end <= reference_length);

        let (start, length, clamped) = if in_bounds {
            (requested_start, requested_length, false)
        } else {
            match self.bounds {
                BoundsPolicy::Strict => {
                    return Err(PileupError::OutOfRange {
                        reference: name.to_string(),
                        start: requested_start,
                        length: requested_length,
                        reference_length,
                    });
                }
                BoundsPolicy::Clamp => {
                    let start = requested_start.min(reference_length);
                    let end = requested_end.unwrap_or(u64::MAX).min(reference_length);
                    warn!(
                        reference = name,
                        requested_start,
                        requested_length,
                        start,
                        length = end - start,
                        "clamped pileup window to reference bounds"
                    );
                    (start, end - start, true)
                }
            }
        };

        let bases = self.store.reference_bases(name, start..start + length)?;
        if bases.len() as u64 != length {
            return Err(PileupError::StorageUnavailable(format!(
                "store returned {} bases for '{}' {}..{}",
                bases.len(),
                name,
                start,
                start + length
            )));
        }

        debug!(
            reference = %record.canonical_name,
            start,
            length,
            "resolved reference window"
        );

        let window = ReferenceWindow {
            name: Arc::from(name),
            canonical_name: record.canonical_name,
            start,
            length,
            reference_length,
            clamped,
        };
        Ok((window, bases))
    }
}
