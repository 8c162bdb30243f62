use std::sync::Arc;

use crate::genomics::{AlignedRead, CigarOpKind, IndelKind, PileupEvent, PileupEventType, SlotId};

/// Forward-only walker over one alignment's CIGAR, producing the raw event at
/// each reference position.
///
/// Insertions are attached to the reference position that follows them.
/// Positions must be requested in non-decreasing order.
#[derive(Debug, Clone)]
pub struct AlignmentCursor {
    read: Arc<AlignedRead>,
    end: u64,
    op_index: usize,
    op_offset: u32,
    ref_pos: u64,
    read_pos: usize,
    pending_insertion: Option<(usize, usize)>,
}

impl AlignmentCursor {
    /// Position the cursor at the alignment's first covered base.
    pub fn new(read: Arc<AlignedRead>) -> Self {
        let end = read.end();
        let ref_pos = read.pos;
        let mut cursor = Self {
            read,
            end,
            op_index: 0,
            op_offset: 0,
            ref_pos,
            read_pos: 0,
            pending_insertion: None,
        };
        cursor.settle();
        cursor
    }

    /// Underlying alignment.
    pub fn read(&self) -> &Arc<AlignedRead> {
        &self.read
    }

    /// Half-open end of the covered reference span.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Whether `position` lies inside the covered span.
    pub fn covers(&self, position: u64) -> bool {
        position >= self.read.pos && position < self.end
    }

    /// Raw, unannotated event at `position`.
    ///
    /// Returns `None` outside the covered span or for a position the cursor
    /// has already moved past.
    pub fn event_at(
        &mut self,
        position: u64,
        reference_base: u8,
        slot: SlotId,
    ) -> Option<PileupEvent> {
        if !self.covers(position) || position < self.ref_pos {
            return None;
        }
        while self.ref_pos < position {
            self.step();
        }

        let op = *self.read.cigar.get(self.op_index)?;
        let read = &self.read;

        let mut event_type;
        let mut alignment_base = b'-';
        let mut quality = 0;
        let mut repeat_count = 0;
        let mut indel_kind = IndelKind::Normal;

        match op.kind {
            CigarOpKind::Deletion | CigarOpKind::Skip => {
                event_type = PileupEventType::DELETION;
                repeat_count = op.len;
                if op.kind == CigarOpKind::Skip {
                    indel_kind = IndelKind::Other;
                }
            }
            kind => {
                let base = read.base_at(self.read_pos).unwrap_or(b'N');
                let matches = match kind {
                    CigarOpKind::SequenceMatch => true,
                    CigarOpKind::SequenceMismatch => false,
                    _ => base.eq_ignore_ascii_case(&reference_base),
                };
                event_type = if matches {
                    PileupEventType::MATCH
                } else {
                    PileupEventType::MISMATCH
                };
                alignment_base = base;
                quality = read.quality_at(self.read_pos).unwrap_or(0);
            }
        }

        let mut insertion_bases = Vec::new();
        let mut insertion_qualities = Vec::new();
        if let Some((start, end)) = self.pending_insertion {
            event_type = event_type.with(PileupEventType::INSERTION);
            insertion_bases = read.sequence.get(start..end).map(<[u8]>::to_vec).unwrap_or_default();
            insertion_qualities = read
                .qualities
                .get(start..end)
                .map(<[u8]>::to_vec)
                .unwrap_or_default();
            if !event_type.is_deletion() {
                repeat_count = (end - start) as u32;
            }
        }

        if position == read.pos {
            event_type = event_type.with(PileupEventType::ALIGNMENT_START);
        }
        if position + 1 == self.end {
            event_type = event_type.with(PileupEventType::ALIGNMENT_STOP);
        }
        if read.is_reverse {
            event_type = event_type.with(PileupEventType::MINUS_STRAND);
        }

        Some(PileupEvent {
            alignment_id: Arc::clone(&read.id),
            slot,
            event_type,
            alignment_base,
            quality,
            repeat_count,
            indel_kind,
            mapping_quality: read.mapq,
            insertion_bases,
            insertion_qualities,
            first_position: read.pos,
            last_position: self.end.saturating_sub(1),
            deletion_after_this_position: false,
            next_repeat_count: 0,
            deferred_insertion_bases: Vec::new(),
        })
    }

    /// Skip operations that do not consume the reference, collecting any
    /// insertion that precedes the current reference position.
    fn settle(&mut self) {
        while let Some(op) = self.read.cigar.get(self.op_index).copied() {
            if op.kind.consumes_reference() && self.op_offset < op.len {
                break;
            }
            if self.op_offset == 0 {
                if op.kind == CigarOpKind::Insertion {
                    let len = op.len as usize;
                    self.pending_insertion = Some(match self.pending_insertion {
                        Some((start, end)) if end == self.read_pos => (start, end + len),
                        _ => (self.read_pos, self.read_pos + len),
                    });
                }
                if op.kind.consumes_read() {
                    self.read_pos += op.len as usize;
                }
            }
            self.op_index += 1;
            self.op_offset = 0;
        }
    }

    fn step(&mut self) {
        self.settle();
        if let Some(op) = self.read.cigar.get(self.op_index) {
            if op.kind.consumes_read() {
                self.read_pos += 1;
            }
            self.op_offset += 1;
        }
        self.ref_pos += 1;
        self.pending_insertion = None;
        self.settle();
    }
}
