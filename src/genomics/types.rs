use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::PileupError;

/// CIGAR operation kinds describing how a read aligns to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CigarOpKind {
    /// `M`: aligned base, match or mismatch decided against the reference.
    Match,
    /// `=`: aligned base known to match the reference.
    SequenceMatch,
    /// `X`: aligned base known to differ from the reference.
    SequenceMismatch,
    /// `I`: insertion relative to the reference.
    Insertion,
    /// `D`: deletion relative to the reference.
    Deletion,
    /// `N`: skipped reference region (intron or read gap).
    Skip,
    /// `S`: soft clipping (sequence present in read only).
    SoftClip,
    /// `H`: hard clipping (trimmed sequence not present in read).
    HardClip,
    /// `P`: silent padding.
    Padding,
}

impl CigarOpKind {
    /// Decode a SAM CIGAR operation letter.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'M' => Some(Self::Match),
            b'=' => Some(Self::SequenceMatch),
            b'X' => Some(Self::SequenceMismatch),
            b'I' => Some(Self::Insertion),
            b'D' => Some(Self::Deletion),
            b'N' => Some(Self::Skip),
            b'S' => Some(Self::SoftClip),
            b'H' => Some(Self::HardClip),
            b'P' => Some(Self::Padding),
            _ => None,
        }
    }

    /// SAM letter for this operation.
    pub fn code(self) -> char {
        match self {
            Self::Match => 'M',
            Self::SequenceMatch => '=',
            Self::SequenceMismatch => 'X',
            Self::Insertion => 'I',
            Self::Deletion => 'D',
            Self::Skip => 'N',
            Self::SoftClip => 'S',
            Self::HardClip => 'H',
            Self::Padding => 'P',
        }
    }

    /// Whether the operation advances along the reference.
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            Self::Match | Self::SequenceMatch | Self::SequenceMismatch | Self::Deletion | Self::Skip
        )
    }

    /// Whether the operation advances along the read sequence.
    pub fn consumes_read(self) -> bool {
        matches!(
            self,
            Self::Match
                | Self::SequenceMatch
                | Self::SequenceMismatch
                | Self::Insertion
                | Self::SoftClip
        )
    }
}

/// CIGAR operation with length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CigarOp {
    /// Operation kind.
    pub kind: CigarOpKind,
    /// Number of bases affected by the operation.
    pub len: u32,
}

impl CigarOp {
    /// Construct a new CIGAR operation.
    pub fn new(kind: CigarOpKind, len: u32) -> Self {
        Self { kind, len }
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len, self.kind.code())
    }
}

/// Errors raised while decoding a textual CIGAR string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CigarError {
    /// A length prefix was missing or not a number.
    #[error("invalid CIGAR length in '{0}'")]
    InvalidLength(String),
    /// Operation letter not defined by SAM.
    #[error("unknown CIGAR operation '{op}' in '{cigar}'")]
    UnknownOperation {
        /// Offending letter.
        op: char,
        /// Full CIGAR string.
        cigar: String,
    },
    /// Digits without a trailing operation letter.
    #[error("truncated CIGAR '{0}'")]
    Truncated(String),
}

/// Parse a CIGAR string such as `5S10M2I3M1D4M` into operations.
///
/// `*` decodes to an empty operation list.
pub fn parse_cigar(cigar: &str) -> Result<Vec<CigarOp>, CigarError> {
    if cigar == "*" {
        return Ok(Vec::new());
    }

    let mut ops = Vec::new();
    let mut num_start = 0;

    for (i, c) in cigar.char_indices() {
        if c.is_ascii_digit() {
            continue;
        }
        let len: u32 = cigar[num_start..i]
            .parse()
            .map_err(|_| CigarError::InvalidLength(cigar.to_string()))?;
        let kind = u8::try_from(c)
            .ok()
            .and_then(CigarOpKind::from_code)
            .ok_or_else(|| CigarError::UnknownOperation {
                op: c,
                cigar: cigar.to_string(),
            })?;
        ops.push(CigarOp::new(kind, len));
        num_start = i + c.len_utf8();
    }

    if num_start != cigar.len() {
        return Err(CigarError::Truncated(cigar.to_string()));
    }

    Ok(ops)
}

/// Classification of an alignment within its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum AlignmentCategory {
    /// Primary placement of the read.
    #[default]
    Primary,
    /// Secondary (alternative) placement.
    Secondary,
}

/// Category selector used when opening a pileup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CategoryFilter {
    /// Primary alignments only.
    Primary,
    /// Secondary alignments only.
    Secondary,
    /// Every alignment.
    #[default]
    All,
}

impl CategoryFilter {
    /// Whether an alignment of the given category passes the filter.
    pub fn matches(self, category: AlignmentCategory) -> bool {
        match self {
            Self::Primary => category == AlignmentCategory::Primary,
            Self::Secondary => category == AlignmentCategory::Secondary,
            Self::All => true,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = PileupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            "all" => Ok(Self::All),
            other => Err(PileupError::InvalidConfiguration(format!(
                "unknown alignment category '{other}' (expected primary, secondary or all)"
            ))),
        }
    }
}

/// Aligned read with sequence and quality information.
#[derive(Debug, Clone)]
pub struct AlignedRead {
    /// Alignment identifier, e.g. `SRR341578.PA.12`.
    pub id: Arc<str>,
    /// Reference contig/chromosome name.
    pub chrom: Arc<str>,
    /// 0-based leftmost reference coordinate.
    pub pos: u64,
    /// Mapping quality (Phred-scaled).
    pub mapq: u8,
    /// CIGAR describing the alignment.
    pub cigar: Vec<CigarOp>,
    /// Read sequence stored as ASCII.
    pub sequence: Arc<[u8]>,
    /// Per-base quality scores in Phred space.
    pub qualities: Arc<[u8]>,
    /// Whether the read maps to the reverse complement strand.
    pub is_reverse: bool,
    /// Primary or secondary placement.
    pub category: AlignmentCategory,
}

impl AlignedRead {
    /// Construct a primary alignment with uniform base quality 30.
    pub fn new(
        id: impl Into<Arc<str>>,
        chrom: impl Into<Arc<str>>,
        pos: u64,
        mapq: u8,
        cigar: Vec<CigarOp>,
        sequence: impl Into<Arc<[u8]>>,
        is_reverse: bool,
    ) -> Self {
        let sequence: Arc<[u8]> = sequence.into();
        let qualities: Arc<[u8]> = vec![30u8; sequence.len()].into();
        Self {
            id: id.into(),
            chrom: chrom.into(),
            pos,
            mapq,
            cigar,
            sequence,
            qualities,
            is_reverse,
            category: AlignmentCategory::Primary,
        }
    }

    /// Replace the per-base qualities.
    pub fn with_qualities(mut self, qualities: impl Into<Arc<[u8]>>) -> Self {
        self.qualities = qualities.into();
        self
    }

    /// Set the alignment category.
    pub fn with_category(mut self, category: AlignmentCategory) -> Self {
        self.category = category;
        self
    }

    /// Read length inferred from the sequence.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Whether the read carries no bases.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Number of reference positions covered, deletions and skips included.
    pub fn reference_span(&self) -> u64 {
        self.cigar
            .iter()
            .filter(|op| op.kind.consumes_reference())
            .map(|op| u64::from(op.len))
            .sum()
    }

    /// End position (half-open) on the reference.
    pub fn end(&self) -> u64 {
        self.pos + self.reference_span()
    }

    /// Last covered reference position, if the alignment covers any.
    pub fn last_position(&self) -> Option<u64> {
        self.end().checked_sub(1).filter(|&last| last >= self.pos)
    }

    /// Base at the provided read offset.
    pub fn base_at(&self, offset: usize) -> Option<u8> {
        self.sequence.get(offset).copied()
    }

    /// Quality score at the provided read offset.
    pub fn quality_at(&self, offset: usize) -> Option<u8> {
        self.qualities.get(offset).copied()
    }

    /// Whether the alignment covers the half-open reference range.
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        start < end && self.pos < end && self.end() > start
    }

    /// CIGAR rendered back to text.
    pub fn cigar_string(&self) -> String {
        if self.cigar.is_empty() {
            return "*".to_string();
        }
        self.cigar.iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_cigar() {
        let ops = parse_cigar("5S10M2I3M1D4N2=1X").unwrap();
        assert_eq!(ops.len(), 8);
        assert_eq!(ops[0], CigarOp::new(CigarOpKind::SoftClip, 5));
        assert_eq!(ops[5], CigarOp::new(CigarOpKind::Skip, 4));
        assert_eq!(ops[7], CigarOp::new(CigarOpKind::SequenceMismatch, 1));
    }

    #[test]
    fn rejects_malformed_cigar() {
        assert_eq!(parse_cigar("*").unwrap(), Vec::new());
        assert!(matches!(parse_cigar("M"), Err(CigarError::InvalidLength(_))));
        assert!(matches!(
            parse_cigar("3Q"),
            Err(CigarError::UnknownOperation { op: 'Q', .. })
        ));
        assert!(matches!(parse_cigar("3M4"), Err(CigarError::Truncated(_))));
    }

    #[test]
    fn reference_span_counts_deletions_and_skips() {
        let read = AlignedRead::new(
            "r1",
            "chr1",
            100,
            60,
            parse_cigar("2S4M1I3M2D1M5N2M").unwrap(),
            b"NNACGTAACGTAC".to_vec(),
            false,
        );
        assert_eq!(read.reference_span(), 4 + 3 + 2 + 1 + 5 + 2);
        assert_eq!(read.end(), 117);
        assert_eq!(read.last_position(), Some(116));
        assert_eq!(read.cigar_string(), "2S4M1I3M2D1M5N2M");
        assert!(read.overlaps(116, 200));
        assert!(!read.overlaps(117, 200));
    }

    #[test]
    fn category_filter_parses_and_matches() {
        let filter: CategoryFilter = "Primary".parse().unwrap();
        assert!(filter.matches(AlignmentCategory::Primary));
        assert!(!filter.matches(AlignmentCategory::Secondary));
        assert!(CategoryFilter::All.matches(AlignmentCategory::Secondary));
        assert!("bogus".parse::<CategoryFilter>().is_err());
    }
}
