use std::io::Write;
use std::sync::Arc;

use crate::genomics::{EventKind, PileupColumn, PileupEvent, PileupIterator};
use crate::store::AlignmentStore;
use crate::PileupError;

const QUALITY_OFFSET: u32 = 33;
const MAX_QUALITY_CHAR: u32 = b'~' as u32;

/// Renders annotated columns as `sra-pileup -s -n` text lines:
///
/// `<name>\t<pos+1>\t<ref base>\t<depth>\t<events>\n`
///
/// Per event, in slot order: `^<mapq+33>` on alignment start, the base glyph
/// (`.`/`,` match, read base mismatch, `>`/`<` deletion), `+<n><bases>` for
/// an insertion that follows, `-<n><bases>` for a deletion that follows, and
/// `$` on alignment stop. Lower case marks the minus strand.
#[derive(Debug, Clone)]
pub struct PileupTextRenderer {
    name: Arc<str>,
}

impl PileupTextRenderer {
    /// Renderer printing `name` in the first column.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    /// Write one line. `reference[0]` is the base at `column.position`
    /// followed by enough bases to spell the longest pending deletion.
    pub fn write_line<W: Write>(
        &self,
        writer: &mut W,
        column: &PileupColumn,
        reference: &[u8],
    ) -> std::io::Result<()> {
        writer.write_all(&self.line(column, reference))
    }

    /// Render one line to a string.
    pub fn render(&self, column: &PileupColumn, reference: &[u8]) -> String {
        String::from_utf8_lossy(&self.line(column, reference)).into_owned()
    }

    fn line(&self, column: &PileupColumn, reference: &[u8]) -> Vec<u8> {
        let head = format!(
            "{}\t{}\t{}\t{}\t",
            self.name,
            column.position + 1,
            column.reference_base as char,
            column.depth
        );
        let mut line = Vec::with_capacity(head.len() + column.events.len() * 2 + 1);
        line.extend_from_slice(head.as_bytes());
        for event in &column.events {
            push_event(&mut line, event, reference);
        }
        line.push(b'\n');
        line
    }
}

/// Event string for a column, without the leading fields.
pub fn event_string(column: &PileupColumn, reference: &[u8]) -> String {
    let mut out = Vec::new();
    for event in &column.events {
        push_event(&mut out, event, reference);
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn push_event(out: &mut Vec<u8>, event: &PileupEvent, reference: &[u8]) {
    let reverse = event.is_reverse();
    let cased = |base: u8| {
        if reverse {
            base.to_ascii_lowercase()
        } else {
            base.to_ascii_uppercase()
        }
    };

    if event.event_type.is_start() {
        let qual = (u32::from(event.mapping_quality) + QUALITY_OFFSET).min(MAX_QUALITY_CHAR);
        out.push(b'^');
        out.push(qual as u8);
    }

    out.push(match event.kind() {
        EventKind::Match => {
            if reverse {
                b','
            } else {
                b'.'
            }
        }
        EventKind::Mismatch => cased(event.alignment_base),
        EventKind::Deletion => {
            if reverse {
                b'<'
            } else {
                b'>'
            }
        }
    });

    if !event.deferred_insertion_bases.is_empty() {
        out.push(b'+');
        out.extend_from_slice(event.deferred_insertion_bases.len().to_string().as_bytes());
        out.extend(event.deferred_insertion_bases.iter().map(|&b| cased(b)));
    }

    if event.deletion_after_this_position {
        let count = event.next_repeat_count as usize;
        out.push(b'-');
        out.extend_from_slice(count.to_string().as_bytes());
        out.extend((1..=count).map(|i| cased(reference.get(i).copied().unwrap_or(b'N'))));
    }

    if event.event_type.is_stop() {
        out.push(b'$');
    }
}

/// Drive `pileup` to exhaustion, writing one line per column.
///
/// Returns the number of lines written.
pub fn write_pileup<W: Write, S: AlignmentStore + ?Sized>(
    writer: &mut W,
    pileup: &mut PileupIterator<'_, S>,
) -> Result<usize, PileupError> {
    let renderer = PileupTextRenderer::new(Arc::clone(&pileup.window().canonical_name));
    let mut lines = 0;
    while pileup.advance_column()? {
        let Some(column) = pileup.column() else {
            break;
        };
        let reach = 1 + u64::from(column.longest_pending_deletion());
        let reference = pileup.reference_bases(column.position, reach)?;
        renderer.write_line(writer, column, &reference)?;
        lines += 1;
    }
    writer.flush()?;
    Ok(lines)
}

/// Render a pileup into a string (useful for tests and snapshots).
pub fn render_pileup<S: AlignmentStore + ?Sized>(
    pileup: &mut PileupIterator<'_, S>,
) -> Result<String, PileupError> {
    let mut buffer = Vec::new();
    write_pileup(&mut buffer, pileup)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
