//! Record-level utilities for SAM/BAM records.

use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::record::Cigar as CigarTrait;
use noodles::sam::alignment::record::cigar::op::Kind;

/// The record's query name, used as its fragment id.
#[must_use]
pub fn read_name(record: &RecordBuf) -> Option<String> {
    record.name().map(|name| name.to_string())
}

/// Name of the reference sequence at `id` in the header.
#[must_use]
pub fn contig_name(header: &Header, id: usize) -> Option<String> {
    header.reference_sequences().get_index(id).map(|(name, _)| name.to_string())
}

/// Counts reference-consuming operations from a CIGAR.
#[must_use]
pub fn reference_length(cigar: &impl CigarTrait) -> usize {
    cigar
        .iter()
        .filter_map(Result::ok)
        .filter(|op| {
            matches!(
                op.kind(),
                Kind::Match
                    | Kind::SequenceMatch
                    | Kind::SequenceMismatch
                    | Kind::Deletion
                    | Kind::Skip
            )
        })
        .map(|op| op.len())
        .sum()
}

/// Gets the read's alignment end position (1-based, inclusive).
#[must_use]
pub fn alignment_end(record: &RecordBuf) -> Option<usize> {
    let start = usize::from(record.alignment_start()?);
    let ref_len = reference_length(&record.cigar());
    Some(start + ref_len.max(1) - 1)
}

/// The reference interval the record occupies, 1-based inclusive.
///
/// Unmapped records placed next to their mate, and records without reference-consuming
/// operations, occupy the single base at their start.
#[must_use]
pub fn aligned_span(record: &RecordBuf) -> Option<(usize, usize)> {
    let start = usize::from(record.alignment_start()?);
    if record.flags().is_unmapped() {
        return Some((start, start));
    }
    Some((start, alignment_end(record).unwrap_or(start)))
}

fn op_char(kind: Kind) -> char {
    match kind {
        Kind::Match => 'M',
        Kind::Insertion => 'I',
        Kind::Deletion => 'D',
        Kind::Skip => 'N',
        Kind::SoftClip => 'S',
        Kind::HardClip => 'H',
        Kind::Pad => 'P',
        Kind::SequenceMatch => '=',
        Kind::SequenceMismatch => 'X',
    }
}

/// Renders the record's CIGAR as text, or `*` when it has none.
#[must_use]
pub fn cigar_to_string(record: &RecordBuf) -> String {
    let ops = record.cigar().as_ref();
    if ops.is_empty() {
        return "*".to_string();
    }
    ops.iter().map(|op| format!("{}{}", op.len(), op_char(op.kind()))).collect()
}
