//! Builders for `RecordBuf`s and headers used by tests and benchmarks.
//!
//! ```rust
//! use fgslice_lib::sam::builder::{RecordBuilder, create_header};
//!
//! let header = create_header(&[("chr1", 10_000), ("chr2", 10_000)]);
//! let record = RecordBuilder::mapped_read()
//!     .name("frag1")
//!     .alignment_start(100)
//!     .cigar("50M")
//!     .build();
//! assert_eq!(record.reference_sequence_id(), Some(0));
//! ```

use bstr::BString;
use noodles::core::Position;
use noodles::sam::Header;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record::{Flags, MappingQuality};
use noodles::sam::alignment::record_buf::data::field::Value as BufValue;
use noodles::sam::alignment::record_buf::{QualityScores, RecordBuf, Sequence};
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::header::tag as header_tag;
use noodles::sam::header::record::value::map::{Header as HeaderRecord, ReferenceSequence};
use std::num::NonZeroUsize;

/// Default base quality for generated qualities
pub const DEFAULT_BASE_QUALITY: u8 = 30;

/// Creates a coordinate-sorted header with the given `(name, length)` reference sequences.
///
/// # Panics
///
/// Panics if a length is zero.
#[must_use]
pub fn create_header(references: &[(&str, usize)]) -> Header {
    let hd = Map::<HeaderRecord>::builder()
        .insert(header_tag::SORT_ORDER, BString::from("coordinate"))
        .build()
        .expect("valid header map");

    references
        .iter()
        .fold(Header::builder().set_header(hd), |builder, (name, len)| {
            let map = Map::<ReferenceSequence>::new(
                NonZeroUsize::new(*len).expect("reference length must be non-zero"),
            );
            builder.add_reference_sequence(BString::from(*name), map)
        })
        .build()
}

/// Parses a CIGAR string into noodles operations.
///
/// # Panics
///
/// Panics on an operation without a length or an unknown operation.
#[must_use]
pub fn parse_cigar(cigar_str: &str) -> Vec<Op> {
    let mut ops = Vec::new();
    let mut len = String::new();
    for c in cigar_str.chars() {
        if c.is_ascii_digit() {
            len.push(c);
            continue;
        }
        let kind = match c {
            'M' => Kind::Match,
            'I' => Kind::Insertion,
            'D' => Kind::Deletion,
            'N' => Kind::Skip,
            'S' => Kind::SoftClip,
            'H' => Kind::HardClip,
            'P' => Kind::Pad,
            '=' => Kind::SequenceMatch,
            'X' => Kind::SequenceMismatch,
            _ => panic!("Unknown CIGAR operation: {c}"),
        };
        ops.push(Op::new(kind, len.parse().expect("Invalid CIGAR: expected number")));
        len.clear();
    }
    ops
}

fn query_length(ops: &[Op]) -> usize {
    ops.iter()
        .filter(|op| {
            matches!(
                op.kind(),
                Kind::Match
                    | Kind::Insertion
                    | Kind::SoftClip
                    | Kind::SequenceMatch
                    | Kind::SequenceMismatch
            )
        })
        .map(|op| op.len())
        .sum()
}

/// Fluent builder for a single `RecordBuf`.
///
/// When a CIGAR is given without a sequence, a sequence of matching length is generated.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    name: Option<String>,
    flags: Flags,
    reference_sequence_id: Option<usize>,
    alignment_start: Option<usize>,
    mapping_quality: Option<u8>,
    cigar: Option<String>,
    sequence: Vec<u8>,
    tags: Vec<(Tag, BufValue)>,
    mate_reference_sequence_id: Option<usize>,
    mate_alignment_start: Option<usize>,
    template_length: i32,
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordBuilder {
    /// Creates a new builder with no placement and mapping quality 60.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            flags: Flags::empty(),
            reference_sequence_id: None,
            alignment_start: None,
            mapping_quality: Some(60),
            cigar: None,
            sequence: Vec::new(),
            tags: Vec::new(),
            mate_reference_sequence_id: None,
            mate_alignment_start: None,
            template_length: 0,
        }
    }

    /// Creates a builder for a read mapped to reference 0 at position 1 with a `50M` CIGAR.
    #[must_use]
    pub fn mapped_read() -> Self {
        Self {
            reference_sequence_id: Some(0),
            alignment_start: Some(1),
            cigar: Some("50M".to_string()),
            ..Self::new()
        }
    }

    /// Sets the read name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Sets the sequence.
    #[must_use]
    pub fn sequence(mut self, seq: &str) -> Self {
        self.sequence = seq.as_bytes().to_vec();
        self
    }

    /// Sets all flags at once.
    #[must_use]
    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Marks the read as the first (`true`) or second (`false`) segment of a pair.
    #[must_use]
    pub fn first_segment(mut self, is_first: bool) -> Self {
        self.flags.set(Flags::SEGMENTED, true);
        self.flags.set(Flags::FIRST_SEGMENT, is_first);
        self.flags.set(Flags::LAST_SEGMENT, !is_first);
        self
    }

    /// Sets the properly paired flag.
    #[must_use]
    pub fn properly_paired(mut self, properly_paired: bool) -> Self {
        self.flags.set(Flags::PROPERLY_SEGMENTED, properly_paired);
        self
    }

    /// Sets the unmapped flag.
    #[must_use]
    pub fn unmapped(mut self, unmapped: bool) -> Self {
        self.flags.set(Flags::UNMAPPED, unmapped);
        if unmapped {
            self.cigar = None;
        }
        self
    }

    /// Sets the reverse complement flag.
    #[must_use]
    pub fn reverse_complement(mut self, reverse: bool) -> Self {
        self.flags.set(Flags::REVERSE_COMPLEMENTED, reverse);
        self
    }

    /// Sets the secondary alignment flag.
    #[must_use]
    pub fn secondary(mut self, secondary: bool) -> Self {
        self.flags.set(Flags::SECONDARY, secondary);
        self
    }

    /// Sets the supplementary alignment flag.
    #[must_use]
    pub fn supplementary(mut self, supplementary: bool) -> Self {
        self.flags.set(Flags::SUPPLEMENTARY, supplementary);
        self
    }

    /// Sets the duplicate flag.
    #[must_use]
    pub fn duplicate(mut self, duplicate: bool) -> Self {
        self.flags.set(Flags::DUPLICATE, duplicate);
        self
    }

    /// Sets the reference sequence ID (0-based).
    #[must_use]
    pub fn reference_sequence_id(mut self, id: usize) -> Self {
        self.reference_sequence_id = Some(id);
        self
    }

    /// Sets the alignment start position (1-based).
    #[must_use]
    pub fn alignment_start(mut self, pos: usize) -> Self {
        self.alignment_start = Some(pos);
        self
    }

    /// Sets the mapping quality.
    #[must_use]
    pub fn mapping_quality(mut self, mapq: u8) -> Self {
        self.mapping_quality = Some(mapq);
        self
    }

    /// Sets the CIGAR string.
    #[must_use]
    pub fn cigar(mut self, cigar: &str) -> Self {
        self.cigar = Some(cigar.to_string());
        self
    }

    /// Sets the mate's reference sequence ID and 1-based start.
    #[must_use]
    pub fn mate(mut self, reference_sequence_id: usize, alignment_start: usize) -> Self {
        self.mate_reference_sequence_id = Some(reference_sequence_id);
        self.mate_alignment_start = Some(alignment_start);
        self
    }

    /// Sets the mate unmapped flag.
    #[must_use]
    pub fn mate_unmapped(mut self, unmapped: bool) -> Self {
        self.flags.set(Flags::MATE_UNMAPPED, unmapped);
        self
    }

    /// Sets the template length (insert size).
    #[must_use]
    pub fn template_length(mut self, tlen: i32) -> Self {
        self.template_length = tlen;
        self
    }

    /// Adds a SAM tag; tags that are not two characters long are ignored.
    #[must_use]
    pub fn tag<V: Into<BufValue>>(mut self, tag: &str, value: V) -> Self {
        if let [a, b] = tag.as_bytes() {
            self.tags.push((Tag::from([*a, *b]), value.into()));
        }
        self
    }

    /// Builds the `RecordBuf`.
    ///
    /// # Panics
    ///
    /// Panics on a zero position, an invalid mapping quality or an invalid CIGAR.
    #[must_use]
    pub fn build(self) -> RecordBuf {
        let mut record = RecordBuf::default();

        *record.name_mut() = self.name.map(BString::from);
        *record.flags_mut() = self.flags;
        *record.reference_sequence_id_mut() = self.reference_sequence_id;
        *record.alignment_start_mut() = self
            .alignment_start
            .map(|pos| Position::try_from(pos).expect("alignment_start must be >= 1"));
        *record.mate_reference_sequence_id_mut() = self.mate_reference_sequence_id;
        *record.mate_alignment_start_mut() = self
            .mate_alignment_start
            .map(|pos| Position::try_from(pos).expect("mate_alignment_start must be >= 1"));
        *record.template_length_mut() = self.template_length;
        *record.mapping_quality_mut() = self
            .mapping_quality
            .map(|mapq| MappingQuality::try_from(mapq).expect("mapping_quality must be valid"));

        let ops = self.cigar.as_deref().map(parse_cigar).unwrap_or_default();
        let sequence = if self.sequence.is_empty() {
            b"ACGT".iter().copied().cycle().take(query_length(&ops)).collect()
        } else {
            self.sequence
        };
        *record.quality_scores_mut() = QualityScores::from(vec![DEFAULT_BASE_QUALITY; sequence.len()]);
        *record.sequence_mut() = Sequence::from(sequence);
        *record.cigar_mut() = ops.into_iter().collect();

        for (tag, value) in self.tags {
            record.data_mut().insert(tag, value);
        }
        record
    }
}

/// Builds a properly paired, forward/reverse read pair with `50M` alignments.
///
/// Each mate is given as `(reference_sequence_id, alignment_start)`.
#[must_use]
pub fn mapped_pair(name: &str, r1: (usize, usize), r2: (usize, usize)) -> (RecordBuf, RecordBuf) {
    let same_contig = r1.0 == r2.0;
    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    let tlen = if same_contig { (r2.1 + 50) as i32 - r1.1 as i32 } else { 0 };

    let first = RecordBuilder::mapped_read()
        .name(name)
        .first_segment(true)
        .properly_paired(same_contig)
        .reference_sequence_id(r1.0)
        .alignment_start(r1.1)
        .mate(r2.0, r2.1)
        .template_length(tlen)
        .build();
    let second = RecordBuilder::mapped_read()
        .name(name)
        .first_segment(false)
        .properly_paired(same_contig)
        .reverse_complement(true)
        .reference_sequence_id(r2.0)
        .alignment_start(r2.1)
        .mate(r1.0, r1.1)
        .template_length(-tlen)
        .build();
    (first, second)
}
