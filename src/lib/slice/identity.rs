//! Read identities and the expectations a record implies about the rest of its fragment.

use std::fmt;

use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::record::Flags;

use crate::sam::record_utils::{cigar_to_string, contig_name, read_name};
use crate::sam::sa_tag::{AlternateAlignment, alternate_alignments};

/// Contig name used for records without a reference sequence.
pub const UNPLACED_CONTIG: &str = "*";

/// Whether an alignment is the primary one for its read or a supplementary (split) piece.
///
/// Only supplementary alignments carry a CIGAR; several supplementary pieces of the same read may
/// share a start position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// The read's primary alignment
    Primary,
    /// A supplementary alignment with its CIGAR (hard clips written as soft clips)
    Supplementary {
        /// Normalized CIGAR text
        cigar: String,
    },
}

impl Role {
    /// Supplementary role for a CIGAR as written in a record or an `SA` entry.
    #[must_use]
    pub fn supplementary(cigar: &str) -> Self {
        Self::Supplementary { cigar: cigar.replace('H', "S") }
    }
}

/// Which read of a pair a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairSlot {
    /// First segment (R1)
    First,
    /// Second segment (R2)
    Second,
    /// Not paired
    Unpaired,
}

impl PairSlot {
    /// Derives the slot from SAM flags; paired reads without the first-segment flag are R2.
    #[must_use]
    pub fn from_flags(flags: Flags) -> Self {
        if !flags.is_segmented() {
            Self::Unpaired
        } else if flags.is_first_segment() {
            Self::First
        } else {
            Self::Second
        }
    }

    /// The mate's slot.
    #[must_use]
    pub fn mate(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
            Self::Unpaired => Self::Unpaired,
        }
    }
}

/// Distinguishes one physical alignment record within a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadIdentity {
    /// Primary or supplementary
    pub role: Role,
    /// R1, R2 or unpaired
    pub slot: PairSlot,
    /// Secondary alignment flag
    pub secondary: bool,
    /// Reference sequence name, or `*`
    pub contig: String,
    /// 1-based alignment start, or 0 when unplaced
    pub position: usize,
}

impl ReadIdentity {
    /// A non-secondary primary alignment.
    #[must_use]
    pub fn primary(slot: PairSlot, contig: impl Into<String>, position: usize) -> Self {
        Self { role: Role::Primary, slot, secondary: false, contig: contig.into(), position }
    }

    /// The supplementary alignment described by an `SA` entry.
    #[must_use]
    pub fn supplementary(slot: PairSlot, alignment: &AlternateAlignment) -> Self {
        Self {
            role: Role::supplementary(&alignment.cigar),
            slot,
            secondary: false,
            contig: alignment.contig.clone(),
            position: alignment.position,
        }
    }

    /// Whether this identity counts towards fragment completeness.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.role == Role::Primary && !self.secondary
    }
}

impl fmt::Display for ReadIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = match self.slot {
            PairSlot::First => "R1",
            PairSlot::Second => "R2",
            PairSlot::Unpaired => "fragment",
        };
        write!(f, "{slot} ")?;
        match &self.role {
            Role::Primary => write!(f, "primary")?,
            Role::Supplementary { cigar } => write!(f, "supplementary {cigar}")?,
        }
        write!(f, " at {}:{}", self.contig, self.position)
    }
}

/// Where a record says its mate is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MateLocation {
    /// Mate reference and 1-based start are known
    Present {
        /// Mate reference sequence name
        contig: String,
        /// Mate 1-based start
        position: usize,
    },
    /// The record carries no mate placement
    Absent,
}

impl MateLocation {
    /// Reads the mate location from the record's own mate fields.
    #[must_use]
    pub fn from_mate_fields(record: &RecordBuf, header: &Header) -> Self {
        let contig = record.mate_reference_sequence_id().and_then(|id| contig_name(header, id));
        match (contig, record.mate_alignment_start()) {
            (Some(contig), Some(start)) => Self::Present { contig, position: usize::from(start) },
            _ => Self::Absent,
        }
    }

    /// Mate location recovered from an `SA` entry.
    #[must_use]
    pub fn from_alternate(alignment: Option<&AlternateAlignment>) -> Self {
        alignment.map_or(Self::Absent, |a| Self::Present {
            contig: a.contig.clone(),
            position: a.position,
        })
    }
}

/// Everything derived from one record before it is offered to the registry.
///
/// Derivation happens outside the registry lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedRead {
    /// Query name shared by all records of the fragment
    pub fragment_id: String,
    /// This record's identity
    pub identity: ReadIdentity,
    /// Paired flag
    pub paired: bool,
    /// Identities the fragment must also contain
    pub expected: Vec<ReadIdentity>,
}

impl ObservedRead {
    /// Derives the identity and expectations of a record; `None` for records without a name.
    ///
    /// Expected mate: `{Primary, mate slot}` at the record's mate fields, except for a
    /// supplementary record whose mate is unmapped, whose mate fields point at itself; the first
    /// `SA` entry (its primary) is used instead. Expected supplementaries: a primary expects one
    /// supplementary per `SA` entry; a supplementary expects its own primary from the first entry.
    /// Secondary records expect nothing.
    #[must_use]
    pub fn from_record(record: &RecordBuf, header: &Header) -> Option<Self> {
        let fragment_id = read_name(record)?;
        let flags = record.flags();
        let slot = PairSlot::from_flags(flags);
        let paired = flags.is_segmented();
        let supplementary = flags.is_supplementary();

        let contig = record
            .reference_sequence_id()
            .and_then(|id| contig_name(header, id))
            .unwrap_or_else(|| UNPLACED_CONTIG.to_string());
        let position = record.alignment_start().map_or(0, usize::from);
        let role =
            if supplementary { Role::supplementary(&cigar_to_string(record)) } else { Role::Primary };
        let identity = ReadIdentity { role, slot, secondary: flags.is_secondary(), contig, position };

        if identity.secondary {
            return Some(Self { fragment_id, identity, paired, expected: Vec::new() });
        }

        let alternates = alternate_alignments(record);
        let mut expected = Vec::with_capacity(alternates.len() + 1);

        if paired {
            let mate = if supplementary && flags.is_mate_unmapped() {
                MateLocation::from_alternate(alternates.first())
            } else {
                MateLocation::from_mate_fields(record, header)
            };
            if let MateLocation::Present { contig, position } = mate {
                expected.push(ReadIdentity::primary(slot.mate(), contig, position));
            }
        }

        if supplementary {
            if let Some(primary) = alternates.first() {
                expected.push(ReadIdentity::primary(slot, primary.contig.clone(), primary.position));
            }
        } else {
            expected.extend(alternates.iter().map(|a| ReadIdentity::supplementary(slot, a)));
        }

        Some(Self { fragment_id, identity, paired, expected })
    }
}
