//! Parsing of the `SA` (other canonical alignments) tag.
//!
//! The tag holds one `rname,pos,strand,CIGAR,mapQ,NM;` entry per other alignment of the read. On a
//! primary record the entries are its supplementary alignments; on a supplementary record the
//! first entry is the primary alignment.

use std::str::FromStr;

use log::debug;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::data::field::Value;

use crate::errors::{Result, SliceError};

/// The `SA` tag.
pub const SA_TAG: Tag = Tag::OTHER_ALIGNMENTS;

/// One entry of an `SA` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternateAlignment {
    /// Reference sequence name
    pub contig: String,
    /// 1-based alignment start
    pub position: usize,
    /// Whether the alignment is on the reverse strand
    pub reverse: bool,
    /// CIGAR of the alignment
    pub cigar: String,
    /// Mapping quality
    pub mapping_quality: u8,
    /// Edit distance (`NM`)
    pub edit_distance: u32,
}

impl FromStr for AlternateAlignment {
    type Err = SliceError;

    fn from_str(entry: &str) -> Result<Self> {
        let malformed = |reason: &str| SliceError::MalformedSupplementaryTag {
            entry: entry.to_string(),
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = entry.split(',').collect();
        let [contig, position, strand, cigar, mapq, nm] = fields.as_slice() else {
            return Err(malformed("expected 6 comma-separated fields"));
        };

        if contig.is_empty() {
            return Err(malformed("empty reference name"));
        }
        let position: usize = position.parse().map_err(|_| malformed("invalid position"))?;
        if position == 0 {
            return Err(malformed("position must be >= 1"));
        }
        let reverse = match *strand {
            "+" => false,
            "-" => true,
            _ => return Err(malformed("strand must be '+' or '-'")),
        };
        if cigar.is_empty() {
            return Err(malformed("empty CIGAR"));
        }

        Ok(Self {
            contig: (*contig).to_string(),
            position,
            reverse,
            cigar: (*cigar).to_string(),
            mapping_quality: mapq.parse().map_err(|_| malformed("invalid mapping quality"))?,
            edit_distance: nm.parse().map_err(|_| malformed("invalid edit distance"))?,
        })
    }
}

/// Parse an `SA` tag value into its entries; empty entries are ignored.
///
/// # Errors
/// Returns [`SliceError::MalformedSupplementaryTag`] for the first malformed entry
///
/// # Example
/// ```
/// use fgslice_lib::sam::parse_sa_tag;
///
/// let entries = parse_sa_tag("chr2,500,+,75M,60,0;chr3,10,-,30S45M,20,1;").unwrap();
/// assert_eq!(entries.len(), 2);
/// assert_eq!(entries[1].contig, "chr3");
/// assert!(entries[1].reverse);
/// ```
pub fn parse_sa_tag(value: &str) -> Result<Vec<AlternateAlignment>> {
    value.split(';').map(str::trim).filter(|e| !e.is_empty()).map(str::parse).collect()
}

/// The record's raw `SA` tag text, if present and a string.
#[must_use]
pub fn sa_tag_value(record: &RecordBuf) -> Option<String> {
    match record.data().get(&SA_TAG) {
        Some(Value::String(s)) => Some(s.to_string()),
        _ => None,
    }
}

/// The record's alternate alignments.
///
/// A malformed tag is logged at debug level and treated as absent.
#[must_use]
pub fn alternate_alignments(record: &RecordBuf) -> Vec<AlternateAlignment> {
    let Some(value) = sa_tag_value(record) else {
        return Vec::new();
    };
    parse_sa_tag(&value).unwrap_or_else(|e| {
        debug!(
            "Ignoring SA tag on {}: {e}",
            record.name().map_or_else(|| "*".to_string(), |n| n.to_string())
        );
        Vec::new()
    })
}
