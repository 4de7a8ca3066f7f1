//! SAM/BAM record utilities.
//!
//! - [`record_utils`] - names, spans and CIGAR rendering for individual records
//! - [`sa_tag`] - parsing of the `SA` (other alignments) tag
//! - [`builder`] - fluent construction of `RecordBuf`s and headers for tests and benchmarks

pub mod builder;
pub mod record_utils;
pub mod sa_tag;

pub use builder::{RecordBuilder, create_header, mapped_pair, parse_cigar};
pub use record_utils::{
    aligned_span, alignment_end, cigar_to_string, contig_name, read_name, reference_length,
};
pub use sa_tag::{AlternateAlignment, SA_TAG, alternate_alignments, parse_sa_tag, sa_tag_value};
