//! Custom error types for fgslice operations.

use thiserror::Error;

/// Result type alias for fgslice operations
pub type Result<T> = std::result::Result<T, SliceError>;

/// Error type for fgslice operations
#[derive(Error, Debug)]
pub enum SliceError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// A region string or BED line could not be parsed
    #[error("Invalid region '{region}': {reason}")]
    InvalidRegion {
        /// The offending region text
        region: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Required reference sequence not found
    #[error("Reference sequence '{ref_name}' not found in header")]
    ReferenceNotFound {
        /// The reference sequence name
        ref_name: String,
    },

    /// The input BAM has no index alongside it
    #[error("No BAI or CSI index found for '{path}' (expected '{path}.bai' or '{path}.csi')")]
    MissingIndex {
        /// Path to the BAM file
        path: String,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "BAM", "BED")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// An `SA` tag entry that does not follow `contig,pos,strand,cigar,mapq,nm`
    #[error("Malformed SA tag entry '{entry}': {reason}")]
    MalformedSupplementaryTag {
        /// The offending entry
        entry: String,
        /// Explanation of the problem
        reason: String,
    },
}
