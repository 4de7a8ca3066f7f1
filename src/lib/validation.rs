//! Input validation utilities
//!
//! Common checks for command-line parameters and input files, reported through the
//! structured error types in [`crate::errors`].

use crate::errors::{Result, SliceError};
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Validate that a file exists
///
/// # Errors
/// Returns an error if the file does not exist
///
/// # Example
/// ```
/// use fgslice_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/file.bam", "Input file");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(SliceError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Locate the index for a BAM file.
///
/// Looks for `<bam>.bai`, then `<bam>.csi`, then the `.bam` extension swapped for `.bai`.
///
/// # Errors
/// Returns [`SliceError::MissingIndex`] if none of the candidate paths exist
pub fn find_bam_index<P: AsRef<Path>>(bam: P) -> Result<PathBuf> {
    let bam = bam.as_ref();
    let mut candidates = Vec::with_capacity(3);
    for ext in ["bai", "csi"] {
        let mut name = bam.as_os_str().to_owned();
        name.push(".");
        name.push(ext);
        candidates.push(PathBuf::from(name));
    }
    candidates.push(bam.with_extension("bai"));

    candidates.into_iter().find(|p| p.is_file()).ok_or_else(|| SliceError::MissingIndex {
        path: bam.display().to_string(),
    })
}

/// Validate that a value is positive (> 0)
///
/// # Errors
/// Returns an error if the value is not positive
///
/// # Example
/// ```
/// use fgslice_lib::validation::validate_positive;
///
/// validate_positive(10, "partition-size").unwrap();
///
/// let result = validate_positive(0, "partition-size");
/// assert!(result.is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_positive<T: Ord + Display + Default>(value: T, name: &str) -> Result<()> {
    if value <= T::default() {
        return Err(SliceError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be positive (> 0), got: {value}"),
        });
    }
    Ok(())
}

/// Validate that an optional cap, when present, is positive
///
/// # Errors
/// Returns an error if the value is `Some(0)`
pub fn validate_optional_positive(value: Option<u64>, name: &str) -> Result<()> {
    match value {
        Some(v) => validate_positive(v, name),
        None => Ok(()),
    }
}
