//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`.

use std::path::PathBuf;

use clap::Args;

use fgslice_lib::slice::consolidate::DEFAULT_CONSOLIDATION_DISTANCE;
use fgslice_lib::slice::remote::DEFAULT_REMOTE_GROUP_DISTANCE;
use fgslice_lib::slice::slicer::DEFAULT_PARTITION_SIZE;
use fgslice_lib::validation::{find_bam_index, validate_file_exists};

/// Common input/output options for commands that read an indexed BAM and write a BAM.
#[derive(Debug, Clone, Args)]
pub struct BamIoOptions {
    /// Input BAM file; must be coordinate sorted with a BAI or CSI index alongside it
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output BAM file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

impl BamIoOptions {
    /// Validates that the input file and its index exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the input file or its index does not exist.
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_file_exists(&self.input, "Input BAM")?;
        find_bam_index(&self.input)?;
        Ok(())
    }
}

/// Threading options.
#[derive(Debug, Clone, Args)]
pub struct ThreadingOptions {
    /// Number of worker threads for scanning partitions and contigs.
    ///
    /// Values above one also enable multi-threaded BGZF compression of the output.
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    pub threads: usize,
}

impl Default for ThreadingOptions {
    fn default() -> Self {
        Self { threads: 1 }
    }
}

impl ThreadingOptions {
    /// Creates options for `threads` worker threads.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        Self { threads }
    }

    /// Returns the number of threads, treating zero as one.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.threads.max(1)
    }

    /// Returns a log-friendly description of the threading configuration.
    #[must_use]
    pub fn log_message(&self) -> String {
        match self.num_threads() {
            1 => "Using a single thread".to_string(),
            n => format!("Using {n} threads"),
        }
    }
}

/// Options for output compression.
///
/// Controls BGZF compression level for BAM output files.
#[derive(Debug, Clone, Args)]
pub struct CompressionOptions {
    /// Compression level for output BAM (0-9).
    ///
    /// Level 1 is fastest with larger files.
    /// Level 9 produces smallest files but is slowest.
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub compression_level: u8,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self { compression_level: 5 }
    }
}

/// Sizes, distances and record budgets of the two slicing phases.
#[derive(Debug, Clone, Args)]
pub struct SliceLimitsOptions {
    /// Maximum length in bases of a phase-one partition
    #[arg(long = "partition-size", default_value_t = DEFAULT_PARTITION_SIZE)]
    pub partition_size: usize,

    /// Pending positions within this distance of each other form one consolidated region
    #[arg(long = "consolidation-distance", default_value_t = DEFAULT_CONSOLIDATION_DISTANCE)]
    pub consolidation_distance: usize,

    /// Pending positions within this distance of each other are fetched in one remote scan
    #[arg(long = "remote-group-distance", default_value_t = DEFAULT_REMOTE_GROUP_DISTANCE)]
    pub remote_group_distance: usize,

    /// Stop scanning a partition after this many records
    #[arg(long = "max-partition-records")]
    pub max_partition_records: Option<u64>,

    /// Stop resolving a contig's pending records after scanning this many records
    #[arg(long = "max-remote-records")]
    pub max_remote_records: Option<u64>,
}

impl Default for SliceLimitsOptions {
    fn default() -> Self {
        Self {
            partition_size: DEFAULT_PARTITION_SIZE,
            consolidation_distance: DEFAULT_CONSOLIDATION_DISTANCE,
            remote_group_distance: DEFAULT_REMOTE_GROUP_DISTANCE,
            max_partition_records: None,
            max_remote_records: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_num_threads() {
        assert_eq!(ThreadingOptions::default().num_threads(), 1);
        assert_eq!(ThreadingOptions::new(0).num_threads(), 1);
        assert_eq!(ThreadingOptions::new(8).num_threads(), 8);
    }

    #[test]
    fn test_log_message() {
        assert_eq!(ThreadingOptions::new(1).log_message(), "Using a single thread");
        assert!(ThreadingOptions::new(8).log_message().contains("8 threads"));
    }

    #[test]
    fn test_bam_io_validate_requires_index() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.bam");
        File::create(&input).unwrap();
        let opts = BamIoOptions { input: input.clone(), output: dir.path().join("out.bam") };
        assert!(opts.validate().is_err());

        File::create(dir.path().join("in.bam.bai")).unwrap();
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_bam_io_validate_missing_input() {
        let dir = TempDir::new().unwrap();
        let opts = BamIoOptions {
            input: dir.path().join("missing.bam"),
            output: dir.path().join("out.bam"),
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_slice_limits_defaults() {
        let opts = SliceLimitsOptions::default();
        assert_eq!(opts.partition_size, 1_000_000);
        assert_eq!(opts.consolidation_distance, 10_000);
        assert_eq!(opts.remote_group_distance, 300);
        assert!(opts.max_partition_records.is_none());
    }
}
