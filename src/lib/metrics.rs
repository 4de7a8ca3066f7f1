//! Slice metrics.
//!
//! Each phase-one and phase-two task accumulates its own counters locally; they are merged into a
//! single [`SliceMetrics`] row after each phase barrier and optionally written as TSV.

use anyhow::{Context, Result};
use fgoxide::io::DelimFile;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Counters gathered by a single partition worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionMetrics {
    /// Records returned by the scan primitive for this partition
    pub records_scanned: u64,
    /// Records forwarded to the output sink
    pub records_written: u64,
    /// Records the registry had already seen
    pub duplicates: u64,
    /// Records owned by an earlier partition on the same contig
    pub ownership_skips: u64,
    /// Records dropped by the supplementary-only filter
    pub filtered: u64,
    /// Whether the record budget halted the scan
    pub truncated: bool,
}

/// Counters gathered by a single remote resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteMetrics {
    /// Windows scanned
    pub groups: u64,
    /// Pending positions dropped because they lie in excluded regions
    pub excluded_positions: u64,
    /// Records returned by the scan primitive
    pub records_scanned: u64,
    /// Records matching a live pending entry
    pub records_matched: u64,
    /// Records forwarded to the output sink
    pub records_written: u64,
    /// Whether the per-contig cap halted the resolver
    pub truncated: bool,
}

/// Summary of a complete slice run; written as a single TSV row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceMetrics {
    /// Number of phase-one partitions
    pub partitions: u64,
    /// Records scanned in phase one
    pub phase_one_records_scanned: u64,
    /// Records written in phase one
    pub phase_one_records_written: u64,
    /// Records rejected as already seen
    pub duplicate_records: u64,
    /// Records skipped because an earlier partition owns them
    pub ownership_skips: u64,
    /// Records dropped by the supplementary-only filter
    pub filtered_records: u64,
    /// Partitions halted by the record budget
    pub truncated_partitions: u64,
    /// Pending positions left after phase one
    pub pending_positions: u64,
    /// Regions produced by consolidation
    pub consolidated_regions: u64,
    /// Windows scanned in phase two
    pub remote_groups: u64,
    /// Pending positions skipped because they lie in excluded regions
    pub remote_excluded_positions: u64,
    /// Records scanned in phase two
    pub remote_records_scanned: u64,
    /// Records matched to a pending entry in phase two
    pub remote_records_matched: u64,
    /// Records written in phase two
    pub remote_records_written: u64,
    /// Contigs whose resolver was halted by the record cap
    pub truncated_remote_contigs: u64,
    /// Fragments that became complete
    pub fragments_completed: u64,
    /// Fragments still incomplete with at least one missing piece outside excluded regions
    pub fragments_unresolved: u64,
    /// Fragments still incomplete whose missing pieces all lie in excluded regions
    pub fragments_excluded: u64,
    /// Missing records of unresolved fragments that lay inside a region scanned in phase two
    pub missing_records_searched: u64,
    /// Missing records of unresolved fragments that no phase-two region covered
    pub missing_records_unsearched: u64,
    /// Failed writes to the BAM output or reads table
    pub write_failures: u64,
}

impl SliceMetrics {
    /// Folds one partition worker's counters into the totals.
    pub fn add_partition(&mut self, partition: &PartitionMetrics) {
        self.phase_one_records_scanned += partition.records_scanned;
        self.phase_one_records_written += partition.records_written;
        self.duplicate_records += partition.duplicates;
        self.ownership_skips += partition.ownership_skips;
        self.filtered_records += partition.filtered;
        self.truncated_partitions += u64::from(partition.truncated);
    }

    /// Folds one remote resolver's counters into the totals.
    pub fn add_remote(&mut self, remote: &RemoteMetrics) {
        self.remote_groups += remote.groups;
        self.remote_excluded_positions += remote.excluded_positions;
        self.remote_records_scanned += remote.records_scanned;
        self.remote_records_matched += remote.records_matched;
        self.remote_records_written += remote.records_written;
        self.truncated_remote_contigs += u64::from(remote.truncated);
    }

    /// Total records written across both phases.
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.phase_one_records_written + self.remote_records_written
    }
}

/// Write the slice metrics to a TSV file.
///
/// # Errors
/// Returns an error if the file cannot be created or written to
pub fn write_slice_metrics<P: AsRef<Path>>(path: P, metrics: &SliceMetrics) -> Result<()> {
    let path_ref = path.as_ref();
    DelimFile::default()
        .write_tsv(&path_ref, std::slice::from_ref(metrics))
        .with_context(|| format!("Failed to write slice metrics: {}", path_ref.display()))
}
