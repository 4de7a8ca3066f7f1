//! Phase-one scan of a single partition.

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;

use super::registry::FragmentRegistry;
use super::scanner::{RecordScanner, ScanControl};
use super::sink::OutputSink;
use crate::metrics::PartitionMetrics;
use crate::progress::ProgressTracker;
use crate::region::GenomicRegion;
use crate::sam::record_utils::aligned_span;
use crate::sam::sa_tag::sa_tag_value;

/// Per-partition scan limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerLimits {
    /// Records to scan before the partition is abandoned
    pub max_records: Option<u64>,
    /// Only keep records that are supplementary or carry an `SA` tag
    pub only_supplementaries: bool,
}

/// Whether a record is one piece of a split alignment.
#[must_use]
pub fn is_split_read(record: &RecordBuf) -> bool {
    record.flags().is_supplementary() || sa_tag_value(record).is_some()
}

/// Scans one partition, offering every record it owns to the registry and writing those that are
/// newly seen.
///
/// A record belongs to the first partition (in contig order) that its aligned span overlaps, so a
/// record straddling a partition boundary is written by the earlier one.
pub struct PartitionWorker<'a> {
    index: usize,
    partitions: &'a [GenomicRegion],
    registry: &'a FragmentRegistry,
    sink: &'a dyn OutputSink,
    header: &'a Header,
    limits: WorkerLimits,
    progress: Option<&'a ProgressTracker>,
}

impl<'a> PartitionWorker<'a> {
    /// Creates a worker for `partitions[index]`.
    ///
    /// `partitions` must be sorted in header order and disjoint, as produced by
    /// [`crate::region::split_into_partitions`].
    #[must_use]
    pub fn new(
        index: usize,
        partitions: &'a [GenomicRegion],
        registry: &'a FragmentRegistry,
        sink: &'a dyn OutputSink,
        header: &'a Header,
    ) -> Self {
        Self {
            index,
            partitions,
            registry,
            sink,
            header,
            limits: WorkerLimits::default(),
            progress: None,
        }
    }

    /// Sets the scan limits.
    #[must_use]
    pub fn with_limits(mut self, limits: WorkerLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Reports scanned records to a shared progress tracker.
    #[must_use]
    pub fn with_progress(mut self, progress: &'a ProgressTracker) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Whether this worker's partition owns the record.
    fn owns(&self, partition: &GenomicRegion, record: &RecordBuf) -> bool {
        let Some((start, end)) = aligned_span(record) else {
            return false;
        };
        if !(start <= partition.end && end >= partition.start) {
            return false;
        }
        for earlier in self.partitions[..self.index].iter().rev() {
            if earlier.contig != partition.contig || earlier.end < start {
                break;
            }
            if earlier.overlaps(&partition.contig, start, end) {
                return false;
            }
        }
        true
    }

    /// Scans the partition to completion or until the record budget is spent.
    ///
    /// # Errors
    /// Returns an error if the partition index is out of range or the scan fails.
    pub fn run<R: RecordScanner + ?Sized>(&self, scanner: &mut R) -> Result<PartitionMetrics> {
        let partition = self
            .partitions
            .get(self.index)
            .ok_or_else(|| anyhow!("Partition index {} out of range", self.index))?;
        let mut metrics = PartitionMetrics::default();

        scanner
            .scan(partition, &mut |record| {
                if self.limits.max_records.is_some_and(|max| metrics.records_scanned >= max) {
                    metrics.truncated = true;
                    return ScanControl::Halt;
                }
                metrics.records_scanned += 1;
                if let Some(progress) = self.progress {
                    progress.record(1);
                }

                if !self.owns(partition, record) {
                    metrics.ownership_skips += 1;
                } else if self.limits.only_supplementaries && !is_split_read(record) {
                    metrics.filtered += 1;
                } else if self.registry.ingest_record(record, self.header) {
                    self.sink.emit(record);
                    metrics.records_written += 1;
                } else {
                    metrics.duplicates += 1;
                }
                ScanControl::Continue
            })
            .with_context(|| format!("Failed to scan partition {partition}"))?;

        if metrics.truncated {
            info!(
                "Partition {partition} reached its budget of {} records; remaining records skipped",
                metrics.records_scanned
            );
        }
        debug!(
            "Partition {partition}: scanned {}, wrote {}, duplicates {}",
            metrics.records_scanned, metrics.records_written, metrics.duplicates
        );
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::split_into_partitions;
    use crate::sam::builder::{RecordBuilder, create_header, mapped_pair};
    use crate::slice::scanner::{RecordStore, ScannerSource};
    use crate::slice::sink::RecordCollector;

    fn two_partitions() -> Vec<GenomicRegion> {
        split_into_partitions(&[GenomicRegion::new("chr1", 1, 200)], 100)
    }

    fn run_all(
        store: &RecordStore,
        partitions: &[GenomicRegion],
        registry: &FragmentRegistry,
        sink: &RecordCollector,
        limits: WorkerLimits,
    ) -> Vec<PartitionMetrics> {
        let header = store.header().clone();
        (0..partitions.len())
            .map(|i| {
                let mut scanner = store.clone();
                PartitionWorker::new(i, partitions, registry, sink, &header)
                    .with_limits(limits)
                    .run(&mut scanner)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_straddling_record_written_by_earlier_partition() {
        let header = create_header(&[("chr1", 10_000)]);
        let (r1, r2) = mapped_pair("frag", (0, 80), (0, 150));
        let store = RecordStore::new(header, vec![r1, r2]);
        let partitions = two_partitions();
        let registry = FragmentRegistry::new();
        let sink = RecordCollector::new();

        let metrics = run_all(&store, &partitions, &registry, &sink, WorkerLimits::default());

        assert_eq!(sink.records().len(), 2);
        assert_eq!(metrics[0].records_written, 1);
        assert_eq!(metrics[1].records_written, 1);
        assert_eq!(metrics[1].ownership_skips, 1);
        assert!(registry.is_empty());
        assert_eq!(registry.completed_fragments(), 1);
    }

    #[test]
    fn test_record_budget_halts_scan() {
        let header = create_header(&[("chr1", 10_000)]);
        let records = (0..5)
            .map(|i| {
                RecordBuilder::mapped_read().name(&format!("r{i}")).alignment_start(10 + i).build()
            })
            .collect();
        let store = RecordStore::new(header, records);
        let partitions = vec![GenomicRegion::new("chr1", 1, 1000)];
        let registry = FragmentRegistry::new();
        let sink = RecordCollector::new();
        let limits = WorkerLimits { max_records: Some(3), only_supplementaries: false };

        let metrics = run_all(&store, &partitions, &registry, &sink, limits);

        assert_eq!(metrics[0].records_scanned, 3);
        assert!(metrics[0].truncated);
        assert_eq!(sink.records().len(), 3);
    }

    #[test]
    fn test_budget_equal_to_record_count_is_not_truncated() {
        let header = create_header(&[("chr1", 10_000)]);
        let records = (0..3)
            .map(|i| {
                RecordBuilder::mapped_read().name(&format!("r{i}")).alignment_start(10 + i).build()
            })
            .collect();
        let store = RecordStore::new(header, records);
        let partitions = vec![GenomicRegion::new("chr1", 1, 1000)];
        let limits = WorkerLimits { max_records: Some(3), only_supplementaries: false };

        let metrics =
            run_all(&store, &partitions, &FragmentRegistry::new(), &RecordCollector::new(), limits);

        assert_eq!(metrics[0].records_scanned, 3);
        assert!(!metrics[0].truncated);
    }

    #[test]
    fn test_only_supplementaries_filter() {
        let header = create_header(&[("chr1", 10_000)]);
        let plain = RecordBuilder::mapped_read().name("plain").alignment_start(10).build();
        let split = RecordBuilder::mapped_read()
            .name("split")
            .alignment_start(20)
            .tag("SA", "chr1,500,+,20S30M,60,0;")
            .build();
        let supplementary = RecordBuilder::mapped_read()
            .name("supp")
            .supplementary(true)
            .alignment_start(30)
            .cigar("20H30M")
            .build();
        let store = RecordStore::new(header, vec![plain, split, supplementary]);
        let partitions = vec![GenomicRegion::new("chr1", 1, 1000)];
        let sink = RecordCollector::new();
        let limits = WorkerLimits { max_records: None, only_supplementaries: true };

        let metrics = run_all(&store, &partitions, &FragmentRegistry::new(), &sink, limits);

        assert_eq!(metrics[0].filtered, 1);
        assert_eq!(metrics[0].records_written, 2);
        let names: Vec<String> =
            sink.records().iter().filter_map(|r| r.name().map(|n| n.to_string())).collect();
        assert_eq!(names, ["split", "supp"]);
    }

    #[test]
    fn test_rescan_counts_duplicates() {
        let header = create_header(&[("chr1", 10_000)]);
        let (r1, _) = mapped_pair("frag", (0, 100), (0, 5000));
        let store = RecordStore::new(header, vec![r1]);
        let partitions = vec![GenomicRegion::new("chr1", 1, 1000)];
        let registry = FragmentRegistry::new();
        let sink = RecordCollector::new();

        run_all(&store, &partitions, &registry, &sink, WorkerLimits::default());
        let second = run_all(&store, &partitions, &registry, &sink, WorkerLimits::default());

        assert_eq!(second[0].duplicates, 1);
        assert_eq!(sink.records().len(), 1);
        assert_eq!(registry.live_fragments(), 1);
    }

    #[test]
    fn test_is_split_read() {
        let plain = RecordBuilder::mapped_read().build();
        let tagged = RecordBuilder::mapped_read().tag("SA", "chr1,1,+,50M,60,0;").build();
        let supplementary = RecordBuilder::mapped_read().supplementary(true).build();
        assert!(!is_split_read(&plain));
        assert!(is_split_read(&tagged));
        assert!(is_split_read(&supplementary));
    }
}
