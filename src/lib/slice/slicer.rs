//! The two-phase slicing protocol.
//!
//! Phase one scans every partition of the target regions in parallel. Whatever the registry still
//! lacks afterwards is consolidated and handed, one contig at a time, to a [`RemoteResolver`] in
//! remote-only mode. Fragments that stay incomplete are reported at the end.

use anyhow::{Context, Result, bail};
use log::{debug, error, info, warn};
use rayon::prelude::*;

use super::consolidate::{ConsolidatedRegion, DEFAULT_CONSOLIDATION_DISTANCE, RegionConsolidator};
use super::identity::ReadIdentity;
use super::registry::{FragmentRegistry, IncompleteFragment};
use super::remote::{DEFAULT_REMOTE_GROUP_DISTANCE, RemoteLimits, RemoteResolver};
use super::scanner::ScannerSource;
use super::sink::OutputSink;
use super::worker::{PartitionWorker, WorkerLimits};
use crate::logging::format_count;
use crate::metrics::{PartitionMetrics, RemoteMetrics, SliceMetrics};
use crate::progress::ProgressTracker;
use crate::region::{
    GenomicRegion, RegionSet, merge_regions, split_into_partitions, whole_genome_regions,
};
use crate::validation::{validate_optional_positive, validate_positive};

/// Default partition size in bases.
pub const DEFAULT_PARTITION_SIZE: usize = 1_000_000;

/// Unresolved fragments logged at warn level; the rest go to debug.
const MAX_REPORTED_FRAGMENTS: usize = 100;

/// Library-level configuration of a slice run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceConfig {
    /// Maximum partition length in bases
    pub partition_size: usize,
    /// Gap within which pending positions are merged into one consolidated region
    pub consolidation_distance: usize,
    /// Gap within which pending positions are scanned as one phase-two window
    pub remote_group_distance: usize,
    /// Records to scan per partition before giving up on it
    pub max_partition_records: Option<u64>,
    /// Records to scan per contig in phase two before giving up on it
    pub max_remote_records: Option<u64>,
    /// Only keep records that are supplementary or carry an `SA` tag
    pub only_supplementaries: bool,
    /// Skip pending positions inside excluded regions in phase two
    pub drop_excluded: bool,
    /// Worker threads
    pub threads: usize,
    /// Scanned records between progress log lines
    pub progress_interval: u64,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            partition_size: DEFAULT_PARTITION_SIZE,
            consolidation_distance: DEFAULT_CONSOLIDATION_DISTANCE,
            remote_group_distance: DEFAULT_REMOTE_GROUP_DISTANCE,
            max_partition_records: None,
            max_remote_records: None,
            only_supplementaries: false,
            drop_excluded: false,
            threads: 1,
            progress_interval: 1_000_000,
        }
    }
}

impl SliceConfig {
    /// Checks that sizes and counts are positive.
    ///
    /// # Errors
    /// Returns [`crate::errors::SliceError::InvalidParameter`] naming the first bad setting.
    pub fn validate(&self) -> crate::errors::Result<()> {
        validate_positive(self.partition_size, "partition-size")?;
        validate_positive(self.threads, "threads")?;
        validate_positive(self.progress_interval, "progress-interval")?;
        validate_optional_positive(self.max_partition_records, "max-partition-records")?;
        validate_optional_positive(self.max_remote_records, "max-remote-records")?;
        Ok(())
    }

    fn worker_limits(&self) -> WorkerLimits {
        WorkerLimits {
            max_records: self.max_partition_records,
            only_supplementaries: self.only_supplementaries,
        }
    }

    fn remote_limits(&self) -> RemoteLimits {
        RemoteLimits {
            group_distance: self.remote_group_distance,
            max_records: self.max_remote_records,
            drop_excluded: self.drop_excluded,
        }
    }
}

/// Everything a run produced besides the records themselves.
#[derive(Debug, Clone, Default)]
pub struct SliceOutcome {
    /// Merged counters of both phases
    pub metrics: SliceMetrics,
    /// Pending positions after phase one, consolidated
    pub consolidated_regions: Vec<ConsolidatedRegion>,
    /// Fragments still incomplete with a missing piece outside the excluded regions
    pub unresolved: Vec<IncompleteFragment>,
    /// Fragments still incomplete whose missing pieces all lie in excluded regions
    pub excluded: Vec<IncompleteFragment>,
}

/// Runs both phases against a scanner source and writes to a sink.
pub struct Slicer<'a, S: ScannerSource> {
    source: &'a S,
    sink: &'a dyn OutputSink,
    config: SliceConfig,
    excluded: RegionSet,
}

impl<'a, S: ScannerSource> Slicer<'a, S> {
    /// Creates a slicer with no excluded regions.
    #[must_use]
    pub fn new(source: &'a S, sink: &'a dyn OutputSink, config: SliceConfig) -> Self {
        Self { source, sink, config, excluded: RegionSet::default() }
    }

    /// Regions whose missing records are expected and not reported as unresolved.
    #[must_use]
    pub fn with_excluded_regions(mut self, excluded: RegionSet) -> Self {
        self.excluded = excluded;
        self
    }

    /// Slices `targets`, or the whole genome when `targets` is empty.
    ///
    /// # Errors
    /// Returns an error on an invalid configuration or region, or when any task of a phase fails.
    /// Sibling tasks always run to completion before the failure is reported.
    pub fn run(&self, targets: &[GenomicRegion]) -> Result<SliceOutcome> {
        self.config.validate()?;
        let header = self.source.header();

        let regions = if targets.is_empty() {
            info!("No target regions given; slicing the whole genome");
            whole_genome_regions(header)
        } else {
            merge_regions(targets.to_vec(), header)?
        };
        let partitions = split_into_partitions(&regions, self.config.partition_size);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .context("Failed to build worker thread pool")?;
        let registry = FragmentRegistry::new();
        let mut metrics = SliceMetrics { partitions: partitions.len() as u64, ..SliceMetrics::default() };

        info!(
            "Phase one: scanning {} partitions from {} regions with {} threads",
            format_count(partitions.len() as u64),
            format_count(regions.len() as u64),
            self.config.threads
        );
        for partition in self.scan_partitions(&pool, &partitions, &registry)? {
            metrics.add_partition(&partition);
        }
        info!(
            "Phase one complete: wrote {} of {} scanned records; {} fragments complete, {} pending",
            format_count(metrics.phase_one_records_written),
            format_count(metrics.phase_one_records_scanned),
            format_count(registry.completed_fragments() as u64),
            format_count(registry.live_fragments() as u64)
        );

        registry.set_remote_only(true);
        let pending = registry.collect_pending_positions();
        metrics.pending_positions = pending.values().map(|p| p.len() as u64).sum();
        let consolidated_regions =
            RegionConsolidator::new(self.config.consolidation_distance).consolidate(&pending);
        metrics.consolidated_regions = consolidated_regions.len() as u64;

        if pending.is_empty() {
            info!("Phase two: nothing pending");
        } else {
            info!(
                "Phase two: resolving {} pending positions in {} regions on {} contigs",
                format_count(metrics.pending_positions),
                format_count(metrics.consolidated_regions),
                pending.len()
            );
            let progress = ProgressTracker::new("Phase two: scanned records")
                .with_interval(self.config.progress_interval);
            let results: Vec<(&String, Result<RemoteMetrics>)> = pool.install(|| {
                pending
                    .par_iter()
                    .map(|(contig, positions)| {
                        let result = self.source.open_scanner().and_then(|mut scanner| {
                            RemoteResolver::new(contig, positions, &registry, self.sink, header)
                                .with_limits(self.config.remote_limits())
                                .with_excluded(&self.excluded)
                                .with_progress(&progress)
                                .run(&mut scanner)
                        });
                        (contig, result)
                    })
                    .collect()
            });
            progress.log_final();

            let mut failures = 0;
            for (contig, result) in results {
                match result {
                    Ok(remote) => metrics.add_remote(&remote),
                    Err(e) => {
                        error!("Phase two failed on {contig}: {e:#}");
                        failures += 1;
                    }
                }
            }
            if failures > 0 {
                bail!("Phase two failed on {failures} of {} contigs", pending.len());
            }
        }

        let (unresolved, excluded) = self.classify(registry.incomplete_fragments());
        report_unresolved(&unresolved, &consolidated_regions);
        if !excluded.is_empty() {
            info!(
                "{} incomplete fragments are missing records only in excluded regions",
                format_count(excluded.len() as u64)
            );
        }

        metrics.fragments_completed = registry.completed_fragments() as u64;
        metrics.fragments_unresolved = unresolved.len() as u64;
        metrics.fragments_excluded = excluded.len() as u64;
        let (searched, unsearched) = count_missing_records(&unresolved, &consolidated_regions);
        metrics.missing_records_searched = searched;
        metrics.missing_records_unsearched = unsearched;
        metrics.write_failures = self.sink.failures();

        Ok(SliceOutcome { metrics, consolidated_regions, unresolved, excluded })
    }

    fn scan_partitions(
        &self,
        pool: &rayon::ThreadPool,
        partitions: &[GenomicRegion],
        registry: &FragmentRegistry,
    ) -> Result<Vec<PartitionMetrics>> {
        let header = self.source.header();
        let progress = ProgressTracker::new("Phase one: scanned records")
            .with_interval(self.config.progress_interval);
        let limits = self.config.worker_limits();

        let results: Vec<Result<PartitionMetrics>> = pool.install(|| {
            (0..partitions.len())
                .into_par_iter()
                .map(|index| {
                    let mut scanner = self.source.open_scanner()?;
                    PartitionWorker::new(index, partitions, registry, self.sink, header)
                        .with_limits(limits)
                        .with_progress(&progress)
                        .run(&mut scanner)
                })
                .collect()
        });
        progress.log_final();

        let mut merged = Vec::with_capacity(results.len());
        let mut failures = 0;
        for (partition, result) in partitions.iter().zip(results) {
            match result {
                Ok(metrics) => merged.push(metrics),
                Err(e) => {
                    error!("Phase one failed on {partition}: {e:#}");
                    failures += 1;
                }
            }
        }
        if failures > 0 {
            bail!("Phase one failed on {failures} of {} partitions", partitions.len());
        }
        Ok(merged)
    }

    /// Splits incomplete fragments into unresolved ones and ones missing only excluded records.
    fn classify(
        &self,
        incomplete: Vec<IncompleteFragment>,
    ) -> (Vec<IncompleteFragment>, Vec<IncompleteFragment>) {
        incomplete.into_iter().partition(|fragment| {
            fragment.missing.is_empty()
                || !fragment.missing.iter().all(|id| self.excluded.contains(&id.contig, id.position))
        })
    }
}

/// The phase-two region a missing record was looked for in, if any.
fn searched_region<'r>(
    identity: &ReadIdentity,
    searched: &'r [ConsolidatedRegion],
) -> Option<&'r ConsolidatedRegion> {
    searched.iter().find(|region| region.contains(&identity.contig, identity.position))
}

/// Counts the missing records of unresolved fragments that phase two did and did not search.
fn count_missing_records(
    unresolved: &[IncompleteFragment],
    searched: &[ConsolidatedRegion],
) -> (u64, u64) {
    let (mut inside, mut outside) = (0, 0);
    for identity in unresolved.iter().flat_map(|fragment| &fragment.missing) {
        if searched_region(identity, searched).is_some() {
            inside += 1;
        } else {
            outside += 1;
        }
    }
    (inside, outside)
}

fn describe_missing(identity: &ReadIdentity, searched: &[ConsolidatedRegion]) -> String {
    match searched_region(identity, searched) {
        Some(region) => format!("{identity} (searched {region})"),
        None => format!("{identity} (not searched)"),
    }
}

fn report_unresolved(unresolved: &[IncompleteFragment], searched: &[ConsolidatedRegion]) {
    if unresolved.is_empty() {
        info!("All fragments touching the target regions are complete");
        return;
    }
    warn!("{} fragments remain incomplete", format_count(unresolved.len() as u64));
    for (i, fragment) in unresolved.iter().enumerate() {
        let missing = if fragment.missing.is_empty() {
            format!("{} primary alignments received", fragment.primaries_received)
        } else {
            fragment
                .missing
                .iter()
                .map(|identity| describe_missing(identity, searched))
                .collect::<Vec<_>>()
                .join(", ")
        };
        if i < MAX_REPORTED_FRAGMENTS {
            warn!("Incomplete fragment {}: missing {missing}", fragment.fragment_id);
        } else {
            debug!("Incomplete fragment {}: missing {missing}", fragment.fragment_id);
        }
    }
    if unresolved.len() > MAX_REPORTED_FRAGMENTS {
        warn!(
            "{} further incomplete fragments logged at debug level",
            format_count((unresolved.len() - MAX_REPORTED_FRAGMENTS) as u64)
        );
    }
}
