//! Phase-two resolution of records pending on a single contig.

use ahash::AHashMap;
use anyhow::{Context, Result};
use log::{debug, info};
use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;

use super::identity::MateLocation;
use super::registry::{FragmentRegistry, PendingPosition};
use super::scanner::{RecordScanner, ScanControl};
use super::sink::OutputSink;
use crate::logging::format_count;
use crate::metrics::RemoteMetrics;
use crate::progress::ProgressTracker;
use crate::region::{GenomicRegion, RegionSet};
use crate::sam::record_utils::read_name;

/// Default maximum gap between consecutive pending positions scanned in one window.
pub const DEFAULT_REMOTE_GROUP_DISTANCE: usize = 300;

/// Settings shared by every resolver of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteLimits {
    /// Maximum gap between consecutive positions of one window
    pub group_distance: usize,
    /// Records to scan on one contig before the resolver gives up
    pub max_records: Option<u64>,
    /// Skip pending positions that lie in excluded regions
    pub drop_excluded: bool,
}

impl Default for RemoteLimits {
    fn default() -> Self {
        Self {
            group_distance: DEFAULT_REMOTE_GROUP_DISTANCE,
            max_records: None,
            drop_excluded: false,
        }
    }
}

/// Splits sorted positions into runs whose consecutive gaps are at most `distance`.
#[must_use]
pub fn group_positions<'p>(
    positions: &[&'p PendingPosition],
    distance: usize,
) -> Vec<Vec<&'p PendingPosition>> {
    let mut groups: Vec<Vec<&PendingPosition>> = Vec::new();
    for &position in positions {
        match groups.last_mut() {
            Some(group)
                if group
                    .last()
                    .is_some_and(|last| position.position - last.position <= distance) =>
            {
                group.push(position);
            }
            _ => groups.push(vec![position]),
        }
    }
    groups
}

/// Revisits the windows around one contig's pending positions in remote-only mode.
///
/// A scanned record matches when its start and name equal those of a live entry in the window.
/// Matching records are offered to the registry and written when newly seen. An entry retires once
/// its record was newly seen and the record's mate is unmapped, absent or outside the window; the
/// window scan stops as soon as every entry has retired.
pub struct RemoteResolver<'a> {
    contig: &'a str,
    positions: &'a [PendingPosition],
    registry: &'a FragmentRegistry,
    sink: &'a dyn OutputSink,
    header: &'a Header,
    excluded: Option<&'a RegionSet>,
    limits: RemoteLimits,
    progress: Option<&'a ProgressTracker>,
}

impl<'a> RemoteResolver<'a> {
    /// Creates a resolver for `positions`, which must all lie on `contig` and be sorted.
    #[must_use]
    pub fn new(
        contig: &'a str,
        positions: &'a [PendingPosition],
        registry: &'a FragmentRegistry,
        sink: &'a dyn OutputSink,
        header: &'a Header,
    ) -> Self {
        Self {
            contig,
            positions,
            registry,
            sink,
            header,
            excluded: None,
            limits: RemoteLimits::default(),
            progress: None,
        }
    }

    /// Sets the grouping distance, record cap and excluded-region handling.
    #[must_use]
    pub fn with_limits(mut self, limits: RemoteLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Regions whose pending positions are skipped when `drop_excluded` is set.
    #[must_use]
    pub fn with_excluded(mut self, excluded: &'a RegionSet) -> Self {
        self.excluded = Some(excluded);
        self
    }

    /// Reports scanned records to a shared progress tracker.
    #[must_use]
    pub fn with_progress(mut self, progress: &'a ProgressTracker) -> Self {
        self.progress = Some(progress);
        self
    }

    fn is_excluded(&self, position: &PendingPosition) -> bool {
        self.limits.drop_excluded
            && self.excluded.is_some_and(|set| set.contains(self.contig, position.position))
    }

    /// Scans every window on the contig, stopping early when the record cap is reached.
    ///
    /// # Errors
    /// Returns an error if a window scan fails.
    pub fn run<R: RecordScanner + ?Sized>(&self, scanner: &mut R) -> Result<RemoteMetrics> {
        let mut metrics = RemoteMetrics::default();

        let mut kept: Vec<&PendingPosition> = Vec::with_capacity(self.positions.len());
        for position in self.positions {
            if self.is_excluded(position) {
                metrics.excluded_positions += 1;
            } else {
                kept.push(position);
            }
        }

        for group in group_positions(&kept, self.limits.group_distance) {
            let (Some(first), Some(last)) = (group.first(), group.last()) else {
                continue;
            };
            let window = GenomicRegion::new(self.contig, first.position, last.position);
            metrics.groups += 1;
            self.resolve_window(scanner, &window, &group, &mut metrics)
                .with_context(|| format!("Failed to resolve pending records in {window}"))?;
            if metrics.truncated {
                info!(
                    "Remote scan of {} reached its cap of {} records; remaining windows skipped",
                    self.contig,
                    format_count(metrics.records_scanned)
                );
                break;
            }
        }

        info!(
            "Resolved {} pending positions on {} in {} windows: scanned {}, matched {}, wrote {}",
            format_count(kept.len() as u64),
            self.contig,
            metrics.groups,
            format_count(metrics.records_scanned),
            format_count(metrics.records_matched),
            format_count(metrics.records_written)
        );
        Ok(metrics)
    }

    fn resolve_window<R: RecordScanner + ?Sized>(
        &self,
        scanner: &mut R,
        window: &GenomicRegion,
        group: &[&PendingPosition],
        metrics: &mut RemoteMetrics,
    ) -> Result<()> {
        let mut live: AHashMap<(usize, String), usize> = AHashMap::with_capacity(group.len());
        for entry in group {
            *live.entry((entry.position, entry.fragment_id.clone())).or_default() += 1;
        }
        let mut remaining = group.len();

        scanner.scan(window, &mut |record| {
            if self.limits.max_records.is_some_and(|max| metrics.records_scanned >= max) {
                metrics.truncated = true;
                return ScanControl::Halt;
            }
            metrics.records_scanned += 1;
            if let Some(progress) = self.progress {
                progress.record(1);
            }

            let (Some(start), Some(name)) = (record.alignment_start(), read_name(record)) else {
                return ScanControl::Continue;
            };
            let Some(count) = live.get_mut(&(usize::from(start), name)) else {
                return ScanControl::Continue;
            };
            if *count == 0 {
                return ScanControl::Continue;
            }
            metrics.records_matched += 1;

            if !self.registry.ingest_record(record, self.header) {
                return ScanControl::Continue;
            }
            self.sink.emit(record);
            metrics.records_written += 1;

            if self.mate_outside(record, window) {
                *count -= 1;
                remaining -= 1;
                if remaining == 0 {
                    debug!("All pending records in {window} resolved");
                    return ScanControl::Halt;
                }
            }
            ScanControl::Continue
        })
    }

    fn mate_outside(&self, record: &RecordBuf, window: &GenomicRegion) -> bool {
        if record.flags().is_mate_unmapped() {
            return true;
        }
        match MateLocation::from_mate_fields(record, self.header) {
            MateLocation::Present { contig, position } => !window.contains(&contig, position),
            MateLocation::Absent => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sam::builder::{RecordBuilder, create_header, mapped_pair};
    use crate::slice::scanner::RecordStore;
    use crate::slice::sink::RecordCollector;

    fn header() -> Header {
        create_header(&[("chr1", 100_000), ("chr2", 100_000)])
    }

    fn pending(registry: &FragmentRegistry, contig: &str) -> Vec<PendingPosition> {
        registry.collect_pending_positions().remove(contig).unwrap_or_default()
    }

    fn position(contig: &str, position: usize, fragment_id: &str) -> PendingPosition {
        PendingPosition { contig: contig.to_string(), position, fragment_id: fragment_id.to_string() }
    }

    #[test]
    fn test_group_positions() {
        let positions = [position("chr1", 100, "a"), position("chr1", 400, "b"), position("chr1", 701, "c")];
        let refs: Vec<&PendingPosition> = positions.iter().collect();
        let groups = group_positions(&refs, 300);
        let spans: Vec<Vec<usize>> =
            groups.iter().map(|g| g.iter().map(|p| p.position).collect()).collect();
        assert_eq!(spans, vec![vec![100, 400], vec![701]]);
    }

    #[test]
    fn test_resolves_distant_mate() {
        let header = header();
        let (r1, r2) = mapped_pair("frag", (0, 100), (0, 9000));
        let other = RecordBuilder::mapped_read().name("other").alignment_start(9000).build();
        let registry = FragmentRegistry::new();
        assert!(registry.ingest_record(&r1, &header));
        registry.set_remote_only(true);

        let positions = pending(&registry, "chr1");
        assert_eq!(positions, vec![position("chr1", 9000, "frag")]);

        let mut store = RecordStore::new(header.clone(), vec![other, r2]);
        let sink = RecordCollector::new();
        let metrics =
            RemoteResolver::new("chr1", &positions, &registry, &sink, &header).run(&mut store).unwrap();

        assert_eq!(metrics.groups, 1);
        assert_eq!(metrics.records_matched, 1);
        assert_eq!(metrics.records_written, 1);
        assert_eq!(sink.records().len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_window_halts_once_all_entries_retire() {
        let header = header();
        let (r1, r2) = mapped_pair("frag", (0, 100), (0, 9000));
        let trailing = RecordBuilder::mapped_read().name("trailing").alignment_start(9000).build();
        let registry = FragmentRegistry::new();
        registry.ingest_record(&r1, &header);
        registry.set_remote_only(true);
        let positions = pending(&registry, "chr1");

        let mut store = RecordStore::new(header.clone(), vec![r2, trailing]);
        let metrics = RemoteResolver::new("chr1", &positions, &registry, &RecordCollector::new(), &header)
            .run(&mut store)
            .unwrap();

        assert_eq!(metrics.records_scanned, 1);
    }

    #[test]
    fn test_unknown_fragments_are_not_written() {
        let header = header();
        let stranger = RecordBuilder::mapped_read().name("frag").alignment_start(9000).build();
        let registry = FragmentRegistry::new();
        registry.set_remote_only(true);
        let positions = vec![position("chr1", 9000, "frag")];

        let mut store = RecordStore::new(header.clone(), vec![stranger]);
        let sink = RecordCollector::new();
        let metrics =
            RemoteResolver::new("chr1", &positions, &registry, &sink, &header).run(&mut store).unwrap();

        assert_eq!(metrics.records_matched, 1);
        assert_eq!(metrics.records_written, 0);
        assert!(sink.records().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_excluded_positions_dropped() {
        let header = header();
        let (r1, r2) = mapped_pair("frag", (0, 100), (1, 5000));
        let registry = FragmentRegistry::new();
        registry.ingest_record(&r1, &header);
        registry.set_remote_only(true);
        let positions = pending(&registry, "chr2");
        let excluded = RegionSet::new(&[GenomicRegion::new("chr2", 4000, 6000)]);
        let limits = RemoteLimits { drop_excluded: true, ..RemoteLimits::default() };

        let mut store = RecordStore::new(header.clone(), vec![r2]);
        let sink = RecordCollector::new();
        let metrics = RemoteResolver::new("chr2", &positions, &registry, &sink, &header)
            .with_excluded(&excluded)
            .with_limits(limits)
            .run(&mut store)
            .unwrap();

        assert_eq!(metrics.excluded_positions, 1);
        assert_eq!(metrics.groups, 0);
        assert!(sink.records().is_empty());
        assert_eq!(registry.live_fragments(), 1);
    }

    #[test]
    fn test_excluded_positions_kept_without_drop_flag() {
        let header = header();
        let (r1, r2) = mapped_pair("frag", (0, 100), (1, 5000));
        let registry = FragmentRegistry::new();
        registry.ingest_record(&r1, &header);
        registry.set_remote_only(true);
        let positions = pending(&registry, "chr2");
        let excluded = RegionSet::new(&[GenomicRegion::new("chr2", 4000, 6000)]);

        let mut store = RecordStore::new(header.clone(), vec![r2]);
        let metrics =
            RemoteResolver::new("chr2", &positions, &registry, &RecordCollector::new(), &header)
                .with_excluded(&excluded)
                .run(&mut store)
                .unwrap();

        assert_eq!(metrics.excluded_positions, 0);
        assert_eq!(metrics.records_written, 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_record_cap_halts_resolver() {
        let header = header();
        let registry = FragmentRegistry::new();
        let mut mates = Vec::new();
        for (i, start) in [1000, 5000, 9000].into_iter().enumerate() {
            let name = format!("frag{i}");
            let (r1, r2) = mapped_pair(&name, (1, 100 + i), (0, start));
            registry.ingest_record(&r1, &header);
            mates.push(r2);
        }
        registry.set_remote_only(true);
        let positions = pending(&registry, "chr1");
        let limits = RemoteLimits { max_records: Some(1), ..RemoteLimits::default() };

        let mut store = RecordStore::new(header.clone(), mates);
        let metrics =
            RemoteResolver::new("chr1", &positions, &registry, &RecordCollector::new(), &header)
                .with_limits(limits)
                .run(&mut store)
                .unwrap();

        assert!(metrics.truncated);
        assert_eq!(metrics.records_scanned, 1);
        assert_eq!(metrics.groups, 2);
        assert_eq!(registry.live_fragments(), 2);
    }
}
