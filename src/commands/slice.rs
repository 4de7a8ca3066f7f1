//! `Slice` command implementation.
//!
//! Extracts every record of each fragment that touches the target regions of a coordinate-sorted,
//! indexed BAM, including mates and supplementary alignments that map elsewhere.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fgslice_lib::header::{add_pg_record, mark_unsorted};
use fgslice_lib::logging::{OperationTimer, log_slice_summary};
use fgslice_lib::metrics::write_slice_metrics;
use fgslice_lib::region::{GenomicRegion, RegionSet, read_bed_regions, write_bed_regions};
use fgslice_lib::slice::{IndexedBamSource, ScannerSource, SliceConfig, SliceWriter, Slicer};
use fgslice_lib::validation::validate_file_exists;
use log::info;

use super::command::Command;
use super::common::{BamIoOptions, CompressionOptions, SliceLimitsOptions, ThreadingOptions};

/// Extracts complete fragments overlapping target regions
#[derive(Parser, Debug)]
#[command(
    name = "slice",
    about = "\x1b[38;5;72m[SLICING]\x1b[0m \x1b[36mExtract complete fragments overlapping target regions\x1b[0m",
    long_about = r#"
Extracts the records of a coordinate-sorted, indexed BAM file that overlap a set of target regions,
together with every other record of the same fragments: mates and supplementary alignments are
written even when they map far outside the targets.

Targets are given with --regions (`chr`, `chr:pos` or `chr:start-end`, 1-based inclusive) and/or
--regions-file (BED). With neither, the whole genome is sliced. Targets are merged and split into
partitions of at most --partition-size bases which are scanned in parallel.

Records still missing after the first pass are fetched in a second pass that revisits only the
coordinates where they are expected. Fragments that remain incomplete are logged at the end,
except those whose missing records all lie in --excluded-regions.

The output BAM carries the input header with sort order `unsorted` and an added @PG record.
Every output record is written exactly once; no other ordering is guaranteed.
"#
)]
pub struct Slice {
    /// Input/output BAM options
    #[command(flatten)]
    pub io: BamIoOptions,

    /// Target regions (`chr`, `chr:pos` or `chr:start-end`); may be repeated
    #[arg(short = 'r', long = "regions", num_args = 1..)]
    pub regions: Vec<GenomicRegion>,

    /// BED file of target regions
    #[arg(short = 'L', long = "regions-file")]
    pub regions_file: Option<PathBuf>,

    /// BED file of regions where missing records are expected (e.g. unplaced contigs, blacklists)
    #[arg(short = 'x', long = "excluded-regions")]
    pub excluded_regions: Option<PathBuf>,

    /// Skip fetching pending records that lie in the excluded regions
    #[arg(long = "drop-excluded", default_value = "false", requires = "excluded_regions")]
    pub drop_excluded: bool,

    /// Only keep records that are supplementary or carry an SA tag
    #[arg(long = "only-supplementaries", default_value = "false")]
    pub only_supplementaries: bool,

    /// Optional tab-separated table describing each written record
    #[arg(long = "reads-table")]
    pub reads_table: Option<PathBuf>,

    /// Optional output file for slice metrics
    #[arg(short = 'm', long = "metrics")]
    pub metrics: Option<PathBuf>,

    /// Optional BED file of the regions revisited in the second pass
    #[arg(long = "remote-regions")]
    pub remote_regions: Option<PathBuf>,

    /// Partition sizes, distances and record budgets
    #[command(flatten)]
    pub limits: SliceLimitsOptions,

    /// Threading options for parallel processing
    #[command(flatten)]
    pub threading: ThreadingOptions,

    /// Compression options for output
    #[command(flatten)]
    pub compression: CompressionOptions,
}

impl Command for Slice {
    fn execute(&self, command_line: &str) -> Result<()> {
        self.io.validate()?;
        if let Some(path) = &self.regions_file {
            validate_file_exists(path, "Regions BED")?;
        }
        if let Some(path) = &self.excluded_regions {
            validate_file_exists(path, "Excluded regions BED")?;
        }
        let config = self.slice_config();
        config.validate()?;

        info!("Slice");
        info!("  Input: {}", self.io.input.display());
        info!("  Output: {}", self.io.output.display());
        info!("  Partition size: {}", config.partition_size);
        info!("  Consolidation distance: {}", config.consolidation_distance);
        info!("  Remote group distance: {}", config.remote_group_distance);
        info!("  {}", self.threading.log_message());

        let targets = self.target_regions()?;
        let excluded = match &self.excluded_regions {
            Some(path) => RegionSet::new(&read_bed_regions(path)?),
            None => RegionSet::default(),
        };

        let timer = OperationTimer::new("Slicing BAM");

        let source = IndexedBamSource::open(&self.io.input)?;
        let header = add_pg_record(
            mark_unsorted(source.header().clone()),
            crate::version::VERSION.as_str(),
            command_line,
        )?;
        let writer = SliceWriter::new(
            &self.io.output,
            &header,
            self.reads_table.as_deref(),
            self.threading.num_threads(),
            self.compression.compression_level,
        )?;

        let outcome =
            Slicer::new(&source, &writer, config).with_excluded_regions(excluded).run(&targets)?;
        let written = writer.records_written();
        writer.finish()?;

        if let Some(path) = &self.metrics {
            write_slice_metrics(path, &outcome.metrics)?;
        }
        if let Some(path) = &self.remote_regions {
            let regions: Vec<GenomicRegion> =
                outcome.consolidated_regions.iter().map(GenomicRegion::from).collect();
            write_bed_regions(path, &regions)
                .with_context(|| format!("Failed to write remote regions: {}", path.display()))?;
        }

        log_slice_summary(&outcome.metrics);
        timer.log_completion(written);
        Ok(())
    }
}

impl Slice {
    fn slice_config(&self) -> SliceConfig {
        SliceConfig {
            partition_size: self.limits.partition_size,
            consolidation_distance: self.limits.consolidation_distance,
            remote_group_distance: self.limits.remote_group_distance,
            max_partition_records: self.limits.max_partition_records,
            max_remote_records: self.limits.max_remote_records,
            only_supplementaries: self.only_supplementaries,
            drop_excluded: self.drop_excluded,
            threads: self.threading.num_threads(),
            ..SliceConfig::default()
        }
    }

    /// Regions from `--regions` followed by those from `--regions-file`.
    fn target_regions(&self) -> Result<Vec<GenomicRegion>> {
        let mut targets = self.regions.clone();
        if let Some(path) = &self.regions_file {
            targets.extend(read_bed_regions(path)?);
        }
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(args: &[&str]) -> Slice {
        let mut argv = vec!["slice", "-i", "in.bam", "-o", "out.bam"];
        argv.extend_from_slice(args);
        Slice::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let slice = parse(&[]);
        assert!(slice.regions.is_empty());
        assert!(!slice.drop_excluded);
        assert_eq!(slice.compression.compression_level, 5);
        assert_eq!(slice.slice_config(), SliceConfig::default());
    }

    #[test]
    fn test_regions_parsed() {
        let slice = parse(&["--regions", "chr1:100-200", "chr2:1,000-2,000", "chr3"]);
        assert_eq!(slice.regions[0], GenomicRegion::new("chr1", 100, 200));
        assert_eq!(slice.regions[1], GenomicRegion::new("chr2", 1000, 2000));
        assert_eq!(slice.regions[2].contig, "chr3");
    }

    #[test]
    fn test_invalid_region_rejected() {
        let result = Slice::try_parse_from([
            "slice", "-i", "in.bam", "-o", "out.bam", "--regions", "chr1:200-100",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_drop_excluded_requires_excluded_regions() {
        let result =
            Slice::try_parse_from(["slice", "-i", "in.bam", "-o", "out.bam", "--drop-excluded"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_compression_level_range() {
        let result = Slice::try_parse_from([
            "slice", "-i", "in.bam", "-o", "out.bam", "--compression-level", "12",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_slice_config_from_options() {
        let slice = parse(&[
            "--partition-size",
            "5000",
            "--max-partition-records",
            "10",
            "--only-supplementaries",
            "--threads",
            "4",
        ]);
        let config = slice.slice_config();
        assert_eq!(config.partition_size, 5000);
        assert_eq!(config.max_partition_records, Some(10));
        assert!(config.only_supplementaries);
        assert_eq!(config.threads, 4);
    }

    #[test]
    fn test_target_regions_combines_sources() {
        let mut bed = NamedTempFile::new().unwrap();
        writeln!(bed, "chr2\t99\t200").unwrap();
        bed.flush().unwrap();
        let path = bed.path().to_str().unwrap().to_string();

        let slice = parse(&["--regions", "chr1:1-10", "--regions-file", &path]);
        let targets = slice.target_regions().unwrap();
        assert_eq!(
            targets,
            vec![GenomicRegion::new("chr1", 1, 10), GenomicRegion::new("chr2", 100, 200)]
        );
    }
}
