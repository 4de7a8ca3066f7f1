//! Genomic regions: parsing, BED loading, merging and partitioning.
//!
//! All regions here are 1-based and inclusive on both ends. BED input (0-based, half-open) is
//! converted on load.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use ahash::AHashMap;
use anyhow::{Context, Result};
use noodles::core::{Position, Region};
use noodles::sam::Header;

use crate::errors::SliceError;

/// A 1-based, fully closed interval on a named reference sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenomicRegion {
    /// Reference sequence name
    pub contig: String,
    /// First base (1-based)
    pub start: usize,
    /// Last base (inclusive)
    pub end: usize,
}

impl GenomicRegion {
    /// Creates a region; callers guarantee `1 <= start <= end`.
    #[must_use]
    pub fn new(contig: impl Into<String>, start: usize, end: usize) -> Self {
        Self { contig: contig.into(), start, end }
    }

    /// Number of bases covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    /// Always false; a region covers at least one base.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `[start, end]` on `contig` overlaps this region.
    #[must_use]
    pub fn overlaps(&self, contig: &str, start: usize, end: usize) -> bool {
        self.contig == contig && start <= self.end && end >= self.start
    }

    /// Whether `position` on `contig` lies within this region.
    #[must_use]
    pub fn contains(&self, contig: &str, position: usize) -> bool {
        self.overlaps(contig, position, position)
    }

    /// Converts to a noodles query region.
    ///
    /// # Errors
    /// Returns an error if the start is zero.
    pub fn to_noodles(&self) -> Result<Region> {
        let start = Position::try_from(self.start)
            .with_context(|| format!("Invalid region start in {self}"))?;
        let end =
            Position::try_from(self.end).with_context(|| format!("Invalid region end in {self}"))?;
        Ok(Region::new(self.contig.as_str(), start..=end))
    }

    /// Checks the region against the header, clamping an open-ended region to the contig length.
    ///
    /// # Errors
    /// Returns an error if the contig is unknown or the region lies outside the contig.
    pub fn resolve(self, header: &Header) -> crate::errors::Result<Self> {
        let length = header
            .reference_sequences()
            .get(self.contig.as_bytes())
            .map(|rs| rs.length().get())
            .ok_or_else(|| SliceError::ReferenceNotFound { ref_name: self.contig.clone() })?;

        if self.start > length {
            return Err(SliceError::InvalidRegion {
                region: self.to_string(),
                reason: format!("start is beyond the end of {} (length {length})", self.contig),
            });
        }
        Ok(Self { end: self.end.min(length), ..self })
    }
}

impl fmt::Display for GenomicRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.contig, self.start, self.end)
    }
}

fn parse_coordinate(s: &str) -> Option<usize> {
    s.replace(',', "").parse().ok().filter(|&v| v > 0)
}

impl FromStr for GenomicRegion {
    type Err = SliceError;

    /// Parses `chr`, `chr:pos` or `chr:start-end`; commas in numbers are allowed.
    ///
    /// A bare contig name covers the whole contig once resolved against a header.
    fn from_str(s: &str) -> crate::errors::Result<Self> {
        let s = s.trim();
        let invalid = |reason: &str| SliceError::InvalidRegion {
            region: s.to_string(),
            reason: reason.to_string(),
        };
        if s.is_empty() {
            return Err(invalid("empty region"));
        }

        let Some((contig, range)) = s.rsplit_once(':') else {
            return Ok(Self::new(s, 1, usize::MAX));
        };
        if contig.is_empty() {
            return Err(invalid("empty contig name"));
        }

        let (start, end) = match range.split_once('-') {
            Some((start, end)) => (
                parse_coordinate(start).ok_or_else(|| invalid("invalid start"))?,
                parse_coordinate(end).ok_or_else(|| invalid("invalid end"))?,
            ),
            None => {
                let pos = parse_coordinate(range).ok_or_else(|| invalid("invalid position"))?;
                (pos, pos)
            }
        };
        if start > end {
            return Err(invalid("start is after end"));
        }
        Ok(Self::new(contig, start, end))
    }
}

/// Reads regions from a BED file.
///
/// Blank lines and `#`, `track` and `browser` lines are skipped. Only the first three columns
/// are used.
///
/// # Errors
/// Returns an error if the file cannot be read or a line is malformed.
pub fn read_bed_regions<P: AsRef<Path>>(path: P) -> Result<Vec<GenomicRegion>> {
    let path_ref = path.as_ref();
    let reader = BufReader::new(
        File::open(path_ref)
            .with_context(|| format!("Failed to open BED file: {}", path_ref.display()))?,
    );

    let mut regions = Vec::new();
    for (line_number, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path_ref.display()))?;
        let line = line.trim_end();
        if line.is_empty()
            || line.starts_with('#')
            || line.starts_with("track")
            || line.starts_with("browser")
        {
            continue;
        }

        let bad_line = |reason: &str| SliceError::InvalidFileFormat {
            file_type: "BED".to_string(),
            path: path_ref.display().to_string(),
            reason: format!("line {}: {reason}", line_number + 1),
        };
        let mut fields = line.split('\t');
        let (Some(contig), Some(start), Some(end)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(bad_line("expected at least 3 tab-separated columns").into());
        };
        let start: usize = start.trim().parse().map_err(|_| bad_line("invalid start"))?;
        let end: usize = end.trim().parse().map_err(|_| bad_line("invalid end"))?;
        if end <= start {
            return Err(bad_line("end must be greater than start").into());
        }
        regions.push(GenomicRegion::new(contig.trim(), start + 1, end));
    }
    Ok(regions)
}

/// Writes regions as BED (0-based, half-open).
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_bed_regions<P: AsRef<Path>>(path: P, regions: &[GenomicRegion]) -> Result<()> {
    let path_ref = path.as_ref();
    let mut writer = BufWriter::new(
        File::create(path_ref)
            .with_context(|| format!("Failed to create BED file: {}", path_ref.display()))?,
    );
    for region in regions {
        writeln!(writer, "{}\t{}\t{}", region.contig, region.start - 1, region.end)?;
    }
    writer.flush().with_context(|| format!("Failed to write BED file: {}", path_ref.display()))
}

fn contig_order(header: &Header) -> AHashMap<String, usize> {
    header
        .reference_sequences()
        .keys()
        .enumerate()
        .map(|(i, name)| (name.to_string(), i))
        .collect()
}

/// Resolves regions against the header, sorts them in header order and merges overlapping or
/// adjacent regions.
///
/// # Errors
/// Returns an error if a region names an unknown contig or lies outside it.
pub fn merge_regions(
    regions: Vec<GenomicRegion>,
    header: &Header,
) -> crate::errors::Result<Vec<GenomicRegion>> {
    let order = contig_order(header);
    let mut resolved =
        regions.into_iter().map(|r| r.resolve(header)).collect::<crate::errors::Result<Vec<_>>>()?;
    resolved.sort_by_key(|r| (order.get(&r.contig).copied(), r.start, r.end));

    let mut merged: Vec<GenomicRegion> = Vec::with_capacity(resolved.len());
    for region in resolved {
        match merged.last_mut() {
            Some(last) if last.contig == region.contig && region.start <= last.end + 1 => {
                last.end = last.end.max(region.end);
            }
            _ => merged.push(region),
        }
    }
    Ok(merged)
}

/// Splits regions into partitions of at most `partition_size` bases, preserving order.
#[must_use]
pub fn split_into_partitions(
    regions: &[GenomicRegion],
    partition_size: usize,
) -> Vec<GenomicRegion> {
    let size = partition_size.max(1);
    regions
        .iter()
        .flat_map(|region| {
            (region.start..=region.end).step_by(size).map(move |start| {
                GenomicRegion::new(
                    region.contig.clone(),
                    start,
                    start.saturating_add(size - 1).min(region.end),
                )
            })
        })
        .collect()
}

/// One region per reference sequence in the header, covering it entirely.
#[must_use]
pub fn whole_genome_regions(header: &Header) -> Vec<GenomicRegion> {
    header
        .reference_sequences()
        .iter()
        .map(|(name, rs)| GenomicRegion::new(name.to_string(), 1, rs.length().get()))
        .collect()
}

/// Sorted, merged regions indexed by contig for point lookups.
#[derive(Debug, Clone, Default)]
pub struct RegionSet {
    by_contig: AHashMap<String, Vec<(usize, usize)>>,
}

impl RegionSet {
    /// Builds a set from arbitrary (possibly overlapping, unsorted) regions.
    #[must_use]
    pub fn new(regions: &[GenomicRegion]) -> Self {
        let mut by_contig: AHashMap<String, Vec<(usize, usize)>> = AHashMap::new();
        for region in regions {
            by_contig.entry(region.contig.clone()).or_default().push((region.start, region.end));
        }
        for intervals in by_contig.values_mut() {
            intervals.sort_unstable();
            let mut merged: Vec<(usize, usize)> = Vec::with_capacity(intervals.len());
            for &(start, end) in intervals.iter() {
                match merged.last_mut() {
                    Some(last) if start <= last.1.saturating_add(1) => last.1 = last.1.max(end),
                    _ => merged.push((start, end)),
                }
            }
            *intervals = merged;
        }
        Self { by_contig }
    }

    /// Whether the set holds no regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_contig.is_empty()
    }

    /// Whether `position` on `contig` lies within any region of the set.
    #[must_use]
    pub fn contains(&self, contig: &str, position: usize) -> bool {
        self.by_contig.get(contig).is_some_and(|intervals| {
            let idx = intervals.partition_point(|&(_, end)| end < position);
            intervals.get(idx).is_some_and(|&(start, _)| start <= position)
        })
    }
}
