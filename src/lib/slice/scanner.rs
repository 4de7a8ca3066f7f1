//! The scan primitive: visit every record overlapping an interval, in coordinate order.
//!
//! [`IndexedBamSource`] backs it with an indexed BAM file; [`RecordStore`] backs it with records
//! held in memory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;

use crate::bam_io::{IndexedBamReader, open_indexed_bam};
use crate::region::GenomicRegion;
use crate::sam::record_utils::aligned_span;

/// Whether a scan should keep going after a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    /// Deliver the next record
    Continue,
    /// Stop the scan
    Halt,
}

/// Visits records overlapping a region in coordinate order until told to halt.
pub trait RecordScanner {
    /// Scans `region`, calling `visit` for each overlapping record.
    ///
    /// # Errors
    /// Returns an error if the underlying store cannot be queried or a record cannot be decoded.
    fn scan(
        &mut self,
        region: &GenomicRegion,
        visit: &mut dyn FnMut(&RecordBuf) -> ScanControl,
    ) -> Result<()>;
}

/// Something that can hand each task its own scanner.
pub trait ScannerSource: Sync {
    /// Scanner type
    type Scanner: RecordScanner;

    /// Header of the underlying records.
    fn header(&self) -> &Header;

    /// Opens an independent scanner.
    ///
    /// # Errors
    /// Returns an error if the scanner cannot be opened.
    fn open_scanner(&self) -> Result<Self::Scanner>;
}

/// An indexed BAM file; each scanner opens its own reader.
#[derive(Debug, Clone)]
pub struct IndexedBamSource {
    path: PathBuf,
    header: Header,
}

impl IndexedBamSource {
    /// Opens the BAM once to check the index and read the header.
    ///
    /// # Errors
    /// Returns an error if the BAM, its index or its header cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (_, header) = open_indexed_bam(&path)?;
        Ok(Self { path, header })
    }
}

impl ScannerSource for IndexedBamSource {
    type Scanner = IndexedBamScanner;

    fn header(&self) -> &Header {
        &self.header
    }

    fn open_scanner(&self) -> Result<IndexedBamScanner> {
        let (reader, header) = open_indexed_bam(&self.path)?;
        Ok(IndexedBamScanner { reader, header })
    }
}

/// Scanner over an indexed BAM reader.
pub struct IndexedBamScanner {
    reader: IndexedBamReader,
    header: Header,
}

impl RecordScanner for IndexedBamScanner {
    fn scan(
        &mut self,
        region: &GenomicRegion,
        visit: &mut dyn FnMut(&RecordBuf) -> ScanControl,
    ) -> Result<()> {
        let query_region = region.to_noodles()?;
        let query = self
            .reader
            .query(&self.header, &query_region)
            .with_context(|| format!("Failed to query {region}"))?;

        for result in query {
            let record = result.with_context(|| format!("Failed to read record in {region}"))?;
            let record = RecordBuf::try_from_alignment_record(&self.header, &record)
                .with_context(|| format!("Failed to decode record in {region}"))?;
            if visit(&record) == ScanControl::Halt {
                break;
            }
        }
        Ok(())
    }
}

/// Records held in memory, sorted by coordinate.
#[derive(Debug, Clone)]
pub struct RecordStore {
    header: Header,
    records: Arc<Vec<RecordBuf>>,
}

impl RecordStore {
    /// Sorts the records by reference and start; records without a placement are dropped.
    #[must_use]
    pub fn new(header: Header, records: Vec<RecordBuf>) -> Self {
        let mut records: Vec<RecordBuf> = records
            .into_iter()
            .filter(|r| r.reference_sequence_id().is_some() && r.alignment_start().is_some())
            .collect();
        records.sort_by_key(|r| (r.reference_sequence_id(), r.alignment_start()));
        Self { header, records: Arc::new(records) }
    }

    /// Number of placed records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ScannerSource for RecordStore {
    type Scanner = RecordStore;

    fn header(&self) -> &Header {
        &self.header
    }

    fn open_scanner(&self) -> Result<RecordStore> {
        Ok(self.clone())
    }
}

impl RecordScanner for RecordStore {
    fn scan(
        &mut self,
        region: &GenomicRegion,
        visit: &mut dyn FnMut(&RecordBuf) -> ScanControl,
    ) -> Result<()> {
        let Some(ref_id) = self.header.reference_sequences().get_index_of(region.contig.as_bytes())
        else {
            anyhow::bail!("Reference sequence '{}' not found in header", region.contig);
        };

        let overlapping = self.records.iter().filter(|r| {
            r.reference_sequence_id() == Some(ref_id)
                && aligned_span(r).is_some_and(|(start, end)| start <= region.end && end >= region.start)
        });
        for record in overlapping {
            if visit(record) == ScanControl::Halt {
                break;
            }
        }
        Ok(())
    }
}
