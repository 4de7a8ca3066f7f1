//! Output destinations for sliced records.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use log::warn;
use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use parking_lot::Mutex;
use serde::Serialize;

use crate::bam_io::{BamWriter, create_bam_writer};
use crate::sam::record_utils::{alignment_end, cigar_to_string, contig_name, read_name};
use crate::sam::sa_tag::sa_tag_value;

/// Thread-safe, append-only destination for records that were newly seen.
///
/// Implementations do not deduplicate. Failures are logged and counted rather than returned so
/// that one bad write never stops a scan.
pub trait OutputSink: Send + Sync {
    /// Appends the record to the alignment output.
    fn write_record(&self, record: &RecordBuf);

    /// Appends a row describing the record to the reads table, if one is configured.
    fn write_row(&self, record: &RecordBuf);

    /// Writes the record and its reads-table row.
    fn emit(&self, record: &RecordBuf) {
        self.write_record(record);
        self.write_row(record);
    }

    /// Number of failed writes so far.
    fn failures(&self) -> u64 {
        0
    }
}

/// One row of the reads table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadRow {
    /// Query name
    pub fragment_id: String,
    /// Reference sequence name, or `*`
    pub contig: String,
    /// 1-based start, 0 when unplaced
    pub start: usize,
    /// 1-based inclusive end, 0 when unplaced
    pub end: usize,
    /// CIGAR text, or `*`
    pub cigar: String,
    /// Observed template length
    pub insert_size: i32,
    /// Mate reference sequence name, or `*`
    pub mate_contig: String,
    /// Mate 1-based start, 0 when absent
    pub mate_start: usize,
    /// Mapping quality, 255 when unavailable
    pub mapping_quality: u8,
    /// Raw `SA` tag, empty when absent
    pub sa_tag: String,
    /// SAM flag bits
    pub flags: u16,
    /// First segment of a pair
    pub first_in_pair: bool,
    /// Reverse strand
    pub reverse_strand: bool,
    /// Properly paired
    pub proper_pair: bool,
    /// Unmapped
    pub unmapped: bool,
    /// Mate unmapped
    pub mate_unmapped: bool,
    /// Supplementary alignment
    pub supplementary: bool,
    /// Marked duplicate
    pub duplicate: bool,
}

impl ReadRow {
    /// Describes a record using reference names from the header.
    #[must_use]
    pub fn from_record(record: &RecordBuf, header: &Header) -> Self {
        let flags = record.flags();
        let name_of = |id: Option<usize>| {
            id.and_then(|id| contig_name(header, id)).unwrap_or_else(|| "*".to_string())
        };
        Self {
            fragment_id: read_name(record).unwrap_or_else(|| "*".to_string()),
            contig: name_of(record.reference_sequence_id()),
            start: record.alignment_start().map_or(0, usize::from),
            end: alignment_end(record).unwrap_or(0),
            cigar: cigar_to_string(record),
            insert_size: record.template_length(),
            mate_contig: name_of(record.mate_reference_sequence_id()),
            mate_start: record.mate_alignment_start().map_or(0, usize::from),
            mapping_quality: record.mapping_quality().map_or(255, |mq| mq.get()),
            sa_tag: sa_tag_value(record).unwrap_or_default(),
            flags: u16::from(flags),
            first_in_pair: flags.is_first_segment(),
            reverse_strand: flags.is_reverse_complemented(),
            proper_pair: flags.is_properly_segmented(),
            unmapped: flags.is_unmapped(),
            mate_unmapped: flags.is_mate_unmapped(),
            supplementary: flags.is_supplementary(),
            duplicate: flags.is_duplicate(),
        }
    }
}

/// BAM output plus an optional tab-separated reads table, each behind its own mutex.
pub struct SliceWriter {
    header: Header,
    bam: Mutex<BamWriter>,
    table: Option<Mutex<csv::Writer<File>>>,
    written: AtomicU64,
    failures: AtomicU64,
}

impl SliceWriter {
    /// Creates the BAM output (writing `header`) and, if requested, the reads table.
    ///
    /// # Errors
    /// Returns an error if either output cannot be created.
    pub fn new<P: AsRef<Path>>(
        output: P,
        header: &Header,
        reads_table: Option<&Path>,
        threads: usize,
        compression_level: u8,
    ) -> Result<Self> {
        let bam = create_bam_writer(output, header, threads, compression_level)?;
        let table = reads_table
            .map(|path| {
                csv::WriterBuilder::new()
                    .delimiter(b'\t')
                    .from_path(path)
                    .with_context(|| format!("Failed to create reads table: {}", path.display()))
            })
            .transpose()?;

        Ok(Self {
            header: header.clone(),
            bam: Mutex::new(bam),
            table: table.map(Mutex::new),
            written: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    /// Number of records written to the BAM output.
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Flushes the reads table and finalizes the BAM output.
    ///
    /// # Errors
    /// Returns an error if either output cannot be flushed.
    pub fn finish(self) -> Result<()> {
        if let Some(table) = self.table {
            table.into_inner().flush().context("Failed to flush reads table")?;
        }
        self.bam.into_inner().into_inner().finish().context("Failed to finish output BAM")
    }
}

impl OutputSink for SliceWriter {
    fn write_record(&self, record: &RecordBuf) {
        let result = self.bam.lock().write_alignment_record(&self.header, record);
        match result {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Failed to write record {}: {e}",
                    read_name(record).unwrap_or_else(|| "*".to_string())
                );
            }
        }
    }

    fn write_row(&self, record: &RecordBuf) {
        let Some(table) = &self.table else {
            return;
        };
        let row = ReadRow::from_record(record, &self.header);
        if let Err(e) = table.lock().serialize(&row) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            warn!("Failed to write reads-table row for {}: {e}", row.fragment_id);
        }
    }

    fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// In-memory sink that keeps every emitted record.
#[derive(Debug, Default)]
pub struct RecordCollector {
    records: Mutex<Vec<RecordBuf>>,
    rows: AtomicU64,
}

impl RecordCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records collected so far, in arrival order.
    #[must_use]
    pub fn records(&self) -> Vec<RecordBuf> {
        self.records.lock().clone()
    }

    /// Number of reads-table rows requested.
    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }
}

impl OutputSink for RecordCollector {
    fn write_record(&self, record: &RecordBuf) {
        self.records.lock().push(record.clone());
    }

    fn write_row(&self, _record: &RecordBuf) {
        self.rows.fetch_add(1, Ordering::Relaxed);
    }
}
