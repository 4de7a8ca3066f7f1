//! BAM file I/O utilities.
//!
//! Indexed readers for the scan primitive and a BAM writer that switches between single- and
//! multi-threaded BGZF compression.

use anyhow::{Context, Result};
use noodles::bam;
use noodles::bam::bai;
use noodles::bgzf;
use noodles::bgzf::io::writer::CompressionLevel;
use noodles::csi;
use noodles::sam::Header;
use std::fs::File;
use std::io::{self, Write};
use std::num::NonZero;
use std::path::Path;

use crate::validation::find_bam_index;

/// Indexed BAM reader over a plain file.
pub type IndexedBamReader = bam::io::IndexedReader<bgzf::io::Reader<File>>;

/// Enum wrapping single-threaded and multi-threaded BGZF writers
pub enum BgzfWriterEnum {
    /// Single-threaded BGZF writer
    SingleThreaded(bgzf::io::Writer<File>),
    /// Multi-threaded BGZF writer
    MultiThreaded(bgzf::io::MultithreadedWriter<File>),
}

impl Write for BgzfWriterEnum {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            BgzfWriterEnum::SingleThreaded(w) => w.write(buf),
            BgzfWriterEnum::MultiThreaded(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            BgzfWriterEnum::SingleThreaded(w) => w.flush(),
            BgzfWriterEnum::MultiThreaded(w) => w.flush(),
        }
    }
}

impl BgzfWriterEnum {
    /// Flush all pending blocks and write the EOF marker.
    ///
    /// # Errors
    /// Returns an error if flushing or finalizing the writer fails.
    pub fn finish(self) -> io::Result<()> {
        match self {
            BgzfWriterEnum::SingleThreaded(mut w) => w.try_finish(),
            BgzfWriterEnum::MultiThreaded(mut w) => w.finish().map(|_| ()),
        }
    }
}

/// BAM writer over either BGZF writer flavour
pub type BamWriter = bam::io::Writer<BgzfWriterEnum>;

/// Create a BAM writer and write the header.
///
/// `threads > 1` selects the multi-threaded BGZF writer. Compression levels outside 0-9 fall back
/// to the BGZF default.
///
/// # Errors
/// Returns an error if the file cannot be created or the header cannot be written
///
/// # Example
/// ```no_run
/// use fgslice_lib::bam_io::create_bam_writer;
/// use noodles::sam::Header;
///
/// let header = Header::default();
/// let mut writer = create_bam_writer("slice.bam", &header, 4, 5).unwrap();
/// ```
pub fn create_bam_writer<P: AsRef<Path>>(
    path: P,
    header: &Header,
    threads: usize,
    compression_level: u8,
) -> Result<BamWriter> {
    let path_ref = path.as_ref();
    let output_file = File::create(path_ref)
        .with_context(|| format!("Failed to create output BAM: {}", path_ref.display()))?;
    let level = CompressionLevel::new(compression_level);

    let bgzf_writer = match NonZero::new(threads).filter(|n| n.get() > 1) {
        Some(worker_count) => {
            let mut builder =
                bgzf::io::multithreaded_writer::Builder::default().set_worker_count(worker_count);
            if let Some(cl) = level {
                builder = builder.set_compression_level(cl);
            }
            BgzfWriterEnum::MultiThreaded(builder.build_from_writer(output_file))
        }
        None => {
            let mut builder = bgzf::io::writer::Builder::default();
            if let Some(cl) = level {
                builder = builder.set_compression_level(cl);
            }
            BgzfWriterEnum::SingleThreaded(builder.build_from_writer(output_file))
        }
    };

    let mut writer = bam::io::Writer::from(bgzf_writer);
    writer
        .write_header(header)
        .with_context(|| format!("Failed to write header to: {}", path_ref.display()))?;
    Ok(writer)
}

/// Open an indexed BAM reader and read its header.
///
/// The index is located with [`find_bam_index`]; both BAI and CSI indexes are accepted.
///
/// # Errors
/// Returns an error if no index exists, or the index, BAM or header cannot be read
pub fn open_indexed_bam<P: AsRef<Path>>(path: P) -> Result<(IndexedBamReader, Header)> {
    let path_ref = path.as_ref();
    let index_path = find_bam_index(path_ref)?;

    let builder = bam::io::indexed_reader::Builder::default();
    let builder = if index_path.extension().is_some_and(|ext| ext == "csi") {
        let index = csi::fs::read(&index_path)
            .with_context(|| format!("Failed to read CSI index: {}", index_path.display()))?;
        builder.set_index(index)
    } else {
        let index = bai::fs::read(&index_path)
            .with_context(|| format!("Failed to read BAI index: {}", index_path.display()))?;
        builder.set_index(index)
    };

    let mut reader = builder
        .build_from_path(path_ref)
        .with_context(|| format!("Failed to open input BAM: {}", path_ref.display()))?;
    let header = reader
        .read_header()
        .with_context(|| format!("Failed to read header from: {}", path_ref.display()))?;
    Ok((reader, header))
}
