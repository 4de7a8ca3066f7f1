//! Utilities for generating indexed test BAM files programmatically.

use std::fs::File;
use std::path::Path;

use noodles::bam;
use noodles::bam::bai;
use noodles::sam::Header;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record_buf::RecordBuf;

/// Writes `records` in coordinate order to `path` and creates `<path>.bai` next to it.
///
/// `header` must declare a coordinate sort order.
pub fn write_indexed_bam(path: &Path, header: &Header, mut records: Vec<RecordBuf>) {
    records.sort_by_key(|r| {
        (r.reference_sequence_id().unwrap_or(usize::MAX), r.alignment_start().map(usize::from))
    });

    let mut writer = bam::io::Writer::new(File::create(path).expect("Failed to create BAM"));
    writer.write_header(header).expect("Failed to write header");
    for record in &records {
        writer.write_alignment_record(header, record).expect("Failed to write record");
    }
    writer.try_finish().expect("Failed to finish BAM");
    drop(writer);

    let index = bam::fs::index(path).expect("Failed to index BAM");
    let mut index_path = path.as_os_str().to_owned();
    index_path.push(".bai");
    let mut index_writer =
        bai::io::Writer::new(File::create(index_path).expect("Failed to create index"));
    index_writer.write_index(&index).expect("Failed to write index");
}

/// Reads the header and every record of a BAM file.
pub fn read_bam(path: &Path) -> (Header, Vec<RecordBuf>) {
    let mut reader = bam::io::Reader::new(File::open(path).expect("Failed to open BAM"));
    let header = reader.read_header().expect("Failed to read header");
    let records = reader
        .record_bufs(&header)
        .collect::<std::io::Result<Vec<_>>>()
        .expect("Failed to read records");
    (header, records)
}

/// Query names of `records`, sorted.
pub fn sorted_names(records: &[RecordBuf]) -> Vec<String> {
    let mut names: Vec<String> =
        records.iter().filter_map(|r| r.name().map(|n| n.to_string())).collect();
    names.sort();
    names
}
