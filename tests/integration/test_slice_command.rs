//! Integration tests for the slice command.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use fgoxide::io::DelimFile;
use fgslice_lib::metrics::SliceMetrics;
use fgslice_lib::sam::builder::{RecordBuilder, create_header, mapped_pair};
use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::header::record::value::map::header::tag::SORT_ORDER;
use tempfile::TempDir;

use crate::helpers::{read_bam, sorted_names, write_indexed_bam};

fn header() -> Header {
    create_header(&[("chr1", 20_000), ("chr2", 20_000)])
}

/// A pair near chr1:100 whose mate lies at chr1:9000, a pair elsewhere on chr1, a split read whose
/// supplementary lies on chr2 and an unrelated pair on chr2.
fn fixture_records() -> Vec<RecordBuf> {
    let (near, far) = mapped_pair("distant", (0, 120), (0, 9000));
    let (other1, other2) = mapped_pair("elsewhere", (0, 5000), (0, 5200));
    let split_r1 = RecordBuilder::mapped_read()
        .name("split")
        .first_segment(true)
        .properly_paired(true)
        .alignment_start(150)
        .cigar("30M20S")
        .mate(0, 400)
        .tag("SA", "chr2,7000,+,30S20M,60,0;")
        .build();
    let split_r2 = RecordBuilder::mapped_read()
        .name("split")
        .first_segment(false)
        .properly_paired(true)
        .reverse_complement(true)
        .alignment_start(400)
        .mate(0, 150)
        .build();
    let split_supplementary = RecordBuilder::mapped_read()
        .name("split")
        .first_segment(true)
        .supplementary(true)
        .reference_sequence_id(1)
        .alignment_start(7000)
        .cigar("30H20M")
        .mate(0, 400)
        .tag("SA", "chr1,150,+,30M20S,60,0;")
        .build();
    let (chr2_a, chr2_b) = mapped_pair("unrelated", (1, 3000), (1, 3100));
    vec![near, far, other1, other2, split_r1, split_r2, split_supplementary, chr2_a, chr2_b]
}

fn write_fixture(dir: &Path) -> PathBuf {
    let input = dir.join("input.bam");
    write_indexed_bam(&input, &header(), fixture_records());
    input
}

fn run_slice(input: &Path, output: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fgslice"))
        .arg("slice")
        .args(["--input", input.to_str().unwrap(), "--output", output.to_str().unwrap()])
        .args(["--compression-level", "1"])
        .args(extra)
        .output()
        .expect("Failed to run slice command")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "slice failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_slice_pulls_in_distant_mates_and_supplementaries() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(dir.path());
    let output = dir.path().join("out.bam");
    let metrics_path = dir.path().join("metrics.tsv");
    let reads_path = dir.path().join("reads.tsv");
    let remote_path = dir.path().join("remote.bed");

    let result = run_slice(
        &input,
        &output,
        &[
            "--regions",
            "chr1:100-200",
            "--metrics",
            metrics_path.to_str().unwrap(),
            "--reads-table",
            reads_path.to_str().unwrap(),
            "--remote-regions",
            remote_path.to_str().unwrap(),
        ],
    );
    assert_success(&result);

    let (_, records) = read_bam(&output);
    assert_eq!(sorted_names(&records), ["distant", "distant", "split", "split", "split"]);

    let metrics: Vec<SliceMetrics> = DelimFile::default().read_tsv(&metrics_path).unwrap();
    assert_eq!(metrics.len(), 1);
    let metrics = &metrics[0];
    assert_eq!(metrics.fragments_completed, 2);
    assert_eq!(metrics.fragments_unresolved, 0);
    assert_eq!(metrics.records_written(), 5);
    assert_eq!(metrics.pending_positions, 3);

    let reads = fs::read_to_string(&reads_path).unwrap();
    let lines: Vec<&str> = reads.lines().collect();
    assert_eq!(lines.len(), 6);
    assert!(lines[0].starts_with("fragment_id\tcontig\tstart"));

    let remote = fs::read_to_string(&remote_path).unwrap();
    assert_eq!(remote, "chr1\t399\t9000\nchr2\t6999\t7000\n");
}

#[test]
fn test_slice_output_header_is_unsorted_with_program_record() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(dir.path());
    let output = dir.path().join("out.bam");

    assert_success(&run_slice(&input, &output, &["--regions", "chr2:2900-3200"]));

    let (header, records) = read_bam(&output);
    let sort_order = header.header().and_then(|hd| hd.other_fields().get(&SORT_ORDER)).cloned();
    assert_eq!(sort_order.as_ref().map(|v| v.to_string()), Some("unsorted".to_string()));
    assert!(header.programs().as_ref().contains_key(&b"fgslice"[..]));
    assert_eq!(sorted_names(&records), ["unrelated", "unrelated"]);
}

#[test]
fn test_slice_whole_genome_writes_every_record_once() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(dir.path());
    let output = dir.path().join("out.bam");

    assert_success(&run_slice(
        &input,
        &output,
        &["--threads", "3", "--partition-size", "1000"],
    ));

    let (_, records) = read_bam(&output);
    assert_eq!(records.len(), fixture_records().len());
}

#[test]
fn test_slice_regions_file() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(dir.path());
    let output = dir.path().join("out.bam");
    let bed = dir.path().join("targets.bed");
    fs::write(&bed, "track name=targets\nchr1\t4999\t5010\n").unwrap();

    assert_success(&run_slice(&input, &output, &["--regions-file", bed.to_str().unwrap()]));

    let (_, records) = read_bam(&output);
    assert_eq!(sorted_names(&records), ["elsewhere", "elsewhere"]);
}

#[test]
fn test_slice_missing_mate_in_excluded_region() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    let (lonely, _) = mapped_pair("lonely", (0, 100), (1, 15_000));
    write_indexed_bam(&input, &header(), vec![lonely]);
    let excluded = dir.path().join("excluded.bed");
    fs::write(&excluded, "chr2\t14000\t16000\n").unwrap();
    let metrics_path = dir.path().join("metrics.tsv");
    let output = dir.path().join("out.bam");

    assert_success(&run_slice(
        &input,
        &output,
        &[
            "--regions",
            "chr1:1-1000",
            "--excluded-regions",
            excluded.to_str().unwrap(),
            "--drop-excluded",
            "--metrics",
            metrics_path.to_str().unwrap(),
        ],
    ));

    let metrics: Vec<SliceMetrics> = DelimFile::default().read_tsv(&metrics_path).unwrap();
    assert_eq!(metrics[0].fragments_excluded, 1);
    assert_eq!(metrics[0].fragments_unresolved, 0);
    assert_eq!(metrics[0].remote_excluded_positions, 1);
    assert_eq!(read_bam(&output).1.len(), 1);
}

#[test]
fn test_slice_fails_without_index() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(dir.path());
    fs::remove_file(dir.path().join("input.bam.bai")).unwrap();

    let result = run_slice(&input, &dir.path().join("out.bam"), &["--regions", "chr1"]);

    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("No BAI or CSI index"));
}

#[test]
fn test_slice_fails_on_unknown_contig() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(dir.path());

    let result = run_slice(&input, &dir.path().join("out.bam"), &["--regions", "chrZ:1-100"]);

    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("chrZ"));
}

#[test]
fn test_slice_rejects_zero_partition_size() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(dir.path());

    let result = run_slice(&input, &dir.path().join("out.bam"), &["--partition-size", "0"]);

    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("partition-size"));
}
