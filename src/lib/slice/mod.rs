//! Fragment-complete slicing.
//!
//! A *fragment* is every record sharing a query name: the primary alignments of a read pair plus
//! their supplementary pieces. Slicing guarantees that any fragment touching a target region is
//! written in full, even when some of its records map far away.
//!
//! - [`identity`] - what distinguishes one record of a fragment, and what it implies about the rest
//! - [`fragment`] - received and pending identities of one fragment
//! - [`registry`] - the shared table every record passes through exactly once
//! - [`scanner`] - the scan primitive over an indexed BAM or in-memory records
//! - [`sink`] - BAM and reads-table output
//! - [`worker`] - phase-one partition scans
//! - [`consolidate`] - merging of leftover pending positions
//! - [`remote`] - phase-two resolution of pending records
//! - [`slicer`] - the two-phase protocol

pub mod consolidate;
pub mod fragment;
pub mod identity;
pub mod registry;
pub mod remote;
pub mod scanner;
pub mod sink;
pub mod slicer;
pub mod worker;

pub use consolidate::{ConsolidatedRegion, RegionConsolidator};
pub use fragment::FragmentState;
pub use identity::{MateLocation, ObservedRead, PairSlot, ReadIdentity, Role};
pub use registry::{FragmentRegistry, IncompleteFragment, PendingPosition};
pub use remote::{RemoteLimits, RemoteResolver};
pub use scanner::{IndexedBamSource, RecordScanner, RecordStore, ScanControl, ScannerSource};
pub use sink::{OutputSink, ReadRow, RecordCollector, SliceWriter};
pub use slicer::{SliceConfig, SliceOutcome, Slicer};
pub use worker::{PartitionWorker, WorkerLimits};
