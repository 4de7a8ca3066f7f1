//! The shared fragment registry.
//!
//! Every scanned record passes through [`FragmentRegistry::ingest`], which decides whether the
//! record is newly seen (and so must be written) and tracks what each fragment still lacks.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;
use parking_lot::Mutex;

use super::fragment::FragmentState;
use super::identity::{ObservedRead, ReadIdentity};

/// A pending identity projected onto the coordinate it is expected at.
///
/// Ordered by contig, position, then fragment id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PendingPosition {
    /// Reference sequence name
    pub contig: String,
    /// 1-based start the record is expected at
    pub position: usize,
    /// Query name of the fragment
    pub fragment_id: String,
}

/// A fragment still incomplete, with the identities it is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteFragment {
    /// Query name of the fragment
    pub fragment_id: String,
    /// Identities still pending, sorted by contig and position
    pub missing: Vec<ReadIdentity>,
    /// Non-secondary primary alignments received
    pub primaries_received: usize,
}

#[derive(Debug, Default)]
struct RegistryState {
    live: AHashMap<String, FragmentState>,
    completed: AHashSet<String>,
    completed_count: usize,
    remote_only: bool,
}

/// Thread-safe `fragment id -> FragmentState` table behind a single mutex.
///
/// States are created on first sight of a fragment (outside remote-only mode) and removed the
/// moment they become complete. Fragments that completed in phase one are remembered and never
/// re-created; the names are released on entering remote-only mode, where no state is created.
#[derive(Debug, Default)]
pub struct FragmentRegistry {
    state: Mutex<RegistryState>,
}

impl FragmentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a read to the registry; returns true when it is newly seen and must be written.
    ///
    /// Secondary alignments are not tracked for completeness: they are newly seen unless the
    /// live fragment already holds them, and always rejected in remote-only mode.
    pub fn ingest(&self, read: &ObservedRead) -> bool {
        let mut state = self.state.lock();
        let remote_only = state.remote_only;

        if read.identity.secondary {
            if remote_only {
                return false;
            }
            return match state.live.get_mut(&read.fragment_id) {
                Some(fragment) => fragment.receive(read),
                None => true,
            };
        }

        if state.completed.contains(&read.fragment_id) {
            return false;
        }

        if !state.live.contains_key(&read.fragment_id) {
            if remote_only {
                return false;
            }
            state.live.insert(read.fragment_id.clone(), FragmentState::new(read.paired));
        }
        let Some(fragment) = state.live.get_mut(&read.fragment_id) else {
            return false;
        };

        if !fragment.receive(read) {
            return false;
        }
        if fragment.is_complete() {
            state.live.remove(&read.fragment_id);
            state.completed_count += 1;
            if !remote_only {
                state.completed.insert(read.fragment_id.clone());
            }
        }
        true
    }

    /// Derives the read from a record outside the lock, then ingests it.
    ///
    /// Records without a name cannot be tracked; they are newly seen except in remote-only mode.
    pub fn ingest_record(&self, record: &RecordBuf, header: &Header) -> bool {
        match ObservedRead::from_record(record, header) {
            Some(read) => self.ingest(&read),
            None => !self.is_remote_only(),
        }
    }

    /// Switches remote-only mode, in which unknown fragments are never created.
    ///
    /// Entering the mode drops the names of completed fragments.
    pub fn set_remote_only(&self, remote_only: bool) {
        let mut state = self.state.lock();
        state.remote_only = remote_only;
        if remote_only {
            state.completed = AHashSet::new();
        }
    }

    /// Whether remote-only mode is on.
    #[must_use]
    pub fn is_remote_only(&self) -> bool {
        self.state.lock().remote_only
    }

    /// Pending positions of all live fragments, grouped by contig and sorted.
    ///
    /// Pending identities without a placement are omitted.
    #[must_use]
    pub fn collect_pending_positions(&self) -> BTreeMap<String, Vec<PendingPosition>> {
        let state = self.state.lock();
        let mut by_contig: BTreeMap<String, Vec<PendingPosition>> = BTreeMap::new();
        for (fragment_id, fragment) in &state.live {
            for identity in fragment.pending().filter(|id| id.position > 0) {
                by_contig.entry(identity.contig.clone()).or_default().push(PendingPosition {
                    contig: identity.contig.clone(),
                    position: identity.position,
                    fragment_id: fragment_id.clone(),
                });
            }
        }
        for positions in by_contig.values_mut() {
            positions.sort_unstable();
        }
        by_contig
    }

    /// Whether no fragment is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().live.is_empty()
    }

    /// Number of live (incomplete) fragments.
    #[must_use]
    pub fn live_fragments(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Number of fragments that completed.
    #[must_use]
    pub fn completed_fragments(&self) -> usize {
        self.state.lock().completed_count
    }

    /// All live fragments with their missing identities, sorted by fragment id.
    #[must_use]
    pub fn incomplete_fragments(&self) -> Vec<IncompleteFragment> {
        let state = self.state.lock();
        let mut fragments: Vec<IncompleteFragment> = state
            .live
            .iter()
            .map(|(fragment_id, fragment)| {
                let mut missing: Vec<ReadIdentity> = fragment.pending().cloned().collect();
                missing.sort_by(|a, b| (&a.contig, a.position).cmp(&(&b.contig, b.position)));
                IncompleteFragment {
                    fragment_id: fragment_id.clone(),
                    missing,
                    primaries_received: fragment.primaries_received(),
                }
            })
            .collect();
        fragments.sort_by(|a, b| a.fragment_id.cmp(&b.fragment_id));
        fragments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sam::builder::{RecordBuilder, create_header, mapped_pair};
    use std::sync::Arc;

    fn header() -> Header {
        create_header(&[("chr1", 100_000), ("chr2", 100_000)])
    }

    #[test]
    fn test_ingest_is_idempotent() {
        let header = header();
        let registry = FragmentRegistry::new();
        let (r1, _) = mapped_pair("frag", (0, 100), (0, 9000));

        assert!(registry.ingest_record(&r1, &header));
        assert!(!registry.ingest_record(&r1, &header));
        assert_eq!(registry.live_fragments(), 1);
    }

    #[test]
    fn test_pair_completes_and_is_removed() {
        let header = header();
        let registry = FragmentRegistry::new();
        let (r1, r2) = mapped_pair("frag", (0, 100), (0, 9000));

        assert!(registry.ingest_record(&r1, &header));
        assert!(!registry.is_empty());
        assert!(registry.ingest_record(&r2, &header));
        assert!(registry.is_empty());
        assert_eq!(registry.completed_fragments(), 1);
    }

    #[test]
    fn test_completed_fragment_is_never_recreated() {
        let header = header();
        let registry = FragmentRegistry::new();
        let (r1, r2) = mapped_pair("frag", (0, 100), (0, 9000));
        registry.ingest_record(&r1, &header);
        registry.ingest_record(&r2, &header);

        assert!(!registry.ingest_record(&r1, &header));
        assert!(!registry.ingest_record(&r2, &header));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remote_only_never_creates_states() {
        let header = header();
        let registry = FragmentRegistry::new();
        registry.set_remote_only(true);
        assert!(registry.is_remote_only());

        let (r1, _) = mapped_pair("frag", (0, 100), (0, 9000));
        assert!(!registry.ingest_record(&r1, &header));
        assert!(registry.is_empty());

        let unnamed = RecordBuilder::mapped_read().build();
        assert!(!registry.ingest_record(&unnamed, &header));
    }

    #[test]
    fn test_remote_only_releases_completed_names() {
        let header = header();
        let registry = FragmentRegistry::new();
        let (a1, a2) = mapped_pair("done", (0, 100), (0, 300));
        let (b1, b2) = mapped_pair("open", (0, 200), (1, 9000));
        for record in [&a1, &a2, &b1] {
            registry.ingest_record(record, &header);
        }
        assert_eq!(registry.state.lock().completed.len(), 1);

        registry.set_remote_only(true);
        assert!(registry.state.lock().completed.is_empty());
        assert!(!registry.ingest_record(&a1, &header));
        assert!(registry.ingest_record(&b2, &header));
        assert!(!registry.ingest_record(&b2, &header));

        assert!(registry.is_empty());
        assert!(registry.state.lock().completed.is_empty());
        assert_eq!(registry.completed_fragments(), 2);
    }

    #[test]
    fn test_remote_only_completes_known_fragment() {
        let header = header();
        let registry = FragmentRegistry::new();
        let (r1, r2) = mapped_pair("frag", (0, 100), (1, 9000));
        registry.ingest_record(&r1, &header);
        registry.set_remote_only(true);

        assert!(registry.ingest_record(&r2, &header));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_collect_pending_positions_sorted_by_contig_and_position() {
        let header = header();
        let registry = FragmentRegistry::new();
        for (name, mate) in [("b", (1, 500)), ("a", (1, 500)), ("c", (0, 9000)), ("d", (1, 20))] {
            let (r1, _) = mapped_pair(name, (0, 100), mate);
            registry.ingest_record(&r1, &header);
        }

        let pending = registry.collect_pending_positions();
        assert_eq!(pending.keys().cloned().collect::<Vec<_>>(), vec!["chr1", "chr2"]);
        assert_eq!(
            pending["chr2"]
                .iter()
                .map(|p| (p.position, p.fragment_id.as_str()))
                .collect::<Vec<_>>(),
            vec![(20, "d"), (500, "a"), (500, "b")]
        );
        assert_eq!(pending["chr1"].len(), 1);
        assert_eq!(pending["chr1"][0].position, 9000);
    }

    #[test]
    fn test_secondary_records() {
        let header = header();
        let registry = FragmentRegistry::new();
        let secondary = RecordBuilder::mapped_read()
            .name("frag")
            .first_segment(true)
            .secondary(true)
            .alignment_start(300)
            .build();

        // Unknown fragment: written, but no state is created.
        assert!(registry.ingest_record(&secondary, &header));
        assert!(registry.is_empty());

        // Live fragment: deduplicated against received identities.
        let (r1, _) = mapped_pair("frag", (0, 100), (0, 9000));
        registry.ingest_record(&r1, &header);
        assert!(registry.ingest_record(&secondary, &header));
        assert!(!registry.ingest_record(&secondary, &header));

        registry.set_remote_only(true);
        let other = RecordBuilder::mapped_read()
            .name("frag")
            .first_segment(true)
            .secondary(true)
            .alignment_start(700)
            .build();
        assert!(!registry.ingest_record(&other, &header));
    }

    #[test]
    fn test_incomplete_fragments_report() {
        let header = header();
        let registry = FragmentRegistry::new();
        let (r1, _) = mapped_pair("zeta", (0, 100), (1, 9000));
        let (a1, _) = mapped_pair("alpha", (0, 200), (0, 300));
        registry.ingest_record(&r1, &header);
        registry.ingest_record(&a1, &header);

        let incomplete = registry.incomplete_fragments();
        assert_eq!(incomplete.len(), 2);
        assert_eq!(incomplete[0].fragment_id, "alpha");
        assert_eq!(incomplete[1].missing.len(), 1);
        assert_eq!(incomplete[1].missing[0].contig, "chr2");
        assert_eq!(incomplete[1].primaries_received, 1);
    }

    #[test]
    fn test_concurrent_ingest_writes_each_record_once() {
        let header = Arc::new(header());
        let registry = Arc::new(FragmentRegistry::new());
        let records: Arc<Vec<_>> = Arc::new(
            (0..200)
                .flat_map(|i| {
                    let (r1, r2) = mapped_pair(&format!("frag{i}"), (0, 100 + i), (1, 5000 + i));
                    [r1, r2]
                })
                .collect(),
        );

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let (header, registry, records) =
                    (Arc::clone(&header), Arc::clone(&registry), Arc::clone(&records));
                std::thread::spawn(move || {
                    records.iter().filter(|r| registry.ingest_record(r, &header)).count()
                })
            })
            .collect();
        let written: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(written, 400);
        assert!(registry.is_empty());
        assert_eq!(registry.completed_fragments(), 200);
    }
}
