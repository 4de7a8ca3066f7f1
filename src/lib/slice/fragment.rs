//! Per-fragment completeness state.

use ahash::AHashSet;

use super::identity::{ObservedRead, ReadIdentity};

/// Identities received so far for one fragment and identities still expected.
///
/// An identity is never in both sets. The fragment is complete when nothing is pending and at
/// least two (paired) or one (unpaired) non-secondary primary alignments have been received.
#[derive(Debug, Clone, Default)]
pub struct FragmentState {
    received: AHashSet<ReadIdentity>,
    pending: AHashSet<ReadIdentity>,
    paired: bool,
}

impl FragmentState {
    /// Creates an empty state.
    #[must_use]
    pub fn new(paired: bool) -> Self {
        Self { paired, ..Self::default() }
    }

    /// Records a newly received read and adds its expectations to the pending set.
    ///
    /// Returns false if the identity had already been received, leaving the state untouched.
    pub fn receive(&mut self, read: &ObservedRead) -> bool {
        if !self.received.insert(read.identity.clone()) {
            return false;
        }
        self.paired |= read.paired;
        self.pending.remove(&read.identity);
        for expected in &read.expected {
            if !self.received.contains(expected) && !self.pending.contains(expected) {
                self.pending.insert(expected.clone());
            }
        }
        true
    }

    /// Number of non-secondary primary alignments received.
    #[must_use]
    pub fn primaries_received(&self) -> usize {
        self.received.iter().filter(|id| id.is_primary()).count()
    }

    /// Whether every expected record has been received.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let required = if self.paired { 2 } else { 1 };
        self.pending.is_empty() && self.primaries_received() >= required
    }

    /// Identities still expected.
    pub fn pending(&self) -> impl Iterator<Item = &ReadIdentity> {
        self.pending.iter()
    }
}
