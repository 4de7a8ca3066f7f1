//! Merging of leftover pending positions into coordinate ranges.

use std::collections::BTreeMap;
use std::fmt;

use super::registry::PendingPosition;
use crate::region::GenomicRegion;

/// Default maximum gap between a window's end and the next position merged into it.
pub const DEFAULT_CONSOLIDATION_DISTANCE: usize = 10_000;

/// A closed coordinate range covering one or more pending positions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConsolidatedRegion {
    /// Reference sequence name
    pub contig: String,
    /// First pending position (1-based)
    pub start: usize,
    /// Last pending position (1-based, inclusive)
    pub end: usize,
}

impl ConsolidatedRegion {
    /// Whether `position` on `contig` lies within the region.
    #[must_use]
    pub fn contains(&self, contig: &str, position: usize) -> bool {
        self.contig == contig && self.start <= position && position <= self.end
    }
}

impl fmt::Display for ConsolidatedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.contig, self.start, self.end)
    }
}

impl From<&ConsolidatedRegion> for GenomicRegion {
    fn from(region: &ConsolidatedRegion) -> Self {
        GenomicRegion::new(region.contig.clone(), region.start, region.end)
    }
}

/// Groups nearby positions into windows.
#[derive(Debug, Clone, Copy)]
pub struct RegionConsolidator {
    distance: usize,
}

impl Default for RegionConsolidator {
    fn default() -> Self {
        Self::new(DEFAULT_CONSOLIDATION_DISTANCE)
    }
}

impl RegionConsolidator {
    /// Creates a consolidator that merges positions within `distance` of a window's end.
    #[must_use]
    pub fn new(distance: usize) -> Self {
        Self { distance }
    }

    /// Consolidates every contig's pending positions, in contig name order.
    #[must_use]
    pub fn consolidate(
        &self,
        pending: &BTreeMap<String, Vec<PendingPosition>>,
    ) -> Vec<ConsolidatedRegion> {
        pending
            .iter()
            .flat_map(|(contig, positions)| {
                self.consolidate_positions(contig, positions.iter().map(|p| p.position))
            })
            .collect()
    }

    /// Sorts one contig's positions and merges them while `next - end <= distance`.
    pub fn consolidate_positions(
        &self,
        contig: &str,
        positions: impl IntoIterator<Item = usize>,
    ) -> Vec<ConsolidatedRegion> {
        let mut positions: Vec<usize> = positions.into_iter().collect();
        positions.sort_unstable();

        let mut regions: Vec<ConsolidatedRegion> = Vec::new();
        for position in positions {
            match regions.last_mut() {
                Some(last) if position - last.end <= self.distance => last.end = position,
                _ => regions.push(ConsolidatedRegion {
                    contig: contig.to_string(),
                    start: position,
                    end: position,
                }),
            }
        }
        regions
    }
}
