//! Threshold-constrained pixel alignment
//!
//! The partitioning decision: map every finest-order pixel to a destination
//! pixel of equal or coarser order such that no destination's aggregate
//! exceeds a capacity threshold, while destinations stay as spatially
//! coarse as the threshold allows.

mod engine;

pub use engine::generate_alignment;

use crate::healpix::order_to_npix;

/// Parameters of an alignment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentConfig {
    /// Finest order scanned; the input histogram's order.
    pub highest_order: u8,
    /// Floor on the destination order, preventing spatially huge pixels.
    pub lowest_order: u8,
    /// Capacity per destination pixel (rows, or weight units when a
    /// weight histogram is supplied).
    pub threshold: u64,
    /// Use the sibling-collapsing strategy: never merge a lone occupied
    /// pixel into an otherwise-empty parent, preserving locality for
    /// sparse clustered data.
    pub drop_empty_siblings: bool,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            highest_order: 10,
            lowest_order: 0,
            threshold: 1_000_000,
            drop_empty_siblings: false,
        }
    }
}

impl AlignmentConfig {
    pub fn new(highest_order: u8) -> Self {
        Self {
            highest_order,
            ..Default::default()
        }
    }

    pub fn with_lowest_order(mut self, lowest_order: u8) -> Self {
        self.lowest_order = lowest_order;
        self
    }

    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_drop_empty_siblings(mut self, drop_empty_siblings: bool) -> Self {
        self.drop_empty_siblings = drop_empty_siblings;
        self
    }
}

/// Destination of one finest-order pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelAssignment {
    /// Destination order, `lowest_order ..= highest_order`.
    pub order: u8,
    /// Destination pixel index at that order.
    pub pixel: u64,
    /// Rows aggregated into the destination.
    pub row_count: u64,
    /// Aggregate secondary weight of the destination; present only when a
    /// weight histogram drove the thresholding.
    pub weight: Option<u64>,
}

/// Alignment outcome for one finest-order pixel: empty sky, or assigned to
/// a destination shared with every sibling that aggregated into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentEntry {
    Empty,
    Assigned(PixelAssignment),
}

impl AlignmentEntry {
    pub fn is_empty(&self) -> bool {
        matches!(self, AlignmentEntry::Empty)
    }

    pub fn assignment(&self) -> Option<&PixelAssignment> {
        match self {
            AlignmentEntry::Empty => None,
            AlignmentEntry::Assigned(assignment) => Some(assignment),
        }
    }
}

/// Dense per-leaf destination map at the finest order. Produced once by
/// [`generate_alignment`], read-only afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    highest_order: u8,
    entries: Vec<AlignmentEntry>,
}

impl Alignment {
    pub(crate) fn new(highest_order: u8, entries: Vec<AlignmentEntry>) -> Self {
        debug_assert_eq!(entries.len() as u64, order_to_npix(highest_order));
        Self {
            highest_order,
            entries,
        }
    }

    pub fn highest_order(&self) -> u8 {
        self.highest_order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(AlignmentEntry::is_empty)
    }

    pub fn entry(&self, leaf: u64) -> &AlignmentEntry {
        &self.entries[leaf as usize]
    }

    pub fn entries(&self) -> &[AlignmentEntry] {
        &self.entries
    }

    /// Distinct destination pixels in ascending sky order.
    ///
    /// The leaves of one destination are contiguous in the nested
    /// numbering, so consecutive deduplication is exact.
    pub fn destination_pixels(&self) -> Vec<PixelAssignment> {
        let mut destinations: Vec<PixelAssignment> = Vec::new();
        for entry in &self.entries {
            if let AlignmentEntry::Assigned(assignment) = entry {
                let seen = destinations
                    .last()
                    .is_some_and(|last| last.order == assignment.order && last.pixel == assignment.pixel);
                if !seen {
                    destinations.push(*assignment);
                }
            }
        }
        destinations
    }

    /// Total rows across distinct destinations. Always equals the total of
    /// the histogram the alignment was generated from.
    pub fn assigned_row_total(&self) -> u64 {
        self.destination_pixels().iter().map(|a| a.row_count).sum()
    }
}
