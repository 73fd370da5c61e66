//! Per-pixel occurrence histograms
//!
//! A [`Histogram`] is a dense array of counters with one entry per HEALPix
//! pixel at a fixed order. Counting shards produce [`SparseHistogram`]
//! partials that a [`HistogramAggregator`] folds back into a dense array.

pub mod builder;
pub mod sparse;

pub use builder::{empty_histogram, generate_histogram, generate_histogram_parallel};
pub use sparse::{supplemental_count_histogram, HistogramAggregator, SparseHistogram};

use crate::healpix::{order_to_npix, MAX_ORDER};
use crate::{HatsError, Result};

/// Dense array of per-pixel counters at a fixed order.
///
/// Length is always `12 * 4^order`. Treated as immutable once handed to
/// the alignment phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    order: u8,
    counts: Vec<u64>,
}

impl Histogram {
    /// An all-zero histogram of the given order.
    pub fn new(order: u8) -> Self {
        Self {
            order,
            counts: vec![0; order_to_npix(order) as usize],
        }
    }

    /// Wrap existing counters, checking the length against the order.
    pub fn from_counts(order: u8, counts: Vec<u64>) -> Result<Self> {
        if order > MAX_ORDER {
            return Err(HatsError::Validation(format!(
                "order {order} exceeds maximum order {MAX_ORDER}"
            )));
        }
        if counts.len() as u64 != order_to_npix(order) {
            return Err(HatsError::Validation(format!(
                "histogram of order {order} must have {} entries, got {}",
                order_to_npix(order),
                counts.len()
            )));
        }
        Ok(Self { order, counts })
    }

    pub fn order(&self) -> u8 {
        self.order
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub(crate) fn counts_mut(&mut self) -> &mut [u64] {
        &mut self.counts
    }

    pub fn into_counts(self) -> Vec<u64> {
        self.counts
    }

    /// Total count across all pixels.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Largest single-pixel count.
    pub fn max(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Raw little-endian dump of the counters, no header. For tools that
    /// expect a plain binary array.
    pub fn write_raw(&self, writer: &mut impl std::io::Write) -> Result<()> {
        for count in &self.counts {
            writer.write_all(&count.to_le_bytes())?;
        }
        Ok(())
    }
}

impl std::ops::Index<u64> for Histogram {
    type Output = u64;

    fn index(&self, pixel: u64) -> &u64 {
        &self.counts[pixel as usize]
    }
}
