//! Sparse histogram partials and their aggregation
//!
//! Counting runs in parallel shards; each shard ships its non-zero pixels
//! as a [`SparseHistogram`], and a [`HistogramAggregator`] folds any number
//! of partials back into one dense array. Addition is associative and
//! commutative, so partials may be grouped and merged in any order.

use crate::healpix::{order_to_npix, MAX_ORDER};
use crate::histogram::Histogram;
use crate::{HatsError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Archive magic: "SPHG" followed by a format version byte.
const ARCHIVE_MAGIC: [u8; 4] = *b"SPHG";
const ARCHIVE_VERSION: u8 = 1;

/// Non-zero pixels of a histogram at a given order.
///
/// For a dense order-0 histogram
/// `[0, 4, 0, 0, 0, 0, 0, 0, 9, 0, 0, 0]` the sparse form is
/// `SparseHistogram::new(vec![1, 8], vec![4, 9], 0)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseHistogram {
    indexes: Vec<u64>,
    counts: Vec<u64>,
    order: u8,
}

impl SparseHistogram {
    pub fn new(indexes: Vec<u64>, counts: Vec<u64>, order: u8) -> Result<Self> {
        if order > MAX_ORDER {
            return Err(HatsError::Validation(format!(
                "order {order} exceeds maximum order {MAX_ORDER}"
            )));
        }
        if indexes.len() != counts.len() {
            return Err(HatsError::Validation(
                "indexes and counts must be same length".to_string(),
            ));
        }
        let npix = order_to_npix(order);
        if let Some(&bad) = indexes.iter().find(|&&i| i >= npix) {
            return Err(HatsError::Validation(format!(
                "index {bad} is out of range for order {order}"
            )));
        }
        Ok(Self { indexes, counts, order })
    }

    pub fn indexes(&self) -> &[u64] {
        &self.indexes
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn order(&self) -> u8 {
        self.order
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Expand to the dense histogram of the matching order.
    pub fn to_array(&self) -> Histogram {
        let mut histogram = Histogram::new(self.order);
        let counts = histogram.counts_mut();
        for (&index, &count) in self.indexes.iter().zip(&self.counts) {
            counts[index as usize] = count;
        }
        histogram
    }

    /// Persist to a self-describing archive: magic + version + bincode
    /// payload + CRC32 trailer over the payload.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let payload = bincode::serialize(self)?;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        let crc = hasher.finalize();

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&ARCHIVE_MAGIC)?;
        writer.write_all(&[ARCHIVE_VERSION])?;
        writer.write_all(&(payload.len() as u64).to_le_bytes())?;
        writer.write_all(&payload)?;
        writer.write_all(&crc.to_le_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Reload an archive written by [`SparseHistogram::to_file`]. Round
    /// trips reproduce bit-identical indexes, counts, and order.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let corrupted = || HatsError::CorruptedFile(path.to_path_buf());

        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        if bytes.len() < 17 || bytes[..4] != ARCHIVE_MAGIC || bytes[4] != ARCHIVE_VERSION {
            return Err(corrupted());
        }
        let payload_len =
            u64::from_le_bytes(bytes[5..13].try_into().map_err(|_| corrupted())?) as usize;
        if bytes.len() != 13 + payload_len + 4 {
            return Err(corrupted());
        }
        let payload = &bytes[13..13 + payload_len];
        let stored_crc = u32::from_le_bytes(bytes[13 + payload_len..].try_into().map_err(|_| corrupted())?);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(payload);
        if hasher.finalize() != stored_crc {
            return Err(corrupted());
        }

        let archived: SparseHistogram = bincode::deserialize(payload)?;
        // Re-validate: the file may predate this process.
        Self::new(archived.indexes, archived.counts, archived.order)
    }

    /// Persist the DENSE expansion as a raw little-endian counter blob,
    /// no header.
    pub fn to_dense_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_array().write_raw(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Accumulates sparse partials into one dense counter array at a fixed
/// order. Single writer; parallel callers keep one aggregator per worker
/// and merge the extracted partials afterward.
#[derive(Debug)]
pub struct HistogramAggregator {
    order: u8,
    full_histogram: Vec<u64>,
}

impl HistogramAggregator {
    pub fn new(order: u8) -> Self {
        Self {
            order,
            full_histogram: vec![0; order_to_npix(order) as usize],
        }
    }

    pub fn order(&self) -> u8 {
        self.order
    }

    /// Add a sparse partial into the accumulator. Overlapping indexes
    /// across repeated calls accumulate; a partial with no entries is a
    /// no-op. Fails when the orders disagree.
    pub fn add(&mut self, other: &SparseHistogram) -> Result<()> {
        if self.order != other.order {
            return Err(HatsError::Validation(
                "histogram partials have incompatible sizes due to different healpix orders"
                    .to_string(),
            ));
        }
        for (&index, &count) in other.indexes.iter().zip(&other.counts) {
            self.full_histogram[index as usize] += count;
        }
        Ok(())
    }

    /// Extract the non-zero entries, in ascending index order.
    pub fn to_sparse(&self) -> SparseHistogram {
        let mut indexes = Vec::new();
        let mut counts = Vec::new();
        for (index, &count) in self.full_histogram.iter().enumerate() {
            if count != 0 {
                indexes.push(index as u64);
                counts.push(count);
            }
        }
        debug!(
            "extracted {} non-zero pixels from order-{} aggregator",
            indexes.len(),
            self.order
        );
        SparseHistogram {
            indexes,
            counts,
            order: self.order,
        }
    }

    /// Consume the aggregator, yielding the dense accumulator.
    pub fn into_histogram(self) -> Histogram {
        // Infallible: the accumulator length is fixed at construction.
        match Histogram::from_counts(self.order, self.full_histogram) {
            Ok(histogram) => histogram,
            Err(_) => unreachable!(),
        }
    }
}

/// Per-pixel row counts for pre-mapped destination pixels, plus (when a
/// parallel secondary value is supplied) per-pixel sums of that value.
///
/// This lets a counting pass that already knows each row's destination
/// cell produce both a row-count partial and e.g. a memory-size partial
/// without re-deriving destinations.
pub fn supplemental_count_histogram(
    mapped_pixels: &[u64],
    supplemental_values: Option<&[u64]>,
    highest_order: u8,
) -> Result<(SparseHistogram, Option<SparseHistogram>)> {
    let mut row_counts: BTreeMap<u64, u64> = BTreeMap::new();
    for &pixel in mapped_pixels {
        *row_counts.entry(pixel).or_insert(0) += 1;
    }
    let row_count_histogram = SparseHistogram::new(
        row_counts.keys().copied().collect(),
        row_counts.values().copied().collect(),
        highest_order,
    )?;

    let supplemental_histogram = match supplemental_values {
        None => None,
        Some(values) => {
            if values.len() != mapped_pixels.len() {
                return Err(HatsError::Validation(
                    "supplemental values and mapped pixels must be same length".to_string(),
                ));
            }
            let mut sums: BTreeMap<u64, u64> = BTreeMap::new();
            for (&pixel, &value) in mapped_pixels.iter().zip(values) {
                *sums.entry(pixel).or_insert(0) += value;
            }
            Some(SparseHistogram::new(
                sums.keys().copied().collect(),
                sums.values().copied().collect(),
                highest_order,
            )?)
        }
    };

    Ok((row_count_histogram, supplemental_histogram))
}
