//! Histogram generation from tabular coordinate data

use crate::healpix::ang2pix;
use crate::histogram::sparse::supplemental_count_histogram;
use crate::histogram::{Histogram, HistogramAggregator};
use crate::table::RowSource;
use crate::{HatsError, Result};
use log::debug;
use rayon::prelude::*;

/// Rows per shard for parallel counting.
const PARALLEL_CHUNK_ROWS: usize = 65_536;

/// An all-zero histogram of the given order.
pub fn empty_histogram(highest_order: u8) -> Histogram {
    Histogram::new(highest_order)
}

/// Count, for every pixel at `highest_order`, the rows whose coordinates
/// project into it.
///
/// The sum of the result always equals the number of input rows.
pub fn generate_histogram(
    rows: &impl RowSource,
    highest_order: u8,
    ra_field: &str,
    dec_field: &str,
) -> Result<Histogram> {
    let (ra, dec) = resolve_coordinates(rows, ra_field, dec_field)?;

    let mut histogram = empty_histogram(highest_order);
    let counts = histogram.counts_mut();
    for (&ra, &dec) in ra.iter().zip(dec) {
        counts[ang2pix(highest_order, ra, dec) as usize] += 1;
    }
    debug!(
        "generated order-{highest_order} histogram from {} rows",
        ra.len()
    );
    Ok(histogram)
}

/// Parallel variant of [`generate_histogram`]: rows are split into shards,
/// each shard counted independently into a sparse partial, and the partials
/// merged through a [`HistogramAggregator`].
///
/// Produces the identical histogram to the sequential version; merging is
/// safe in any shard order because aggregator addition is associative and
/// commutative.
pub fn generate_histogram_parallel(
    rows: &(impl RowSource + Sync),
    highest_order: u8,
    ra_field: &str,
    dec_field: &str,
) -> Result<Histogram> {
    let (ra, dec) = resolve_coordinates(rows, ra_field, dec_field)?;

    let partials = ra
        .par_chunks(PARALLEL_CHUNK_ROWS)
        .zip(dec.par_chunks(PARALLEL_CHUNK_ROWS))
        .map(|(ra_chunk, dec_chunk)| {
            let mapped: Vec<u64> = ra_chunk
                .iter()
                .zip(dec_chunk)
                .map(|(&ra, &dec)| ang2pix(highest_order, ra, dec))
                .collect();
            let (partial, _) = supplemental_count_histogram(&mapped, None, highest_order)?;
            Ok(partial)
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("merging {} histogram shards", partials.len());
    let mut aggregator = HistogramAggregator::new(highest_order);
    for partial in &partials {
        aggregator.add(partial)?;
    }
    Ok(aggregator.into_histogram())
}

fn resolve_coordinates<'a>(
    rows: &'a impl RowSource,
    ra_field: &str,
    dec_field: &str,
) -> Result<(&'a [f64], &'a [f64])> {
    let (ra, dec) = match (rows.column(ra_field), rows.column(dec_field)) {
        (Some(ra), Some(dec)) => (ra, dec),
        _ => {
            return Err(HatsError::Validation(format!(
                "invalid column names in input: {ra_field}, {dec_field}"
            )))
        }
    };
    if ra.len() != rows.num_rows() || dec.len() != rows.num_rows() {
        return Err(HatsError::Validation(format!(
            "columns {ra_field}, {dec_field} do not match the table row count"
        )));
    }
    Ok((ra, dec))
}
