//! Alignment generation
//!
//! Two strategies over a shared nested-sum pyramid:
//!
//! - top-down first fit (default): sweep orders coarse to fine; the first
//!   ancestor under the threshold absorbs its whole subtree.
//! - bottom-up sibling collapsing (`drop_empty_siblings`): sweep fine to
//!   coarse, collapsing a quad only when more than one child carries
//!   content and the quad total fits the threshold. Slower, but keeps an
//!   isolated hot spot from being merged into a mostly-empty ancestor.

use crate::alignment::{Alignment, AlignmentConfig, AlignmentEntry, PixelAssignment};
use crate::healpix::order_to_npix;
use crate::histogram::Histogram;
use crate::{HatsError, Result};
use log::debug;

/// Per-order cell sums, order 0 through the finest order, each cell the
/// sum of its four children. An arena of flat buffers addressed by
/// `(order, pixel)`; no pointer tree.
struct NestedSums {
    sums: Vec<Vec<u64>>,
}

impl NestedSums {
    fn build(histogram: &Histogram, highest_order: u8, lowest_order: u8) -> Self {
        let mut sums: Vec<Vec<u64>> = (0..highest_order)
            .map(|order| vec![0u64; order_to_npix(order) as usize])
            .collect();
        sums.push(histogram.counts().to_vec());

        // Work backward from the finest order, accumulating each pixel
        // into its parent via the index >> 2 relation.
        for read_order in ((lowest_order + 1)..=highest_order).rev() {
            let (lower, upper) = sums.split_at_mut(read_order as usize);
            let parents = &mut lower[read_order as usize - 1];
            for (pixel, &value) in upper[0].iter().enumerate() {
                parents[pixel >> 2] += value;
            }
        }
        Self { sums }
    }

    #[inline]
    fn at(&self, order: u8) -> &[u64] {
        &self.sums[order as usize]
    }
}

/// Compute the destination pixel of every finest-order pixel, subject to
/// the capacity threshold.
///
/// When `weights` is supplied it takes thresholding precedence over the
/// raw row counts; row counts are still carried through for reporting.
/// Fails when histogram sizes disagree with `config.highest_order`, when
/// `lowest_order > highest_order`, or when any single finest-order pixel
/// already exceeds the threshold (an indivisible pixel cannot be split,
/// so no aggregation could recover).
pub fn generate_alignment(
    row_counts: &Histogram,
    weights: Option<&Histogram>,
    config: &AlignmentConfig,
) -> Result<Alignment> {
    if row_counts.order() != config.highest_order {
        return Err(HatsError::Validation(
            "row count histogram is not the right size".to_string(),
        ));
    }
    if let Some(weights) = weights {
        if weights.order() != config.highest_order {
            return Err(HatsError::Validation(
                "weight histogram is not the right size".to_string(),
            ));
        }
    }
    if config.lowest_order > config.highest_order {
        return Err(HatsError::Validation(
            "lowest_order should be less than highest_order".to_string(),
        ));
    }
    match weights {
        Some(weights) if weights.max() > config.threshold => {
            return Err(HatsError::Validation(format!(
                "single pixel weight {} exceeds threshold {}",
                weights.max(),
                config.threshold
            )));
        }
        None if row_counts.max() > config.threshold => {
            return Err(HatsError::Validation(format!(
                "single pixel row count {} exceeds threshold {}",
                row_counts.max(),
                config.threshold
            )));
        }
        _ => {}
    }

    let count_sums = NestedSums::build(row_counts, config.highest_order, config.lowest_order);
    let weight_sums =
        weights.map(|weights| NestedSums::build(weights, config.highest_order, config.lowest_order));
    debug!(
        "aligning order {}..={} histogram, threshold {}, drop_empty_siblings={}",
        config.lowest_order, config.highest_order, config.threshold, config.drop_empty_siblings
    );

    let entries = if config.drop_empty_siblings {
        align_collapsing_siblings(&count_sums, weight_sums.as_ref(), config)
    } else {
        align_first_fit(&count_sums, weight_sums.as_ref(), config)
    };
    Ok(Alignment::new(config.highest_order, entries))
}

/// Top-down first-fit sweep. A single forward pass: each pixel inherits
/// its parent's destination if one exists, stays unassigned if empty,
/// claims itself if it fits the threshold, and otherwise defers to finer
/// orders.
fn align_first_fit(
    count_sums: &NestedSums,
    weight_sums: Option<&NestedSums>,
    config: &AlignmentConfig,
) -> Vec<AlignmentEntry> {
    let decision = weight_sums.unwrap_or(count_sums);

    // Only the parent order's destinations are needed at each step, so
    // keep two rows instead of the full per-order map.
    let mut parent_row: Vec<Option<(u8, u64)>> = Vec::new();
    for read_order in config.lowest_order..=config.highest_order {
        let npix = order_to_npix(read_order) as usize;
        let mut row: Vec<Option<(u8, u64)>> = vec![None; npix];
        let sums = decision.at(read_order);
        for (pixel, destination) in row.iter_mut().enumerate() {
            if let Some(inherited) = parent_row.get(pixel >> 2).copied().flatten() {
                *destination = Some(inherited);
            } else if sums[pixel] != 0 && sums[pixel] <= config.threshold {
                *destination = Some((read_order, pixel as u64));
            }
        }
        parent_row = row;
    }

    parent_row
        .into_iter()
        .map(|destination| match destination {
            None => AlignmentEntry::Empty,
            Some((order, pixel)) => {
                AlignmentEntry::Assigned(assignment(order, pixel, count_sums, weight_sums))
            }
        })
        .collect()
}

/// Bottom-up sibling-collapsing sweep. `quad_sum` is a pixel's pyramid
/// sum, `quad_max` the largest sum among its four children; the quad
/// collapses only when `quad_sum != quad_max` (more than one child carries
/// content) and `quad_sum` fits the threshold. Coarser orders may collapse
/// again, so each leaf ends at the coarsest qualifying ancestor.
fn align_collapsing_siblings(
    count_sums: &NestedSums,
    weight_sums: Option<&NestedSums>,
    config: &AlignmentConfig,
) -> Vec<AlignmentEntry> {
    let decision = weight_sums.unwrap_or(count_sums);
    let highest = config.highest_order;

    // Destination order per leaf; None marks empty sky.
    let mut order_map: Vec<Option<u8>> = decision
        .at(highest)
        .iter()
        .map(|&count| (count > 0).then_some(highest))
        .collect();

    for pixel_order in (config.lowest_order..highest).rev() {
        let leaves_per_pixel = 1usize << (2 * (highest - pixel_order));
        let sums = decision.at(pixel_order);
        let child_sums = decision.at(pixel_order + 1);
        for (pixel, &quad_sum) in sums.iter().enumerate() {
            if quad_sum == 0 || quad_sum > config.threshold {
                continue;
            }
            let quad_max = child_sums[pixel * 4..pixel * 4 + 4]
                .iter()
                .copied()
                .max()
                .unwrap_or(0);
            if quad_sum != quad_max {
                let start = pixel * leaves_per_pixel;
                order_map[start..start + leaves_per_pixel].fill(Some(pixel_order));
            }
        }
    }

    order_map
        .into_iter()
        .enumerate()
        .map(|(leaf, destination_order)| match destination_order {
            None => AlignmentEntry::Empty,
            Some(order) => {
                let pixel = (leaf as u64) >> (2 * (highest - order) as u64);
                AlignmentEntry::Assigned(assignment(order, pixel, count_sums, weight_sums))
            }
        })
        .collect()
}

fn assignment(
    order: u8,
    pixel: u64,
    count_sums: &NestedSums,
    weight_sums: Option<&NestedSums>,
) -> PixelAssignment {
    PixelAssignment {
        order,
        pixel,
        row_count: count_sums.at(order)[pixel as usize],
        weight: weight_sums.map(|sums| sums.at(order)[pixel as usize]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::empty_histogram;

    fn histogram_with(order: u8, entries: &[(u64, u64)]) -> Histogram {
        let mut counts = empty_histogram(order).into_counts();
        for &(pixel, count) in entries {
            counts[pixel as usize] = count;
        }
        Histogram::from_counts(order, counts).unwrap()
    }

    fn assigned(entry: &AlignmentEntry) -> &PixelAssignment {
        entry.assignment().expect("expected an assigned entry")
    }

    #[test]
    fn test_wrong_histogram_size() {
        let histogram = empty_histogram(1);
        let config = AlignmentConfig::new(0).with_threshold(250);
        let result = generate_alignment(&histogram, None, &config);
        assert!(matches!(result, Err(HatsError::Validation(_))));
    }

    #[test]
    fn test_wrong_weight_size() {
        let histogram = empty_histogram(1);
        let weights = empty_histogram(2);
        let config = AlignmentConfig::new(1).with_threshold(250);
        let result = generate_alignment(&histogram, Some(&weights), &config);
        assert!(matches!(result, Err(HatsError::Validation(_))));
    }

    #[test]
    fn test_lowest_order_too_large() {
        let histogram = empty_histogram(1);
        let config = AlignmentConfig::new(1).with_lowest_order(2).with_threshold(20);
        let result = generate_alignment(&histogram, None, &config);
        assert!(matches!(result, Err(HatsError::Validation(_))));
    }

    #[test]
    fn test_leaf_exceeds_threshold() {
        let histogram = histogram_with(0, &[(11, 131)]);
        let config = AlignmentConfig::new(0).with_threshold(20);
        let result = generate_alignment(&histogram, None, &config);
        assert!(matches!(result, Err(HatsError::Validation(_))));
    }

    #[test]
    fn test_leaf_exceeds_threshold_order2() {
        let filled: Vec<u64> = vec![4, 11, 14, 13, 5, 7, 8, 9, 11, 23, 4, 4, 17, 0, 1, 0];
        let entries: Vec<(u64, u64)> =
            filled.iter().enumerate().map(|(i, &c)| (176 + i as u64, c)).collect();
        let histogram = histogram_with(2, &entries);
        let config = AlignmentConfig::new(2).with_threshold(20);
        let result = generate_alignment(&histogram, None, &config);
        assert!(matches!(result, Err(HatsError::Validation(_))));
    }

    #[test]
    fn test_weight_thresholding_precedence() {
        // Row counts exceed the threshold, but the weights (which take
        // precedence) do not.
        let counts = histogram_with(0, &[(11, 500)]);
        let weights = histogram_with(0, &[(11, 10)]);
        let config = AlignmentConfig::new(0).with_threshold(20);

        assert!(generate_alignment(&counts, None, &config).is_err());

        let alignment = generate_alignment(&counts, Some(&weights), &config).unwrap();
        let destination = assigned(alignment.entry(11));
        assert_eq!(destination.order, 0);
        assert_eq!(destination.pixel, 11);
        assert_eq!(destination.row_count, 500);
        assert_eq!(destination.weight, Some(10));
    }

    #[test]
    fn test_small_sky_order0() {
        for drop_empty_siblings in [false, true] {
            let histogram = histogram_with(0, &[(11, 131)]);
            let config = AlignmentConfig::new(0)
                .with_threshold(250)
                .with_drop_empty_siblings(drop_empty_siblings);
            let alignment = generate_alignment(&histogram, None, &config).unwrap();

            assert_eq!(alignment.len(), 12);
            for pixel in 0..11 {
                assert!(alignment.entry(pixel).is_empty());
            }
            let destination = assigned(alignment.entry(11));
            assert_eq!((destination.order, destination.pixel, destination.row_count), (0, 11, 131));
            assert_eq!(destination.weight, None);
        }
    }

    #[test]
    fn test_small_sky_order1() {
        // All four children of base pixel 11 fit together under the
        // threshold, so both strategies aggregate to (0, 11).
        for drop_empty_siblings in [false, true] {
            let histogram =
                histogram_with(1, &[(44, 42), (45, 29), (46, 42), (47, 18)]);
            let config = AlignmentConfig::new(1)
                .with_threshold(250)
                .with_drop_empty_siblings(drop_empty_siblings);
            let alignment = generate_alignment(&histogram, None, &config).unwrap();

            assert_eq!(alignment.len(), 48);
            for leaf in 0..44 {
                assert!(alignment.entry(leaf).is_empty());
            }
            for leaf in 44..48 {
                let destination = assigned(alignment.entry(leaf));
                assert_eq!(
                    (destination.order, destination.pixel, destination.row_count),
                    (0, 11, 131)
                );
            }
        }
    }

    #[test]
    fn test_lone_occupied_sibling() {
        // One occupied leaf under an otherwise-empty parent: first fit
        // absorbs the quad into the parent, sibling collapsing keeps the
        // leaf at its own order.
        let histogram = histogram_with(1, &[(44, 100)]);

        let config = AlignmentConfig::new(1).with_threshold(250);
        let alignment = generate_alignment(&histogram, None, &config).unwrap();
        for leaf in 44..48 {
            let destination = assigned(alignment.entry(leaf));
            assert_eq!(
                (destination.order, destination.pixel, destination.row_count),
                (0, 11, 100)
            );
        }

        let config = config.with_drop_empty_siblings(true);
        let alignment = generate_alignment(&histogram, None, &config).unwrap();
        let destination = assigned(alignment.entry(44));
        assert_eq!(
            (destination.order, destination.pixel, destination.row_count),
            (1, 44, 100)
        );
        for leaf in 45..48 {
            assert!(alignment.entry(leaf).is_empty());
        }
    }

    #[test]
    fn test_uniform_distribution_destination_order() {
        // Uniform 40 rows per order-7 pixel with threshold 1000: an
        // order-5 pixel aggregates 16 * 40 = 640 <= 1000, while an
        // order-4 pixel would aggregate 2560. Every destination must be
        // order 5.
        let counts = vec![40u64; order_to_npix(7) as usize];
        let histogram = Histogram::from_counts(7, counts).unwrap();
        let config = AlignmentConfig::new(7).with_threshold(1000);
        let alignment = generate_alignment(&histogram, None, &config).unwrap();

        for entry in alignment.entries() {
            let destination = assigned(entry);
            assert_eq!(destination.order, 5);
            assert_eq!(destination.row_count, 640);
        }
        assert_eq!(alignment.destination_pixels().len(), order_to_npix(5) as usize);
    }

    #[test]
    fn test_lowest_order_floor() {
        // A single tiny count would aggregate to order 0, but the floor
        // keeps the destination at order 2.
        let histogram = histogram_with(2, &[(176, 3)]);
        let config = AlignmentConfig::new(2).with_lowest_order(2).with_threshold(250);
        let alignment = generate_alignment(&histogram, None, &config).unwrap();

        let destination = assigned(alignment.entry(176));
        assert_eq!((destination.order, destination.pixel), (2, 176));
        assert!(alignment.entry(177).is_empty());
    }

    #[test]
    fn test_count_conservation() {
        let filled: Vec<u64> = vec![4, 11, 14, 13, 5, 7, 8, 9, 11, 23, 4, 4, 17, 0, 1, 0];
        let entries: Vec<(u64, u64)> =
            filled.iter().enumerate().map(|(i, &c)| (176 + i as u64, c)).collect();
        let histogram = histogram_with(2, &entries);
        let total = histogram.total();

        for drop_empty_siblings in [false, true] {
            for threshold in [30u64, 150, 250] {
                let config = AlignmentConfig::new(2)
                    .with_threshold(threshold)
                    .with_drop_empty_siblings(drop_empty_siblings);
                let alignment = generate_alignment(&histogram, None, &config).unwrap();
                assert_eq!(alignment.assigned_row_total(), total);
                for destination in alignment.destination_pixels() {
                    assert!(destination.row_count <= threshold);
                }
            }
        }
    }

    #[test]
    fn test_collapse_respects_threshold() {
        // Two occupied leaves in one quad whose combined count exceeds the
        // threshold: no collapse under either strategy.
        let histogram = histogram_with(1, &[(44, 150), (45, 150)]);
        for drop_empty_siblings in [false, true] {
            let config = AlignmentConfig::new(1)
                .with_threshold(250)
                .with_drop_empty_siblings(drop_empty_siblings);
            let alignment = generate_alignment(&histogram, None, &config).unwrap();
            assert_eq!(
                (assigned(alignment.entry(44)).order, assigned(alignment.entry(44)).pixel),
                (1, 44)
            );
            assert_eq!(
                (assigned(alignment.entry(45)).order, assigned(alignment.entry(45)).pixel),
                (1, 45)
            );
            assert!(alignment.entry(46).is_empty());
        }
    }

    #[test]
    fn test_sibling_collapse_multiple_levels() {
        // Two occupied leaves in different order-1 quads of the same base
        // pixel: collapsing proceeds to order 0 (two children of the base
        // pixel carry content, total fits).
        let histogram = histogram_with(2, &[(176, 10), (180, 10)]);
        let config = AlignmentConfig::new(2)
            .with_threshold(250)
            .with_drop_empty_siblings(true);
        let alignment = generate_alignment(&histogram, None, &config).unwrap();

        for leaf in 176..192 {
            let destination = assigned(alignment.entry(leaf));
            assert_eq!((destination.order, destination.pixel, destination.row_count), (0, 11, 20));
        }
    }

    #[test]
    fn test_empty_histogram_aligns_empty() {
        let histogram = empty_histogram(2);
        for drop_empty_siblings in [false, true] {
            let config = AlignmentConfig::new(2)
                .with_threshold(10)
                .with_drop_empty_siblings(drop_empty_siblings);
            let alignment = generate_alignment(&histogram, None, &config).unwrap();
            assert!(alignment.is_empty());
            assert_eq!(alignment.destination_pixels().len(), 0);
        }
    }

    #[test]
    fn test_weight_mode_reports_both_totals() {
        let counts = histogram_with(1, &[(44, 10), (45, 20)]);
        let weights = histogram_with(1, &[(44, 100), (45, 80)]);
        let config = AlignmentConfig::new(1).with_threshold(200);
        let alignment = generate_alignment(&counts, Some(&weights), &config).unwrap();

        let destination = assigned(alignment.entry(44));
        assert_eq!((destination.order, destination.pixel), (0, 11));
        assert_eq!(destination.row_count, 30);
        assert_eq!(destination.weight, Some(180));
    }
}
