//! 64-bit sortable spatial keys
//!
//! The spatial index of a row is its NESTED pixel index at order 29, the
//! finest order whose `12 * 4^29` pixel ids still fit in 64 bits. Rows in
//! the same order-29 pixel share one value: this is a coarse spatial key
//! for sorting and range pruning, not a row-unique id. Conversions to and
//! from coarser orders are pure bit shifts, exact and float-free.

use crate::healpix::{ang2pix, order_to_npix};
use crate::{HatsError, Result};

/// Order at which spatial index values are computed.
pub const SPATIAL_INDEX_ORDER: u8 = 29;

/// Project coordinate pairs (degrees) to their order-29 spatial index,
/// one value per pair in input order.
pub fn compute_spatial_index(ra: &[f64], dec: &[f64]) -> Result<Vec<u64>> {
    if ra.len() != dec.len() {
        return Err(HatsError::Validation(
            "ra and dec arrays must be the same length".to_string(),
        ));
    }
    Ok(ra
        .iter()
        .zip(dec)
        .map(|(&ra, &dec)| ang2pix(SPATIAL_INDEX_ORDER, ra, dec))
        .collect())
}

/// Recover the ancestor pixel index at `target_order` for each spatial
/// index value. `target_order = 29` is the identity.
pub fn spatial_index_to_healpix(ids: &[u64], target_order: u8) -> Result<Vec<u64>> {
    if target_order > SPATIAL_INDEX_ORDER {
        return Err(HatsError::Validation(format!(
            "target_order {target_order} exceeds the spatial index order {SPATIAL_INDEX_ORDER}"
        )));
    }
    let shift = 2 * (SPATIAL_INDEX_ORDER - target_order) as u64;
    Ok(ids.iter().map(|&id| id >> shift).collect())
}

/// The order-29 index of the first (lowest-index) descendant of
/// `(order, pixel)` — aligns pixels at different orders onto one sortable
/// axis.
pub fn spatial_to_healpix_index(order: u8, pixel: u64) -> Result<u64> {
    if order > SPATIAL_INDEX_ORDER {
        return Err(HatsError::Validation(format!(
            "order {order} exceeds the spatial index order {SPATIAL_INDEX_ORDER}"
        )));
    }
    if pixel >= order_to_npix(order) {
        return Err(HatsError::Validation(format!(
            "pixel {pixel} is out of range for order {order}"
        )));
    }
    Ok(pixel << (2 * (SPATIAL_INDEX_ORDER - order) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch() {
        let result = compute_spatial_index(&[5.0, 1.0, 5.0], &[5.0]);
        assert!(matches!(result, Err(HatsError::Validation(_))));
    }

    #[test]
    fn test_matches_fine_projection() {
        let ra = [5.0, 1.0, 5.0, 250.0, 282.5];
        let dec = [5.0, 1.0, 5.0, -80.0, -58.5];
        let result = compute_spatial_index(&ra, &dec).unwrap();
        for (i, id) in result.iter().enumerate() {
            assert_eq!(*id, ang2pix(SPATIAL_INDEX_ORDER, ra[i], dec[i]));
        }
        // Identical positions share the key.
        assert_eq!(result[0], result[2]);
    }

    #[test]
    fn test_to_healpix_is_right_shift() {
        let ids = [0u64, 1, 4, 1 << 58, (12 << 58) - 1];
        for target_order in 0..=SPATIAL_INDEX_ORDER {
            let shifted = spatial_index_to_healpix(&ids, target_order).unwrap();
            for (&id, &out) in ids.iter().zip(&shifted) {
                assert_eq!(out, id >> (2 * (29 - target_order as u64)));
            }
        }
        assert!(spatial_index_to_healpix(&ids, 30).is_err());
    }

    #[test]
    fn test_identity_at_order_29() {
        let ids = [17u64, 42, 1 << 40];
        assert_eq!(spatial_index_to_healpix(&ids, 29).unwrap(), ids);
    }

    #[test]
    fn test_shift_round_trip() {
        for (order, pixel) in [(0u8, 11u64), (5, 1234), (13, 98765), (29, 1 << 57)] {
            let id = spatial_to_healpix_index(order, pixel).unwrap();
            let back = spatial_index_to_healpix(&[id], order).unwrap();
            assert_eq!(back, vec![pixel]);
        }
    }

    #[test]
    fn test_pixel_out_of_range() {
        assert!(spatial_to_healpix_index(0, 12).is_err());
        assert!(spatial_to_healpix_index(30, 0).is_err());
    }
}
