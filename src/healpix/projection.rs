//! Nested-scheme HEALPix projection math.
//!
//! Implements the tessellation contract the rest of the crate is built on:
//! `order_to_npix(order) = 12 * 4^order`, a deterministic angle-to-cell
//! projection in the NESTED numbering (children of pixel `p` are
//! `4p..4p+3` at the next order), and the inverse cell-center mapping.
//!
//! Cross-order consistency is exact: all internal scalings are powers of
//! two, so projecting at order `k` equals projecting at order 29 and
//! right-shifting the result by `2 * (29 - k)`.

use std::f64::consts::{FRAC_PI_2, PI};

/// Highest representable order: `12 * 4^29` pixel ids fit in 64 bits.
pub const MAX_ORDER: u8 = 29;

const TWO_PI: f64 = 2.0 * PI;

/// Northernmost ring index (in units of nside) crossed by each base face.
const JRLL: [i64; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
/// Longitude offset (in units of pi/4) of each base face center.
const JPLL: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

/// Number of pixels in a HEALPix map of the given order.
#[inline]
pub fn order_to_npix(order: u8) -> u64 {
    assert!(order <= MAX_ORDER, "order {order} exceeds MAX_ORDER");
    12 << (2 * order as u64)
}

/// Spread the lower 32 bits of `v` to the even bit positions.
#[inline]
fn spread_bits(v: u64) -> u64 {
    let mut v = v & 0x0000_0000_ffff_ffff;
    v = (v | (v << 16)) & 0x0000_ffff_0000_ffff;
    v = (v | (v << 8)) & 0x00ff_00ff_00ff_00ff;
    v = (v | (v << 4)) & 0x0f0f_0f0f_0f0f_0f0f;
    v = (v | (v << 2)) & 0x3333_3333_3333_3333;
    v = (v | (v << 1)) & 0x5555_5555_5555_5555;
    v
}

/// Gather the even bit positions of `v` into the lower 32 bits.
#[inline]
fn compress_bits(v: u64) -> u64 {
    let mut v = v & 0x5555_5555_5555_5555;
    v = (v | (v >> 1)) & 0x3333_3333_3333_3333;
    v = (v | (v >> 2)) & 0x0f0f_0f0f_0f0f_0f0f;
    v = (v | (v >> 4)) & 0x00ff_00ff_00ff_00ff;
    v = (v | (v >> 8)) & 0x0000_ffff_0000_ffff;
    v = (v | (v >> 16)) & 0x0000_0000_ffff_ffff;
    v
}

/// Project celestial coordinates (degrees) to the NESTED pixel index at
/// the given order.
///
/// Right ascension may be any real value; it is wrapped into `[0, 360)`.
/// Declination is clamped to `[-90, 90]`.
pub fn ang2pix(order: u8, ra_deg: f64, dec_deg: f64) -> u64 {
    assert!(order <= MAX_ORDER, "order {order} exceeds MAX_ORDER");
    let nside = 1i64 << order;

    let z = dec_deg.clamp(-90.0, 90.0).to_radians().sin();
    let mut phi = ra_deg.to_radians() % TWO_PI;
    if phi < 0.0 {
        phi += TWO_PI;
    }
    // Longitude in units of pi/2, in [0, 4).
    let tt = (phi / FRAC_PI_2).clamp(0.0, 4.0 - f64::EPSILON);

    let (face, ix, iy) = if z.abs() <= 2.0 / 3.0 {
        // Equatorial region: locate the pixel between the two diagonal
        // edge lines ascending and descending through the point.
        let temp1 = nside as f64 * (0.5 + tt);
        let temp2 = nside as f64 * (z * 0.75);
        let jp = (temp1 - temp2) as i64;
        let jm = (temp1 + temp2) as i64;
        let ifp = jp >> order;
        let ifm = jm >> order;
        let face = if ifp == ifm {
            (ifp & 3) + 4
        } else if ifp < ifm {
            ifp & 3
        } else {
            (ifm & 3) + 8
        };
        let ix = jm & (nside - 1);
        let iy = nside - 1 - (jp & (nside - 1));
        (face as u64, ix as u64, iy as u64)
    } else {
        // Polar caps.
        let ntt = (tt as i64).min(3);
        let tp = tt - ntt as f64;
        let tmp = nside as f64 * (3.0 * (1.0 - z.abs())).sqrt();
        let jp = ((tp * tmp) as u64).min(nside as u64 - 1);
        let jm = (((1.0 - tp) * tmp) as u64).min(nside as u64 - 1);
        if z >= 0.0 {
            (ntt as u64, nside as u64 - 1 - jm, nside as u64 - 1 - jp)
        } else {
            (ntt as u64 + 8, jp, jm)
        }
    };

    (face << (2 * order)) | spread_bits(ix) | (spread_bits(iy) << 1)
}

/// Center coordinates (ra, dec in degrees) of the NESTED pixel at the
/// given order. Inverse of [`ang2pix`] at cell-membership granularity.
pub fn pix2ang(order: u8, pixel: u64) -> (f64, f64) {
    assert!(order <= MAX_ORDER, "order {order} exceeds MAX_ORDER");
    assert!(pixel < order_to_npix(order), "pixel {pixel} out of range");
    let nside = 1i64 << order;

    let face = (pixel >> (2 * order)) as usize;
    let within = pixel & ((1u64 << (2 * order)) - 1);
    let ix = compress_bits(within) as i64;
    let iy = compress_bits(within >> 1) as i64;

    // Ring index counted from the north pole.
    let jr = JRLL[face] * nside - ix - iy - 1;
    let (nr, z, kshift) = if jr < nside {
        // North polar cap.
        let nr = jr;
        let z = 1.0 - (nr * nr) as f64 / (3.0 * (nside * nside) as f64);
        (nr, z, 0)
    } else if jr > 3 * nside {
        // South polar cap.
        let nr = 4 * nside - jr;
        let z = (nr * nr) as f64 / (3.0 * (nside * nside) as f64) - 1.0;
        (nr, z, 0)
    } else {
        // Equatorial belt.
        let z = (2 * nside - jr) as f64 * (2.0 / (3.0 * nside as f64));
        (nside, z, (jr - nside) & 1)
    };

    // Longitude index within the ring; the numerator is even by
    // construction of the nested scheme.
    let mut jp = (JPLL[face] * nr + ix - iy + 1 + kshift) / 2;
    if jp > 4 * nside {
        jp -= 4 * nside;
    }
    if jp < 1 {
        jp += 4 * nside;
    }
    let phi = (jp as f64 - (kshift + 1) as f64 * 0.5) * (FRAC_PI_2 / nr as f64);

    let ra = phi.to_degrees();
    let dec = 90.0 - z.acos().to_degrees();
    (ra, dec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_to_npix() {
        assert_eq!(order_to_npix(0), 12);
        assert_eq!(order_to_npix(1), 48);
        assert_eq!(order_to_npix(2), 192);
        for order in 1..=MAX_ORDER {
            assert_eq!(order_to_npix(order), 4 * order_to_npix(order - 1));
        }
    }

    #[test]
    fn test_bit_spread_round_trip() {
        for v in [0u64, 1, 2, 3, 0xdead, 0x1fff_ffff, u32::MAX as u64] {
            assert_eq!(compress_bits(spread_bits(v)), v);
        }
        assert_eq!(spread_bits(0b11), 0b101);
        assert_eq!(spread_bits(0b101), 0b10001);
    }

    #[test]
    fn test_small_sky_pixel() {
        // Two southern points known to share base pixel 11.
        assert_eq!(ang2pix(0, 282.5, -58.5), 11);
        assert_eq!(ang2pix(0, 299.5, -48.5), 11);
    }

    #[test]
    fn test_pixel_in_range() {
        let samples = [
            (0.0, 0.0),
            (45.0, 45.0),
            (180.0, -45.0),
            (359.9, 89.9),
            (120.0, -89.9),
            (0.0, 90.0),
            (0.0, -90.0),
            (-10.0, 10.0),
            (370.0, 10.0),
        ];
        for order in [0u8, 1, 3, 7, 15, 29] {
            for &(ra, dec) in &samples {
                assert!(ang2pix(order, ra, dec) < order_to_npix(order));
            }
        }
    }

    #[test]
    fn test_cross_order_consistency() {
        // Projecting at a coarse order must equal projecting at the
        // finest order and shifting down the hierarchy.
        let samples = [
            (12.3, 4.5),
            (282.5, -58.5),
            (200.0, 70.0),
            (99.9, -33.3),
            (311.0, 2.0),
        ];
        for &(ra, dec) in &samples {
            let fine = ang2pix(MAX_ORDER, ra, dec);
            for order in 0..=MAX_ORDER {
                let expected = fine >> (2 * (MAX_ORDER - order) as u64);
                assert_eq!(ang2pix(order, ra, dec), expected, "order {order}");
            }
        }
    }

    #[test]
    fn test_center_round_trip() {
        // A pixel center must project back onto the same pixel.
        for order in [0u8, 1, 2] {
            for pixel in 0..order_to_npix(order) {
                let (ra, dec) = pix2ang(order, pixel);
                assert_eq!(ang2pix(order, ra, dec), pixel, "order {order}");
            }
        }
        // Spot checks at finer resolution.
        for order in [5u8, 8, 10] {
            let npix = order_to_npix(order);
            for pixel in (0..npix).step_by((npix / 97) as usize) {
                let (ra, dec) = pix2ang(order, pixel);
                assert_eq!(ang2pix(order, ra, dec), pixel, "order {order}");
            }
        }
    }

    #[test]
    fn test_ra_wrapping() {
        for &(ra, dec) in &[(10.0, 25.0), (350.0, -12.0)] {
            let base = ang2pix(10, ra, dec);
            assert_eq!(ang2pix(10, ra + 360.0, dec), base);
            assert_eq!(ang2pix(10, ra - 360.0, dec), base);
        }
    }
}
