//! HEALPix pixel value type

use crate::healpix::projection::{order_to_npix, MAX_ORDER};
use crate::{HatsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell of the nested sky tessellation, identified by
/// `(order, pixel)` with `pixel < 12 * 4^order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HealpixPixel {
    pub order: u8,
    pub pixel: u64,
}

impl HealpixPixel {
    pub fn new(order: u8, pixel: u64) -> Result<Self> {
        if order > MAX_ORDER {
            return Err(HatsError::Validation(format!(
                "order {order} exceeds maximum order {MAX_ORDER}"
            )));
        }
        if pixel >= order_to_npix(order) {
            return Err(HatsError::Validation(format!(
                "pixel {pixel} is out of range for order {order}"
            )));
        }
        Ok(Self { order, pixel })
    }

    /// The ancestor cell `delta_order` levels up the hierarchy.
    pub fn to_lower_order(&self, delta_order: u8) -> Result<Self> {
        if delta_order > self.order {
            return Err(HatsError::Validation(
                "cannot reduce pixel order below zero".to_string(),
            ));
        }
        Ok(Self {
            order: self.order - delta_order,
            pixel: self.pixel >> (2 * delta_order as u64),
        })
    }

    /// All `4^delta_order` descendant cells, in ascending pixel order.
    pub fn to_higher_order(&self, delta_order: u8) -> Result<Vec<Self>> {
        let order = self.order.checked_add(delta_order).filter(|o| *o <= MAX_ORDER);
        let order = order.ok_or_else(|| {
            HatsError::Validation(format!(
                "cannot raise pixel order above maximum order {MAX_ORDER}"
            ))
        })?;
        let first = self.pixel << (2 * delta_order as u64);
        let count = 1u64 << (2 * delta_order as u64);
        Ok((first..first + count).map(|pixel| Self { order, pixel }).collect())
    }

    /// The immediate parent cell, or `None` at order zero.
    pub fn parent(&self) -> Option<Self> {
        (self.order > 0).then(|| Self {
            order: self.order - 1,
            pixel: self.pixel >> 2,
        })
    }

    /// The four immediate child cells, or `None` at the maximum order.
    pub fn children(&self) -> Option<[Self; 4]> {
        if self.order >= MAX_ORDER {
            return None;
        }
        let order = self.order + 1;
        let first = self.pixel << 2;
        Some([
            Self { order, pixel: first },
            Self { order, pixel: first + 1 },
            Self { order, pixel: first + 2 },
            Self { order, pixel: first + 3 },
        ])
    }
}

impl fmt::Display for HealpixPixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Order: {}, Pixel: {}", self.order, self.pixel)
    }
}

/// Stable indirect sort of mixed-order pixels by sky position.
///
/// Pixels are exploded to the highest order present, so the result orders
/// them along the nested numbering of the sky rather than by raw index.
pub fn sky_argsort(pixels: &[HealpixPixel]) -> Vec<usize> {
    let highest_order = pixels.iter().map(|p| p.order).max().unwrap_or(0);
    let mut order: Vec<usize> = (0..pixels.len()).collect();
    order.sort_by_key(|&i| {
        let p = pixels[i];
        p.pixel << (2 * (highest_order - p.order) as u64)
    });
    order
}
