//! Nested HEALPix tessellation geometry
//!
//! Everything else in the crate leans on two facts about this module:
//! `order_to_npix(order) = 12 * 4^order`, and children of pixel `p` occupy
//! indices `4p..4p+3` at the next order (so `parent = pixel >> 2`).

pub mod pixel;
pub mod projection;

pub use pixel::{sky_argsort, HealpixPixel};
pub use projection::{ang2pix, order_to_npix, pix2ang, MAX_ORDER};
