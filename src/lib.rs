//! HATS Partitioning Core
//!
//! Spatial partitioning engine for large tabular catalogs of sky
//! positions. Objects are binned into pixels of the nested HEALPix
//! tessellation; pixels are aggregated to the coarsest order that keeps
//! every disk partition under a capacity threshold.
//!
//! ## Pipeline
//! - Counting: rows -> per-pixel histograms at a fine order
//!   ([`generate_histogram`]), shardable via [`SparseHistogram`] partials
//!   merged through a [`HistogramAggregator`]
//! - Partitioning: aggregated histogram -> per-pixel destination map
//!   ([`generate_alignment`]), the core threshold-constrained decision
//! - Keying: rows -> sortable 64-bit spatial keys
//!   ([`compute_spatial_index`])
//!
//! Counting and keying are embarrassingly parallel over row shards;
//! alignment runs once, single-threaded, linear in the pixel count of the
//! finest order.

pub mod alignment;
pub mod healpix;
pub mod histogram;
pub mod spatial_index;
pub mod table;

mod error;

pub use alignment::{
    generate_alignment, Alignment, AlignmentConfig, AlignmentEntry, PixelAssignment,
};
pub use error::{HatsError, Result};
pub use healpix::{HealpixPixel, MAX_ORDER};
pub use histogram::{
    empty_histogram, generate_histogram, generate_histogram_parallel,
    supplemental_count_histogram, Histogram, HistogramAggregator, SparseHistogram,
};
pub use spatial_index::{
    compute_spatial_index, spatial_index_to_healpix, spatial_to_healpix_index,
    SPATIAL_INDEX_ORDER,
};
pub use table::{ColumnTable, RowSource};
