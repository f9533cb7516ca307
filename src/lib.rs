// Library exports for the CLI and for embedding callers

pub mod chunking;
pub mod cli;
pub mod diagnostics;
pub mod error;
pub mod fraction;
pub mod histogram;
pub mod io;
pub mod legacy;
pub mod locator;
pub mod pipeline;
pub mod raster;
pub mod stats;

// Re-export commonly used types
pub use error::{Result, SnowLineError};
pub use histogram::{HistogramAxis, JointHistogram, JointHistogramBuilder, MaskClassifier};
pub use locator::{locate_snow_line, LocatorParams, ScanDirection, SnowLine};
pub use pipeline::{
    compute_legacy_snow_line, compute_pixel_count_in_range, compute_snow_fraction,
    compute_snow_line, snow_line_from_rasters, SnowLineParams,
};
pub use raster::{RasterGrid, MemoryRaster, RasterSource};
