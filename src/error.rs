use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnowLineError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("Input raster has invalid dimensions: {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("Raster grids differ: {0}")]
    GridMismatch(String),

    #[error("Raster contains no valid samples")]
    EmptyInput,

    #[error("Histogram has zero total frequency")]
    EmptyHistogram,

    #[error("Invalid histogram axis: {count} bins over [{lower}, {upper}]")]
    InvalidAxis { count: usize, lower: f64, upper: f64 },

    #[error("Cannot merge histograms with different axes")]
    AxisMismatch,

    #[error("Invalid elevation bin width: {0} (must be positive)")]
    InvalidBinWidth(i32),

    #[error("Invalid threshold {name}: {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("Invalid block size: {0} (must be positive)")]
    InvalidBlockSize(usize),

    #[error("Read window [{0},{1}]-[{2},{3}] returned {4}x{5} samples")]
    InvalidWindow(usize, usize, usize, usize, usize, usize),
}

pub type Result<T> = std::result::Result<T, SnowLineError>;
