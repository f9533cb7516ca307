use crate::chunking::BlockBounds;
use crate::error::{Result, SnowLineError};
use log::debug;
use ndarray::Array2;

const GEOTRANSFORM_TOLERANCE: f64 = 1e-9;

/// Pixel dimensions and optional georeferencing of a raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    pub width: usize,
    pub height: usize,
    pub geotransform: Option<[f64; 6]>,
}

impl RasterGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            geotransform: None,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Describe how `other` differs from `self`, if it does.
    ///
    /// Geotransforms are only compared when both grids carry one; terms are
    /// compared relative to their magnitude.
    pub fn mismatch(&self, other: &RasterGrid) -> Option<String> {
        if self.width != other.width || self.height != other.height {
            return Some(format!(
                "dimensions {}x{} vs {}x{}",
                self.width, self.height, other.width, other.height
            ));
        }

        if let (Some(a), Some(b)) = (&self.geotransform, &other.geotransform) {
            for (term, (x, y)) in a.iter().zip(b.iter()).enumerate() {
                let scale = x.abs().max(y.abs()).max(1.0);
                if (x - y).abs() > GEOTRANSFORM_TOLERANCE * scale {
                    return Some(format!("geotransform term {} is {} vs {}", term, x, y));
                }
            }
        }

        None
    }
}

/// Read-only, block-addressable raster band.
///
/// Implementations must be shareable across tile workers; a block read may
/// fail but never blocks indefinitely.
pub trait RasterSource: Sync {
    fn grid(&self) -> &RasterGrid;

    fn nodata(&self) -> Option<f64>;

    /// Read the samples inside `bounds` as a (rows, cols) array.
    fn read_block(&self, bounds: &BlockBounds) -> Result<Array2<f64>>;

    /// A sample is valid when it is neither NaN nor the nodata value.
    fn is_valid(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        match self.nodata() {
            Some(nd) => value != nd,
            None => true,
        }
    }
}

/// Check that every named raster shares the reference raster's grid.
pub fn ensure_same_grid(
    reference: &dyn RasterSource,
    others: &[(&str, &dyn RasterSource)],
) -> Result<()> {
    let grid = reference.grid();
    for (name, raster) in others {
        if let Some(reason) = grid.mismatch(raster.grid()) {
            return Err(SnowLineError::GridMismatch(format!("{}: {}", name, reason)));
        }
    }
    debug!(
        "{} raster(s) aligned with {}x{} reference grid",
        others.len(),
        grid.width,
        grid.height
    );
    Ok(())
}

/// Raster held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryRaster {
    data: Array2<f64>,
    grid: RasterGrid,
    nodata: Option<f64>,
}

impl MemoryRaster {
    pub fn new(data: Array2<f64>) -> Result<Self> {
        let (height, width) = data.dim();
        if width == 0 || height == 0 {
            return Err(SnowLineError::InvalidDimensions(width, height));
        }
        Ok(Self {
            data,
            grid: RasterGrid::new(width, height),
            nodata: None,
        })
    }

    pub fn filled(width: usize, height: usize, value: f64) -> Result<Self> {
        Self::new(Array2::from_elem((height, width), value))
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_geotransform(mut self, geotransform: [f64; 6]) -> Self {
        self.grid.geotransform = Some(geotransform);
        self
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[[row, col]] = value;
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }
}

impl RasterSource for MemoryRaster {
    fn grid(&self) -> &RasterGrid {
        &self.grid
    }

    fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    fn read_block(&self, bounds: &BlockBounds) -> Result<Array2<f64>> {
        if bounds.x_max > self.grid.width || bounds.y_max > self.grid.height {
            return Err(SnowLineError::InvalidWindow(
                bounds.x_min,
                bounds.y_min,
                bounds.x_max,
                bounds.y_max,
                self.grid.width,
                self.grid.height,
            ));
        }
        let block = self
            .data
            .slice(ndarray::s![bounds.y_min..bounds.y_max, bounds.x_min..bounds.x_max]);
        Ok(block.to_owned())
    }
}
