//! Streaming single-band reductions.
//!
//! Every reduction walks the raster one block at a time, so memory use is
//! bounded by the block size rather than the raster size.

use crate::chunking::BlockGrid;
use crate::error::{Result, SnowLineError};
use crate::raster::RasterSource;
use log::{debug, info};
use ndarray::Array2;

/// Global extent of the valid samples of a band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
    pub valid_count: u64,
}

impl MinMax {
    fn absorb(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.valid_count += 1;
    }
}

fn fold_blocks<T, F>(raster: &dyn RasterSource, block_size: usize, init: T, mut f: F) -> Result<T>
where
    F: FnMut(T, &Array2<f64>) -> T,
{
    let grid = raster.grid();
    let blocks = BlockGrid::new(grid.width, grid.height, block_size)?;

    let mut acc = init;
    for (idx, bounds) in blocks.iter() {
        let block = raster.read_block(&bounds)?;
        debug!("Reduced block {}/{}", idx + 1, blocks.total_blocks);
        acc = f(acc, &block);
    }
    Ok(acc)
}

/// Minimum and maximum over all valid samples.
pub fn compute_min_max(raster: &dyn RasterSource, block_size: usize) -> Result<MinMax> {
    let init = MinMax {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        valid_count: 0,
    };

    let extent = fold_blocks(raster, block_size, init, |mut acc, block| {
        for &value in block.iter() {
            if raster.is_valid(value) {
                acc.absorb(value);
            }
        }
        acc
    })?;

    if extent.valid_count == 0 {
        return Err(SnowLineError::EmptyInput);
    }

    info!(
        "Raster extent: min={}, max={} over {} valid samples",
        extent.min, extent.max, extent.valid_count
    );
    Ok(extent)
}

/// Number of valid samples with `lower <= value <= upper`.
pub fn count_in_range(
    raster: &dyn RasterSource,
    lower: f64,
    upper: f64,
    block_size: usize,
) -> Result<u64> {
    fold_blocks(raster, block_size, 0u64, |acc, block| {
        acc + block
            .iter()
            .filter(|&&v| raster.is_valid(v) && v >= lower && v <= upper)
            .count() as u64
    })
}

/// Number of samples exactly equal to `target`.
pub fn count_equal(raster: &dyn RasterSource, target: f64, block_size: usize) -> Result<u64> {
    fold_blocks(raster, block_size, 0u64, |acc, block| {
        acc + block.iter().filter(|&&v| v == target).count() as u64
    })
}
