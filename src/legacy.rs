//! Two-histogram ratio snow line, kept for compatibility with historical
//! results.
//!
//! Unlike the joint histogram this does not cross-tabulate snow and cloud:
//! the snow population includes snow flagged under cloud, so a bin ratio
//! can exceed 1. Bins without cloud-free pixels are skipped rather than
//! divided by zero.

use crate::chunking::{BlockBounds, BlockGrid};
use crate::error::{Result, SnowLineError};
use crate::histogram::HistogramAxis;
use crate::locator::SnowLine;
use crate::raster::{ensure_same_grid, RasterSource};
use crate::stats::compute_min_max;
use log::{debug, info};
use rayon::prelude::*;

/// Bins looked back from the first qualifying bin.
const LOOKBACK_BINS: usize = 2;

/// Single-band elevation histogram restricted to pixels where a mask equals a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedHistogram {
    counts: Vec<u64>,
}

impl MaskedHistogram {
    fn empty(bins: usize) -> Self {
        Self {
            counts: vec![0; bins],
        }
    }

    pub fn frequency(&self, bin: usize) -> u64 {
        self.counts[bin]
    }

    pub fn total_frequency(&self) -> u64 {
        self.counts.iter().sum()
    }

    fn merged(mut self, other: MaskedHistogram) -> Self {
        for (cell, add) in self.counts.iter_mut().zip(other.counts) {
            *cell += add;
        }
        self
    }

    pub fn build(
        elevation: &dyn RasterSource,
        mask: &dyn RasterSource,
        mask_value: f64,
        axis: HistogramAxis,
        block_size: usize,
    ) -> Result<Self> {
        let grid = elevation.grid();
        let tiles = BlockGrid::new(grid.width, grid.height, block_size)?.blocks();

        let tile = |bounds: &BlockBounds| -> Result<MaskedHistogram> {
            let z_block = elevation.read_block(bounds)?;
            let m_block = mask.read_block(bounds)?;
            let mut histogram = MaskedHistogram::empty(axis.count());
            for (&z, &m) in z_block.iter().zip(m_block.iter()) {
                if m == mask_value && elevation.is_valid(z) {
                    histogram.counts[axis.bin_index(z)] += 1;
                }
            }
            Ok(histogram)
        };

        tiles
            .par_iter()
            .map(tile)
            .try_reduce(|| MaskedHistogram::empty(axis.count()), |a, b| Ok(a.merged(b)))
    }
}

/// Ascending ratio scan over the cloud-free and snow histograms.
pub fn locate_by_ratio(
    clear: &MaskedHistogram,
    snow: &MaskedHistogram,
    axis: HistogramAxis,
    dz: i32,
    fsnow_lim: f64,
) -> SnowLine {
    for bin in 0..axis.count() {
        let denominator = clear.frequency(bin);
        if denominator == 0 {
            debug!("Bin {} has no cloud-free pixels, skipped", bin);
            continue;
        }

        let ratio = snow.frequency(bin) as f64 / denominator as f64;
        if ratio > fsnow_lim {
            let selected = bin.saturating_sub(LOOKBACK_BINS);
            let elevation = (axis.centroid(selected) - f64::from(dz / 2)) as i32;
            info!(
                "Legacy snow line at {} (bin {} ratio {:.3}, looked back to bin {})",
                elevation, bin, ratio, selected
            );
            return SnowLine::Found(elevation);
        }
    }

    SnowLine::NotFound
}

/// Snow line from independent cloud-free and snow histograms.
///
/// The elevation axis spans the DEM's own valid extent with
/// `floor((max - min) / dz)` bins.
pub fn legacy_snow_line(
    elevation: &dyn RasterSource,
    snow: &dyn RasterSource,
    cloud: &dyn RasterSource,
    dz: i32,
    fsnow_lim: f64,
    block_size: usize,
) -> Result<SnowLine> {
    if dz <= 0 {
        return Err(SnowLineError::InvalidBinWidth(dz));
    }
    if !fsnow_lim.is_finite() || fsnow_lim < 0.0 {
        return Err(SnowLineError::InvalidThreshold {
            name: "fsnow_lim",
            value: fsnow_lim,
        });
    }
    ensure_same_grid(elevation, &[("snow mask", snow), ("cloud mask", cloud)])?;

    let extent = compute_min_max(elevation, block_size)?;
    let axis = HistogramAxis::from_extent(extent.min, extent.max, dz)?;
    info!(
        "Legacy histograms: {} bins of {:.3} over [{}, {}]",
        axis.count(),
        axis.width(),
        axis.lower(),
        axis.upper()
    );

    let clear = MaskedHistogram::build(elevation, cloud, 0.0, axis, block_size)?;
    let snowy = MaskedHistogram::build(elevation, snow, 1.0, axis, block_size)?;
    debug!(
        "Cloud-free pixels: {}, snow pixels: {}",
        clear.total_frequency(),
        snowy.total_frequency()
    );

    Ok(locate_by_ratio(&clear, &snowy, axis, dz, fsnow_lim))
}
