//! Joint elevation × snow × cloud histogram.
//!
//! Elevation bounds are fixed before accumulation starts (a bounds pass over
//! the DEM, then an accumulation pass). Each block of the raster is reduced
//! into its own tile-local histogram and the tiles are combined by
//! elementwise addition, which is commutative and associative, so the
//! result does not depend on block size, block order or worker count.

use crate::chunking::{BlockBounds, BlockGrid, DEFAULT_BLOCK_SIZE};
use crate::error::{Result, SnowLineError};
use crate::raster::{ensure_same_grid, RasterSource};
use log::{debug, info, warn};
use rayon::prelude::*;

/// Number of categories on the snow and cloud axes.
pub const FLAG_BINS: usize = 2;

/// Equal-width binning of an interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramAxis {
    count: usize,
    lower: f64,
    upper: f64,
}

impl HistogramAxis {
    pub fn new(count: usize, lower: f64, upper: f64) -> Result<Self> {
        if count == 0 || !lower.is_finite() || !upper.is_finite() || upper <= lower {
            return Err(SnowLineError::InvalidAxis {
                count,
                lower,
                upper,
            });
        }
        Ok(Self {
            count,
            lower,
            upper,
        })
    }

    /// Axis spanning `[min, max]` with `floor((max - min) / dz)` bins.
    ///
    /// At least one bin is always produced. A flat raster (`min == max`)
    /// gets a single bin of width `dz`.
    pub fn from_extent(min: f64, max: f64, dz: i32) -> Result<Self> {
        if dz <= 0 {
            return Err(SnowLineError::InvalidBinWidth(dz));
        }
        let dz = f64::from(dz);
        let upper = if max > min { max } else { min + dz };
        let count = (((upper - min) / dz).floor() as usize).max(1);
        Self::new(count, min, upper)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn width(&self) -> f64 {
        (self.upper - self.lower) / self.count as f64
    }

    /// Bin midpoint.
    pub fn centroid(&self, bin: usize) -> f64 {
        self.lower + (bin as f64 + 0.5) * self.width()
    }

    /// Bin holding `value`.
    ///
    /// Values below `lower` clip into bin 0. Values at or above `upper`
    /// clip into the last bin, so the upper bound is inclusive.
    pub fn bin_index(&self, value: f64) -> usize {
        if value < self.lower {
            return 0;
        }
        if value >= self.upper {
            return self.count - 1;
        }
        let bin = ((value - self.lower) / self.width()).floor() as usize;
        bin.min(self.count - 1)
    }
}

/// Maps a mask sample onto the {0, 1} flag axis.
///
/// A sample is category 1 when it is strictly greater than `threshold`.
/// NaN always maps to 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskClassifier {
    pub threshold: f64,
}

impl Default for MaskClassifier {
    fn default() -> Self {
        Self { threshold: 0.0 }
    }
}

impl MaskClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn category(&self, value: f64) -> usize {
        if value > self.threshold {
            1
        } else {
            0
        }
    }
}

/// Frequencies indexed by (elevation bin, snow flag, cloud flag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointHistogram {
    axis: AxisKey,
    cells: Vec<u64>,
}

// Axis stored bitwise so the histogram can be Eq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AxisKey {
    count: usize,
    lower: u64,
    upper: u64,
}

impl From<HistogramAxis> for AxisKey {
    fn from(axis: HistogramAxis) -> Self {
        Self {
            count: axis.count,
            lower: axis.lower.to_bits(),
            upper: axis.upper.to_bits(),
        }
    }
}

impl JointHistogram {
    pub fn new(axis: HistogramAxis) -> Self {
        Self {
            axis: axis.into(),
            cells: vec![0; axis.count * FLAG_BINS * FLAG_BINS],
        }
    }

    pub fn axis(&self) -> HistogramAxis {
        HistogramAxis {
            count: self.axis.count,
            lower: f64::from_bits(self.axis.lower),
            upper: f64::from_bits(self.axis.upper),
        }
    }

    fn offset(bin: usize, snow: usize, cloud: usize) -> usize {
        (bin * FLAG_BINS + snow) * FLAG_BINS + cloud
    }

    pub fn increment(&mut self, bin: usize, snow: usize, cloud: usize) {
        self.cells[Self::offset(bin, snow, cloud)] += 1;
    }

    pub fn frequency(&self, bin: usize, snow: usize, cloud: usize) -> u64 {
        self.cells[Self::offset(bin, snow, cloud)]
    }

    /// Sum of the four snow × cloud cells of one elevation bin.
    pub fn bin_total(&self, bin: usize) -> u64 {
        let start = Self::offset(bin, 0, 0);
        self.cells[start..start + FLAG_BINS * FLAG_BINS].iter().sum()
    }

    pub fn total_frequency(&self) -> u64 {
        self.cells.iter().sum()
    }

    /// Number of cells across all three axes.
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Bins per axis: elevation, snow, cloud.
    pub fn dimension_sizes(&self) -> [usize; 3] {
        [self.axis.count, FLAG_BINS, FLAG_BINS]
    }

    /// Add `other` cell by cell. Both histograms must share an axis.
    pub fn merge(&mut self, other: &JointHistogram) -> Result<()> {
        if self.axis != other.axis {
            return Err(SnowLineError::AxisMismatch);
        }
        for (cell, add) in self.cells.iter_mut().zip(&other.cells) {
            *cell += add;
        }
        Ok(())
    }

    pub fn merged(mut self, other: &JointHistogram) -> Result<Self> {
        self.merge(other)?;
        Ok(self)
    }
}

/// Builds a [`JointHistogram`] over three co-registered rasters.
pub struct JointHistogramBuilder<'a> {
    elevation: &'a dyn RasterSource,
    snow: &'a dyn RasterSource,
    cloud: &'a dyn RasterSource,
    axis: HistogramAxis,
    classifier: MaskClassifier,
    block_size: usize,
}

impl<'a> JointHistogramBuilder<'a> {
    pub fn new(
        elevation: &'a dyn RasterSource,
        snow: &'a dyn RasterSource,
        cloud: &'a dyn RasterSource,
        axis: HistogramAxis,
    ) -> Self {
        Self {
            elevation,
            snow,
            cloud,
            axis,
            classifier: MaskClassifier::default(),
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    pub fn with_classifier(mut self, classifier: MaskClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Partition of the shared grid into tiles, after checking alignment.
    pub fn tiles(&self) -> Result<Vec<BlockBounds>> {
        ensure_same_grid(self.elevation, &[("snow mask", self.snow), ("cloud mask", self.cloud)])?;
        let grid = self.elevation.grid();
        Ok(BlockGrid::new(grid.width, grid.height, self.block_size)?.blocks())
    }

    /// Histogram of a single tile.
    pub fn build_tile(&self, bounds: &BlockBounds) -> Result<JointHistogram> {
        let elevation = self.elevation.read_block(bounds)?;
        let snow = self.snow.read_block(bounds)?;
        let cloud = self.cloud.read_block(bounds)?;

        let mut histogram = JointHistogram::new(self.axis);
        for ((&z, &s), &c) in elevation.iter().zip(snow.iter()).zip(cloud.iter()) {
            if !self.elevation.is_valid(z) {
                continue;
            }
            histogram.increment(
                self.axis.bin_index(z),
                self.classifier.category(s),
                self.classifier.category(c),
            );
        }

        debug!(
            "Tile ({},{})-({},{}): {} of {} pixels binned",
            bounds.x_min,
            bounds.y_min,
            bounds.x_max,
            bounds.y_max,
            histogram.total_frequency(),
            bounds.pixel_count()
        );
        Ok(histogram)
    }

    /// Validate inputs, then reduce every tile in parallel and merge.
    pub fn build(&self) -> Result<JointHistogram> {
        let tiles = self.tiles()?;
        info!(
            "Accumulating joint histogram: {} elevation bins over [{}, {}], {} tiles",
            self.axis.count(),
            self.axis.lower(),
            self.axis.upper(),
            tiles.len()
        );

        let axis = self.axis;
        let histogram = tiles
            .par_iter()
            .map(|bounds| self.build_tile(bounds))
            .try_reduce(|| JointHistogram::new(axis), |acc, tile| acc.merged(&tile))?;

        let pixels = self.elevation.grid().pixel_count() as u64;
        let binned = histogram.total_frequency();
        if binned < pixels {
            warn!("{} pixels skipped with invalid elevation", pixels - binned);
        }
        info!("Joint histogram complete: {} pixels binned", binned);

        Ok(histogram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::MemoryRaster;
    use ndarray::Array2;

    fn axis() -> HistogramAxis {
        HistogramAxis::new(10, 0.0, 100.0).unwrap()
    }

    /// DEM rising 7 m per pixel with a snow mask above 300 m and a cloudy stripe.
    fn scene() -> (MemoryRaster, MemoryRaster, MemoryRaster) {
        let (rows, cols) = (9, 11);
        let dem = Array2::from_shape_fn((rows, cols), |(r, c)| ((r * cols + c) * 7) as f64);
        let snow = dem.mapv(|z| if z > 300.0 { 1.0 } else { 0.0 });
        let cloud = Array2::from_shape_fn((rows, cols), |(r, _)| if r == 4 { 1.0 } else { 0.0 });
        (
            MemoryRaster::new(dem).unwrap(),
            MemoryRaster::new(snow).unwrap(),
            MemoryRaster::new(cloud).unwrap(),
        )
    }

    #[test]
    fn test_invalid_axis_rejected() {
        assert!(HistogramAxis::new(0, 0.0, 100.0).is_err());
        assert!(HistogramAxis::new(10, 100.0, 100.0).is_err());
        assert!(HistogramAxis::new(10, 0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_axis_from_extent() {
        let axis = HistogramAxis::from_extent(0.0, 81.0, 10).unwrap();
        assert_eq!(axis.count(), 8);
        assert!((axis.width() - 10.125).abs() < 1e-12);

        let flat = HistogramAxis::from_extent(500.0, 500.0, 100).unwrap();
        assert_eq!(flat.count(), 1);
        assert_eq!(flat.upper(), 600.0);

        assert!(matches!(
            HistogramAxis::from_extent(0.0, 10.0, 0),
            Err(SnowLineError::InvalidBinWidth(0))
        ));
    }

    #[test]
    fn test_centroids_strictly_increase() {
        for axis in [
            axis(),
            HistogramAxis::new(7, -12.5, 3.0).unwrap(),
            HistogramAxis::new(1000, 0.0, 1.0).unwrap(),
        ] {
            for i in 0..axis.count() - 1 {
                assert!(axis.centroid(i) < axis.centroid(i + 1));
            }
        }
        assert_eq!(axis().centroid(0), 5.0);
        assert_eq!(axis().centroid(9), 95.0);
    }

    #[test]
    fn test_clipping_policy() {
        let axis = axis();
        assert_eq!(axis.bin_index(-50.0), 0);
        assert_eq!(axis.bin_index(0.0), 0);
        assert_eq!(axis.bin_index(9.999), 0);
        assert_eq!(axis.bin_index(10.0), 1);
        assert_eq!(axis.bin_index(99.0), 9);
        assert_eq!(axis.bin_index(100.0), 9);
        assert_eq!(axis.bin_index(4000.0), 9);
    }

    #[test]
    fn test_mask_classifier() {
        let default = MaskClassifier::default();
        assert_eq!(default.category(0.0), 0);
        assert_eq!(default.category(1.0), 1);
        assert_eq!(default.category(205.0), 1);
        assert_eq!(default.category(-1.0), 0);
        assert_eq!(default.category(f64::NAN), 0);

        let raised = MaskClassifier::new(1.0);
        assert_eq!(raised.category(1.0), 0);
        assert_eq!(raised.category(2.0), 1);
    }

    #[test]
    fn test_merge_rejects_different_axes() {
        let mut a = JointHistogram::new(axis());
        let b = JointHistogram::new(HistogramAxis::new(10, 0.0, 200.0).unwrap());
        assert!(matches!(a.merge(&b), Err(SnowLineError::AxisMismatch)));
    }

    #[test]
    fn test_per_bin_totals_match_pixel_counts() {
        let (dem, snow, cloud) = scene();
        let axis = HistogramAxis::new(12, 0.0, 600.0).unwrap();
        let histogram = JointHistogramBuilder::new(&dem, &snow, &cloud, axis)
            .with_block_size(4)
            .build()
            .unwrap();

        let mut expected = vec![0u64; axis.count()];
        for &z in dem.data().iter() {
            expected[axis.bin_index(z)] += 1;
        }

        for (bin, &count) in expected.iter().enumerate() {
            let cells = histogram.frequency(bin, 0, 0)
                + histogram.frequency(bin, 0, 1)
                + histogram.frequency(bin, 1, 0)
                + histogram.frequency(bin, 1, 1);
            assert_eq!(cells, count, "bin {}", bin);
            assert_eq!(histogram.bin_total(bin), count);
        }
        assert_eq!(histogram.total_frequency(), 99);
    }

    #[test]
    fn test_tile_merge_order_does_not_matter() {
        let (dem, snow, cloud) = scene();
        let axis = HistogramAxis::new(12, 0.0, 600.0).unwrap();

        let whole = JointHistogramBuilder::new(&dem, &snow, &cloud, axis)
            .with_block_size(64)
            .build()
            .unwrap();

        let builder = JointHistogramBuilder::new(&dem, &snow, &cloud, axis).with_block_size(3);
        let tiles: Vec<JointHistogram> = builder
            .tiles()
            .unwrap()
            .iter()
            .map(|bounds| builder.build_tile(bounds).unwrap())
            .collect();
        assert!(tiles.len() > 1);

        let forward = tiles
            .iter()
            .try_fold(JointHistogram::new(axis), |acc, t| acc.merged(t))
            .unwrap();
        let backward = tiles
            .iter()
            .rev()
            .try_fold(JointHistogram::new(axis), |acc, t| acc.merged(t))
            .unwrap();

        // Pairwise tree: (t0 + t1) + (t2 + t3) + ...
        let pairs: Vec<JointHistogram> = tiles
            .chunks(2)
            .map(|pair| {
                pair.iter()
                    .try_fold(JointHistogram::new(axis), |acc, t| acc.merged(t))
                    .unwrap()
            })
            .collect();
        let tree = pairs
            .iter()
            .try_fold(JointHistogram::new(axis), |acc, t| acc.merged(t))
            .unwrap();

        assert_eq!(forward, whole);
        assert_eq!(backward, whole);
        assert_eq!(tree, whole);

        let parallel = builder.build().unwrap();
        assert_eq!(parallel, whole);
    }

    #[test]
    fn test_invalid_elevations_not_binned() {
        let mut dem = MemoryRaster::filled(4, 4, 50.0).unwrap().with_nodata(-9999.0);
        dem.set(0, 0, -9999.0);
        dem.set(3, 3, f64::NAN);
        let snow = MemoryRaster::filled(4, 4, 1.0).unwrap();
        let cloud = MemoryRaster::filled(4, 4, 0.0).unwrap();

        let histogram = JointHistogramBuilder::new(&dem, &snow, &cloud, axis())
            .build()
            .unwrap();
        assert_eq!(histogram.total_frequency(), 14);
        assert_eq!(histogram.frequency(5, 1, 0), 14);
    }

    #[test]
    fn test_grid_mismatch_detected_before_accumulation() {
        let dem = MemoryRaster::filled(10, 10, 0.0).unwrap();
        let snow = MemoryRaster::filled(10, 10, 0.0).unwrap();
        let cloud = MemoryRaster::filled(9, 10, 0.0).unwrap();
        let result = JointHistogramBuilder::new(&dem, &snow, &cloud, axis()).build();
        assert!(matches!(result, Err(SnowLineError::GridMismatch(_))));
    }
}
