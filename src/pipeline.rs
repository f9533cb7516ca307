//! Entry points composing the bounds pass, the accumulation pass and the
//! threshold search.

use crate::chunking::DEFAULT_BLOCK_SIZE;
use crate::diagnostics::export_histogram;
use crate::error::{Result, SnowLineError};
use crate::histogram::{HistogramAxis, JointHistogramBuilder, MaskClassifier};
use crate::io::GdalRaster;
use crate::legacy::legacy_snow_line;
use crate::locator::{locate_snow_line, LocatorParams, ScanDirection, SnowLine};
use crate::raster::{ensure_same_grid, RasterSource};
use crate::stats::{compute_min_max, count_equal, count_in_range};
use log::info;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnowLineParams {
    /// Target elevation bin width, in DEM units.
    pub dz: i32,
    pub locator: LocatorParams,
    pub classifier: MaskClassifier,
    pub block_size: usize,
}

impl SnowLineParams {
    pub fn new(dz: i32, fsnow_lim: f64, reverse: bool, offset: i32, center_offset: i32) -> Self {
        Self {
            dz,
            locator: LocatorParams {
                fsnow_lim,
                fclear_lim: 0.0,
                direction: ScanDirection::from_reverse(reverse),
                offset,
                center_offset,
            },
            classifier: MaskClassifier::default(),
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    pub fn with_fclear_lim(mut self, fclear_lim: f64) -> Self {
        self.locator.fclear_lim = fclear_lim;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_classifier(mut self, classifier: MaskClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dz <= 0 {
            return Err(SnowLineError::InvalidBinWidth(self.dz));
        }
        if self.block_size == 0 {
            return Err(SnowLineError::InvalidBlockSize(self.block_size));
        }
        self.locator.validate()
    }
}

impl Default for SnowLineParams {
    fn default() -> Self {
        Self::new(100, 0.1, false, -2, -50)
    }
}

/// Snow line over already-opened rasters.
///
/// All inputs are validated before the first pixel is read.
pub fn snow_line_from_rasters(
    elevation: &dyn RasterSource,
    snow: &dyn RasterSource,
    cloud: &dyn RasterSource,
    params: &SnowLineParams,
    diagnostics_path: Option<&Path>,
) -> Result<SnowLine> {
    params.validate()?;
    ensure_same_grid(elevation, &[("snow mask", snow), ("cloud mask", cloud)])?;

    let extent = compute_min_max(elevation, params.block_size)?;
    let axis = HistogramAxis::from_extent(extent.min, extent.max, params.dz)?;

    let histogram = JointHistogramBuilder::new(elevation, snow, cloud, axis)
        .with_classifier(params.classifier)
        .with_block_size(params.block_size)
        .build()?;

    if let Some(path) = diagnostics_path {
        export_histogram(&histogram, path)?;
    }

    locate_snow_line(&histogram, &params.locator)
}

/// Snow line from three co-registered GeoTIFFs (or any GDAL-readable rasters).
pub fn compute_snow_line<P: AsRef<Path>>(
    elevation_path: P,
    snow_mask_path: P,
    cloud_mask_path: P,
    params: &SnowLineParams,
    diagnostics_path: Option<&Path>,
) -> Result<SnowLine> {
    params.validate()?;
    let elevation = GdalRaster::open(elevation_path)?;
    let snow = GdalRaster::open(snow_mask_path)?;
    let cloud = GdalRaster::open(cloud_mask_path)?;

    let result = snow_line_from_rasters(&elevation, &snow, &cloud, params, diagnostics_path)?;
    info!("Snow line: {}", result);
    Ok(result)
}

/// Legacy two-histogram snow line from raster files.
pub fn compute_legacy_snow_line<P: AsRef<Path>>(
    elevation_path: P,
    snow_mask_path: P,
    cloud_mask_path: P,
    dz: i32,
    fsnow_lim: f64,
    block_size: usize,
) -> Result<SnowLine> {
    let elevation = GdalRaster::open(elevation_path)?;
    let snow = GdalRaster::open(snow_mask_path)?;
    let cloud = GdalRaster::open(cloud_mask_path)?;
    legacy_snow_line(&elevation, &snow, &cloud, dz, fsnow_lim, block_size)
}

/// Valid pixels with `lower <= value <= upper`.
pub fn compute_pixel_count_in_range<P: AsRef<Path>>(
    raster_path: P,
    lower: i32,
    upper: i32,
) -> Result<u64> {
    let raster = GdalRaster::open(raster_path)?;
    let count = count_in_range(&raster, f64::from(lower), f64::from(upper), DEFAULT_BLOCK_SIZE)?;
    info!("{} pixels in [{}, {}]", count, lower, upper);
    Ok(count)
}

/// Pixels of a mask equal to category 1.
pub fn compute_snow_fraction<P: AsRef<Path>>(mask_path: P) -> Result<u64> {
    let raster = GdalRaster::open(mask_path)?;
    snow_pixel_count(&raster, DEFAULT_BLOCK_SIZE)
}

pub fn snow_pixel_count(mask: &dyn RasterSource, block_size: usize) -> Result<u64> {
    let grid = mask.grid();
    let count = count_equal(mask, 1.0, block_size)?;
    info!("{} of {} mask pixels are snow", count, grid.pixel_count());
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::MemoryRaster;
    use ndarray::Array2;

    /// Valley at 0 m rising to 990 m, snow above 600 m, clouds over the
    /// 300-399 m band.
    fn mountain() -> (MemoryRaster, MemoryRaster, MemoryRaster) {
        let dem = Array2::from_shape_fn((10, 10), |(r, c)| (r * 100 + c * 10) as f64);
        let snow = dem.mapv(|z| if z >= 600.0 { 1.0 } else { 0.0 });
        let cloud = dem.mapv(|z| if (300.0..400.0).contains(&z) { 1.0 } else { 0.0 });
        (
            MemoryRaster::new(dem).unwrap(),
            MemoryRaster::new(snow).unwrap(),
            MemoryRaster::new(cloud).unwrap(),
        )
    }

    #[test]
    fn test_snow_line_on_synthetic_slope() {
        // Axis [0, 990] with 9 bins of 110 m; the 550-660 bin (index 5) is
        // the first with snow above 10%, shifted back to bin 3 (centroid 385)
        let (dem, snow, cloud) = mountain();
        let params = SnowLineParams::new(110, 0.1, false, -2, -55).with_block_size(4);
        let result = snow_line_from_rasters(&dem, &snow, &cloud, &params, None).unwrap();
        assert_eq!(result, SnowLine::Found(330));
    }

    #[test]
    fn test_descending_scan_on_synthetic_slope() {
        // From the top, bin 8 (880-990) is fully snowy and wins immediately
        let (dem, snow, cloud) = mountain();
        let params = SnowLineParams::new(110, 0.1, true, 0, 0).with_block_size(3);
        let result = snow_line_from_rasters(&dem, &snow, &cloud, &params, None).unwrap();
        assert_eq!(result, SnowLine::Found(935));
    }

    #[test]
    fn test_block_size_does_not_change_result() {
        let (dem, snow, cloud) = mountain();
        let reference = snow_line_from_rasters(&dem, &snow, &cloud, &SnowLineParams::default(), None)
            .unwrap();
        for block_size in [1, 2, 7, 10] {
            let params = SnowLineParams::default().with_block_size(block_size);
            let result = snow_line_from_rasters(&dem, &snow, &cloud, &params, None).unwrap();
            assert_eq!(result, reference);
        }
    }

    #[test]
    fn test_invalid_params_rejected_before_reading() {
        let (dem, snow, cloud) = mountain();
        let bad_dz = SnowLineParams::new(0, 0.1, false, -2, -50);
        assert!(matches!(
            snow_line_from_rasters(&dem, &snow, &cloud, &bad_dz, None),
            Err(SnowLineError::InvalidBinWidth(0))
        ));

        let bad_block = SnowLineParams::default().with_block_size(0);
        assert!(matches!(
            snow_line_from_rasters(&dem, &snow, &cloud, &bad_block, None),
            Err(SnowLineError::InvalidBlockSize(0))
        ));
    }

    #[test]
    fn test_empty_dem_rejected() {
        let dem = MemoryRaster::filled(5, 5, -32768.0).unwrap().with_nodata(-32768.0);
        let mask = MemoryRaster::filled(5, 5, 0.0).unwrap();
        let result = snow_line_from_rasters(&dem, &mask, &mask, &SnowLineParams::default(), None);
        assert!(matches!(result, Err(SnowLineError::EmptyInput)));
    }

    #[test]
    fn test_snow_pixel_count() {
        let (_, snow, _) = mountain();
        assert_eq!(snow_pixel_count(&snow, 3).unwrap(), 40);
    }
}
