use crate::chunking::BlockBounds;
use crate::error::{Result, SnowLineError};
use crate::raster::{RasterGrid, RasterSource};
use gdal::raster::RasterBand;
use gdal::Dataset;
use log::{debug, info};
use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub geotransform: Option<[f64; 6]>,
    pub projection: String,
    pub nodata: Option<f64>,
}

/// Extract metadata from a dataset without reading any samples
pub fn extract_metadata_from_dataset(dataset: &Dataset) -> Result<RasterMetadata> {
    let rasterband: RasterBand = dataset.rasterband(1)?;

    let width = rasterband.x_size();
    let height = rasterband.y_size();

    if width == 0 || height == 0 {
        return Err(SnowLineError::InvalidDimensions(width, height));
    }

    // Ungeoreferenced rasters (plain arrays written as TIFF) are still usable
    let geotransform = dataset.geo_transform().ok();

    Ok(RasterMetadata {
        width,
        height,
        geotransform,
        projection: dataset.projection(),
        nodata: rasterband.no_data_value(),
    })
}

/// First band of a GDAL dataset, read block by block.
///
/// A GDAL dataset handle is not `Sync`, so block reads from concurrent tile
/// workers are serialised behind a mutex.
pub struct GdalRaster {
    path: PathBuf,
    dataset: Mutex<Dataset>,
    metadata: RasterMetadata,
    grid: RasterGrid,
}

impl GdalRaster {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!("Opening raster: {}", path.display());
        let dataset = Dataset::open(&path)?;
        let metadata = extract_metadata_from_dataset(&dataset)?;

        debug!(
            "Raster {}: {}x{}, nodata={:?}",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.nodata
        );

        let grid = RasterGrid {
            width: metadata.width,
            height: metadata.height,
            geotransform: metadata.geotransform,
        };

        Ok(Self {
            path,
            dataset: Mutex::new(dataset),
            metadata,
            grid,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }
}

impl RasterSource for GdalRaster {
    fn grid(&self) -> &RasterGrid {
        &self.grid
    }

    fn nodata(&self) -> Option<f64> {
        self.metadata.nodata
    }

    fn read_block(&self, bounds: &BlockBounds) -> Result<Array2<f64>> {
        let width = bounds.width();
        let height = bounds.height();

        debug!(
            "Reading {}: offset=({},{}), size=({},{})",
            self.path.display(),
            bounds.x_min,
            bounds.y_min,
            width,
            height
        );

        let data_vec: Vec<f64> = {
            // A poisoned lock only means another reader panicked; the handle itself is intact
            let dataset = self
                .dataset
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let rasterband = dataset.rasterband(1)?;
            let buffer = rasterband.read_as::<f64>(
                (bounds.x_min as isize, bounds.y_min as isize),
                (width, height),
                (width, height),
                None,
            )?;
            buffer.into_iter().collect()
        };

        if data_vec.len() != width * height {
            return Err(SnowLineError::InvalidWindow(
                bounds.x_min,
                bounds.y_min,
                bounds.x_max,
                bounds.y_max,
                data_vec.len(),
                1,
            ));
        }

        let data = Array2::from_shape_vec((height, width), data_vec)?;
        Ok(data)
    }
}
