use crate::error::{Result, SnowLineError};
use log::debug;

pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Pixel window of one block, half-open on the max side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockBounds {
    pub x_min: usize,
    pub y_min: usize,
    pub x_max: usize,
    pub y_max: usize,
}

impl BlockBounds {
    pub fn width(&self) -> usize {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> usize {
        self.y_max - self.y_min
    }

    pub fn pixel_count(&self) -> usize {
        self.width() * self.height()
    }
}

/// Partition of a raster into disjoint blocks covering every pixel once.
#[derive(Debug, Clone)]
pub struct BlockGrid {
    raster_width: usize,
    raster_height: usize,
    block_size: usize,
    pub num_blocks_x: usize,
    pub num_blocks_y: usize,
    pub total_blocks: usize,
}

impl BlockGrid {
    pub fn new(raster_width: usize, raster_height: usize, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(SnowLineError::InvalidBlockSize(block_size));
        }
        if raster_width == 0 || raster_height == 0 {
            return Err(SnowLineError::InvalidDimensions(raster_width, raster_height));
        }

        let num_blocks_x = (raster_width + block_size - 1) / block_size;
        let num_blocks_y = (raster_height + block_size - 1) / block_size;
        let total_blocks = num_blocks_x * num_blocks_y;

        debug!(
            "BlockGrid: {}x{} raster, block_size={} → {}x{} blocks ({} total)",
            raster_width, raster_height, block_size, num_blocks_x, num_blocks_y, total_blocks
        );

        Ok(Self {
            raster_width,
            raster_height,
            block_size,
            num_blocks_x,
            num_blocks_y,
            total_blocks,
        })
    }

    pub fn iter(&self) -> BlockIterator<'_> {
        BlockIterator::new(self)
    }

    pub fn block_bounds(&self, block_idx: usize) -> BlockBounds {
        let block_y = block_idx / self.num_blocks_x;
        let block_x = block_idx % self.num_blocks_x;

        BlockBounds {
            x_min: block_x * self.block_size,
            y_min: block_y * self.block_size,
            x_max: ((block_x + 1) * self.block_size).min(self.raster_width),
            y_max: ((block_y + 1) * self.block_size).min(self.raster_height),
        }
    }

    /// All block windows, in row-major order.
    pub fn blocks(&self) -> Vec<BlockBounds> {
        self.iter().map(|(_, bounds)| bounds).collect()
    }
}

pub struct BlockIterator<'a> {
    grid: &'a BlockGrid,
    current_idx: usize,
}

impl<'a> BlockIterator<'a> {
    fn new(grid: &'a BlockGrid) -> Self {
        Self {
            grid,
            current_idx: 0,
        }
    }
}

impl<'a> Iterator for BlockIterator<'a> {
    type Item = (usize, BlockBounds);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_idx < self.grid.total_blocks {
            let bounds = self.grid.block_bounds(self.current_idx);
            let idx = self.current_idx;
            self.current_idx += 1;
            Some((idx, bounds))
        } else {
            None
        }
    }
}
