use crate::histogram::JointHistogram;

/// Per-bin counts derived from a joint histogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinSummary {
    pub bin: usize,
    pub centroid: f64,
    /// All four snow × cloud cells.
    pub total: u64,
    /// Cloud-flagged pixels, with or without snow.
    pub cloud: u64,
    /// Cloud-free snow pixels.
    pub snow: u64,
    /// Cloud-free snow-free pixels.
    pub no_snow: u64,
}

impl BinSummary {
    pub fn cloud_free(&self) -> u64 {
        self.snow + self.no_snow
    }

    /// Snow share of the cloud-free pixels; `None` when the bin is fully obscured.
    pub fn snow_fraction(&self) -> Option<f64> {
        match self.cloud_free() {
            0 => None,
            z => Some(self.snow as f64 / z as f64),
        }
    }

    pub fn clear_fraction(&self) -> Option<f64> {
        match self.total {
            0 => None,
            t => Some(self.cloud_free() as f64 / t as f64),
        }
    }

    pub fn cloud_fraction(&self) -> Option<f64> {
        match self.total {
            0 => None,
            t => Some(self.cloud as f64 / t as f64),
        }
    }
}

/// Read-only per-bin view over a completed histogram.
pub struct SnowFractionAnalyzer<'a> {
    histogram: &'a JointHistogram,
}

impl<'a> SnowFractionAnalyzer<'a> {
    pub fn new(histogram: &'a JointHistogram) -> Self {
        Self { histogram }
    }

    pub fn bin_count(&self) -> usize {
        self.histogram.axis().count()
    }

    pub fn summary(&self, bin: usize) -> BinSummary {
        let h = self.histogram;
        BinSummary {
            bin,
            centroid: h.axis().centroid(bin),
            total: h.bin_total(bin),
            cloud: h.frequency(bin, 0, 1) + h.frequency(bin, 1, 1),
            snow: h.frequency(bin, 1, 0),
            no_snow: h.frequency(bin, 0, 0),
        }
    }

    /// z(i): cloud-free pixel count of a bin.
    pub fn cloud_free_count(&self, bin: usize) -> u64 {
        self.summary(bin).cloud_free()
    }

    pub fn snow_fraction(&self, bin: usize) -> Option<f64> {
        self.summary(bin).snow_fraction()
    }

    /// Summaries in ascending bin order.
    pub fn summaries(&self) -> impl Iterator<Item = BinSummary> + '_ {
        (0..self.bin_count()).map(move |bin| self.summary(bin))
    }
}
