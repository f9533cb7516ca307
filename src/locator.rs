//! Threshold-crossing search over a joint histogram.

use crate::error::{Result, SnowLineError};
use crate::fraction::SnowFractionAnalyzer;
use crate::histogram::JointHistogram;
use log::{debug, info};
use std::fmt;

/// Outcome of a snow line search.
///
/// `NotFound` is a regular outcome. Callers needing the historical integer
/// convention use [`SnowLine::code`], which maps it to −1; that is only
/// unambiguous for non-negative elevations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnowLine {
    Found(i32),
    NotFound,
}

impl SnowLine {
    pub const NOT_FOUND_CODE: i32 = -1;

    pub fn elevation(&self) -> Option<i32> {
        match self {
            SnowLine::Found(z) => Some(*z),
            SnowLine::NotFound => None,
        }
    }

    pub fn code(&self) -> i32 {
        self.elevation().unwrap_or(Self::NOT_FOUND_CODE)
    }
}

impl fmt::Display for SnowLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnowLine::Found(z) => write!(f, "{}", z),
            SnowLine::NotFound => write!(f, "not found"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    /// Low to high elevation.
    Ascending,
    /// High to low elevation.
    Descending,
}

impl ScanDirection {
    pub fn from_reverse(reverse: bool) -> Self {
        if reverse {
            ScanDirection::Descending
        } else {
            ScanDirection::Ascending
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocatorParams {
    /// Snow fraction of the cloud-free pixels a bin must exceed.
    pub fsnow_lim: f64,
    /// Cloud-free fraction of all pixels a bin must exceed.
    pub fclear_lim: f64,
    pub direction: ScanDirection,
    /// Added to the winning bin index; the result is clamped to the axis.
    pub offset: i32,
    /// Added to the centroid of the selected bin before flooring.
    pub center_offset: i32,
}

impl Default for LocatorParams {
    fn default() -> Self {
        Self {
            fsnow_lim: 0.1,
            fclear_lim: 0.0,
            direction: ScanDirection::Ascending,
            offset: -2,
            center_offset: -50,
        }
    }
}

impl LocatorParams {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("fsnow_lim", self.fsnow_lim), ("fclear_lim", self.fclear_lim)] {
            if !value.is_finite() || value < 0.0 {
                return Err(SnowLineError::InvalidThreshold { name, value });
            }
        }
        Ok(())
    }
}

/// Scan `histogram` for the first bin whose snow fraction exceeds the limit.
///
/// Bins without cloud-free pixels are skipped. The first qualifying bin in
/// scan order wins, regardless of how its fraction compares with later bins.
pub fn locate_snow_line(histogram: &JointHistogram, params: &LocatorParams) -> Result<SnowLine> {
    params.validate()?;
    if histogram.total_frequency() == 0 {
        return Err(SnowLineError::EmptyHistogram);
    }

    let analyzer = SnowFractionAnalyzer::new(histogram);
    let count = analyzer.bin_count();
    let order: Box<dyn Iterator<Item = usize>> = match params.direction {
        ScanDirection::Ascending => Box::new(0..count),
        ScanDirection::Descending => Box::new((0..count).rev()),
    };

    for bin in order {
        let summary = analyzer.summary(bin);
        let (Some(fsnow), Some(fclear)) = (summary.snow_fraction(), summary.clear_fraction())
        else {
            continue;
        };

        if fsnow > params.fsnow_lim && fclear > params.fclear_lim {
            let shifted = (bin as i64 + i64::from(params.offset)).clamp(0, count as i64 - 1) as usize;
            let axis = histogram.axis();
            let elevation = (axis.centroid(shifted) + f64::from(params.center_offset)).floor() as i32;

            debug!(
                "Bin {} qualifies: snow={} cloud-free={} fsnow={:.3} fclear={:.3}",
                bin,
                summary.snow,
                summary.cloud_free(),
                fsnow,
                fclear
            );
            info!("Snow line found at {} (bin {} shifted to {})", elevation, bin, shifted);
            return Ok(SnowLine::Found(elevation));
        }
    }

    info!("No elevation bin exceeds fsnow_lim={}", params.fsnow_lim);
    Ok(SnowLine::NotFound)
}
