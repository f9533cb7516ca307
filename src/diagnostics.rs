use crate::error::Result;
use crate::fraction::SnowFractionAnalyzer;
use crate::histogram::JointHistogram;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const HEADER: &str = "z_center,tot_z,fcloud_z,fsnow_z,fnosnow_z";

/// Write the per-bin table of `histogram`.
///
/// Line 1 summarises the histogram (cell count, total frequency, axis
/// sizes), line 2 is [`HEADER`], then one row per elevation bin in ascending
/// order.
pub fn write_histogram<W: Write>(histogram: &JointHistogram, out: &mut W) -> Result<()> {
    let [z_bins, snow_bins, cloud_bins] = histogram.dimension_sizes();
    writeln!(
        out,
        "Number of bins={}-Total frequency={}-Dimension sizes=[{}, {}, {}]",
        histogram.size(),
        histogram.total_frequency(),
        z_bins,
        snow_bins,
        cloud_bins
    )?;
    writeln!(out, "{}", HEADER)?;

    for bin in SnowFractionAnalyzer::new(histogram).summaries() {
        writeln!(
            out,
            "{},{},{},{},{}",
            bin.centroid, bin.total, bin.cloud, bin.snow, bin.no_snow
        )?;
    }
    Ok(())
}

pub fn export_histogram<P: AsRef<Path>>(histogram: &JointHistogram, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Writing histogram diagnostics: {}", path.display());
    let mut out = BufWriter::new(File::create(path)?);
    write_histogram(histogram, &mut out)?;
    out.flush()?;
    Ok(())
}
