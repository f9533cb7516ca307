use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::chunking::DEFAULT_BLOCK_SIZE;

#[derive(Parser, Debug)]
#[command(name = "snowline")]
#[command(about = "Estimate snow line elevation from a DEM and snow/cloud masks")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Number of threads (default: all available)
    #[arg(short, long, global = true, value_name = "N")]
    pub threads: Option<usize>,

    /// Block edge length in pixels for streamed reads
    #[arg(long, global = true, value_name = "PIXELS", default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(ClapArgs, Debug)]
pub struct MaskInputs {
    /// Elevation raster (DEM)
    #[arg(long, value_name = "FILE")]
    pub dem: PathBuf,

    /// Snow mask raster, same grid as the DEM
    #[arg(long, value_name = "FILE")]
    pub snow: PathBuf,

    /// Cloud mask raster, same grid as the DEM
    #[arg(long, value_name = "FILE")]
    pub cloud: PathBuf,

    /// Elevation bin width, in DEM units
    #[arg(long, default_value_t = 100)]
    pub dz: i32,

    /// Minimum snow fraction of cloud-free pixels in a bin
    #[arg(long, default_value_t = 0.1)]
    pub fsnow_lim: f64,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Locate the snow line from the joint elevation/snow/cloud histogram
    Snowline {
        #[command(flatten)]
        inputs: MaskInputs,

        /// Minimum cloud-free fraction of all pixels in a bin
        #[arg(long, default_value_t = 0.0)]
        fclear_lim: f64,

        /// Scan from high to low elevation
        #[arg(long)]
        reverse: bool,

        /// Bins added to the winning bin index
        #[arg(long, default_value_t = -2, allow_hyphen_values = true)]
        offset: i32,

        /// Added to the selected bin centroid (default: -dz/2)
        #[arg(long, allow_hyphen_values = true)]
        center_offset: Option<i32>,

        /// Mask values above this are flagged
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        mask_threshold: f64,

        /// Write the per-bin histogram table to this file
        #[arg(long, value_name = "FILE")]
        histogram: Option<PathBuf>,
    },

    /// Locate the snow line with the two-histogram ratio method
    Legacy {
        #[command(flatten)]
        inputs: MaskInputs,
    },

    /// Count pixels with lower <= value <= upper
    CountRange {
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        #[arg(long, allow_hyphen_values = true)]
        lower: i32,

        #[arg(long, allow_hyphen_values = true)]
        upper: i32,
    },

    /// Count mask pixels equal to 1
    SnowCount {
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },
}
