use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use snowline::cli::{Args, Command};
use snowline::error::Result;
use snowline::histogram::MaskClassifier;
use snowline::pipeline::{
    compute_legacy_snow_line, compute_pixel_count_in_range, compute_snow_fraction,
    compute_snow_line, SnowLineParams,
};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("=== Snow Line Estimator ===");

    // Set thread pool size if specified
    if let Some(n_threads) = args.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build_global()
        {
            warn!("Could not configure thread pool: {}", e);
        } else {
            info!("Using {} threads", n_threads);
        }
    } else {
        info!("Using all available threads");
    }

    match args.command {
        Command::Snowline {
            inputs,
            fclear_lim,
            reverse,
            offset,
            center_offset,
            mask_threshold,
            histogram,
        } => {
            let center_offset = center_offset.unwrap_or(-inputs.dz / 2);
            let params = SnowLineParams::new(inputs.dz, inputs.fsnow_lim, reverse, offset, center_offset)
                .with_fclear_lim(fclear_lim)
                .with_classifier(MaskClassifier::new(mask_threshold))
                .with_block_size(args.block_size);

            let zs = compute_snow_line(
                &inputs.dem,
                &inputs.snow,
                &inputs.cloud,
                &params,
                histogram.as_deref(),
            )?;
            if zs.elevation().is_none() {
                warn!("No snow line found");
            }
            println!("{}", zs.code());
        }
        Command::Legacy { inputs } => {
            let zs = compute_legacy_snow_line(
                &inputs.dem,
                &inputs.snow,
                &inputs.cloud,
                inputs.dz,
                inputs.fsnow_lim,
                args.block_size,
            )?;
            println!("{}", zs.code());
        }
        Command::CountRange {
            input,
            lower,
            upper,
        } => {
            println!("{}", compute_pixel_count_in_range(&input, lower, upper)?);
        }
        Command::SnowCount { input } => {
            println!("{}", compute_snow_fraction(&input)?);
        }
    }

    info!("=== Done! ===");
    Ok(())
}
