//! Stack cached star-field frames into composite images.
//!
//! # Usage
//!
//! ```bash
//! # Refresh metadata, download what is missing and stack one day
//! cargo run --release --bin stack_frames -- -u -d --from 2015-07-13 --to "2015-07-14 06:00:00"
//!
//! # Only long exposures, cropped, skipping washed-out frames
//! cargo run --release --bin stack_frames -- --exposure '^150' --crop 0,0,512,512 --max-brightness 40
//! ```
//!
//! Frames that fail extraction or registration are logged and skipped; the
//! exit status is non-zero only for bad arguments, an unreadable config,
//! missing images when downloads are disabled, or write failures.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::info;
use regex::Regex;

use shared::cli_args::{parse_datetime, parse_exposure_filter, CropArg};
use shared::frame_store::{HttpSource, TimeRange};
use shared::stack_config::StackConfig;
use stacker::{StackRequest, Stacker};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Register star-field frames and stack them into composite images"
)]
struct Args {
    /// Earliest frame time, UTC ("YYYY-MM-DD" or "YYYY-MM-DD HH:MM:SS")
    #[arg(long, value_parser = parse_datetime)]
    from: Option<DateTime<Utc>>,

    /// Latest frame time, UTC, inclusive
    #[arg(long, value_parser = parse_datetime)]
    to: Option<DateTime<Utc>>,

    /// Regular expression the frame exposure must match
    #[arg(long, value_parser = parse_exposure_filter)]
    exposure: Option<Regex>,

    /// Crop rectangle "x,y,w,h" in anchor frame pixels
    #[arg(long)]
    crop: Option<CropArg>,

    /// Skip frames whose mean pixel value exceeds this
    #[arg(long)]
    max_brightness: Option<f64>,

    /// Start a new output image after a gap longer than this many seconds
    #[arg(long)]
    max_interval_secs: Option<i64>,

    /// Refresh frame metadata from the remote index first
    #[arg(short, long)]
    update_metadata: bool,

    /// Download images that are not cached yet
    #[arg(short, long)]
    download_missing: bool,

    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding cached metadata and images
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory stacked images are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Seed for the registration search
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn stack_config(&self) -> Result<StackConfig> {
        let mut config = match &self.config {
            Some(path) => StackConfig::load_from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => StackConfig::default(),
        };

        if let Some(crop) = self.crop {
            config.stacking.crop = Some(crop.into());
        }
        if let Some(limit) = self.max_brightness {
            config.stacking.max_brightness = Some(limit);
        }
        if let Some(secs) = self.max_interval_secs {
            config.stacking.max_frame_interval_secs = secs;
        }
        if let Some(dir) = &self.data_dir {
            config.store.data_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.store.output_dir = dir.clone();
        }
        if let Some(seed) = self.seed {
            config.registration.seed = Some(seed);
        }
        Ok(config)
    }

    fn request(&self) -> StackRequest {
        StackRequest {
            range: TimeRange::new(self.from, self.to),
            exposure: self.exposure.clone(),
            update_metadata: self.update_metadata,
            download_missing: self.download_missing,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.stack_config()?;
    let request = args.request();

    let mut source = HttpSource::new(&config.store.fetch)?;
    let stacker = Stacker::new(config);
    let report = stacker.run(&request, &mut source)?;

    info!(
        "{} selected, {} loaded, {} too bright, {} extracted, {} registered, {} groups",
        report.selected,
        report.loaded,
        report.too_bright,
        report.extracted,
        report.registered,
        report.groups
    );
    for path in &report.outputs {
        println!("{}", path.display());
    }

    Ok(())
}
