//! Refresh frame metadata and download images into the local cache.
//!
//! ```bash
//! cargo run --release --bin fetch_frames -- --from 2015-07-14 --max-requests 200
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::info;
use regex::Regex;

use shared::cli_args::{parse_datetime, parse_exposure_filter};
use shared::frame_store::{HttpSource, TimeRange};
use shared::stack_config::StackConfig;
use stacker::{StackRequest, Stacker};

#[derive(Parser, Debug)]
#[command(author, version, about = "Download star-field frames into the local cache")]
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

    /// Skip the metadata refresh and only download missing images
    #[arg(long)]
    no_update: bool,

    /// Maximum number of HTTP requests for this session
    #[arg(long)]
    max_requests: Option<usize>,

    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding cached metadata and images
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => StackConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => StackConfig::default(),
    };
    if let Some(dir) = args.data_dir {
        config.store.data_dir = dir;
    }
    if let Some(max) = args.max_requests {
        config.store.fetch.max_requests = max;
    }

    let request = StackRequest {
        range: TimeRange::new(args.from, args.to),
        exposure: args.exposure,
        update_metadata: !args.no_update,
        download_missing: true,
    };

    let mut source = HttpSource::new(&config.store.fetch)?;
    let stacker = Stacker::new(config);
    let paths = stacker.fetch(&request, &mut source)?;

    info!(
        "{} frames cached, {} requests made",
        paths.len(),
        source.budget().used()
    );
    Ok(())
}
