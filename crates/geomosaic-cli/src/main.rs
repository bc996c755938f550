//! image2qtree
//!
//! Mosaics georeferenced images and writes them out as a quad-tree of tiles.

mod args;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use geomosaic_core::progress::LogProgress;
use geomosaic_core::{
    run_mosaic, DiskTileWriter, ImageFileSource, NormalizeRange, Options, RasterSource,
};

use crate::args::Args;

fn load_options_file(path: &Path) -> Result<Options> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read options file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid options file {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt().with_env_filter(filter).with_target(false).init();

    let mut opts = match &args.options_file {
        Some(path) => load_options_file(path)?,
        None => Options::default(),
    };
    args.merge_into(&mut opts);

    let sources = opts
        .input_files
        .iter()
        .map(|path| {
            ImageFileSource::open(path)
                .map(|s| Arc::new(s) as Arc<dyn RasterSource>)
                .with_context(|| format!("Failed to open {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let normalize = if opts.normalize {
        info!("Scanning inputs for normalization range");
        let range = NormalizeRange::scan(&sources, opts.nodata)
            .context("Failed to scan inputs for normalization")?;
        if let Some(r) = range {
            info!(lo = r.lo, hi = r.hi, "Normalization range");
        }
        range
    } else {
        None
    };

    let writer = DiskTileWriter::new(".", opts.encode_settings());
    let progress = LogProgress::new("Generating tiles");
    let summary = run_mosaic(&opts, &sources, normalize, &writer, &progress)
        .context("Failed to build quad-tree")?;

    info!(
        tiles = summary.tiles_written(),
        levels = summary.root.max_level() + 1,
        "Done"
    );
    Ok(())
}
