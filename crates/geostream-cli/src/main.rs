//! GeoStream CLI (geoctl)
//!
//! Command-line tool for inspecting and querying GeoStream files.
//!
//! ## Overview
//!
//! `geoctl` wraps the stream reader and writer:
//! - **info**: print the header (layer name, geometry type, columns, index)
//! - **dump**: print features as JSON lines, optionally filtered by a rectangle
//! - **index**: rewrite a stream with a packed spatial index
//!
//! ## Quick Start
//!
//! ```bash
//! # Inspect a stream
//! geoctl info parcels.gst
//!
//! # All features
//! geoctl dump parcels.gst
//!
//! # Features intersecting a rectangle, at most 10
//! geoctl dump parcels.gst --bbox 10.0,50.0,11.0,51.0 --limit 10
//!
//! # Add an index so --bbox no longer scans the whole file
//! geoctl index parcels.gst parcels-indexed.gst --node-size 16
//! ```
//!
//! ## Configuration
//!
//! - `RUST_LOG` / `--log-level`: log filter directives, logs go to stderr (default: warn)
//!
//! ## Error Handling
//!
//! Errors carry the file path and the failing step. A damaged record stops
//! `dump` after printing every feature before it.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use geostream_core::Rect;
use geostream_storage::{FeatureReader, FeatureWriter, WriteConfig};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod format;

#[derive(Parser)]
#[command(name = "geoctl")]
#[command(about = "GeoStream command-line tool", long_about = None)]
struct Cli {
    /// Log filter: a level (warn, debug) or directives such as `geostream_storage=debug`
    #[arg(long, env = "RUST_LOG", default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the stream header as JSON
    Info {
        /// GeoStream file
        file: PathBuf,
    },
    /// Print features as JSON lines
    Dump {
        /// GeoStream file
        file: PathBuf,
        /// Only features intersecting minx,miny,maxx,maxy
        #[arg(short, long, value_parser = parse_bbox)]
        bbox: Option<Rect>,
        /// Maximum number of features to print
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Rewrite a stream with a packed spatial index
    Index {
        /// Source GeoStream file
        input: PathBuf,
        /// Destination file
        output: PathBuf,
        /// R-tree node size
        #[arg(short, long, default_value = "16")]
        node_size: u16,
    },
}

fn parse_bbox(s: &str) -> std::result::Result<Rect, String> {
    let values = s
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid number in bbox: {}", e))?;

    match values.as_slice() {
        [min_x, min_y, max_x, max_y] if min_x <= max_x && min_y <= max_y => {
            Ok(Rect::new(*min_x, *min_y, *max_x, *max_y))
        }
        [_, _, _, _] => Err("bbox min must not exceed max".to_string()),
        _ => Err(format!(
            "bbox needs 4 comma-separated numbers, got {}",
            values.len()
        )),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match cli.command {
        Commands::Info { file } => handle_info(&mut out, &file)?,
        Commands::Dump { file, bbox, limit } => handle_dump(&mut out, &file, bbox, limit)?,
        Commands::Index {
            input,
            output,
            node_size,
        } => handle_index(&input, &output, node_size)?,
    }

    out.flush()?;
    Ok(())
}

fn open(path: &Path) -> Result<FeatureReader<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    FeatureReader::open(BufReader::new(file))
        .with_context(|| format!("Failed to read header of {}", path.display()))
}

fn handle_info<W: Write>(out: &mut W, path: &Path) -> Result<()> {
    let reader = open(path)?;
    format::print_header(out, reader.header())
}

fn handle_dump<W: Write>(
    out: &mut W,
    path: &Path,
    bbox: Option<Rect>,
    limit: Option<usize>,
) -> Result<()> {
    let features = open(path)?
        .select(bbox)
        .with_context(|| format!("Failed to search index of {}", path.display()))?;

    let mut printed = 0usize;
    for (position, feature) in features.take(limit.unwrap_or(usize::MAX)).enumerate() {
        let feature = feature
            .with_context(|| format!("Failed to decode feature {} of {}", position, path.display()))?;
        format::print_feature(out, &feature)?;
        printed += 1;
    }

    info!(printed, file = %path.display(), "Dump complete");
    Ok(())
}

fn handle_index(input: &Path, output: &Path, node_size: u16) -> Result<()> {
    if node_size < 2 {
        bail!("node size must be at least 2, got {}", node_size);
    }

    let reader = open(input)?;
    let header = reader.header().clone();
    let config = WriteConfig {
        index_node_size: node_size,
        layer_name: header.name.clone(),
    };
    let mut writer = FeatureWriter::new(
        header.geometry_type,
        header.dimensions(),
        header.columns.clone(),
        config,
    );

    for (position, feature) in reader.select_all()?.enumerate() {
        let feature = feature
            .with_context(|| format!("Failed to decode feature {} of {}", position, input.display()))?;
        writer.add(&feature)?;
    }

    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut file = BufWriter::new(file);
    let written = writer.finish(&mut file)?;
    file.flush()?;

    info!(
        features = written.features_count,
        indexed = written.has_index(),
        node_size = written.index_node_size,
        output = %output.display(),
        "Wrote stream"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        assert_eq!(
            parse_bbox("0,1.5, 2 ,3").unwrap(),
            Rect::new(0.0, 1.5, 2.0, 3.0)
        );
        assert!(parse_bbox("0,1,2").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
        assert!(parse_bbox("5,0,1,1").is_err());
    }

    #[test]
    fn test_log_level_accepts_directives() {
        let cli = Cli::try_parse_from([
            "geoctl",
            "--log-level",
            "geostream_storage=debug,warn",
            "info",
            "x.gst",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "geostream_storage=debug,warn");
        assert!(EnvFilter::try_new(&cli.log_level).is_ok());
    }

    #[test]
    fn test_cli_parses_dump() {
        let cli = Cli::try_parse_from(["geoctl", "dump", "x.gst", "--bbox", "0,0,1,1", "--limit", "3"])
            .unwrap();
        match cli.command {
            Commands::Dump { bbox, limit, .. } => {
                assert_eq!(bbox, Some(Rect::new(0.0, 0.0, 1.0, 1.0)));
                assert_eq!(limit, Some(3));
            }
            _ => panic!("expected dump"),
        }
    }
}
