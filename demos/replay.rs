//! Replays recorded detections through a scene.
//!
//! Reads one JSON `Frame` per line, e.g.
//! `{"index":0,"dims":[640,480],"detections":[{"bbox":[10,20,60,120],"p":0.9,"c":0}]}`
//! and prints one JSON snapshot per frame.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use zonetrack::{Frame, SceneConfig, Streams, Tracking};

#[derive(Parser, Debug)]
#[command(name = "replay", about = "Run recorded detections through the tracker and analytics")]
struct Args {
    /// Scene configuration (tracker, zones, lines) as JSON
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// JSON-lines file with one frame per line, stdin when omitted
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,
    /// Source name the frames belong to
    #[arg(long, default_value = "default")]
    source: String,
    /// Print only the final snapshot
    #[arg(long)]
    summary: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zonetrack=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SceneConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SceneConfig::default(),
    };
    info!(
        zones = config.zones.len(),
        lines = config.lines.len(),
        "scene configured"
    );

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut streams = Streams::new(config)?;
    let mut out = BufWriter::new(io::stdout().lock());
    let mut last = None;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let frame: Frame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(line = lineno + 1, %err, "skipping unparsable frame");
                continue;
            }
        };

        let snapshot = streams.update(&frame, &args.source)?;
        if args.summary {
            last = Some(snapshot);
        } else {
            serde_json::to_writer(&mut out, &snapshot)?;
            writeln!(out)?;
        }
    }

    if let Some(snapshot) = last {
        serde_json::to_writer_pretty(&mut out, &snapshot)?;
        writeln!(out)?;
    }

    out.flush()?;

    Ok(())
}
