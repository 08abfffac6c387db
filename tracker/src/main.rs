//! handcloud-replay - run a recorded frame log through the hand tracker.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use handcloud_tracker::replay::{read_frame_log, run_replay};
use handcloud_tracker::TrackerConfig;

#[derive(Parser, Debug)]
#[command(name = "handcloud-replay", about = "Replay a hand tracking frame log")]
struct Cli {
    /// JSON-lines frame log
    #[arg(long)]
    log: PathBuf,

    /// TOML tracker config (defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sampler RNG seed (overrides the config)
    #[arg(long)]
    seed: Option<u64>,

    /// Point budget per frame (overrides the config)
    #[arg(long)]
    max_points: Option<usize>,

    /// Only print the final status lines
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.quiet {
        "handcloud_tracker=warn"
    } else {
        "handcloud_tracker=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config = config.with_sample_seed(seed);
    }
    if let Some(points) = cli.max_points {
        config = config.with_max_sample_points(points);
    }
    info!("handcloud-replay v{} config {}", env!("CARGO_PKG_VERSION"), config.config_sexp());

    let records = read_frame_log(&cli.log)?;
    let summary = run_replay(&records, config)
        .with_context(|| format!("replaying {}", cli.log.display()))?;

    info!(
        "processed {} of {} frames ({} detected), peak {} points",
        summary.frames_processed, summary.frames_read, summary.detected_frames, summary.max_point_count
    );
    if !cli.quiet {
        for (t, event) in &summary.events {
            println!("{:.3} {}", t, event.as_str());
        }
    }
    println!("{}", summary.status);
    println!("{}", summary.timing);
    println!(
        "(:menu-open {} :capture-requests {})",
        if summary.ui.menu_open { "t" } else { "nil" },
        summary.ui.capture_requests
    );
    Ok(())
}
