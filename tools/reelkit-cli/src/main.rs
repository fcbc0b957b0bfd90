//! reelkit CLI: probe, play, and export short-form video.
//!
//! Usage:
//!   reelkit probe <PATH>                 Show duration, size, and playability
//!   reelkit play <PATH>                  Play headless until finished
//!   reelkit export <PATH>                Export a trimmed range
//!   reelkit clips <PATH> --clip-length L Split and export fixed-length clips
//!   reelkit check                        Check media tool availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use reelkit_common::config::AppConfig;

mod commands;

use commands::{OverlayArgs, RangeArgs};

#[derive(Parser)]
#[command(
    name = "reelkit",
    about = "Playback and export for short-form video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show media information
    Probe {
        /// Media file
        path: PathBuf,
    },

    /// Play a file headless and print playback snapshots
    Play {
        /// Media file
        path: PathBuf,

        /// Loop instead of finishing (stop with Ctrl+C)
        #[arg(long = "loop")]
        should_loop: bool,

        /// Start muted
        #[arg(long)]
        muted: bool,

        /// Playback rate
        #[arg(long, default_value = "1.0")]
        rate: f32,

        /// Seconds to start from
        #[arg(long)]
        seek: Option<f64>,

        /// Skip ahead before playing; without a value uses the configured skip distance
        #[arg(long, num_args = 0..=1, allow_negative_numbers = true)]
        skip: Option<Option<f64>>,
    },

    /// Export the trimmed range of a file
    Export {
        /// Media file
        path: PathBuf,

        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        overlay: OverlayArgs,

        /// Directory for exported files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Split a file into fixed-length clips and export them concurrently
    Clips {
        /// Media file
        path: PathBuf,

        /// Clip length in seconds
        #[arg(long)]
        clip_length: f64,

        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        overlay: OverlayArgs,

        /// Directory for exported files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Check media tool availability
    Check {
        /// Write the effective configuration to the config file
        #[arg(long)]
        write_config: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load();

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    reelkit_common::logging::init_logging(&config.logging);
    tracing::debug!(
        resources_dir = %config.resources_dir.display(),
        output_dir = %config.export.output_dir.display(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Probe { path } => commands::probe::run(&config, path),
        Commands::Play {
            path,
            should_loop,
            muted,
            rate,
            seek,
            skip,
        } => {
            let skip = skip.map(|by| by.unwrap_or(config.playback.default_skip_secs));
            commands::play::run(&config, path, should_loop, muted, rate, seek, skip).await
        }
        Commands::Export {
            path,
            range,
            overlay,
            output_dir,
        } => commands::export::run(config, path, range, overlay, output_dir).await,
        Commands::Clips {
            path,
            clip_length,
            range,
            overlay,
            output_dir,
        } => commands::clips::run(config, path, clip_length, range, overlay, output_dir).await,
        Commands::Check { write_config } => commands::check::run(&config, write_config),
    }
}
