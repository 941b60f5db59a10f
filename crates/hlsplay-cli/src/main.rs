//! hlsplay CLI - Headless HLS session driver
//!
//! Features:
//! - Playlist probing (live/VOD, duration, variants)
//! - Simulated playback with progress, seeks and remote commands
//! - Now-playing snapshot inspection
//! - Clock-style time formatting

use clap::{Parser, Subcommand};
use hlsplay_core::TimeDisplay;
use std::path::PathBuf;

mod commands;
mod output;
mod probe;

use output::OutputFormat;

/// hlsplay CLI - HLS playback session toolkit
#[derive(Parser)]
#[command(name = "hlsplay")]
#[command(version)]
#[command(about = "Drive and inspect HLS playback sessions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a stream against the simulated engine
    Play {
        /// URL of the HLS playlist
        url: String,

        /// Title shown in now-playing info
        #[arg(short, long, default_value = "")]
        title: String,

        /// Artwork image file
        #[arg(long)]
        artwork: Option<PathBuf>,

        /// Wait for readiness before starting playback
        #[arg(long)]
        no_auto_play: bool,

        /// Simulated duration in seconds
        #[arg(short, long, default_value = "60")]
        duration: f64,

        /// Simulate a live stream
        #[arg(long)]
        live: bool,

        /// Probe the playlist to decide duration and live-ness
        #[arg(long)]
        probe: bool,

        /// Seek to this position halfway through the run
        #[arg(long)]
        seek: Option<f64>,

        /// Send a remote change-position command halfway through the run
        #[arg(long)]
        remote_seek: Option<f64>,

        /// Enter the background halfway through the run
        #[arg(long)]
        background: bool,

        /// Seconds to play before stopping
        #[arg(short, long, default_value = "5")]
        run_for: u64,

        /// Session config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Publish rate and elapsed time in now-playing info
        #[arg(long)]
        timing: bool,

        /// Mirror now-playing info to the OS media controls
        #[arg(long)]
        os_controls: bool,
    },

    /// Probe a playlist
    Probe {
        /// URL of the HLS playlist
        url: String,
    },

    /// Format seconds as a clock string
    Format {
        /// Seconds to format
        seconds: f64,

        /// Granularity (hour, minutes, seconds)
        #[arg(short, long, default_value = "hour")]
        display: TimeDisplay,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();
    hlsplay_core::init();

    let format = OutputFormat::from(cli.format.as_str());

    match cli.command {
        Commands::Play {
            url,
            title,
            artwork,
            no_auto_play,
            duration,
            live,
            probe,
            seek,
            remote_seek,
            background,
            run_for,
            config,
            timing,
            os_controls,
        } => {
            let opts = commands::PlayOptions {
                url,
                title,
                artwork,
                auto_play: !no_auto_play,
                duration,
                live,
                probe,
                seek,
                remote_seek,
                background,
                run_for,
                config,
                timing,
                os_controls,
            };
            commands::play(opts, format).await?;
        }
        Commands::Probe { url } => {
            commands::probe(&url, format).await?;
        }
        Commands::Format { seconds, display } => {
            commands::format_time(seconds, display)?;
        }
    }

    Ok(())
}
