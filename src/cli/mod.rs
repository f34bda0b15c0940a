use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ytdlp-source",
    about = "Resolve and download media from any URL yt-dlp supports",
    version,
    long_about = "Extracts track metadata and downloads audio or video through yt-dlp. Each extractor run is retried across a list of JavaScript runtimes so that site challenges keep working when one runtime is missing or broken."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./config.yaml or the user config dir)
    #[arg(short, long, global = true, value_name = "FILE", env = "YTDLP_SOURCE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check whether a query is a URL this tool can handle
    Check {
        #[arg(value_name = "QUERY")]
        query: String,
    },

    /// Extract tracks from a URL
    Tracks {
        #[arg(value_name = "URL")]
        url: String,

        /// Fetch video instead of audio only
        #[arg(long)]
        video: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Extract tracks from a URL and download each of them
    Download {
        #[arg(value_name = "URL")]
        url: String,

        /// Download video instead of audio only
        #[arg(long)]
        video: bool,
    },

    /// List configured JS runtimes in priority order
    Runtimes,

    /// Show the effective configuration
    Config,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON array of tracks
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
