//! ytdlp-source - a yt-dlp backed media source
//!
//! This library extracts track metadata for arbitrary URLs and downloads the media behind
//! them by delegating to the external `yt-dlp` command. Every invocation is retried across
//! a fixed priority list of JavaScript runtimes, outcomes are validated on disk, and
//! failures are reduced to short user-safe errors while the full detail goes to the logs.

pub mod cli;
pub mod config;
pub mod cookies;
pub mod output;
pub mod platforms;
pub mod storage;
pub mod utils;
pub mod ytdlp;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use platforms::{MediaKind, Platform, PlatformName, PlatformRegistry, Track};
pub use ytdlp::{ExtractorSettings, YtdlpPlatform};

/// Result type used by the configuration and CLI plumbing
pub type Result<T> = anyhow::Result<T>;

/// Errors returned to callers of a platform.
///
/// The messages are meant to be shown to end users as-is, so none of them carry
/// process output, file paths or URLs. The technical detail is logged where the
/// failure happens.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("this link is not supported")]
    InputRejected,

    #[error("live streams are not supported")]
    UnsupportedContent,

    #[error("failed to get information about this media, try again later")]
    ExtractionFailed,

    #[error("failed to download this media, try again later or use another source")]
    DownloadFailed,

    #[error("the request was cancelled")]
    Cancelled,
}
