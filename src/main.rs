use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ytdlp_source::cli::{Cli, Commands};
use ytdlp_source::config::Config;
use ytdlp_source::cookies::{CookiePool, CookieSource, NoCookies};
use ytdlp_source::platforms::{Platform, PlatformRegistry};
use ytdlp_source::storage::MediaStore;
use ytdlp_source::utils::{self, format_file_size};
use ytdlp_source::ytdlp::runner::TokioProcessRunner;
use ytdlp_source::ytdlp::{classifier, ExtractorSettings, YtdlpPlatform};
use ytdlp_source::output;

/// Registry priority of the generic yt-dlp platform
const YTDLP_PRIORITY: u8 = 60;

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose { "ytdlp_source=debug" } else { "ytdlp_source=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

/// Cancel the token on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            token.cancel();
        }
    });
    cancel
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config = Config::load(cli.config.as_deref()).await?;
    let settings = Arc::new(
        ExtractorSettings::from_config(&config.extractor).context("Invalid restricted URL patterns")?,
    );

    let cookies: Arc<dyn CookieSource> = match &config.storage.cookies_dir {
        Some(dir) => Arc::new(CookiePool::new(dir)),
        None => Arc::new(NoCookies),
    };
    let ytdlp = Arc::new(YtdlpPlatform::new(
        Arc::clone(&settings),
        Arc::new(TokioProcessRunner),
        cookies,
        MediaStore::new(config.download_dir()).with_audio_format(&config.extractor.audio_format),
    ));

    let mut registry = PlatformRegistry::new();
    registry.register(YTDLP_PRIORITY, ytdlp.clone());

    match cli.command {
        Commands::Check { query } => {
            let supported = classifier::can_handle(&query);
            println!("supported: {}", if supported { "yes" } else { "no" });
            if supported {
                let restricted = ytdlp.is_restricted(query.trim());
                println!("restricted: {}", if restricted { "yes" } else { "no" });
            }
        }
        Commands::Tracks { url, video, format } => {
            let cancel = cancel_on_ctrl_c();
            let tracks = registry.get_tracks(&url, video, &cancel).await?;
            output::print_to_console(&tracks, &format)?;
        }
        Commands::Download { url, video } => {
            warn_missing_dependencies(&settings).await;

            let cancel = cancel_on_ctrl_c();
            let tracks = registry.get_tracks(&url, video, &cancel).await?;
            if tracks.is_empty() {
                println!("No playable tracks found.");
            }

            for track in &tracks {
                let path = registry.download(track, &cancel, None).await?;
                let size = fs_err::metadata(&path).map(|m| m.len()).unwrap_or(0);
                println!("{} ({}) -> {}", track.title, format_file_size(size), path.display());
            }
        }
        Commands::Runtimes => {
            println!("JS runtimes in priority order:");
            for (index, runtime) in settings.runtimes.iter().enumerate() {
                let available = utils::check_command_available(runtime).await;
                println!(
                    "  {}. {} ({})",
                    index + 1,
                    runtime,
                    if available { "available" } else { "not found" }
                );
            }
            for (priority, name) in registry.list_platforms() {
                tracing::debug!(priority, platform = %name, "registered platform");
            }
            tracing::debug!(search = ytdlp.can_search(), "yt-dlp platform capabilities");
        }
        Commands::Config => {
            config.display();
        }
    }

    Ok(())
}

/// Check for required external dependencies (non-fatal)
async fn warn_missing_dependencies(settings: &ExtractorSettings) {
    let missing = utils::check_dependencies(&settings.binary, &settings.runtimes).await;
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}
