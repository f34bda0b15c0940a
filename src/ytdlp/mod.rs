//! yt-dlp backed platform.
//!
//! Every extractor run goes through [`runner::FallbackExecutor`], which retries
//! across the configured JS runtimes. Callers only ever see a [`SourceError`];
//! what actually went wrong is logged here.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub mod args;
pub mod classifier;
pub mod info;
pub mod runner;
pub mod validate;

use crate::config::ExtractorConfig;
use crate::cookies::CookieSource;
use crate::platforms::{MediaKind, Notifier, Platform, PlatformName, Track};
use crate::storage::MediaStore;
use crate::utils::truncate_for_log;
use crate::SourceError;
use args::{build_args, ArgProfile, ArgRequest, ExtractorArgs, Mode};
use classifier::UrlClassifier;
use info::{normalize, ExtractionInfo};
use runner::{AttemptRecord, FallbackError, FallbackExecutor, ProcessRunner};
use validate::{validate_download, validate_probe, FailureHint};

/// Immutable extractor settings, built once at startup and shared
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub binary: String,
    /// JS runtimes in priority order
    pub runtimes: Arc<[String]>,
    pub classifier: UrlClassifier,
    pub profile: ArgProfile,
    pub probe_timeout: Duration,
    pub download_timeout: Duration,
}

impl ExtractorSettings {
    pub fn from_config(config: &ExtractorConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            binary: config.binary.clone(),
            runtimes: config.js_runtimes.iter().cloned().collect(),
            classifier: UrlClassifier::new(&config.restricted_patterns)?,
            profile: ArgProfile {
                retries: config.retries,
                max_video_height: config.max_video_height,
                audio_format: config.audio_format.clone(),
                restricted_client_args: config.restricted_client_args.clone(),
            },
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
        })
    }
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        let config = ExtractorConfig::default();
        Self {
            binary: config.binary,
            runtimes: config.js_runtimes.into_iter().collect(),
            classifier: UrlClassifier::default(),
            profile: ArgProfile::default(),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
        }
    }
}

/// Platform that resolves and downloads any URL yt-dlp understands
pub struct YtdlpPlatform {
    settings: Arc<ExtractorSettings>,
    executor: FallbackExecutor,
    cookies: Arc<dyn CookieSource>,
    store: MediaStore,
}

impl YtdlpPlatform {
    pub fn new(
        settings: Arc<ExtractorSettings>,
        runner: Arc<dyn ProcessRunner>,
        cookies: Arc<dyn CookieSource>,
        store: MediaStore,
    ) -> Self {
        let executor = FallbackExecutor::new(settings.binary.clone(), Arc::clone(&settings.runtimes), runner);
        Self {
            settings,
            executor,
            cookies,
            store,
        }
    }

    /// Check if the URL belongs to the restricted family
    pub fn is_restricted(&self, url: &str) -> bool {
        self.settings.classifier.is_restricted(url)
    }

    /// Arguments for one attempt. Restricted URLs draw a fresh cookie file each time.
    fn attempt_args(&self, mode: Mode<'_>, kind: MediaKind, url: &str) -> ExtractorArgs {
        let restricted = self.is_restricted(url);
        let cookies = if restricted {
            self.cookies.random_cookie_file()
        } else {
            None
        };

        if let Some(file) = &cookies {
            tracing::debug!(cookies = ?file.file_name(), "using cookie file");
        }

        build_args(
            &self.settings.profile,
            &ArgRequest {
                mode,
                kind,
                restricted,
                cookies: cookies.as_deref(),
                url,
            },
        )
    }

    /// Probe a URL for its media description
    pub async fn extract_metadata(
        &self,
        url: &str,
        kind: MediaKind,
        cancel: &CancellationToken,
    ) -> Result<ExtractionInfo, SourceError> {
        let result = self
            .executor
            .execute(
                self.settings.probe_timeout,
                cancel,
                || self.attempt_args(Mode::Probe, kind, url),
                |_, output| validate_probe(output),
            )
            .await;

        match result {
            Ok(info) => {
                tracing::debug!(
                    url,
                    id = ?info.id,
                    uploader = ?info.uploader,
                    description = %truncate_for_log(info.description.as_deref().unwrap_or_default(), 200),
                    entries = info.entries.len(),
                    "metadata extracted"
                );
                Ok(info)
            }
            Err(FallbackError::Cancelled { runtime }) => {
                tracing::info!(url, runtime = %runtime, "metadata extraction cancelled");
                Err(SourceError::Cancelled)
            }
            Err(FallbackError::Exhausted { attempts }) => {
                log_exhausted("metadata extraction", url, None, &attempts);
                Err(SourceError::ExtractionFailed)
            }
        }
    }
}

/// Log the aggregate failure; each attempt was already logged with its hint
fn log_exhausted(operation: &str, url: &str, title: Option<&str>, attempts: &[AttemptRecord]) {
    let last = attempts.last();
    let hint = last.map(|a| a.failure.hint()).unwrap_or(FailureHint::Unknown);

    tracing::error!(
        url,
        title = title.unwrap_or_default(),
        attempts = attempts.len(),
        ?hint,
        error = %last.map(|a| a.failure.to_string()).unwrap_or_default(),
        stderr = %truncate_for_log(last.and_then(|a| a.failure.stderr()).unwrap_or_default(), 2000),
        "yt-dlp {} failed with every runtime",
        operation
    );
}

#[async_trait]
impl Platform for YtdlpPlatform {
    fn name(&self) -> PlatformName {
        PlatformName::YtDlp
    }

    fn can_get_tracks(&self, query: &str) -> bool {
        classifier::can_handle(query)
    }

    async fn get_tracks(
        &self,
        query: &str,
        video: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Track>, SourceError> {
        let query = query.trim();
        if !self.can_get_tracks(query) {
            return Err(SourceError::InputRejected);
        }

        tracing::info!(url = query, "YtDlp: extracting metadata");
        let kind = MediaKind::from_video_flag(video);
        let info = self.extract_metadata(query, kind, cancel).await?;

        let tracks = normalize(&info, kind).inspect_err(|_| {
            tracing::info!(url = query, "YtDlp: refusing live stream");
        })?;
        tracing::info!(url = query, tracks = tracks.len(), "YtDlp: metadata ready");
        Ok(tracks)
    }

    fn can_download(&self, source: PlatformName) -> bool {
        matches!(source, PlatformName::YtDlp | PlatformName::YouTube)
    }

    async fn download(
        &self,
        track: &Track,
        cancel: &CancellationToken,
        _notifier: Option<&dyn Notifier>,
    ) -> Result<PathBuf, SourceError> {
        if let Some(path) = self.store.find_file(track) {
            tracing::info!(track = %track.id, path = %path.display(), "YtDlp: using cached file");
            return Ok(path);
        }

        if !classifier::can_handle(&track.url) {
            tracing::error!(track = %track.id, url = %track.url, "YtDlp: track has no usable URL");
            return Err(SourceError::InputRejected);
        }

        if let Err(e) = self.store.ensure_dir() {
            tracing::error!(error = %e, dir = %self.store.download_dir().display(), "YtDlp: cannot create download dir");
            return Err(SourceError::DownloadFailed);
        }

        let template = self.store.output_template(track);
        let kind = track.media_kind();

        let result = self
            .executor
            .execute(
                self.settings.download_timeout,
                cancel,
                || {
                    self.attempt_args(
                        Mode::Download {
                            output_template: &template,
                        },
                        kind,
                        &track.url,
                    )
                },
                |_, output| validate_download(output),
            )
            .await;

        match result {
            Ok(path) => {
                tracing::info!(url = %track.url, path = %path.display(), "YtDlp: downloaded");
                Ok(path)
            }
            Err(FallbackError::Cancelled { runtime }) => {
                tracing::info!(url = %track.url, runtime = %runtime, "YtDlp: download cancelled");
                self.store.find_and_remove(track);
                Err(SourceError::Cancelled)
            }
            Err(FallbackError::Exhausted { attempts }) => {
                log_exhausted("download", &track.url, Some(&track.title), &attempts);
                self.store.find_and_remove(track);
                Err(SourceError::DownloadFailed)
            }
        }
    }

    fn can_search(&self) -> bool {
        false
    }

    async fn search(&self, _query: &str, _video: bool) -> Result<Vec<Track>, SourceError> {
        Ok(Vec::new())
    }
}
