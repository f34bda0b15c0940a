use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ytdlp::classifier::{UrlClassifier, DEFAULT_RESTRICTED_PATTERNS};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// External extractor settings
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Download and cookie locations
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// yt-dlp executable name or path
    pub binary: String,

    /// JS runtimes to try, in priority order
    pub js_runtimes: Vec<String>,

    /// Hostname regexes of sites that get cookies and client impersonation
    pub restricted_patterns: Vec<String>,

    /// `--extractor-args` value for restricted sites
    pub restricted_client_args: String,

    /// yt-dlp internal retry count
    pub retries: u32,

    /// Per-attempt limit for metadata probes. A playlist probe resolves every
    /// entry in one run, so this has to cover the largest playlist you accept;
    /// a probe that times out on every runtime fails the request.
    pub probe_timeout_secs: u64,

    /// Per-attempt limit for downloads
    pub download_timeout_secs: u64,

    /// Highest video resolution to download
    pub max_video_height: u32,

    /// Codec audio downloads are converted to
    pub audio_format: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for downloaded media (defaults to the user cache dir)
    pub download_dir: Option<PathBuf>,

    /// Directory holding cookie files for restricted sites
    pub cookies_dir: Option<PathBuf>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            js_runtimes: vec!["deno".to_string(), "node".to_string(), "bun".to_string()],
            restricted_patterns: DEFAULT_RESTRICTED_PATTERNS.iter().map(|p| p.to_string()).collect(),
            restricted_client_args: "youtube:player_client=web,web_safari".to_string(),
            retries: 3,
            probe_timeout_secs: 180,
            download_timeout_secs: 600,
            max_video_height: 1080,
            audio_format: "mp3".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, or from the default location
    /// (created with defaults when missing)
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save(&config_path).await?;
            Ok(config)
        }
    }

    /// Read and validate a configuration file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("ytdlp-source").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let extractor = &self.extractor;

        if extractor.binary.trim().is_empty() {
            anyhow::bail!("extractor.binary must not be empty");
        }

        if extractor.js_runtimes.is_empty() || extractor.js_runtimes.iter().any(|r| r.trim().is_empty()) {
            anyhow::bail!("extractor.js_runtimes must list at least one runtime");
        }

        if extractor.probe_timeout_secs == 0 || extractor.download_timeout_secs == 0 {
            anyhow::bail!("extractor timeouts must be greater than zero");
        }

        if extractor.max_video_height == 0 {
            anyhow::bail!("extractor.max_video_height must be greater than zero");
        }

        UrlClassifier::new(&extractor.restricted_patterns).context("Invalid extractor.restricted_patterns")?;

        Ok(())
    }

    /// Directory for downloads
    pub fn download_dir(&self) -> PathBuf {
        self.storage.download_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("ytdlp-source")
                .join("downloads")
        })
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Extractor: {}", self.extractor.binary);
        println!("  JS runtimes: {}", self.extractor.js_runtimes.join(" > "));
        println!("  Restricted patterns: {}", self.extractor.restricted_patterns.join(", "));
        println!("  Retries: {}", self.extractor.retries);
        println!(
            "  Timeouts: probe {}s, download {}s",
            self.extractor.probe_timeout_secs, self.extractor.download_timeout_secs
        );
        println!("  Max video height: {}", self.extractor.max_video_height);
        println!("  Audio format: {}", self.extractor.audio_format);
        println!("  Download dir: {}", self.download_dir().display());
        match &self.storage.cookies_dir {
            Some(dir) => println!("  Cookies dir: {}", dir.display()),
            None => println!("  Cookies dir: (none)"),
        }
    }
}
