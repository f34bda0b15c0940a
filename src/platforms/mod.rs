use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::SourceError;

/// Tag identifying which platform produced a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformName {
    YtDlp,
    YouTube,
}

impl PlatformName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformName::YtDlp => "YtDlp",
            PlatformName::YouTube => "YouTube",
        }
    }
}

impl fmt::Display for PlatformName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a track is fetched as audio only or as video with audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn from_video_flag(video: bool) -> Self {
        if video {
            MediaKind::Video
        } else {
            MediaKind::Audio
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::Video)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// A playable media item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Identifier assigned by the hosting site
    pub id: String,

    pub title: String,

    /// Duration in whole seconds
    pub duration: u64,

    /// Thumbnail URL, empty when unknown
    pub artwork: String,

    /// URL the media is downloaded from
    pub url: String,

    /// Platform that produced this track
    pub source: PlatformName,

    /// True when the video stream is wanted
    pub video: bool,
}

impl Track {
    pub fn media_kind(&self) -> MediaKind {
        MediaKind::from_video_flag(self.video)
    }
}

/// Outbound status channel handed to downloads.
///
/// Platforms receive it opaquely and may ignore it.
pub trait Notifier: Send + Sync {
    fn status(&self, text: &str);
}

/// A source of tracks that can be registered in a [`PlatformRegistry`]
#[async_trait]
pub trait Platform: Send + Sync {
    fn name(&self) -> PlatformName;

    /// Check if this platform can resolve the given query into tracks
    fn can_get_tracks(&self, query: &str) -> bool;

    /// Resolve a query into tracks
    async fn get_tracks(
        &self,
        query: &str,
        video: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Track>, SourceError>;

    /// Check if this platform can download tracks produced by `source`
    fn can_download(&self, source: PlatformName) -> bool;

    /// Download a track and return the local path of the media file
    async fn download(
        &self,
        track: &Track,
        cancel: &CancellationToken,
        notifier: Option<&dyn Notifier>,
    ) -> Result<PathBuf, SourceError>;

    fn can_search(&self) -> bool;

    async fn search(&self, query: &str, video: bool) -> Result<Vec<Track>, SourceError>;
}

struct Registered {
    priority: u8,
    platform: Arc<dyn Platform>,
}

/// Ordered set of platforms, populated explicitly by the application at startup
#[derive(Default)]
pub struct PlatformRegistry {
    platforms: Vec<Registered>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a platform. Higher priorities are consulted first; equal
    /// priorities keep registration order.
    pub fn register(&mut self, priority: u8, platform: Arc<dyn Platform>) {
        let index = self
            .platforms
            .iter()
            .position(|registered| registered.priority < priority)
            .unwrap_or(self.platforms.len());
        self.platforms.insert(index, Registered { priority, platform });
    }

    /// Find the first platform that can resolve the query
    pub fn find_for_query(&self, query: &str) -> Option<Arc<dyn Platform>> {
        self.platforms
            .iter()
            .find(|registered| registered.platform.can_get_tracks(query))
            .map(|registered| Arc::clone(&registered.platform))
    }

    /// Find the first platform able to download tracks from `source`
    pub fn find_for_download(&self, source: PlatformName) -> Option<Arc<dyn Platform>> {
        self.platforms
            .iter()
            .find(|registered| registered.platform.can_download(source))
            .map(|registered| Arc::clone(&registered.platform))
    }

    /// List registered platforms in lookup order
    pub fn list_platforms(&self) -> Vec<(u8, PlatformName)> {
        self.platforms
            .iter()
            .map(|registered| (registered.priority, registered.platform.name()))
            .collect()
    }

    /// Resolve a query with the first matching platform
    pub async fn get_tracks(
        &self,
        query: &str,
        video: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Track>, SourceError> {
        let platform = self
            .find_for_query(query)
            .ok_or(SourceError::InputRejected)?;

        tracing::debug!(platform = %platform.name(), query, "resolving query");
        platform.get_tracks(query, video, cancel).await
    }

    /// Download a track with the first platform accepting its source
    pub async fn download(
        &self,
        track: &Track,
        cancel: &CancellationToken,
        notifier: Option<&dyn Notifier>,
    ) -> Result<PathBuf, SourceError> {
        let platform = self
            .find_for_download(track.source)
            .ok_or(SourceError::DownloadFailed)?;

        platform.download(track, cancel, notifier).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        name: PlatformName,
        accepts: &'static str,
    }

    #[async_trait]
    impl Platform for Fixed {
        fn name(&self) -> PlatformName {
            self.name
        }

        fn can_get_tracks(&self, query: &str) -> bool {
            query.contains(self.accepts)
        }

        async fn get_tracks(
            &self,
            query: &str,
            video: bool,
            _cancel: &CancellationToken,
        ) -> Result<Vec<Track>, SourceError> {
            Ok(vec![Track {
                id: "1".to_string(),
                title: query.to_string(),
                duration: 1,
                artwork: String::new(),
                url: query.to_string(),
                source: self.name,
                video,
            }])
        }

        fn can_download(&self, source: PlatformName) -> bool {
            source == self.name
        }

        async fn download(
            &self,
            _track: &Track,
            _cancel: &CancellationToken,
            _notifier: Option<&dyn Notifier>,
        ) -> Result<PathBuf, SourceError> {
            Ok(PathBuf::from(self.name.as_str()))
        }

        fn can_search(&self) -> bool {
            false
        }

        async fn search(&self, _query: &str, _video: bool) -> Result<Vec<Track>, SourceError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_register_orders_by_priority() {
        let mut registry = PlatformRegistry::new();
        registry.register(10, Arc::new(Fixed { name: PlatformName::YtDlp, accepts: "http" }));
        registry.register(90, Arc::new(Fixed { name: PlatformName::YouTube, accepts: "youtube" }));

        assert_eq!(
            registry.list_platforms(),
            vec![(90, PlatformName::YouTube), (10, PlatformName::YtDlp)]
        );

        let found = registry.find_for_query("https://youtube.com/watch?v=1").unwrap();
        assert_eq!(found.name(), PlatformName::YouTube);

        let found = registry.find_for_query("https://example.com/a.mp3").unwrap();
        assert_eq!(found.name(), PlatformName::YtDlp);
    }

    #[test]
    fn test_equal_priority_keeps_registration_order() {
        let mut registry = PlatformRegistry::new();
        registry.register(50, Arc::new(Fixed { name: PlatformName::YtDlp, accepts: "http" }));
        registry.register(50, Arc::new(Fixed { name: PlatformName::YouTube, accepts: "http" }));

        let found = registry.find_for_query("https://example.com").unwrap();
        assert_eq!(found.name(), PlatformName::YtDlp);
    }

    #[test]
    fn test_unmatched_query_is_rejected() {
        let registry = PlatformRegistry::new();
        let cancel = CancellationToken::new();

        let result = tokio_test::block_on(registry.get_tracks("nothing", false, &cancel));
        assert_eq!(result, Err(SourceError::InputRejected));
    }

    #[test]
    fn test_download_routes_by_source() {
        let mut registry = PlatformRegistry::new();
        registry.register(60, Arc::new(Fixed { name: PlatformName::YtDlp, accepts: "http" }));
        let cancel = CancellationToken::new();

        let track = tokio_test::block_on(registry.get_tracks("https://a.b/c", true, &cancel))
            .unwrap()
            .remove(0);
        assert!(track.video);

        let path = tokio_test::block_on(registry.download(&track, &cancel, None)).unwrap();
        assert_eq!(path, PathBuf::from("YtDlp"));
    }
}
