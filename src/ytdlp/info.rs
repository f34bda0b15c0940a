use serde::Deserialize;

use crate::platforms::{MediaKind, PlatformName, Track};
use crate::SourceError;

/// Media description printed by `yt-dlp --dump-single-json`.
///
/// yt-dlp emits `null` for most fields it could not determine, so everything
/// is optional. When `entries` is non-empty the scalar fields describe the
/// playlist itself and are not playable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Seconds, possibly fractional
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_live: Option<bool>,
    #[serde(default, deserialize_with = "entries")]
    pub entries: Vec<ExtractionInfo>,
}

/// Playlist entries may be `null` when an item is unavailable; those are dropped
fn entries<'de, D>(deserializer: D) -> Result<Vec<ExtractionInfo>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<Vec<Option<ExtractionInfo>>> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default().into_iter().flatten().collect())
}

impl ExtractionInfo {
    pub fn is_live(&self) -> bool {
        self.is_live.unwrap_or(false)
    }

    /// URL the user should see: the URL they actually shared when known
    pub fn track_url(&self) -> String {
        non_empty(&self.original_url)
            .or_else(|| non_empty(&self.webpage_url))
            .unwrap_or_default()
            .to_string()
    }

    /// Whole seconds, truncated toward zero
    pub fn whole_seconds(&self) -> u64 {
        match self.duration {
            Some(seconds) if seconds.is_finite() && seconds > 0.0 => seconds.trunc() as u64,
            _ => 0,
        }
    }

    pub fn to_track(&self, kind: MediaKind) -> Track {
        Track {
            id: self.id.clone().unwrap_or_default(),
            title: self.title.clone().unwrap_or_default(),
            duration: self.whole_seconds(),
            artwork: self.thumbnail.clone().unwrap_or_default(),
            url: self.track_url(),
            source: PlatformName::YtDlp,
            video: kind.is_video(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

/// Map an extraction result to tracks.
///
/// A single live item is an error. Live entries of a playlist are skipped, so a
/// playlist of only live entries yields an empty list.
pub fn normalize(info: &ExtractionInfo, kind: MediaKind) -> Result<Vec<Track>, SourceError> {
    if info.entries.is_empty() {
        if info.is_live() {
            return Err(SourceError::UnsupportedContent);
        }
        return Ok(vec![info.to_track(kind)]);
    }

    let tracks: Vec<Track> = info
        .entries
        .iter()
        .filter(|entry| {
            if entry.is_live() {
                tracing::debug!(id = ?entry.id, "skipping live playlist entry");
                return false;
            }
            true
        })
        .map(|entry| entry.to_track(kind))
        .collect();

    Ok(tracks)
}
