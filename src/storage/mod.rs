use std::path::{Path, PathBuf};

use crate::platforms::Track;
use crate::utils::sanitize_filename;

/// Where downloaded media lives on disk.
///
/// Every track maps to one file stem inside the download directory; the
/// extension is decided by the extractor.
#[derive(Debug, Clone)]
pub struct MediaStore {
    download_dir: PathBuf,
    /// Extension audio downloads end up with after conversion
    audio_format: String,
}

impl MediaStore {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            audio_format: "mp3".to_string(),
        }
    }

    pub fn with_audio_format(mut self, audio_format: impl Into<String>) -> Self {
        self.audio_format = audio_format.into();
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Create the download directory if needed
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        fs_err::create_dir_all(&self.download_dir)
    }

    /// File stem for a track: its id (or URL when it has none), plus a marker for video
    pub fn file_stem(&self, track: &Track) -> String {
        let base = if track.id.trim().is_empty() {
            sanitize_filename(&track.url).replace(' ', "_")
        } else {
            sanitize_filename(&track.id).replace(' ', "_")
        };

        if track.video {
            format!("{}_video", base)
        } else {
            base
        }
    }

    /// Output template handed to the extractor
    pub fn output_template(&self, track: &Track) -> String {
        self.download_dir
            .join(format!("{}.%(ext)s", self.file_stem(track)))
            .to_string_lossy()
            .into_owned()
    }

    /// Existing non-empty artifact for the track, if one was downloaded before.
    ///
    /// Only a finished file counts: `<stem>.<ext>` with no intermediate format
    /// id, and for audio only the converted extension. Whatever an interrupted
    /// run left behind (`<stem>.webm` before conversion, `<stem>.f137.mp4`
    /// before merging) is ignored.
    pub fn find_file(&self, track: &Track) -> Option<PathBuf> {
        let stem = self.file_stem(track);

        self.matching_files(track).into_iter().find(|path| {
            self.is_finished(track, &stem, path)
                && fs_err::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
        })
    }

    fn is_finished(&self, track: &Track, stem: &str, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|name| name.to_string_lossy()) else {
            return false;
        };
        let Some(ext) = name.strip_prefix(stem).and_then(|rest| rest.strip_prefix('.')) else {
            return false;
        };

        if ext.is_empty() || ext.contains('.') || is_partial(ext) {
            return false;
        }

        track.video || ext.eq_ignore_ascii_case(&self.audio_format)
    }

    /// Remove every file belonging to the track, including partial ones.
    /// Returns how many files were removed.
    pub fn find_and_remove(&self, track: &Track) -> usize {
        let mut removed = 0;

        for path in self.matching_files(track) {
            match fs_err::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(error = %e, "failed to remove stale artifact"),
            }
        }

        if removed > 0 {
            tracing::debug!(track = %track.id, removed, "removed stale artifacts");
        }
        removed
    }

    fn matching_files(&self, track: &Track) -> Vec<PathBuf> {
        let stem = self.file_stem(track);
        let entries = match fs_err::read_dir(&self.download_dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy())
                    .is_some_and(|name| name.strip_prefix(stem.as_str()).is_some_and(|rest| rest.starts_with('.')))
            })
            .collect();
        files.sort();
        files
    }
}

fn is_partial(ext: &str) -> bool {
    matches!(ext, "part" | "ytdl" | "temp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::PlatformName;

    fn track(id: &str, video: bool) -> Track {
        Track {
            id: id.to_string(),
            title: "Song".to_string(),
            duration: 10,
            artwork: String::new(),
            url: format!("https://youtu.be/{}", id),
            source: PlatformName::YtDlp,
            video,
        }
    }

    #[test]
    fn test_output_template() {
        let store = MediaStore::new("/data/downloads");

        assert_eq!(store.output_template(&track("abc123", false)), "/data/downloads/abc123.%(ext)s");
        assert_eq!(store.output_template(&track("abc123", true)), "/data/downloads/abc123_video.%(ext)s");
    }

    #[test]
    fn test_stem_is_sanitized() {
        let store = MediaStore::new("/data");
        assert_eq!(store.file_stem(&track("../evil/id", false)), ".._evil_id");
    }

    #[test]
    fn test_find_file_skips_empty_and_partial() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());
        let audio = track("abc", false);

        std::fs::write(dir.path().join("abc.webm.part"), b"partial").unwrap();
        assert_eq!(store.find_file(&audio), None);

        std::fs::write(dir.path().join("abc.mp3"), b"").unwrap();
        assert_eq!(store.find_file(&audio), None);

        std::fs::write(dir.path().join("abc.mp3"), b"ID3").unwrap();
        assert_eq!(store.find_file(&audio), Some(dir.path().join("abc.mp3")));

        // The video variant and other ids are separate files.
        assert_eq!(store.find_file(&track("abc", true)), None);
        assert_eq!(store.find_file(&track("ab", false)), None);
    }

    #[test]
    fn test_find_file_ignores_unconverted_audio() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());
        let audio = track("abc", false);

        // Interrupted before the mp3 conversion ran
        std::fs::write(dir.path().join("abc.webm"), b"opus data").unwrap();
        assert_eq!(store.find_file(&audio), None);

        std::fs::write(dir.path().join("abc.mp3"), b"ID3").unwrap();
        assert_eq!(store.find_file(&audio), Some(dir.path().join("abc.mp3")));
    }

    #[test]
    fn test_find_file_uses_configured_audio_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path()).with_audio_format("opus");
        let audio = track("abc", false);

        std::fs::write(dir.path().join("abc.mp3"), b"ID3").unwrap();
        assert_eq!(store.find_file(&audio), None);

        std::fs::write(dir.path().join("abc.OPUS"), b"OggS").unwrap();
        assert_eq!(store.find_file(&audio), Some(dir.path().join("abc.OPUS")));
    }

    #[test]
    fn test_find_file_ignores_unmerged_video_formats() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());
        let video = track("abc", true);

        std::fs::write(dir.path().join("abc_video.f137.mp4"), b"video only").unwrap();
        std::fs::write(dir.path().join("abc_video.f251.webm"), b"audio only").unwrap();
        std::fs::write(dir.path().join("abc_video.temp.mp4"), b"merging").unwrap();
        assert_eq!(store.find_file(&video), None);

        std::fs::write(dir.path().join("abc_video.mkv"), b"merged").unwrap();
        assert_eq!(store.find_file(&video), Some(dir.path().join("abc_video.mkv")));
    }

    #[test]
    fn test_find_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());
        let audio = track("abc", false);

        std::fs::write(dir.path().join("abc.mp3"), b"").unwrap();
        std::fs::write(dir.path().join("abc.webm.part"), b"x").unwrap();
        std::fs::write(dir.path().join("abcd.mp3"), b"x").unwrap();

        assert_eq!(store.find_and_remove(&audio), 2);
        assert!(dir.path().join("abcd.mp3").exists());
        assert_eq!(store.find_and_remove(&audio), 0);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let store = MediaStore::new("/nonexistent/downloads/dir");
        assert_eq!(store.find_file(&track("abc", false)), None);
        assert_eq!(store.find_and_remove(&track("abc", false)), 0);
    }
}
