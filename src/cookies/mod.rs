use rand::seq::SliceRandom;
use std::path::PathBuf;

/// Supplier of cookie files for sites that need an authenticated session.
///
/// Implementations return a path to a Netscape-format cookie file, or `None`
/// when nothing is available. The caller only borrows the file for the length
/// of one extractor run.
pub trait CookieSource: Send + Sync {
    fn random_cookie_file(&self) -> Option<PathBuf>;
}

/// Directory of `*.txt` cookie files, one of which is picked at random per call
#[derive(Debug, Clone)]
pub struct CookiePool {
    dir: PathBuf,
}

impl CookiePool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Non-empty cookie files currently in the pool
    pub fn files(&self) -> Vec<PathBuf> {
        let entries = match fs_err::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(error = %e, "cookie pool unavailable");
                return Vec::new();
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("txt")))
            .filter(|path| fs_err::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false))
            .collect();
        files.sort();
        files
    }
}

impl CookieSource for CookiePool {
    fn random_cookie_file(&self) -> Option<PathBuf> {
        let files = self.files();
        files.choose(&mut rand::thread_rng()).cloned()
    }
}

/// Cookie source that never has anything to offer
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCookies;

impl CookieSource for NoCookies {
    fn random_cookie_file(&self) -> Option<PathBuf> {
        None
    }
}
