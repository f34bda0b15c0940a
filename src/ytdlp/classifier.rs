use regex::Regex;
use url::Url;

/// Hostname patterns of the restricted family when nothing else is configured
pub const DEFAULT_RESTRICTED_PATTERNS: &[&str] = &[r"(?i)(youtube\.com|youtu\.be|music\.youtube\.com)"];

/// Check if a query is an absolute URL with both a scheme and a host
pub fn can_handle(query: &str) -> bool {
    match Url::parse(query.trim()) {
        Ok(parsed) => !parsed.scheme().is_empty() && parsed.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

/// Classifies URLs into the restricted family (needs cookies and client
/// impersonation) or the generic family.
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    patterns: Vec<Regex>,
}

impl UrlClassifier {
    /// Compile the given patterns. Matching is always case-insensitive.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                if pattern.starts_with("(?i)") {
                    Regex::new(pattern)
                } else {
                    Regex::new(&format!("(?i){}", pattern))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    pub fn is_restricted(&self, url: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(url))
    }
}

impl Default for UrlClassifier {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_RESTRICTED_PATTERNS
                .iter()
                .filter_map(|pattern| Regex::new(pattern).ok())
                .collect(),
        }
    }
}
