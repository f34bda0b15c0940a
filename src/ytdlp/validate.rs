use std::path::{Path, PathBuf};

use super::info::ExtractionInfo;
use super::runner::{AttemptFailure, ProcessOutput};

/// Accept a probe attempt: successful exit with a JSON description on stdout
pub fn validate_probe(output: ProcessOutput) -> Result<ExtractionInfo, AttemptFailure> {
    let stdout = successful_stdout(output)?;

    serde_json::from_str(stdout.trim()).map_err(|e| AttemptFailure::MalformedResponse(e.to_string()))
}

/// Accept a download attempt.
///
/// The process must exit successfully and print a path, the path must exist
/// and the file must not be empty. A zero-byte file left behind is removed.
pub fn validate_download(output: ProcessOutput) -> Result<PathBuf, AttemptFailure> {
    let stdout = successful_stdout(output)?;

    // yt-dlp prints the path after every post-processing move; the last one wins.
    let printed = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or_default();
    let path = PathBuf::from(printed);

    let metadata = match fs_err::metadata(&path) {
        Ok(metadata) => metadata,
        Err(_) => return Err(AttemptFailure::MissingArtifact(printed.to_string())),
    };

    if !metadata.is_file() || metadata.len() == 0 {
        remove_artifact(&path);
        return Err(AttemptFailure::EmptyArtifact(printed.to_string()));
    }

    Ok(path)
}

fn successful_stdout(output: ProcessOutput) -> Result<String, AttemptFailure> {
    if !output.success {
        return Err(AttemptFailure::Process {
            code: output.code,
            stderr: output.stderr,
        });
    }

    if output.stdout.trim().is_empty() {
        return Err(AttemptFailure::EmptyOutput { stderr: output.stderr });
    }

    Ok(output.stdout)
}

/// Best-effort delete; failures are logged and otherwise ignored
pub fn remove_artifact(path: &Path) {
    if !path.is_file() {
        return;
    }

    match fs_err::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial artifact"),
        Err(e) => tracing::warn!(error = %e, "failed to remove partial artifact"),
    }
}

/// Advisory reading of extractor stderr.
///
/// This matches the wording of an external tool and may stop recognizing
/// failures when that wording changes; it is only used to enrich logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureHint {
    /// JS challenge / signature solving failed
    ChallengeSolving,
    BotCheck,
    RateLimited,
    GeoBlocked,
    Unavailable,
    Unknown,
}

impl FailureHint {
    /// What an operator can do about it, when there is anything
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            FailureHint::ChallengeSolving => Some(
                "install or upgrade a supported JS runtime (deno, node or bun) and update yt-dlp",
            ),
            FailureHint::BotCheck => Some("refresh the cookie files in the cookie pool"),
            FailureHint::RateLimited => Some("reduce request rate or rotate cookies/IP"),
            FailureHint::GeoBlocked => Some("the media is not available from this server's region"),
            FailureHint::Unavailable | FailureHint::Unknown => None,
        }
    }
}

pub fn classify_stderr(stderr: &str) -> FailureHint {
    let lower = stderr.to_lowercase();

    if lower.contains("signature solving failed")
        || lower.contains("n challenge solving failed")
        || lower.contains("challenge solving failed")
        || lower.contains("no supported javascript runtime")
        || lower.contains("unable to extract nsig")
        || lower.contains("nsig extraction failed")
    {
        FailureHint::ChallengeSolving
    } else if lower.contains("confirm you're not a bot")
        || lower.contains("confirm you’re not a bot")
        || lower.contains("sign in to confirm")
    {
        FailureHint::BotCheck
    } else if lower.contains("http error 429") || lower.contains("too many requests") || lower.contains("rate-limit")
    {
        FailureHint::RateLimited
    } else if lower.contains("available in your country")
        || lower.contains("geo restricted")
        || lower.contains("geo-restricted")
    {
        FailureHint::GeoBlocked
    } else if lower.contains("video unavailable") || lower.contains("private video") || lower.contains("has been removed")
    {
        FailureHint::Unavailable
    } else {
        FailureHint::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn output(success: bool, stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            success,
            code: Some(if success { 0 } else { 1 }),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_probe_parses_json() {
        let info = validate_probe(output(true, r#"{"id":"abc","title":"T"}"#, "")).unwrap();
        assert_eq!(info.id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_probe_rejects_garbage() {
        let result = validate_probe(output(true, "<html>blocked</html>", ""));
        assert!(matches!(result, Err(AttemptFailure::MalformedResponse(_))));
    }

    #[test]
    fn test_probe_rejects_failed_process() {
        let result = validate_probe(output(false, "", "ERROR: Video unavailable"));
        assert_eq!(
            result.unwrap_err(),
            AttemptFailure::Process {
                code: Some(1),
                stderr: "ERROR: Video unavailable".to_string()
            }
        );
    }

    #[test]
    fn test_download_accepts_non_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.mp3");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"ID3 data").unwrap();

        let stdout = format!("\n{}\n", path.display());
        assert_eq!(validate_download(output(true, &stdout, "")), Ok(path));
    }

    #[test]
    fn test_download_rejects_zero_byte_file_and_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.mp3");
        std::fs::File::create(&path).unwrap();

        let result = validate_download(output(true, &path.display().to_string(), ""));

        assert!(matches!(result, Err(AttemptFailure::EmptyArtifact(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_download_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-written.mp3");

        let result = validate_download(output(true, &path.display().to_string(), ""));
        assert!(matches!(result, Err(AttemptFailure::MissingArtifact(_))));
    }

    #[test]
    fn test_download_rejects_empty_stdout() {
        let result = validate_download(output(true, "  ", "WARNING: nothing"));
        assert_eq!(
            result,
            Err(AttemptFailure::EmptyOutput {
                stderr: "WARNING: nothing".to_string()
            })
        );
    }

    #[test]
    fn test_classify_stderr() {
        assert_eq!(
            classify_stderr("WARNING: [youtube] abc: Signature solving failed: Some formats may be missing"),
            FailureHint::ChallengeSolving
        );
        assert_eq!(
            classify_stderr("ERROR: [youtube] abc: Sign in to confirm you're not a bot."),
            FailureHint::BotCheck
        );
        assert_eq!(classify_stderr("ERROR: HTTP Error 429: Too Many Requests"), FailureHint::RateLimited);
        assert_eq!(
            classify_stderr("ERROR: The uploader has not made this video available in your country"),
            FailureHint::GeoBlocked
        );
        assert_eq!(classify_stderr("ERROR: Private video"), FailureHint::Unavailable);
        assert_eq!(classify_stderr("segfault"), FailureHint::Unknown);
    }

    #[test]
    fn test_only_actionable_hints_have_remediation() {
        assert!(FailureHint::ChallengeSolving.remediation().is_some());
        assert!(FailureHint::Unknown.remediation().is_none());
    }
}
