use url::Url;

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format a duration in whole seconds as `1h 2m 3s`
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Sanitize filename for safe filesystem usage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            match c {
                // Keep alphanumeric characters, spaces, hyphens, underscores, and dots
                c if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.' => c,
                // Replace everything else with underscore
                _ => '_',
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Trim process output for log lines, keeping the tail where yt-dlp puts its errors
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }

    let tail: String = text.chars().skip(count - max_chars).collect();
    format!("...{}", tail)
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Check the extractor and the configured JS runtimes; returns a line per missing tool
pub async fn check_dependencies(binary: &str, runtimes: &[String]) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(binary).await {
        missing.push(format!("{} - required for extraction and downloads", binary));
    }

    let mut any_runtime = false;
    for runtime in runtimes {
        if check_command_available(runtime).await {
            any_runtime = true;
        }
    }
    if !any_runtime && !runtimes.is_empty() {
        missing.push(format!(
            "no JS runtime found ({}) - YouTube challenges will fail",
            runtimes.join(", ")
        ));
    }

    // Check for ffmpeg (needed for audio extraction and merging)
    if !check_command_available("ffmpeg").await {
        missing.push("ffmpeg - required for audio conversion and video merging".to_string());
    }

    missing
}

/// Check if a command is available in PATH
pub async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3661), "1h 1m 1s");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Hello World!"), "Hello World_");
        assert_eq!(sanitize_filename("test/file?name"), "test_file_name");
        assert_eq!(sanitize_filename("  spaced  "), "spaced");
    }

    #[test]
    fn test_truncate_for_log_keeps_tail() {
        assert_eq!(truncate_for_log("  short  ", 10), "short");
        assert_eq!(truncate_for_log("WARNING: x\nERROR: boom", 11), "...ERROR: boom");
        assert_eq!(truncate_for_log("ééééé", 2), "...éé");
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://www.youtube.com/watch?v=123"), Some("youtube.com".to_string()));
        assert_eq!(extract_domain("https://music.youtube.com/watch?v=1"), Some("music.youtube.com".to_string()));
        assert_eq!(extract_domain("invalid-url"), None);
    }

    #[tokio::test]
    async fn test_missing_command_is_unavailable() {
        assert!(!check_command_available("definitely-not-a-real-binary-4f1c").await);
    }
}
