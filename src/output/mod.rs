use anyhow::Result;

use crate::cli::OutputFormat;
use crate::platforms::Track;
use crate::utils::{extract_domain, format_duration};

/// Render tracks in the requested format
pub fn format_tracks(tracks: &[Track], format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_as_text(tracks)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(tracks)?),
    }
}

fn format_as_text(tracks: &[Track]) -> String {
    if tracks.is_empty() {
        return "No playable tracks found.".to_string();
    }

    tracks
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let site = extract_domain(&track.url).unwrap_or_else(|| "unknown".to_string());
            format!(
                "{:>3}. {} [{}] ({}, {}, {})\n     {}",
                index + 1,
                track.title,
                format_duration(track.duration),
                site,
                track.media_kind().as_str(),
                track.source,
                track.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print tracks to console
pub fn print_to_console(tracks: &[Track], format: &OutputFormat) -> Result<()> {
    println!("{}", format_tracks(tracks, format)?);
    Ok(())
}
