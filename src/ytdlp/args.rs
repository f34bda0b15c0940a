use std::fmt;
use std::path::Path;

use crate::platforms::MediaKind;

/// What an invocation of the extractor is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode<'a> {
    /// Print the media description as a single JSON object
    Probe,
    /// Download into `output_template` and print the final file path
    Download { output_template: &'a str },
}

/// Tunables shared by every invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgProfile {
    /// Extractor-internal retry count
    pub retries: u32,
    pub max_video_height: u32,
    pub audio_format: String,
    /// `--extractor-args` value used for the restricted family
    pub restricted_client_args: String,
}

impl Default for ArgProfile {
    fn default() -> Self {
        Self {
            retries: 3,
            max_video_height: 1080,
            audio_format: "mp3".to_string(),
            restricted_client_args: "youtube:player_client=web,web_safari".to_string(),
        }
    }
}

/// Everything that varies per request
#[derive(Debug, Clone, Copy)]
pub struct ArgRequest<'a> {
    pub mode: Mode<'a>,
    pub kind: MediaKind,
    pub restricted: bool,
    pub cookies: Option<&'a Path>,
    pub url: &'a str,
}

/// Ordered argument list for one extractor invocation. The URL is always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorArgs {
    args: Vec<String>,
}

impl ExtractorArgs {
    #[cfg(test)]
    pub fn as_slice(&self) -> &[String] {
        &self.args
    }

    /// Prepend the flags that restrict the extractor to a single JS runtime
    pub fn with_runtime(&self, runtime: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(self.args.len() + 3);
        args.push("--no-js-runtimes".to_string());
        args.push("--js-runtimes".to_string());
        args.push(runtime.to_string());
        args.extend(self.args.iter().cloned());
        args
    }

    #[cfg(test)]
    pub fn contains(&self, flag: &str) -> bool {
        self.args.iter().any(|arg| arg == flag)
    }

    /// Value following `flag`, if present
    #[cfg(test)]
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|index| self.args.get(index + 1))
            .map(String::as_str)
    }

    /// Rendering for logs: the cookie file is reduced to its file name
    pub fn log_safe(&self) -> String {
        let mut rendered = Vec::with_capacity(self.args.len());
        let mut hide_next = false;

        for arg in &self.args {
            if hide_next {
                let name = Path::new(arg)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "<cookies>".to_string());
                rendered.push(name);
                hide_next = false;
                continue;
            }

            hide_next = arg == "--cookies";
            rendered.push(arg.clone());
        }

        rendered.join(" ")
    }
}

impl fmt::Display for ExtractorArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.log_safe())
    }
}

/// Build the extractor arguments for a request. Pure and deterministic.
pub fn build_args(profile: &ArgProfile, request: &ArgRequest<'_>) -> ExtractorArgs {
    let mut args: Vec<String> = Vec::new();
    let retries = profile.retries.to_string();

    match request.mode {
        Mode::Probe => {
            push(&mut args, &["--dump-single-json", "--no-playlist", "--no-warnings", "--no-check-certificate"]);
            push(&mut args, &["--extractor-retries", &retries, "--retries", &retries]);
        }
        Mode::Download { output_template } => {
            push(&mut args, &["--no-playlist", "--no-part", "--geo-bypass", "--no-check-certificate"]);
            push(&mut args, &["--retries", &retries, "--fragment-retries", &retries]);
            push(&mut args, &["--print", "after_move:filepath", "-o", output_template]);

            match request.kind {
                MediaKind::Video => {
                    let format = format!("bv*[height<={}]+ba/b", profile.max_video_height);
                    push(&mut args, &["-f", &format]);
                }
                MediaKind::Audio => {
                    push(&mut args, &["-f", "ba/b", "-x"]);
                    push(&mut args, &["--audio-format", &profile.audio_format, "--audio-quality", "0"]);
                    push(&mut args, &["--concurrent-fragments", "4"]);
                }
            }
        }
    }

    if request.restricted {
        push(&mut args, &["--extractor-args", &profile.restricted_client_args]);
        if let Some(cookies) = request.cookies {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().into_owned());
        }
    }

    args.push(request.url.to_string());

    ExtractorArgs { args }
}

fn push(args: &mut Vec<String>, values: &[&str]) {
    args.extend(values.iter().map(|value| value.to_string()));
}
