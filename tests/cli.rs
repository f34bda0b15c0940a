use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};

fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("config.yaml");
    std::fs::write(&path, content).unwrap();
    path
}

fn ytdlp_source(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ytdlp-source").unwrap();
    cmd.arg("--config").arg(config).env_remove("RUST_LOG");
    cmd
}

#[test]
fn check_rejects_plain_text() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "extractor:\n  retries: 2\n");

    ytdlp_source(&config)
        .args(["check", "never gonna give you up"])
        .assert()
        .success()
        .stdout(predicate::str::contains("supported: no"));
}

#[test]
fn check_classifies_restricted_urls() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "extractor:\n  retries: 2\n");

    ytdlp_source(&config)
        .args(["check", "https://youtu.be/abc123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("supported: yes").and(predicate::str::contains("restricted: yes")));

    ytdlp_source(&config)
        .args(["check", "https://example.org/clip"])
        .assert()
        .success()
        .stdout(predicate::str::contains("restricted: no"));
}

#[test]
fn config_shows_runtime_priority() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "extractor:\n  js_runtimes: [node, deno]\n");

    ytdlp_source(&config)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("JS runtimes: node > deno"));
}

#[test]
fn invalid_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "extractor:\n  js_runtimes: []\n");

    ytdlp_source(&config)
        .args(["check", "https://youtu.be/abc123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("js_runtimes"));
}
