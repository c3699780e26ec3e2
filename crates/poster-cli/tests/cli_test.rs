//! Smoke tests for the `poster` binary.

use std::path::Path;

use assert_cmd::Command;
use image::{GrayImage, Luma};
use predicates::prelude::*;
use tempfile::TempDir;

/// A command isolated from the user's config directory and API key.
fn poster(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("poster").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.path())
        .env("HOME", home.path())
        .env_remove("POSTER_API_KEY");
    cmd
}

fn write_poster_png(path: &Path) {
    let image = GrayImage::from_fn(160, 240, |x, y| {
        if (y / 12) % 3 == 0 && x % 9 < 6 {
            Luma([20])
        } else {
            Luma([235])
        }
    });
    image.save(path).unwrap();
}

#[test]
fn test_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    poster(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_path_honours_flag() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("custom.json");
    poster(&home)
        .args(["-c", path.to_str().unwrap(), "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.json"))
        .stdout(predicate::str::contains("not created"));
}

#[test]
fn test_config_init_set_get() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("poster.json");
    let path = path.to_str().unwrap();

    poster(&home)
        .args(["-c", path, "config", "init"])
        .assert()
        .success();

    poster(&home)
        .args(["-c", path, "config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    poster(&home)
        .args(["-c", path, "config", "set", "routing.blur_threshold", "80"])
        .assert()
        .success();

    poster(&home)
        .args(["-c", path, "config", "get", "routing.blur_threshold"])
        .assert()
        .success()
        .stdout(predicate::str::contains("80"));

    poster(&home)
        .args(["-c", path, "config", "get", "routing.nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));

    let saved = std::fs::read_to_string(path).unwrap();
    assert!(!saved.contains("api_key"));
}

#[test]
fn test_extract_missing_file_fails() {
    let home = TempDir::new().unwrap();
    poster(&home)
        .args(["extract", "--provider", "mock", "does-not-exist.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_extract_without_key_fails_with_hint() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("poster.png");
    write_poster_png(&input);

    poster(&home)
        .args(["extract", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("POSTER_API_KEY"));
}

#[test]
fn test_extract_with_mock_provider() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("poster.png");
    write_poster_png(&input);

    poster(&home)
        .args([
            "extract",
            "--provider",
            "mock",
            "--force-route",
            "vision",
            "--model-dir",
            home.path().join("no-models").to_str().unwrap(),
            input.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\":\"event_poster\""))
        .stdout(predicate::str::contains("\"route\":\"vision\""))
        .stdout(predicate::str::contains("Mock Tech Conference 2026"));
}

#[test]
fn test_extract_rejects_non_image() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("notes.png");
    std::fs::write(&input, b"definitely not an image").unwrap();

    poster(&home)
        .args([
            "extract",
            "--provider",
            "mock",
            "--model-dir",
            home.path().to_str().unwrap(),
            input.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Rejected"));
}

#[test]
fn test_extract_rejects_unknown_route() {
    let home = TempDir::new().unwrap();
    poster(&home)
        .args(["extract", "--force-route", "sideways", "x.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sideways"));
}

#[test]
fn test_config_show_masks_api_key() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("poster.json");
    let path = path.to_str().unwrap();

    poster(&home)
        .args(["-c", path, "config", "set", "capability.api_key", "AIza-secret-key"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AIza-secret-key").not());

    poster(&home)
        .args(["-c", path, "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("api_key"))
        .stdout(predicate::str::contains("AIza-secret-key").not());

    poster(&home)
        .args(["-c", path, "config", "get", "capability.api_key"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AIza-secret-key").not());
}
