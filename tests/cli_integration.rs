//! CLI integration tests using assert_cmd

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use tempfile::TempDir;

fn bookscan_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_bookscan"))
}

/// Bright page on a dark table
fn write_page(dir: &Path, name: &str) -> PathBuf {
    let img = RgbImage::from_fn(300, 200, |x, y| {
        if (60..240).contains(&x) && (40..160).contains(&y) {
            Rgb([240, 240, 235])
        } else {
            Rgb([20, 25, 30])
        }
    });
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

#[test]
fn test_help_command() {
    bookscan_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("deskew"))
        .stdout(predicate::str::contains("merge"));
}

#[test]
fn test_version_command() {
    bookscan_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_deskew_requires_input() {
    bookscan_cmd()
        .arg("deskew")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_missing_input_file() {
    let temp = TempDir::new().unwrap();
    bookscan_cmd()
        .args(["enhance", "/nonexistent/page.jpg", "-o"])
        .arg(temp.path().join("out.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open input file"));
}

#[test]
fn test_detect_blank_prints_bounds() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("blank.png");
    RgbImage::from_pixel(60, 40, Rgb([128, 128, 128]))
        .save(&path)
        .unwrap();

    bookscan_cmd()
        .arg("detect")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("0,0 59,0 59,39 0,39"));
}

#[test]
fn test_deskew_with_manual_corners() {
    let temp = TempDir::new().unwrap();
    let input = write_page(temp.path(), "page.png");
    let output = temp.path().join("flat.png");

    bookscan_cmd()
        .arg("deskew")
        .arg(&input)
        .args(["--corners", "240,40 60,40 60,160 240,160", "-o"])
        .arg(&output)
        .assert()
        .success();

    let img = image::open(&output).unwrap();
    assert_eq!((img.width(), img.height()), (180, 120));
}

#[test]
fn test_deskew_default_output_name() {
    let temp = TempDir::new().unwrap();
    let scans = temp.path().join("chapter1");
    std::fs::create_dir(&scans).unwrap();
    let input = write_page(&scans, "page.png");
    let results = temp.path().join("results");

    bookscan_cmd()
        .arg("deskew")
        .arg(&input)
        .arg("--results-dir")
        .arg(&results)
        .assert()
        .success();

    assert!(results.join("chapter1").join("page_deskewed.png").exists());
}

#[test]
fn test_deskew_rejects_bad_corners() {
    let temp = TempDir::new().unwrap();
    let input = write_page(temp.path(), "page.png");

    bookscan_cmd()
        .arg("deskew")
        .arg(&input)
        .args(["--corners", "1,2 3,4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Expected 4 corners"));
}

#[test]
fn test_deskew_collinear_corners_fail() {
    let temp = TempDir::new().unwrap();
    let input = write_page(temp.path(), "page.png");

    bookscan_cmd()
        .arg("deskew")
        .arg(&input)
        .args(["--corners", "0,0 10,10 20,20 30,30", "-o"])
        .arg(temp.path().join("out.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("geometry failure"));
}

#[test]
fn test_rotate_swaps_dimensions() {
    let temp = TempDir::new().unwrap();
    let input = write_page(temp.path(), "page.png");
    let output = temp.path().join("turned.png");

    bookscan_cmd()
        .arg("rotate")
        .arg(&input)
        .args(["--direction", "left", "-o"])
        .arg(&output)
        .assert()
        .success();

    let img = image::open(&output).unwrap();
    assert_eq!((img.width(), img.height()), (200, 300));
}

#[test]
fn test_enhance_filters() {
    let temp = TempDir::new().unwrap();
    let input = write_page(temp.path(), "page.png");

    for filter in ["readability", "contrast", "sharpen", "binarize", "denoise"] {
        let output = temp.path().join(format!("{}.png", filter));
        bookscan_cmd()
            .arg("enhance")
            .arg(&input)
            .args(["--filter", filter, "-o"])
            .arg(&output)
            .assert()
            .success();
        let img = image::open(&output).unwrap();
        assert_eq!((img.width(), img.height()), (300, 200));
    }
}

#[test]
fn test_merge_side_by_side() {
    let temp = TempDir::new().unwrap();
    let first = write_page(temp.path(), "left.png");
    let second = write_page(temp.path(), "right.png");
    let output = temp.path().join("spread.png");

    bookscan_cmd()
        .arg("merge")
        .arg(&first)
        .arg(&second)
        .args(["--overlap", "20", "-o"])
        .arg(&output)
        .assert()
        .success();

    let img = image::open(&output).unwrap();
    assert_eq!((img.width(), img.height()), (580, 200));
}

#[test]
fn test_merge_overlap_too_large() {
    let temp = TempDir::new().unwrap();
    let first = write_page(temp.path(), "left.png");
    let second = write_page(temp.path(), "right.png");

    bookscan_cmd()
        .arg("merge")
        .arg(&first)
        .arg(&second)
        .args(["--vertical", "--overlap", "500", "-o"])
        .arg(temp.path().join("out.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("overlap"));
}
