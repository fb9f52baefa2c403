// ABOUTME: Integration tests for the mdtools CLI binary.
// ABOUTME: Runs tidy and merge against temporary fixtures and checks exit codes and output files.

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::CommandCargoExt;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn mdtools_cmd() -> Command {
    Command::cargo_bin("mdtools").unwrap()
}

fn quoted(path: &Path) -> String {
    format!("{:?}", path.to_str().unwrap())
}

#[test]
fn tidy_writes_output_and_reports_done() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("dict.txt");
    let config = temp_dir.path().join("tidy.json");
    fs::write(&input, "w\r\n<html><body><p>text\r\n</>\r\nv\r\n<p>more</p>").unwrap();
    fs::write(&config, format!(r#"{{"Input": {}}}"#, quoted(&input))).unwrap();

    mdtools_cmd()
        .arg("tidy")
        .arg("-c")
        .arg(&config)
        .arg("--jobs")
        .arg("2")
        .assert()
        .success()
        .stderr(predicate::str::contains("process done"));

    let out = fs::read_to_string(temp_dir.path().join("dict.new.txt")).unwrap();
    assert_eq!(out, "w\r\n<p>text</p>\r\n</>\r\nv\r\n<p>more</p>");
}

#[test]
fn merge_appends_new_headwords() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("a.txt");
    let target = temp_dir.path().join("b.txt");
    let output = temp_dir.path().join("merged.txt");
    let config = temp_dir.path().join("merge.json");
    fs::write(&source, "x\r\n<p>from a</p>").unwrap();
    fs::write(&target, "y\r\n<p>from b</p>").unwrap();
    fs::write(
        &config,
        format!(
            r#"{{"Source": {}, "Target": {}, "Output": {}}}"#,
            quoted(&source),
            quoted(&target),
            quoted(&output)
        ),
    )
    .unwrap();

    mdtools_cmd()
        .arg("merge")
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "y\r\n<p>from b</p>\r\n</>\r\nx\r\n<p>from a</p>"
    );
}

#[test]
fn missing_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    mdtools_cmd()
        .arg("tidy")
        .arg("-c")
        .arg(temp_dir.path().join("absent.json"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn invalid_config_lists_problems() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("tidy.json");
    fs::write(&config, r#"{"Drop": ["div."]}"#).unwrap();

    mdtools_cmd()
        .arg("tidy")
        .arg("-c")
        .arg(&config)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Input is required"))
        .stderr(predicate::str::contains("Drop:"));
}

#[test]
fn unknown_command_is_a_usage_error() {
    mdtools_cmd()
        .arg("css")
        .arg("-c")
        .arg("x.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn quiet_suppresses_progress() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("dict.txt");
    let config = temp_dir.path().join("tidy.json");
    fs::write(&input, "w\r\n<p>x</p>").unwrap();
    fs::write(&config, format!(r#"{{"Input": {}}}"#, quoted(&input))).unwrap();

    mdtools_cmd()
        .arg("-q")
        .arg("tidy")
        .arg("-c")
        .arg(&config)
        .assert()
        .success()
        .stderr(predicate::str::contains("process done").not());
}
