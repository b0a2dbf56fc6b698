use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;
use sump_core::{Capture, CaptureFile, CaptureOrder, Settings, TriggerSet};
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("sump"))
}

fn write_capture(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
    let settings = Settings {
        read_count: 4,
        channel_groups: 0b1100,
        ..Settings::default()
    };
    let capture = Capture::new(
        vec![0x0001, 0x0100, 0x0101, 0x0000],
        2,
        CaptureOrder::Arrival,
    );
    let file = CaptureFile::new(settings, TriggerSet::default(), None, capture);
    let path = dir.join(name);
    file.save(&path, true).expect("save capture");
    path
}

#[test]
fn help_lists_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("encode").and(contains("capture")).and(contains("inspect")));
}

#[test]
fn encode_prints_default_configuration() {
    let assert = cmd().arg("encode").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 15);
    assert_eq!(lines[0], "80 01 00 00 00");
    assert_eq!(lines[13], "81 00 04 00 02");
    assert_eq!(lines[14], "82 00 00 00 00");
}

#[test]
fn encode_trace_decodes_messages() {
    cmd()
        .arg("encode")
        .arg("--divider")
        .arg("5")
        .arg("--stages")
        .arg("1")
        .arg("--trace")
        .assert()
        .success()
        .stdout(contains("divider 5").and(contains("counts read=4096 delay=2048")));
}

#[test]
fn encode_uses_settings_file_then_flags() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{"settings": {"divider": 3, "demux": true}, "triggers": {"mode": "simple", "n_stages": 1, "stages": [{"mask": 1, "value": 1}]}}"#,
    )
    .expect("write settings");

    cmd()
        .arg("encode")
        .arg("--settings")
        .arg(&path)
        .arg("--divider")
        .arg("7")
        .arg("--trace")
        .assert()
        .success()
        .stdout(
            contains("divider 7")
                .and(contains("trigger[0] mask 0x00000001"))
                .and(contains("demux=true")),
        );
}

#[test]
fn invalid_trigger_mode_shows_error_and_hint() {
    cmd()
        .arg("encode")
        .arg("--trigger-mode")
        .arg("edge")
        .assert()
        .failure()
        .stdout(predicates::str::is_empty())
        .stderr(contains("error:").and(contains("edge")).and(contains("hint:")));
}

#[test]
fn zero_divider_is_rejected() {
    cmd()
        .arg("encode")
        .arg("--divider")
        .arg("0")
        .assert()
        .failure()
        .stderr(contains("divider"));
}

#[test]
fn inspect_prints_summary_and_fields() {
    let temp = TempDir::new().expect("tempdir");
    let path = write_capture(temp.path(), "capture.json");

    cmd()
        .arg("inspect")
        .arg(&path)
        .arg("--field")
        .arg("a=0")
        .arg("--field")
        .arg("b=8")
        .assert()
        .success()
        .stdout(
            contains("samples: 4 (2 lanes, arrival order)")
                .and(contains("index\ta\tb"))
                .and(contains("2\t1\t1")),
        );
}

#[test]
fn inspect_resolves_single_glob_match() {
    let temp = TempDir::new().expect("tempdir");
    write_capture(temp.path(), "only.json");
    let pattern = temp.path().join("*.json");

    cmd()
        .arg("inspect")
        .arg(pattern)
        .assert()
        .success()
        .stdout(contains("only.json"));
}

#[test]
fn inspect_rejects_ambiguous_glob() {
    let temp = TempDir::new().expect("tempdir");
    write_capture(temp.path(), "one.json");
    write_capture(temp.path(), "two.json");
    let pattern = temp.path().join("*.json");

    cmd()
        .arg("inspect")
        .arg(pattern)
        .assert()
        .failure()
        .stderr(contains("multiple files match").and(contains("hint:")));
}

#[test]
fn inspect_rejects_bad_field_spec() {
    let temp = TempDir::new().expect("tempdir");
    let path = write_capture(temp.path(), "capture.json");

    cmd()
        .arg("inspect")
        .arg(path)
        .arg("--field")
        .arg("x=30:8")
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn inspect_rejects_non_capture_json() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("other.json");
    std::fs::write(&path, "{\"hello\": 1}").expect("write json");

    cmd()
        .arg("inspect")
        .arg(path)
        .assert()
        .failure()
        .stderr(contains("error:").and(contains("hint:")));
}

#[test]
fn capture_requires_an_output() {
    cmd()
        .arg("capture")
        .arg("--port")
        .arg("/dev/nonexistent-sump")
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn capture_stdout_and_output_conflict() {
    let temp = TempDir::new().expect("tempdir");
    cmd()
        .arg("capture")
        .arg("--port")
        .arg("/dev/nonexistent-sump")
        .arg("--stdout")
        .arg("-o")
        .arg(temp.path().join("capture.json"))
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn missing_port_shows_error_and_hint() {
    cmd()
        .arg("metadata")
        .arg("--port")
        .arg("/dev/nonexistent-sump")
        .assert()
        .failure()
        .stderr(contains("error:").and(contains("sump ports")));
}

#[test]
fn capture_file_json_is_valid() {
    let temp = TempDir::new().expect("tempdir");
    let path = write_capture(temp.path(), "capture.json");
    let text = std::fs::read_to_string(path).expect("read capture");
    let value: Value = serde_json::from_str(&text).expect("valid json");
    assert_eq!(value["capture"]["samples"][1], 0x0100);
}
