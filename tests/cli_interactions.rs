//! CLI options interaction tests
//!
//! Every run here uses the local backend, so the whole cluster lives inside
//! the spawned `lft` process.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use regex::Regex;
use std::process::Command;
use tempfile::TempDir;

/// Command with a clean environment, run from an empty directory so no
/// `.env` file is picked up
fn lft(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lft").unwrap();
    cmd.current_dir(dir.path());
    for name in [
        "LFT_SIZE", "LFT_RETRIES", "LFT_MODE", "LFT_YAML", "LFT_SEED", "LFT_TRANSPORT",
        "LFT_RANKS", "LFT_RANK", "LFT_HOSTS", "LFT_CONNECT_TIMEOUT", "ENABLE_COLOR",
        "OMPI_COMM_WORLD_RANK", "PMI_RANK",
    ] {
        cmd.env_remove(name);
    }
    cmd
}

#[test]
fn test_matrix_run_prints_table_and_stats() {
    let dir = TempDir::new().unwrap();
    lft(&dir)
        .args(["--ranks", "4", "-s", "64K", "-p", "2", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("| To "))
        .stdout(predicate::str::contains("| From "))
        .stdout(predicate::str::contains("Latency :"))
        .stdout(predicate::str::contains("Throughput :"))
        .stdout(predicate::str::contains(" MiB/s"));
}

#[test]
fn test_bisection_run() {
    let dir = TempDir::new().unwrap();
    let output = lft(&dir)
        .args(["-n", "5", "-s", "64K", "-p", "1", "-b", "--no-color"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    // 4 workers -> 2 pairs
    assert_eq!(stdout.matches("| From ").count(), 2);
    assert!(stdout.contains("Avg : "));
}

#[test]
fn test_gnuplot_line() {
    let dir = TempDir::new().unwrap();
    let output = lft(&dir)
        .args(["-n", "7", "-s", "64K", "-p", "1", "-g", "--no-color"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let line = Regex::new(r"^7\t\d+\.\d{3}\n$").unwrap();
    assert!(line.is_match(&stdout), "unexpected output {:?}", stdout);
}

#[test]
fn test_random_bisection_with_seed() {
    let dir = TempDir::new().unwrap();
    lft(&dir)
        .args(["-n", "5", "-s", "64K", "-p", "1", "-r", "--seed", "3", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("| From ").count(2));
}

#[test]
fn test_yaml_output() {
    let dir = TempDir::new().unwrap();
    let yaml_path = dir.path().join("results.yaml");
    lft(&dir)
        .args(["-n", "4", "-s", "64K", "-p", "1", "--no-color", "-o"])
        .arg(&yaml_path)
        .assert()
        .success();

    let written = std::fs::read_to_string(&yaml_path).unwrap();
    let parsed: serde_yaml::Value = serde_yaml::from_str(&written).unwrap();
    let senders = parsed.as_mapping().unwrap();
    assert_eq!(senders.len(), 3);
    for (_, receivers) in senders {
        let receivers = receivers.as_mapping().unwrap();
        assert_eq!(receivers.len(), 2);
        for (_, values) in receivers {
            assert!(values["latency"].as_f64().unwrap() > 0.0);
            assert!(values["throughput"].as_f64().unwrap() > 0.0);
        }
    }
}

#[test]
fn test_unwritable_yaml_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    lft(&dir)
        .args(["-n", "3", "-s", "64K", "-p", "1", "--no-color", "-o", "missing/dir/out.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Latency :"));
}

#[test]
fn test_unknown_size_unit() {
    let dir = TempDir::new().unwrap();
    lft(&dir)
        .args(["-s", "64X", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unit -s X unknown"));
}

#[test]
fn test_payload_below_minimum() {
    let dir = TempDir::new().unwrap();
    lft(&dir)
        .args(["-s", "32K", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("below the minimum"));
}

#[test]
fn test_negative_retries() {
    let dir = TempDir::new().unwrap();
    lft(&dir)
        .args(["-p", "-1", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Retry count must be positive"));
}

#[test]
fn test_too_few_processes() {
    let dir = TempDir::new().unwrap();
    lft(&dir)
        .args(["-n", "2", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("at least 3 processes"));
}

#[test]
fn test_non_root_rank_exits_silently() {
    let dir = TempDir::new().unwrap();
    lft(&dir)
        .args(["--transport", "tcp", "--rank", "2", "-s", "1X", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_env_file_is_read() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".env"), "LFT_MODE=bisection\nLFT_RANKS=5\nLFT_SIZE=64K\nLFT_RETRIES=1\n").unwrap();
    lft(&dir)
        .args(["--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("| From ").count(2));
}

#[test]
fn test_cli_overrides_env() {
    let dir = TempDir::new().unwrap();
    lft(&dir)
        .env("LFT_RETRIES", "-1")
        .args(["-s", "64K", "-p", "1", "-n", "3", "--no-color"])
        .assert()
        .success();
}

#[test]
fn test_help_and_version() {
    let dir = TempDir::new().unwrap();
    lft(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--bisection"))
        .stdout(predicate::str::contains("--gnuplot"));

    lft(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lft"));
}

#[test]
fn test_conflicting_color_flags() {
    let dir = TempDir::new().unwrap();
    lft(&dir).args(["--color", "--no-color"]).assert().failure();
}

#[test]
fn test_json_logs_stay_on_stderr() {
    let dir = TempDir::new().unwrap();
    let output = lft(&dir)
        .args(["-n", "3", "-s", "64K", "-p", "1", "-g", "--verbose", "--log-format", "json", "--no-color"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.lines().any(|l| l.starts_with('{')));
}
