use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[pins]
# pins are unused by the simulated bench but must be present
hx711_dt = 5
hx711_sck = 6
grinder_relay = 17
encoder_a = 22
encoder_b = 27
encoder_button = 23
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8(stdout.to_vec())
        .unwrap()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("not JSON ({e}): {l}")))
        .collect()
}

/// Validate the JSONL schema for an idle simulated run.
#[rstest]
fn jsonl_idle_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("grinder")
        .unwrap()
        .arg("--json")
        .arg("--log-level")
        .arg("warn")
        .arg("--config")
        .arg(&cfg)
        .args(["simulate", "--seconds", "1"])
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let lines = json_lines(&out.stdout);
    let (summary, frames) = lines.split_last().expect("at least a summary line");
    assert!(!frames.is_empty(), "expected at least one frame");

    for f in frames {
        assert_eq!(f["event"], "frame");
        assert!(f["t_ms"].is_u64());
        assert!(f["state"].is_string());
        assert!(f["weight_g"].is_number());
        assert!(f["lines"].is_array());
    }

    assert_eq!(summary["event"], "summary");
    assert_eq!(summary["state"], "empty");
    assert!(summary["weight_g"].as_f64().unwrap().abs() < 1.0);
    assert_eq!(summary["shot_count"], 0);
}

/// Settings written through `--store` survive the run.
#[rstest]
fn simulate_uses_the_given_store() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let store = dir.path().join("sim_prefs.toml");
    fs::write(&store, "[scale]\nsetWeight = 15.0\n").unwrap();

    let out = Command::cargo_bin("grinder")
        .unwrap()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .args(["simulate", "--seconds", "1", "--store"])
        .arg(&store)
        .output()
        .unwrap();
    assert!(out.status.success());

    let lines = json_lines(&out.stdout);
    let frame = lines
        .iter()
        .find(|v| v["event"] == "frame" && v["state"] == "empty" && v["lines"].as_array().is_some_and(|a| a.len() == 3))
        .expect("an idle frame");
    assert_eq!(frame["lines"][2], "Set: 15.0g");
}
