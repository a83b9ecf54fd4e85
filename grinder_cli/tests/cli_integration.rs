use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal valid config; the settings file lives next to it
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let store = dir.path().join("prefs.toml");
    let toml = format!(
        r#"
[pins]
# pins are unused by the simulated bench but must be present
hx711_dt = 5
hx711_sck = 6
grinder_relay = 17
encoder_a = 22
encoder_b = 27
encoder_button = 23

[timeouts]
sample_ms = 100

[store]
path = "{}"
"#,
        store.display()
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn grinder(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("grinder").unwrap();
    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["health"], 0, "ok", "stdout")]
#[case(&["profile"], 2, "Usage:", "stderr")]
#[case(&["simulate", "--seconds", "0"], 1, "--seconds must be > 0", "stderr")]
#[case(&["simulate", "--grind-rate", "fast"], 2, "grind-rate", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let assert = grinder(&cfg).args(args).assert().code(exit_code);

    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[cfg(not(feature = "hardware"))]
#[rstest]
fn run_without_gpio_support_explains_the_feature() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    grinder(&cfg)
        .arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no GPIO support"))
        .stderr(predicate::str::contains("--features hardware"));
}

#[cfg(not(feature = "hardware"))]
#[rstest]
fn self_check_reads_the_simulated_cell() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    grinder(&cfg)
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::contains("ok: sim load cell responding"));
}

#[rstest]
fn missing_config_file_is_explained() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    grinder(&missing)
        .arg("health")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("config file could not be read"));
}

#[rstest]
#[case("[filter]\nsmoothing_alpha = 0.5\n", "missing field `pins`")]
#[case(
    "[pins]\nhx711_dt = 5\nhx711_sck = 6\ngrinder_relay = 17\nencoder_a = 22\nencoder_b = 27\nencoder_button = 23\n[filter]\nquantum_g = 0.0\n",
    "filter.quantum_g must be > 0"
)]
fn invalid_config_is_explained(#[case] toml: &str, #[case] detail: &str) {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, toml).unwrap();

    grinder(&cfg)
        .arg("health")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains(detail));
}

#[rstest]
fn json_mode_reports_errors_as_json() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, "[pins]\n").unwrap();

    let out = grinder(&cfg).arg("--json").arg("health").output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let line = stderr.lines().last().expect("error line");
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "Error");
    assert!(v["message"].as_str().unwrap().contains("What happened"));
}

#[rstest]
fn profile_show_reads_the_settings_file() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    fs::write(
        dir.path().join("prefs.toml"),
        "[scale]\nsetWeight = 17.5\ncup = 231.0\nshotCount = 12\n",
    )
    .unwrap();

    grinder(&cfg)
        .args(["profile", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("target       : 17.5 g"))
        .stdout(predicate::str::contains("cup weight   : 231.0 g"))
        .stdout(predicate::str::contains("shots        : 12"));
}

#[rstest]
fn profile_reset_keeps_calibration_and_shot_count() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    fs::write(
        dir.path().join("prefs.toml"),
        "[scale]\ncalibration = 3.5\nsetWeight = 21.0\noffset = 1.25\nscaleMode = true\nshotCount = 9\n",
    )
    .unwrap();

    let out = grinder(&cfg)
        .args(["--json", "profile", "reset"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(v["scale_factor"], 3.5);
    assert_eq!(v["shot_count"], 9);
    assert_eq!(v["target_weight_g"], 18.0);
    assert_eq!(v["offset_g"], 2.0);
    assert_eq!(v["scale_mode"], false);

    // The reset is durable
    grinder(&cfg)
        .args(["profile", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("target       : 18.0 g"));
}
