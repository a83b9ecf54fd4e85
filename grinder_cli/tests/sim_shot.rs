use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

const CONFIG: &str = r#"
[pins]
hx711_dt = 5
hx711_sck = 6
grinder_relay = 17
encoder_a = 22
encoder_b = 27
encoder_button = 23

[defaults]
cup_weight_g = 200.0
target_weight_g = 18.0
offset_g = 0.0
"#;

/// A full shot on the simulated bench: cup placed, grounds delivered,
/// offset learned, cup lifted.
#[rstest]
fn simulated_shot_finishes_and_counts() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, CONFIG).unwrap();
    let store = dir.path().join("prefs.toml");

    Command::cargo_bin("grinder")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args([
            "simulate",
            "--cup",
            "200",
            "--place-after-ms",
            "500",
            "--lift-after-ms",
            "2500",
            "--grind-rate",
            "8",
            "--seconds",
            "30",
            "--store",
        ])
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("Grinding..."))
        .stdout(predicate::str::contains("Shot finished"))
        .stdout(predicate::str::contains("shots 1"));

    // Shot count and learned offset were persisted
    let saved = fs::read_to_string(&store).unwrap();
    assert!(saved.contains("shotCount = 1"), "store: {saved}");
    assert!(saved.contains("offset"), "store: {saved}");
}
