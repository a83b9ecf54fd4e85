use grinder_config::load_toml;
use rstest::rstest;

const PINS: &str = r#"
[pins]
hx711_dt = 32
hx711_sck = 33
grinder_relay = 25
encoder_a = 21
encoder_b = 22
encoder_button = 23
"#;

fn with_pins(extra: &str) -> String {
    format!("{PINS}\n{extra}")
}

#[test]
fn accepts_full_config() {
    let toml = with_pins(
        r#"
[filter]
smoothing_alpha = 0.25
history_capacity = 120

[grind]
cup_tolerance_g = 4.0
max_grinding_ms = 25000

[auto_tare]
enabled = false

[input]
double_click_ms = 450

[menu]
target_max_g = 60.0

[timeouts]
sensor_ms = 150
tick_ms = 40

[defaults]
target_weight_g = 16.5
offset_g = 1.2
cup_weight_g = 180.0

[logging]
level = "debug"
rotation = "daily"

[store]
path = "/var/lib/grinder/prefs.toml"
"#,
    );
    let cfg = load_toml(&toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert!(!cfg.auto_tare.enabled);
    assert_eq!(cfg.filter.history_capacity, 120);
}

#[rstest]
#[case("[filter]\nsmoothing_alpha = 0.0\n", "smoothing_alpha")]
#[case("[filter]\nsmoothing_alpha = 1.5\n", "smoothing_alpha")]
#[case("[filter]\nhistory_capacity = 1\n", "history_capacity")]
#[case("[grind]\nstall_min_delta_g = 6.0\n", "stall_min_delta_g")]
#[case("[grind]\nmax_grinding_ms = 1000\n", "max_grinding_ms")]
#[case("[grind]\nfailed_reset_g = 150.0\n", "failed_reset_g")]
#[case("[grind]\nidle_weight_g = 8.0\n", "idle_weight_g")]
#[case("[input]\nsingle_click_delay_ms = 700\n", "single_click_delay_ms")]
#[case("[input]\nrapid_clicks = 2\n", "rapid_clicks")]
#[case("[menu]\nsleep_min_ms = 700000\n", "sleep_min_ms")]
#[case("[timeouts]\ntick_ms = 0\n", "tick_ms")]
#[case("[defaults]\nscale_factor = -3.0\n", "scale_factor")]
#[case("[defaults]\noffset_g = 20.0\n", "offset_g")]
#[case("[defaults]\nsleep_timeout_ms = 1000\n", "sleep_timeout_ms")]
#[case("[store]\npath = \"  \"\n", "store.path")]
fn rejects_out_of_order_or_invalid_values(#[case] section: &str, #[case] needle: &str) {
    let cfg = load_toml(&with_pins(section)).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "error '{err}' should mention {needle}"
    );
}

#[test]
fn unknown_type_is_a_parse_error() {
    let toml = with_pins("[grind]\ncup_tolerance_g = \"five\"\n");
    assert!(load_toml(&toml).is_err());
}
