#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and settings persistence for the grinder.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - `TomlFileStore` keeps the user-confirmed calibration profile on disk.
use serde::Deserialize;

pub mod atomic;
pub mod store;

pub use store::TomlFileStore;

#[derive(Debug, Deserialize)]
pub struct Pins {
    pub hx711_dt: u8,
    pub hx711_sck: u8,
    pub grinder_relay: u8,
    pub encoder_a: u8,
    pub encoder_b: u8,
    pub encoder_button: u8,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FilterCfg {
    /// EMA smoothing factor in (0.0, 1.0]
    pub smoothing_alpha: f64,
    /// Readings jumping further than this from the last stabilized value are dropped
    pub reject_jump_g: f64,
    /// Output resolution in grams
    pub quantum_g: f64,
    /// Magnitudes below this snap to zero
    pub dead_zone_g: f64,
    /// Rolling history capacity (samples)
    pub history_capacity: usize,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.2,
            reject_jump_g: 1000.0,
            quantum_g: 0.1,
            dead_zone_g: 0.15,
            history_capacity: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GrindCfg {
    pub cup_tolerance_g: f64,
    pub cup_detect_window_ms: u64,
    pub cup_snapshot_window_ms: u64,
    pub finish_window_ms: u64,
    pub max_grinding_ms: u64,
    pub stall_window_ms: u64,
    pub stall_min_delta_g: f64,
    pub removal_window_ms: u64,
    pub removal_tolerance_g: f64,
    /// Timer-only mode starts its clock once this much has landed in the cup
    pub timer_start_delta_g: f64,
    pub cup_removed_g: f64,
    pub idle_return_ms: u64,
    pub idle_weight_g: f64,
    pub settle_ms: u64,
    pub settle_window_ms: u64,
    pub failed_reset_g: f64,
    /// Relay pulse length in impulse grind mode
    pub impulse_ms: u64,
    /// Weight change (vs. the activity window average) that counts as activity
    pub significant_change_g: f64,
    pub activity_window_ms: u64,
}

impl Default for GrindCfg {
    fn default() -> Self {
        Self {
            cup_tolerance_g: 5.0,
            cup_detect_window_ms: 1000,
            cup_snapshot_window_ms: 500,
            finish_window_ms: 200,
            max_grinding_ms: 30_000,
            stall_window_ms: 2000,
            stall_min_delta_g: 1.0,
            removal_window_ms: 200,
            removal_tolerance_g: 5.0,
            timer_start_delta_g: 0.1,
            cup_removed_g: 5.0,
            idle_return_ms: 5000,
            idle_weight_g: 3.0,
            settle_ms: 1500,
            settle_window_ms: 500,
            failed_reset_g: 500.0,
            impulse_ms: 100,
            significant_change_g: 5.0,
            activity_window_ms: 10_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AutoTareCfg {
    pub enabled: bool,
    pub hold_ms: u64,
    pub band_g: f64,
    /// Drift smaller than this is left alone
    pub min_drift_g: f64,
    pub min_interval_ms: u64,
    pub average_window_ms: u64,
    pub samples: u32,
}

impl Default for AutoTareCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            hold_ms: 2000,
            band_g: 3.0,
            min_drift_g: 0.2,
            min_interval_ms: 30_000,
            average_window_ms: 10_000,
            samples: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InputCfg {
    pub single_click_delay_ms: u64,
    pub double_click_ms: u64,
    pub rapid_clicks: u8,
    pub long_press_ms: u64,
    pub default_acceleration: u32,
    pub fine_acceleration: u32,
}

impl Default for InputCfg {
    fn default() -> Self {
        Self {
            single_click_delay_ms: 300,
            double_click_ms: 500,
            rapid_clicks: 4,
            long_press_ms: 1500,
            default_acceleration: 100,
            fine_acceleration: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MenuCfg {
    pub target_step_g: f64,
    pub target_min_g: f64,
    pub target_max_g: f64,
    pub offset_step_g: f64,
    pub sleep_step_ms: u32,
    pub sleep_min_ms: u32,
    pub sleep_max_ms: u32,
    pub calibration_reference_g: f64,
    pub cup_stable_window_ms: u64,
    pub cup_stable_band_g: f64,
    pub procedure_timeout_ms: u64,
    pub tare_samples: u32,
    pub raw_samples: u32,
}

impl Default for MenuCfg {
    fn default() -> Self {
        Self {
            target_step_g: 0.1,
            target_min_g: 1.0,
            target_max_g: 100.0,
            offset_step_g: 0.01,
            sleep_step_ms: 1000,
            sleep_min_ms: 5000,
            sleep_max_ms: 600_000,
            calibration_reference_g: 100.0,
            cup_stable_window_ms: 1000,
            cup_stable_band_g: 0.5,
            procedure_timeout_ms: 60_000,
            tare_samples: 10,
            raw_samples: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Max wait for HX711 data-ready per read (ms). Also accepts alias "sample_ms".
    #[serde(alias = "sample_ms")]
    pub sensor_ms: u64,
    /// Control loop period (ms)
    pub tick_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            sensor_ms: 200,
            tick_ms: 50,
        }
    }
}

/// Factory values used when the store has no entry, and by "Reset".
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub scale_factor: f64,
    pub target_weight_g: f64,
    pub offset_g: f64,
    pub cup_weight_g: f64,
    pub scale_mode: bool,
    pub grind_mode: bool,
    pub sleep_timeout_ms: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            target_weight_g: 18.0,
            offset_g: 2.0,
            cup_weight_g: 200.0,
            scale_mode: false,
            grind_mode: false,
            sleep_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// Conversions averaged per reported reading
    pub samples_per_read: u32,
    pub relay_active_high: bool,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            samples_per_read: 7,
            relay_active_high: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreCfg {
    /// Settings file; relative paths resolve against the working directory
    pub path: String,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            path: "grinder_prefs.toml".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub filter: FilterCfg,
    #[serde(default)]
    pub grind: GrindCfg,
    #[serde(default)]
    pub auto_tare: AutoTareCfg,
    #[serde(default)]
    pub input: InputCfg,
    #[serde(default)]
    pub menu: MenuCfg,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub store: StoreCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn positive_finite(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Filter
        let f = &self.filter;
        if !(f.smoothing_alpha > 0.0 && f.smoothing_alpha <= 1.0) {
            eyre::bail!("filter.smoothing_alpha must be in (0.0, 1.0]");
        }
        if !positive_finite(f.reject_jump_g) {
            eyre::bail!("filter.reject_jump_g must be > 0");
        }
        if !positive_finite(f.quantum_g) {
            eyre::bail!("filter.quantum_g must be > 0");
        }
        if !f.dead_zone_g.is_finite() || f.dead_zone_g < 0.0 {
            eyre::bail!("filter.dead_zone_g must be >= 0");
        }
        if f.history_capacity < 2 {
            eyre::bail!("filter.history_capacity must be >= 2");
        }

        // Grind
        let g = &self.grind;
        if !positive_finite(g.cup_tolerance_g) {
            eyre::bail!("grind.cup_tolerance_g must be > 0");
        }
        if g.cup_detect_window_ms == 0 || g.finish_window_ms == 0 || g.stall_window_ms == 0 {
            eyre::bail!("grind window lengths must be >= 1 ms");
        }
        if g.max_grinding_ms <= g.stall_window_ms {
            eyre::bail!("grind.max_grinding_ms must exceed grind.stall_window_ms");
        }
        if !positive_finite(g.stall_min_delta_g) || g.stall_min_delta_g >= g.cup_tolerance_g {
            eyre::bail!("grind.stall_min_delta_g must be in (0, grind.cup_tolerance_g)");
        }
        if !positive_finite(g.removal_tolerance_g) {
            eyre::bail!("grind.removal_tolerance_g must be > 0");
        }
        if g.idle_weight_g > g.cup_removed_g {
            eyre::bail!("grind.idle_weight_g must be <= grind.cup_removed_g");
        }
        if g.settle_ms >= g.idle_return_ms {
            eyre::bail!("grind.settle_ms must be shorter than grind.idle_return_ms");
        }
        if g.failed_reset_g <= self.defaults.cup_weight_g + g.cup_tolerance_g {
            eyre::bail!("grind.failed_reset_g must be above the cup detection band");
        }

        // Auto-tare
        let t = &self.auto_tare;
        if t.min_drift_g < 0.0 || t.min_drift_g >= t.band_g {
            eyre::bail!("auto_tare.min_drift_g must be in [0, auto_tare.band_g)");
        }
        if t.samples == 0 {
            eyre::bail!("auto_tare.samples must be >= 1");
        }

        // Input
        let i = &self.input;
        if i.double_click_ms == 0 {
            eyre::bail!("input.double_click_ms must be >= 1");
        }
        if i.single_click_delay_ms > i.double_click_ms {
            eyre::bail!("input.single_click_delay_ms must be <= input.double_click_ms");
        }
        if i.rapid_clicks < 3 {
            eyre::bail!("input.rapid_clicks must be >= 3");
        }

        // Menu
        let m = &self.menu;
        if !positive_finite(m.target_step_g) || !positive_finite(m.offset_step_g) {
            eyre::bail!("menu step sizes must be > 0");
        }
        if m.target_min_g <= 0.0 || m.target_min_g >= m.target_max_g {
            eyre::bail!("menu.target_min_g must be in (0, menu.target_max_g)");
        }
        if m.sleep_min_ms == 0 || m.sleep_min_ms > m.sleep_max_ms {
            eyre::bail!("menu.sleep_min_ms must be in [1, menu.sleep_max_ms]");
        }
        if !positive_finite(m.calibration_reference_g) {
            eyre::bail!("menu.calibration_reference_g must be > 0");
        }
        if m.procedure_timeout_ms == 0 {
            eyre::bail!("menu.procedure_timeout_ms must be >= 1");
        }

        // Timeouts
        if self.timeouts.sensor_ms == 0 {
            eyre::bail!("timeouts.sensor_ms must be >= 1");
        }
        if self.timeouts.tick_ms == 0 {
            eyre::bail!("timeouts.tick_ms must be >= 1");
        }

        // Defaults
        let d = &self.defaults;
        if !positive_finite(d.scale_factor) {
            eyre::bail!("defaults.scale_factor must be > 0");
        }
        if !(m.target_min_g..=m.target_max_g).contains(&d.target_weight_g) {
            eyre::bail!("defaults.target_weight_g must be within menu target bounds");
        }
        if !d.offset_g.is_finite() || d.offset_g.abs() >= d.target_weight_g {
            eyre::bail!("defaults.offset_g magnitude must be below defaults.target_weight_g");
        }
        if !(m.sleep_min_ms..=m.sleep_max_ms).contains(&d.sleep_timeout_ms) {
            eyre::bail!("defaults.sleep_timeout_ms must be within menu sleep bounds");
        }

        // Hardware
        if self.hardware.samples_per_read == 0 {
            eyre::bail!("hardware.samples_per_read must be >= 1");
        }

        // Store
        if self.store.path.trim().is_empty() {
            eyre::bail!("store.path must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[pins]
hx711_dt = 32
hx711_sck = 33
grinder_relay = 25
encoder_a = 21
encoder_b = 22
encoder_button = 23
"#;

    #[test]
    fn minimal_config_uses_documented_defaults() {
        let cfg = load_toml(MINIMAL).expect("parse");
        cfg.validate().expect("defaults validate");
        assert_eq!(cfg.filter.history_capacity, 100);
        assert!((cfg.filter.smoothing_alpha - 0.2).abs() < 1e-12);
        assert_eq!(cfg.timeouts.tick_ms, 50);
        assert_eq!(cfg.timeouts.sensor_ms, 200);
        assert!((cfg.defaults.cup_weight_g - 200.0).abs() < 1e-12);
        assert_eq!(cfg.store.path, "grinder_prefs.toml");
    }

    #[test]
    fn sample_ms_alias_is_accepted() {
        let toml = format!("{MINIMAL}\n[timeouts]\nsample_ms = 150\n");
        let cfg = load_toml(&toml).expect("parse");
        assert_eq!(cfg.timeouts.sensor_ms, 150);
    }

    #[test]
    fn missing_pins_is_a_parse_error() {
        assert!(load_toml("[filter]\nsmoothing_alpha = 0.3\n").is_err());
    }
}
