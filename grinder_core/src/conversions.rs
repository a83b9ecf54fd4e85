//! `From` implementations bridging `grinder_config` types to `grinder_core` types.

use crate::config::{
    AutoTareCfg, ControllerCfg, FactoryDefaults, FilterCfg, GrindCfg, InputCfg, MenuCfg, Timeouts,
};

impl From<&grinder_config::FilterCfg> for FilterCfg {
    fn from(c: &grinder_config::FilterCfg) -> Self {
        Self {
            smoothing_alpha: c.smoothing_alpha,
            reject_jump_g: c.reject_jump_g,
            quantum_g: c.quantum_g,
            dead_zone_g: c.dead_zone_g,
            history_capacity: c.history_capacity,
        }
    }
}

impl From<&grinder_config::GrindCfg> for GrindCfg {
    fn from(c: &grinder_config::GrindCfg) -> Self {
        Self {
            cup_tolerance_g: c.cup_tolerance_g,
            cup_detect_window_ms: c.cup_detect_window_ms,
            cup_snapshot_window_ms: c.cup_snapshot_window_ms,
            finish_window_ms: c.finish_window_ms,
            max_grinding_ms: c.max_grinding_ms,
            stall_window_ms: c.stall_window_ms,
            stall_min_delta_g: c.stall_min_delta_g,
            removal_window_ms: c.removal_window_ms,
            removal_tolerance_g: c.removal_tolerance_g,
            timer_start_delta_g: c.timer_start_delta_g,
            cup_removed_g: c.cup_removed_g,
            idle_return_ms: c.idle_return_ms,
            idle_weight_g: c.idle_weight_g,
            settle_ms: c.settle_ms,
            settle_window_ms: c.settle_window_ms,
            failed_reset_g: c.failed_reset_g,
            impulse_ms: c.impulse_ms,
            significant_change_g: c.significant_change_g,
            activity_window_ms: c.activity_window_ms,
        }
    }
}

impl From<&grinder_config::AutoTareCfg> for AutoTareCfg {
    fn from(c: &grinder_config::AutoTareCfg) -> Self {
        Self {
            enabled: c.enabled,
            hold_ms: c.hold_ms,
            band_g: c.band_g,
            min_drift_g: c.min_drift_g,
            min_interval_ms: c.min_interval_ms,
            average_window_ms: c.average_window_ms,
            samples: c.samples,
        }
    }
}

impl From<&grinder_config::InputCfg> for InputCfg {
    fn from(c: &grinder_config::InputCfg) -> Self {
        Self {
            single_click_delay_ms: c.single_click_delay_ms,
            double_click_ms: c.double_click_ms,
            rapid_clicks: c.rapid_clicks,
            long_press_ms: c.long_press_ms,
            default_acceleration: c.default_acceleration,
            fine_acceleration: c.fine_acceleration,
        }
    }
}

impl From<&grinder_config::MenuCfg> for MenuCfg {
    fn from(c: &grinder_config::MenuCfg) -> Self {
        Self {
            target_step_g: c.target_step_g,
            target_min_g: c.target_min_g,
            target_max_g: c.target_max_g,
            offset_step_g: c.offset_step_g,
            sleep_step_ms: c.sleep_step_ms,
            sleep_min_ms: c.sleep_min_ms,
            sleep_max_ms: c.sleep_max_ms,
            calibration_reference_g: c.calibration_reference_g,
            cup_stable_window_ms: c.cup_stable_window_ms,
            cup_stable_band_g: c.cup_stable_band_g,
            procedure_timeout_ms: c.procedure_timeout_ms,
            tare_samples: c.tare_samples,
            raw_samples: c.raw_samples,
        }
    }
}

impl From<&grinder_config::Defaults> for FactoryDefaults {
    fn from(c: &grinder_config::Defaults) -> Self {
        Self {
            scale_factor: c.scale_factor,
            target_weight_g: c.target_weight_g,
            offset_g: c.offset_g,
            cup_weight_g: c.cup_weight_g,
            scale_mode: c.scale_mode,
            grind_mode: c.grind_mode,
            sleep_timeout_ms: c.sleep_timeout_ms,
        }
    }
}

impl From<&grinder_config::Timeouts> for Timeouts {
    fn from(c: &grinder_config::Timeouts) -> Self {
        Self {
            sensor_ms: c.sensor_ms,
            tick_ms: c.tick_ms,
        }
    }
}

impl From<&grinder_config::Config> for ControllerCfg {
    fn from(c: &grinder_config::Config) -> Self {
        Self {
            filter: (&c.filter).into(),
            grind: (&c.grind).into(),
            auto_tare: (&c.auto_tare).into(),
            input: (&c.input).into(),
            menu: (&c.menu).into(),
            defaults: (&c.defaults).into(),
            timeouts: (&c.timeouts).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_values_flow_into_runtime_config() {
        let cfg = grinder_config::load_toml(
            r#"
[pins]
hx711_dt = 1
hx711_sck = 2
grinder_relay = 3
encoder_a = 4
encoder_b = 5
encoder_button = 6

[grind]
cup_tolerance_g = 3.5

[defaults]
offset_g = 1.5

[timeouts]
tick_ms = 25
"#,
        )
        .unwrap();
        let rt = ControllerCfg::from(&cfg);
        assert!((rt.grind.cup_tolerance_g - 3.5).abs() < 1e-12);
        assert!((rt.defaults.offset_g - 1.5).abs() < 1e-12);
        assert_eq!(rt.timeouts.tick_ms, 25);
        assert_eq!(rt.filter.history_capacity, 100);
    }
}
