//! Runtime configuration for the controller.
//!
//! These are the structs the state machines read. They are separate from
//! the TOML-deserialized types in `grinder_config`; see `conversions`.

/// Signal conditioning for raw load-cell readings.
#[derive(Debug, Clone)]
pub struct FilterCfg {
    /// EMA weight of the newest reading, in (0.0, 1.0].
    pub smoothing_alpha: f64,
    /// Readings further than this from the last stabilized value are dropped.
    pub reject_jump_g: f64,
    pub quantum_g: f64,
    pub dead_zone_g: f64,
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

/// Thresholds and windows of the grinding lifecycle.
#[derive(Debug, Clone)]
pub struct GrindCfg {
    /// Cup is "present" while min and max over the detect window are within this of the cup weight.
    pub cup_tolerance_g: f64,
    pub cup_detect_window_ms: u64,
    /// Window averaged to snapshot the empty cup weight.
    pub cup_snapshot_window_ms: u64,
    pub finish_window_ms: u64,
    pub max_grinding_ms: u64,
    pub stall_window_ms: u64,
    /// Minimum increase expected over `stall_window_ms`.
    pub stall_min_delta_g: f64,
    pub removal_window_ms: u64,
    pub removal_tolerance_g: f64,
    pub timer_start_delta_g: f64,
    /// Below this, a finished cup counts as taken away.
    pub cup_removed_g: f64,
    pub idle_return_ms: u64,
    pub idle_weight_g: f64,
    pub settle_ms: u64,
    pub settle_window_ms: u64,
    pub failed_reset_g: f64,
    pub impulse_ms: u64,
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

/// Zero-drift correction while the scale is idle.
#[derive(Debug, Clone)]
pub struct AutoTareCfg {
    pub enabled: bool,
    /// Drift must persist this long before a tare is issued.
    pub hold_ms: u64,
    pub band_g: f64,
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

#[derive(Debug, Clone)]
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

/// Step sizes and bounds of editable settings, plus guided-procedure knobs.
#[derive(Debug, Clone)]
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

/// Factory values: used when the store has no entry and by "Reset".
#[derive(Debug, Clone)]
pub struct FactoryDefaults {
    pub scale_factor: f64,
    pub target_weight_g: f64,
    pub offset_g: f64,
    pub cup_weight_g: f64,
    pub scale_mode: bool,
    pub grind_mode: bool,
    pub sleep_timeout_ms: u32,
}

impl Default for FactoryDefaults {
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

/// Timeouts for sensor reads and the control tick.
#[derive(Debug, Clone)]
pub struct Timeouts {
    pub sensor_ms: u64,
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

/// Everything the controller needs, bundled.
#[derive(Debug, Clone, Default)]
pub struct ControllerCfg {
    pub filter: FilterCfg,
    pub grind: GrindCfg,
    pub auto_tare: AutoTareCfg,
    pub input: InputCfg,
    pub menu: MenuCfg,
    pub defaults: FactoryDefaults,
    pub timeouts: Timeouts,
}
