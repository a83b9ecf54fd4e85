//! Persisted user settings.
//!
//! Loaded once at startup; every field is written back individually as soon
//! as it changes. Keys live under the `"scale"` namespace.

use grinder_traits::SettingsStore;

use crate::config::FactoryDefaults;
use crate::error::GrinderError;

pub const NAMESPACE: &str = "scale";

pub mod keys {
    pub const SCALE_FACTOR: &str = "calibration";
    pub const TARGET_WEIGHT: &str = "setWeight";
    pub const OFFSET: &str = "offset";
    pub const CUP_WEIGHT: &str = "cup";
    pub const SCALE_MODE: &str = "scaleMode";
    pub const GRIND_MODE: &str = "grindMode";
    pub const SHOT_COUNT: &str = "shotCount";
    pub const SLEEP_TIMEOUT: &str = "sleepTime";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    ScaleFactor,
    TargetWeight,
    Offset,
    CupWeight,
    ScaleMode,
    GrindMode,
    SleepTimeout,
    ShotCount,
}

impl ProfileField {
    pub const ALL: [Self; 8] = [
        Self::ScaleFactor,
        Self::TargetWeight,
        Self::Offset,
        Self::CupWeight,
        Self::ScaleMode,
        Self::GrindMode,
        Self::SleepTimeout,
        Self::ShotCount,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::ScaleFactor => keys::SCALE_FACTOR,
            Self::TargetWeight => keys::TARGET_WEIGHT,
            Self::Offset => keys::OFFSET,
            Self::CupWeight => keys::CUP_WEIGHT,
            Self::ScaleMode => keys::SCALE_MODE,
            Self::GrindMode => keys::GRIND_MODE,
            Self::SleepTimeout => keys::SLEEP_TIMEOUT,
            Self::ShotCount => keys::SHOT_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationProfile {
    /// Raw counts per gram; always > 0.
    pub scale_factor: f64,
    pub target_weight_g: f64,
    /// Learned stop-early margin; |offset| < target.
    pub offset_g: f64,
    pub cup_weight_g: f64,
    /// Timer-only: the scale weighs and times but never drives the grinder.
    pub scale_mode: bool,
    /// true = continuous (held on), false = impulse (pulse to toggle).
    pub grind_mode: bool,
    pub sleep_timeout_ms: u32,
    pub shot_count: u32,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self::from_defaults(&FactoryDefaults::default())
    }
}

impl CalibrationProfile {
    pub fn from_defaults(d: &FactoryDefaults) -> Self {
        Self {
            scale_factor: d.scale_factor,
            target_weight_g: d.target_weight_g,
            offset_g: d.offset_g,
            cup_weight_g: d.cup_weight_g,
            scale_mode: d.scale_mode,
            grind_mode: d.grind_mode,
            sleep_timeout_ms: d.sleep_timeout_ms,
            shot_count: 0,
        }
    }

    /// Read every field, falling back to `defaults` for missing entries.
    /// Unusable values are corrected and logged; loading never fails.
    pub fn load<S: SettingsStore + ?Sized>(store: &S, defaults: &FactoryDefaults) -> Self {
        let get_f64 = |key: &str, fallback: f64| store.get_f64(NAMESPACE, key).unwrap_or(fallback);
        let mut p = Self {
            scale_factor: get_f64(keys::SCALE_FACTOR, defaults.scale_factor),
            target_weight_g: get_f64(keys::TARGET_WEIGHT, defaults.target_weight_g),
            offset_g: get_f64(keys::OFFSET, defaults.offset_g),
            cup_weight_g: get_f64(keys::CUP_WEIGHT, defaults.cup_weight_g),
            scale_mode: store
                .get_bool(NAMESPACE, keys::SCALE_MODE)
                .unwrap_or(defaults.scale_mode),
            grind_mode: store
                .get_bool(NAMESPACE, keys::GRIND_MODE)
                .unwrap_or(defaults.grind_mode),
            sleep_timeout_ms: store
                .get_i32(NAMESPACE, keys::SLEEP_TIMEOUT)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.sleep_timeout_ms),
            shot_count: store.get_u32(NAMESPACE, keys::SHOT_COUNT).unwrap_or(0),
        };

        if !(p.scale_factor.is_finite() && p.scale_factor > 0.0) {
            tracing::warn!(
                stored = p.scale_factor,
                "invalid calibration factor, resetting to 1.0"
            );
            p.scale_factor = 1.0;
        }
        if !(p.target_weight_g.is_finite() && p.target_weight_g > 0.0) {
            tracing::warn!(stored = p.target_weight_g, "invalid target weight, using default");
            p.target_weight_g = defaults.target_weight_g;
        }
        if !p.offset_g.is_finite() || p.offset_g.abs() >= p.target_weight_g {
            tracing::warn!(stored = p.offset_g, "invalid offset, using default");
            p.offset_g = if defaults.offset_g.abs() < p.target_weight_g {
                defaults.offset_g
            } else {
                0.0
            };
        }
        if !p.cup_weight_g.is_finite() {
            p.cup_weight_g = defaults.cup_weight_g;
        }
        if p.sleep_timeout_ms == 0 {
            p.sleep_timeout_ms = defaults.sleep_timeout_ms;
        }

        tracing::info!(
            scale_factor = p.scale_factor,
            target_g = p.target_weight_g,
            offset_g = p.offset_g,
            cup_g = p.cup_weight_g,
            shots = p.shot_count,
            "profile loaded"
        );
        p
    }

    pub fn persist<S: SettingsStore + ?Sized>(
        &self,
        store: &mut S,
        field: ProfileField,
    ) -> Result<(), GrinderError> {
        let key = field.key();
        let res = match field {
            ProfileField::ScaleFactor => store.put_f64(NAMESPACE, key, self.scale_factor),
            ProfileField::TargetWeight => store.put_f64(NAMESPACE, key, self.target_weight_g),
            ProfileField::Offset => store.put_f64(NAMESPACE, key, self.offset_g),
            ProfileField::CupWeight => store.put_f64(NAMESPACE, key, self.cup_weight_g),
            ProfileField::ScaleMode => store.put_bool(NAMESPACE, key, self.scale_mode),
            ProfileField::GrindMode => store.put_bool(NAMESPACE, key, self.grind_mode),
            ProfileField::SleepTimeout => store.put_i32(
                NAMESPACE,
                key,
                i32::try_from(self.sleep_timeout_ms).unwrap_or(i32::MAX),
            ),
            ProfileField::ShotCount => store.put_u32(NAMESPACE, key, self.shot_count),
        };
        res.map_err(|e| GrinderError::Persistence(format!("{key}: {e}")))
    }

    /// Restore factory settings; the scale factor and shot count are kept.
    pub fn reset_to_factory(&mut self, d: &FactoryDefaults) {
        self.target_weight_g = d.target_weight_g;
        self.offset_g = d.offset_g;
        self.cup_weight_g = d.cup_weight_g;
        self.scale_mode = d.scale_mode;
        self.grind_mode = d.grind_mode;
        self.sleep_timeout_ms = d.sleep_timeout_ms;
    }
}
