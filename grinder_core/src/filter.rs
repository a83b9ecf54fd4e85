//! Raw reading → stabilized weight.
//!
//! Stages, in order: jump rejection against the last stabilized value,
//! exponential smoothing, quantization, dead zone. A rejected reading leaves
//! the filter untouched.

use crate::config::FilterCfg;
use crate::util::quantize;

#[derive(Debug, Clone)]
pub struct SignalFilter {
    cfg: FilterCfg,
    smoothed: f64,
    stabilized: f64,
}

impl SignalFilter {
    pub fn new(cfg: FilterCfg) -> Self {
        Self {
            cfg,
            smoothed: 0.0,
            stabilized: 0.0,
        }
    }

    /// Feed one raw reading (grams). `None` when the reading was discarded.
    pub fn apply(&mut self, raw_g: f64) -> Option<f64> {
        if !raw_g.is_finite() {
            tracing::debug!(raw_g, "discarding non-finite reading");
            return None;
        }
        if (raw_g - self.stabilized).abs() > self.cfg.reject_jump_g {
            tracing::debug!(raw_g, last_g = self.stabilized, "discarding implausible jump");
            return None;
        }

        let a = self.cfg.smoothing_alpha;
        self.smoothed = a.mul_add(raw_g, (1.0 - a) * self.smoothed);

        let mut v = quantize(self.smoothed, self.cfg.quantum_g);
        if v.abs() < self.cfg.dead_zone_g {
            v = 0.0;
        }
        self.stabilized = v;
        Some(v)
    }

    /// Last stabilized value (0.0 before the first accepted reading).
    pub const fn last(&self) -> f64 {
        self.stabilized
    }

    /// Forget all state, e.g. after the scale factor changed units.
    pub fn reset(&mut self) {
        self.smoothed = 0.0;
        self.stabilized = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> SignalFilter {
        SignalFilter::new(FilterCfg::default())
    }

    #[test]
    fn first_reading_is_smoothed_from_zero() {
        let mut f = filter();
        // 0.2 * 10 = 2.0
        assert_eq!(f.apply(10.0), Some(2.0));
    }

    #[test]
    fn small_values_fall_into_dead_zone() {
        let mut f = filter();
        // 0.2 * 0.6 = 0.12 → 0.1 → dead zone
        assert_eq!(f.apply(0.6), Some(0.0));
    }

    #[test]
    fn jump_is_rejected_without_touching_state() {
        let mut f = filter();
        f.apply(100.0);
        let before = f.last();
        assert_eq!(f.apply(5000.0), None);
        assert!((f.last() - before).abs() < 1e-12);
        assert_eq!(f.apply(f64::NAN), None);
    }

    #[test]
    fn reset_clears_history() {
        let mut f = filter();
        for _ in 0..50 {
            f.apply(200.0);
        }
        f.reset();
        assert_eq!(f.last(), 0.0);
        assert_eq!(f.apply(10.0), Some(2.0));
    }
}
