//! Guided, blocking procedures run from the menu.
//!
//! Both hold the display for their whole duration (the caller owns the
//! `DisplayGuard`) and talk to the world only through `ProcedureIo`.

use grinder_traits::BoxError;

use crate::config::MenuCfg;
use crate::error::ProcedureError;
use crate::history::WeightHistory;
use crate::util::{elapsed_ms, window_start};

const POLL_MS: u64 = 50;
const CONFIRM_SCREEN_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Procedure {
    CupWeight,
    Calibration,
}

/// What a procedure may do while it owns the control task.
pub trait ProcedureIo {
    fn now_ms(&self) -> u64;
    fn sleep_ms(&self, ms: u64);
    /// Pull in pending samples; returns the latest stabilized weight.
    fn refresh(&mut self) -> f64;
    fn history(&self) -> &WeightHistory;
    /// True once per button click.
    fn take_click(&mut self) -> bool;
    fn prompt(&mut self, text: &str);
    fn tare(&mut self, samples: u32) -> Result<(), BoxError>;
    fn set_scale_factor(&mut self, factor: f64) -> Result<(), BoxError>;
    /// Mean of `samples` sensor reads taken around the filter.
    fn read_direct(&mut self, samples: u32) -> Result<f64, BoxError>;
    fn reset_filter(&mut self);
}

fn sensor_err(e: &BoxError) -> ProcedureError {
    ProcedureError::Sensor(e.to_string())
}

fn wait_for_click<P: ProcedureIo + ?Sized>(
    io: &mut P,
    timeout_ms: u64,
    screen: impl Fn(f64) -> String,
) -> Result<(), ProcedureError> {
    let start = io.now_ms();
    loop {
        let w = io.refresh();
        io.prompt(&screen(w));
        if io.take_click() {
            return Ok(());
        }
        let waited_ms = elapsed_ms(io.now_ms(), start);
        if waited_ms > timeout_ms {
            return Err(ProcedureError::TimedOut {
                step: "button press",
                waited_ms,
            });
        }
        io.sleep_ms(POLL_MS);
    }
}

/// Weigh the empty cup: wait for the user, then for a steady reading.
pub fn measure_cup_weight<P: ProcedureIo + ?Sized>(
    io: &mut P,
    cfg: &MenuCfg,
    min_cup_g: f64,
) -> Result<f64, ProcedureError> {
    wait_for_click(io, cfg.procedure_timeout_ms, |w| {
        format!("Cup Weight\n{w:.1}g\nPlace cup on scale\nand press button")
    })?;

    let start = io.now_ms();
    let cup = loop {
        io.refresh();
        let now = io.now_ms();
        let from = window_start(now, cfg.cup_stable_window_ms);
        let h = io.history();
        let steady = h.covers(from)
            && match (h.min_since(from), h.max_since(from)) {
                (Some(min), Some(max)) => max - min <= cfg.cup_stable_band_g,
                _ => false,
            };
        if steady {
            break h.average_since(from);
        }
        let waited_ms = elapsed_ms(now, start);
        if waited_ms > cfg.procedure_timeout_ms {
            return Err(ProcedureError::TimedOut {
                step: "steady weight",
                waited_ms,
            });
        }
        io.prompt("Cup Weight\nHold still...");
        io.sleep_ms(POLL_MS);
    };

    if !(cup.is_finite() && cup > min_cup_g) {
        return Err(ProcedureError::ImplausibleCup(cup));
    }
    tracing::info!(cup_g = cup, "cup weight measured");
    io.prompt(&format!("Cup Weight Set:\n{cup:.1}g"));
    io.sleep_ms(CONFIRM_SCREEN_MS);
    Ok(cup)
}

/// Derive a new scale factor from a reference weight.
///
/// On any error the previous factor is restored on the sensor.
pub fn calibrate<P: ProcedureIo + ?Sized>(
    io: &mut P,
    cfg: &MenuCfg,
    current_factor: f64,
) -> Result<f64, ProcedureError> {
    match run_calibration(io, cfg) {
        Ok(factor) => Ok(factor),
        Err(e) => {
            tracing::warn!(error = %e, "calibration aborted, restoring previous factor");
            if let Err(restore) = io.set_scale_factor(current_factor) {
                tracing::error!(error = %restore, "could not restore scale factor");
            }
            io.reset_filter();
            Err(e)
        }
    }
}

fn run_calibration<P: ProcedureIo + ?Sized>(
    io: &mut P,
    cfg: &MenuCfg,
) -> Result<f64, ProcedureError> {
    let reference = cfg.calibration_reference_g;

    io.prompt("Calibration\nTaring...");
    io.set_scale_factor(1.0).map_err(|e| sensor_err(&e))?;
    io.tare(cfg.tare_samples).map_err(|e| sensor_err(&e))?;
    let before = io.read_direct(cfg.raw_samples).map_err(|e| sensor_err(&e))?;

    wait_for_click(io, cfg.procedure_timeout_ms, |_| {
        format!("Calibration\nPlace {reference:.0}g weight\non scale and\npress button")
    })?;

    let after = io.read_direct(cfg.raw_samples).map_err(|e| sensor_err(&e))?;
    let factor = (after - before).abs() / reference;
    if !(factor.is_finite() && factor > 0.0) {
        return Err(ProcedureError::InvalidFactor(factor));
    }
    io.set_scale_factor(factor).map_err(|e| sensor_err(&e))?;
    io.reset_filter();
    tracing::info!(factor, before, after, "calibration factor computed");

    io.prompt("Calibration\nRemove weight");
    let start = io.now_ms();
    loop {
        let g = io.read_direct(1).map_err(|e| sensor_err(&e))?;
        if g.abs() < reference * 0.1 {
            io.tare(cfg.tare_samples).map_err(|e| sensor_err(&e))?;
            break;
        }
        if elapsed_ms(io.now_ms(), start) > cfg.procedure_timeout_ms {
            tracing::warn!(weight_g = g, "reference weight not removed, skipping tare");
            break;
        }
        io.sleep_ms(POLL_MS);
    }
    io.reset_filter();
    Ok(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Bench with a load cell in counts, a clock and a scripted button.
    struct Bench {
        now: Cell<u64>,
        counts_per_gram: f64,
        tare_counts: f64,
        factor: f64,
        /// Grams on the platter as a function of time.
        load: Box<dyn Fn(u64) -> f64>,
        click_at: Vec<u64>,
        history: WeightHistory,
        prompts: Vec<String>,
        filter_resets: u32,
    }

    impl Bench {
        fn new(load: impl Fn(u64) -> f64 + 'static, click_at: Vec<u64>) -> Self {
            Self {
                now: Cell::new(0),
                counts_per_gram: 2280.0,
                tare_counts: 0.0,
                factor: 2280.0,
                load: Box::new(load),
                click_at,
                history: WeightHistory::default(),
                prompts: Vec::new(),
                filter_resets: 0,
            }
        }

        fn grams(&self) -> f64 {
            let counts = (self.load)(self.now.get()) * self.counts_per_gram + 84_000.0;
            (counts - self.tare_counts) / self.factor
        }
    }

    impl ProcedureIo for Bench {
        fn now_ms(&self) -> u64 {
            self.now.get()
        }
        fn sleep_ms(&self, ms: u64) {
            self.now.set(self.now.get() + ms);
        }
        fn refresh(&mut self) -> f64 {
            let g = self.grams();
            self.history.push(self.now.get(), g);
            g
        }
        fn history(&self) -> &WeightHistory {
            &self.history
        }
        fn take_click(&mut self) -> bool {
            let now = self.now.get();
            if let Some(pos) = self.click_at.iter().position(|&t| t <= now) {
                self.click_at.remove(pos);
                return true;
            }
            false
        }
        fn prompt(&mut self, text: &str) {
            self.prompts.push(text.to_string());
        }
        fn tare(&mut self, _samples: u32) -> Result<(), BoxError> {
            self.tare_counts = (self.load)(self.now.get()) * self.counts_per_gram + 84_000.0;
            Ok(())
        }
        fn set_scale_factor(&mut self, factor: f64) -> Result<(), BoxError> {
            self.factor = factor;
            Ok(())
        }
        fn read_direct(&mut self, _samples: u32) -> Result<f64, BoxError> {
            Ok(self.grams())
        }
        fn reset_filter(&mut self) {
            self.filter_resets += 1;
        }
    }

    #[test]
    fn calibration_recovers_counts_per_gram() {
        // reference placed at 1 s, removed at 3 s
        let mut bench = Bench::new(|t| if (1000..3000).contains(&t) { 100.0 } else { 0.0 }, vec![1500]);
        let factor = calibrate(&mut bench, &MenuCfg::default(), 999.0).unwrap();
        assert!((factor - 2280.0).abs() < 1e-6);
        assert!((bench.factor - 2280.0).abs() < 1e-6);
        assert!(bench.prompts.iter().any(|p| p.contains("Place 100g weight")));
        assert!(bench.grams().abs() < 1e-9);
    }

    #[test]
    fn calibration_without_weight_restores_factor() {
        let mut bench = Bench::new(|_| 0.0, vec![200]);
        let err = calibrate(&mut bench, &MenuCfg::default(), 412.0).unwrap_err();
        assert!(matches!(err, ProcedureError::InvalidFactor(_)));
        assert!((bench.factor - 412.0).abs() < 1e-9);
    }

    #[test]
    fn calibration_times_out_without_click() {
        let cfg = MenuCfg {
            procedure_timeout_ms: 500,
            ..MenuCfg::default()
        };
        let mut bench = Bench::new(|_| 0.0, vec![]);
        let err = calibrate(&mut bench, &cfg, 412.0).unwrap_err();
        assert!(matches!(err, ProcedureError::TimedOut { step: "button press", .. }));
        assert!((bench.factor - 412.0).abs() < 1e-9);
    }

    #[test]
    fn cup_weight_waits_for_steady_reading() {
        // cup lands at 300 ms and wobbles until 1200 ms
        let load = |t: u64| match t {
            0..300 => 0.0,
            300..1200 => 180.0 + if (t / 50) % 2 == 0 { 3.0 } else { -3.0 },
            _ => 180.0,
        };
        let mut bench = Bench::new(load, vec![400]);
        bench.tare_counts = 84_000.0;
        let cup = measure_cup_weight(&mut bench, &MenuCfg::default(), 5.0).unwrap();
        assert!((cup - 180.0).abs() < 1e-6);
        assert!(bench.prompts.last().is_some_and(|p| p.contains("180.0g")));
    }

    #[test]
    fn empty_platter_is_not_a_cup() {
        let mut bench = Bench::new(|_| 0.0, vec![0]);
        bench.tare_counts = 84_000.0;
        let err = measure_cup_weight(&mut bench, &MenuCfg::default(), 5.0).unwrap_err();
        assert!(matches!(err, ProcedureError::ImplausibleCup(_)));
    }
}
