//! Simulated scale, grinder and encoder sharing one physical model.
//!
//! The grinder adds grounds at `grind_rate_gps` while running, plus
//! `coast_g` after each stop. A press shorter than `PULSE_MAX` toggles the
//! motor (momentary-switch grinders); a longer press runs it for as long as
//! the line is held.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use grinder_traits::clock::Clock;
use grinder_traits::{Actuator, BoxError, LoadCell, RotaryInput};

use crate::error::HwError;

const PULSE_MAX: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct SimParams {
    /// Raw counts per gram; 1.0 makes an uncalibrated scale read grams.
    pub counts_per_gram: f64,
    pub grind_rate_gps: f64,
    pub coast_g: f64,
    /// Peak noise added to each conversion, in grams.
    pub noise_g: f64,
    pub conversion: Duration,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            counts_per_gram: 1.0,
            grind_rate_gps: 1.5,
            coast_g: 0.3,
            noise_g: 0.05,
            conversion: Duration::from_millis(12),
        }
    }
}

#[derive(Debug)]
struct BenchState {
    load_g: f64,
    running: bool,
    level: bool,
    press: Option<(Instant, bool)>,
    last_update: Instant,
    tare_counts: f64,
    scale_factor: f64,
    rng: u32,
    starts: u32,
}

impl BenchState {
    fn advance(&mut self, now: Instant, rate_gps: f64) {
        if self.running {
            let dt = now.saturating_duration_since(self.last_update).as_secs_f64();
            self.load_g += rate_gps * dt;
        }
        self.last_update = now;
    }

    /// Uniform in [-1, 1).
    fn noise(&mut self) -> f64 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        f64::from(x) / f64::from(u32::MAX) * 2.0 - 1.0
    }
}

#[derive(Clone)]
pub struct SimBench {
    params: SimParams,
    clock: Arc<dyn Clock + Send + Sync>,
    state: Arc<Mutex<BenchState>>,
}

impl SimBench {
    pub fn new(params: SimParams, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let now = clock.now();
        Self {
            params,
            clock,
            state: Arc::new(Mutex::new(BenchState {
                load_g: 0.0,
                running: false,
                level: false,
                press: None,
                last_update: now,
                tare_counts: 0.0,
                scale_factor: 1.0,
                rng: 0x9E37_79B9,
                starts: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BenchState> {
        // A panicked holder cannot leave the model half-updated in a way that matters.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_advanced(&self) -> MutexGuard<'_, BenchState> {
        let now = self.clock.now();
        let mut s = self.lock();
        s.advance(now, self.params.grind_rate_gps);
        s
    }

    /// Replace everything on the platform.
    pub fn set_load(&self, grams: f64) {
        self.lock_advanced().load_g = grams;
    }

    pub fn add_load(&self, grams: f64) {
        self.lock_advanced().load_g += grams;
    }

    pub fn load_g(&self) -> f64 {
        self.lock_advanced().load_g
    }

    pub fn grinder_running(&self) -> bool {
        self.lock().running
    }

    /// How many times the motor was started.
    pub fn grinder_starts(&self) -> u32 {
        self.lock().starts
    }

    pub fn load_cell(&self) -> SimLoadCell {
        SimLoadCell {
            bench: self.clone(),
        }
    }

    pub fn grinder(&self) -> SimGrinder {
        SimGrinder {
            bench: self.clone(),
        }
    }
}

pub struct SimLoadCell {
    bench: SimBench,
}

impl LoadCell for SimLoadCell {
    fn try_read_grams(&mut self, _timeout: Duration) -> Result<Option<f64>, BoxError> {
        self.bench.clock.sleep(self.bench.params.conversion);
        let p = &self.bench.params;
        let mut s = self.bench.lock_advanced();
        let noise = s.noise() * p.noise_g;
        let counts = (s.load_g + noise) * p.counts_per_gram;
        Ok(Some((counts - s.tare_counts) / s.scale_factor))
    }

    fn tare(&mut self, _samples: u32) -> Result<(), BoxError> {
        let cpg = self.bench.params.counts_per_gram;
        let mut s = self.bench.lock_advanced();
        s.tare_counts = s.load_g * cpg;
        tracing::debug!(tare_counts = s.tare_counts, "sim tare");
        Ok(())
    }

    fn set_scale_factor(&mut self, factor: f64) -> Result<(), BoxError> {
        if !factor.is_finite() || factor == 0.0 {
            return Err(Box::new(HwError::InvalidScaleFactor(factor)));
        }
        self.bench.lock().scale_factor = factor;
        Ok(())
    }
}

pub struct SimGrinder {
    bench: SimBench,
}

impl Actuator for SimGrinder {
    fn set_active(&mut self, active: bool) -> Result<(), BoxError> {
        let now = self.bench.clock.now();
        let coast = self.bench.params.coast_g;
        let mut s = self.bench.lock_advanced();
        match (s.level, active) {
            (false, true) => {
                s.level = true;
                s.press = Some((now, s.running));
                if !s.running {
                    s.running = true;
                    s.starts += 1;
                    tracing::debug!("sim grinder on");
                }
            }
            (true, false) => {
                s.level = false;
                let (at, was_running) = s.press.take().unwrap_or((now, true));
                let pulse = now.saturating_duration_since(at) < PULSE_MAX;
                // A short pulse on an idle motor latches it on.
                if !pulse || was_running {
                    s.running = false;
                    s.load_g += coast;
                    tracing::debug!("sim grinder off");
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct EncoderState {
    counter: i32,
    clicks: u32,
    down: bool,
    acceleration: u32,
}

/// Encoder driven from the outside through cloned handles.
#[derive(Debug, Default, Clone)]
pub struct SimEncoder {
    state: Arc<Mutex<EncoderState>>,
}

impl SimEncoder {
    fn lock(&self) -> MutexGuard<'_, EncoderState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn rotate(&self, detents: i32) {
        let mut s = self.lock();
        s.counter = s.counter.wrapping_add(detents);
    }

    pub fn click(&self) {
        self.lock().clicks += 1;
    }

    pub fn press(&self, down: bool) {
        self.lock().down = down;
    }

    pub fn acceleration(&self) -> u32 {
        self.lock().acceleration
    }
}

impl RotaryInput for SimEncoder {
    fn read_counter(&mut self) -> i32 {
        self.lock().counter
    }

    fn is_button_clicked(&mut self) -> bool {
        let mut s = self.lock();
        if s.clicks > 0 {
            s.clicks -= 1;
            true
        } else {
            false
        }
    }

    fn is_button_down(&self) -> bool {
        self.lock().down
    }

    fn set_acceleration(&mut self, acceleration: u32) {
        self.lock().acceleration = acceleration;
    }
}
