//! Builder for `Controller`.
//!
//! Every device is required; `try_build()` reports the first missing piece
//! as a `BuildError` and rejects configurations the state machines cannot
//! run with.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use grinder_traits::clock::{Clock, MonotonicClock};
use grinder_traits::{Actuator, LoadCell, RotaryInput, SettingsStore};

use crate::config::ControllerCfg;
use crate::control::{ControlState, Devices};
use crate::error::{BuildError, Result};
use crate::runner::Controller;
use crate::sampler::Sampler;
use crate::status::StatusBoard;

pub struct ControllerBuilder<L, A, R, S> {
    sensor: Option<L>,
    actuator: Option<A>,
    input: Option<R>,
    store: Option<S>,
    cfg: ControllerCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl<L, A, R, S> Default for ControllerBuilder<L, A, R, S> {
    fn default() -> Self {
        Self {
            sensor: None,
            actuator: None,
            input: None,
            store: None,
            cfg: ControllerCfg::default(),
            clock: None,
        }
    }
}

impl<L, A, R, S> ControllerBuilder<L, A, R, S> {
    pub fn with_sensor(mut self, sensor: L) -> Self {
        self.sensor = Some(sensor);
        self
    }

    pub fn with_actuator(mut self, actuator: A) -> Self {
        self.actuator = Some(actuator);
        self
    }

    pub fn with_input(mut self, input: R) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_store(mut self, store: S) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_config(mut self, cfg: ControllerCfg) -> Self {
        self.cfg = cfg;
        self
    }

    /// Inject a clock (tests use `TestClock`). Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

fn invalid(msg: &'static str) -> Result<()> {
    Err(eyre::Report::new(BuildError::InvalidConfig(msg)))
}

fn validate(cfg: &ControllerCfg) -> Result<()> {
    if !(cfg.filter.smoothing_alpha > 0.0 && cfg.filter.smoothing_alpha <= 1.0) {
        return invalid("filter.smoothing_alpha must be in (0, 1]");
    }
    if cfg.filter.history_capacity < 2 {
        return invalid("filter.history_capacity must be >= 2");
    }
    if cfg.timeouts.tick_ms == 0 {
        return invalid("timeouts.tick_ms must be > 0");
    }
    if cfg.timeouts.sensor_ms == 0 {
        return invalid("timeouts.sensor_ms must be > 0");
    }
    if cfg.grind.cup_tolerance_g <= 0.0 {
        return invalid("grind.cup_tolerance_g must be > 0");
    }
    if cfg.grind.max_grinding_ms == 0 {
        return invalid("grind.max_grinding_ms must be > 0");
    }
    if cfg.menu.calibration_reference_g <= 0.0 {
        return invalid("menu.calibration_reference_g must be > 0");
    }
    Ok(())
}

impl<L, A, R, S> ControllerBuilder<L, A, R, S>
where
    L: LoadCell + Send + 'static,
    A: Actuator,
    R: RotaryInput,
    S: SettingsStore,
{
    /// Spawns the acquisition thread; call `Controller::startup` before ticking.
    pub fn try_build(self) -> Result<Controller<L, A, R, S>> {
        let sensor = self
            .sensor
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSensor))?;
        let actuator = self
            .actuator
            .ok_or_else(|| eyre::Report::new(BuildError::MissingActuator))?;
        let input = self
            .input
            .ok_or_else(|| eyre::Report::new(BuildError::MissingInput))?;
        let store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;
        validate(&self.cfg)?;

        let clock: Arc<dyn Clock + Send + Sync> = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let epoch = clock.now();
        let sensor = Arc::new(Mutex::new(sensor));
        let sampler = Sampler::spawn(
            Arc::clone(&sensor),
            self.cfg.filter.clone(),
            Duration::from_millis(self.cfg.timeouts.sensor_ms),
            Arc::clone(&clock),
            epoch,
        );
        let board = Arc::new(StatusBoard::new());
        let tick = Duration::from_millis(self.cfg.timeouts.tick_ms);
        let control = ControlState::new(
            self.cfg,
            Devices {
                sensor,
                actuator,
                input,
                store,
            },
            Arc::clone(&clock),
            epoch,
            sampler.receiver(),
            sampler.flags(),
            Arc::clone(&board),
        );
        Ok(Controller::from_parts(control, sampler, board, clock, tick))
    }
}
