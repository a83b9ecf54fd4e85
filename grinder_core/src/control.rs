//! The control task: one owner for all mutable controller state.
//!
//! Each `tick()` drains new readings into the history, dispatches input,
//! advances the grinding process, applies side effects and publishes a
//! `StatusSnapshot`. Guided procedures run inline and block the tick.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use grinder_traits::clock::Clock;
use grinder_traits::{Actuator, BoxError, LoadCell, RotaryInput, SettingsStore};

use crate::config::ControllerCfg;
use crate::error::GrinderError;
use crate::grind::{Effect, GrindInputs, GrindProcess, GrinderCommand, TickOutcome};
use crate::history::WeightHistory;
use crate::hw_error::map_hw_error;
use crate::input::InputDispatcher;
use crate::menu::{MenuAction, MenuNavigator, MenuOutcome};
use crate::procedures::{self, Procedure, ProcedureIo};
use crate::profile::{CalibrationProfile, ProfileField};
use crate::sampler::{Reading, SamplerFlags};
use crate::status::{DisplayGuard, ProcessState, StatusBoard, StatusSnapshot};
use crate::util::{elapsed_ms, window_start};

/// Residual weight after the startup tare that triggers a second tare.
const STARTUP_DRIFT_G: f64 = 0.5;
const ERROR_SCREEN_MS: u64 = 2000;

/// The hardware the control task owns.
pub struct Devices<L, A, R, S> {
    pub sensor: Arc<Mutex<L>>,
    pub actuator: A,
    pub input: R,
    pub store: S,
}

pub struct ControlState<L, A, R, S> {
    cfg: ControllerCfg,
    sensor: Arc<Mutex<L>>,
    actuator: A,
    input: R,
    store: S,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    rx: xch::Receiver<Reading>,
    flags: SamplerFlags,
    board: Arc<StatusBoard>,
    history: WeightHistory,
    weight_g: f64,
    sensor_ready: bool,
    profile: CalibrationProfile,
    state: ProcessState,
    grind: GrindProcess,
    dispatcher: InputDispatcher,
    navigator: MenuNavigator,
    last_activity_ms: u64,
}

impl<L, A, R, S> ControlState<L, A, R, S>
where
    L: LoadCell,
    A: Actuator,
    R: RotaryInput,
    S: SettingsStore,
{
    pub fn new(
        cfg: ControllerCfg,
        devices: Devices<L, A, R, S>,
        clock: Arc<dyn Clock + Send + Sync>,
        epoch: Instant,
        rx: xch::Receiver<Reading>,
        flags: SamplerFlags,
        board: Arc<StatusBoard>,
    ) -> Self {
        let profile = CalibrationProfile::load(&devices.store, &cfg.defaults);
        let grind = GrindProcess::new(
            cfg.grind.clone(),
            cfg.auto_tare.clone(),
            cfg.defaults.offset_g,
        );
        let dispatcher = InputDispatcher::new(cfg.input.clone());
        let navigator = MenuNavigator::new(cfg.menu.clone(), &cfg.input, cfg.defaults.clone());
        let history = WeightHistory::new(cfg.filter.history_capacity);
        Self {
            cfg,
            sensor: devices.sensor,
            actuator: devices.actuator,
            input: devices.input,
            store: devices.store,
            clock,
            epoch,
            rx,
            flags,
            board,
            history,
            weight_g: 0.0,
            sensor_ready: false,
            profile,
            state: ProcessState::Empty,
            grind,
            dispatcher,
            navigator,
            last_activity_ms: 0,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    pub const fn state(&self) -> ProcessState {
        self.state
    }

    pub const fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    pub const fn history(&self) -> &WeightHistory {
        &self.history
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn weight_g(&self) -> f64 {
        self.weight_g
    }

    /// Apply the stored calibration, tare (twice if the first leaves drift),
    /// make sure the grinder is off.
    pub fn startup(&mut self) -> Result<(), GrinderError> {
        let samples = self.cfg.menu.tare_samples;
        {
            let mut cell = self.lock_sensor()?;
            cell.set_scale_factor(self.profile.scale_factor)
                .map_err(|e| map_hw_error(&*e))?;
            cell.tare(samples).map_err(|e| map_hw_error(&*e))?;
        }
        let residual = self.read_direct(samples).map_err(|e| map_hw_error(&*e))?;
        if residual.abs() > STARTUP_DRIFT_G {
            tracing::warn!(residual_g = residual, "drift after tare, taring again");
            self.lock_sensor()?
                .tare(samples)
                .map_err(|e| map_hw_error(&*e))?;
        }

        if let Err(e) = self.actuator.set_active(false) {
            tracing::warn!(error = %map_hw_error(&*e), "could not switch grinder off");
        }
        self.input
            .set_acceleration(self.cfg.input.default_acceleration);
        self.dispatcher.resync(&mut self.input);

        self.flags.request_filter_reset();
        self.drain_readings();
        self.history.clear();
        self.weight_g = 0.0;
        let now = self.now_ms();
        self.grind.note_tare(now);
        self.last_activity_ms = now;
        tracing::info!(scale_factor = self.profile.scale_factor, "scale ready");
        self.publish();
        Ok(())
    }

    pub fn tick(&mut self) {
        self.drain_readings();
        let now = self.now_ms();

        let activity_avg = self
            .history
            .average_since(window_start(now, self.cfg.grind.activity_window_ms));
        if (activity_avg - self.weight_g).abs() > self.cfg.grind.significant_change_g {
            self.last_activity_ms = now;
        }

        let events = self.dispatcher.poll(&mut self.input, now);
        if !events.is_empty() {
            self.last_activity_ms = now;
        }
        for ev in events {
            let outcome = self.navigator.handle(ev, self.state, &mut self.profile);
            self.apply_menu(outcome);
        }

        let outcome = self.grind.tick(
            self.state,
            &GrindInputs {
                now_ms: self.now_ms(),
                weight_g: self.weight_g,
                sensor_ready: self.sensor_ready,
                history: &self.history,
                profile: &self.profile,
            },
        );
        self.apply_grind(outcome);
        self.publish();
    }

    /// Make sure the grinder is stopped; safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.grind.engaged() {
            let outcome = self.grind.cancel(self.now_ms());
            self.apply_grind(outcome);
        }
        if let Err(e) = self.actuator.set_active(false) {
            tracing::warn!(error = %map_hw_error(&*e), "could not switch grinder off");
        }
        self.publish();
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let now = self.now_ms();
        let session = self.grind.session().copied();
        StatusSnapshot {
            state: self.state,
            weight_g: self.weight_g,
            sensor_ready: self.sensor_ready,
            profile: self.profile.clone(),
            session,
            fail_reason: self.grind.fail_reason(),
            menu: self.navigator.context(),
            diagnostic_mode: self.navigator.diagnostics(),
            display_asleep: self.display_asleep(now),
            grind_elapsed_ms: session.and_then(|s| s.elapsed_ms(now)),
            dose_g: session.map(|s| self.weight_g - s.cup_empty_weight_g),
            now_ms: now,
        }
    }

    fn display_asleep(&self, now_ms: u64) -> bool {
        self.state != ProcessState::GrindingInProgress
            && elapsed_ms(now_ms, self.last_activity_ms) > u64::from(self.profile.sleep_timeout_ms)
    }

    fn publish(&self) {
        self.board.publish(self.snapshot());
    }

    fn drain_readings(&mut self) {
        for reading in self.rx.try_iter() {
            match reading {
                Reading::Sample { ts_ms, grams } => {
                    self.history.push(ts_ms, grams);
                    self.weight_g = grams;
                    if !self.sensor_ready {
                        tracing::info!("load cell ready");
                    }
                    self.sensor_ready = true;
                }
                Reading::NotReady { .. } => {
                    if self.sensor_ready {
                        tracing::warn!("load cell not responding");
                    }
                    self.sensor_ready = false;
                }
            }
        }
    }

    fn lock_sensor(&self) -> Result<std::sync::MutexGuard<'_, L>, GrinderError> {
        self.sensor
            .lock()
            .map_err(|_| GrinderError::State("load cell mutex poisoned".into()))
    }

    fn read_direct(&self, samples: u32) -> Result<f64, BoxError> {
        let timeout = Duration::from_millis(self.cfg.timeouts.sensor_ms);
        let mut cell = self
            .sensor
            .lock()
            .map_err(|_| BoxError::from("load cell mutex poisoned"))?;
        let mut sum = 0.0;
        let mut n = 0_u32;
        for _ in 0..samples.max(1) {
            if let Some(g) = cell.try_read_grams(timeout)? {
                sum += g;
                n += 1;
            }
        }
        if n == 0 {
            return Err(GrinderError::Timeout.into());
        }
        Ok(sum / f64::from(n))
    }

    fn tare_now(&mut self) {
        let samples = self.cfg.auto_tare.samples;
        let res = self
            .lock_sensor()
            .and_then(|mut cell| cell.tare(samples).map_err(|e| map_hw_error(&*e)));
        match res {
            Ok(()) => {
                tracing::info!("scale tared");
                let now = self.now_ms();
                self.grind.note_tare(now);
            }
            Err(e) => tracing::warn!(error = %e, "tare failed"),
        }
    }

    fn persist(&mut self, field: ProfileField) {
        if let Err(e) = self.profile.persist(&mut self.store, field) {
            tracing::warn!(error = %e, "setting not saved");
        }
    }

    fn transition(&mut self, next: ProcessState) {
        if next != self.state {
            tracing::info!(from = self.state.as_str(), to = next.as_str(), "state change");
            self.state = next;
        }
    }

    fn drive_grinder(&mut self, cmd: GrinderCommand) {
        if self.profile.scale_mode {
            return;
        }
        let res = if self.profile.grind_mode {
            self.actuator.set_active(cmd == GrinderCommand::Start)
        } else {
            // Impulse mode: every pulse toggles the grinder.
            self.actuator.set_active(true).and_then(|()| {
                self.clock
                    .sleep(Duration::from_millis(self.cfg.grind.impulse_ms));
                self.actuator.set_active(false)
            })
        };
        match res {
            Ok(()) => tracing::info!(?cmd, continuous = self.profile.grind_mode, "grinder"),
            Err(e) => tracing::error!(?cmd, error = %map_hw_error(&*e), "grinder command failed"),
        }
    }

    fn apply_grind(&mut self, outcome: TickOutcome) {
        for effect in outcome.effects {
            match effect {
                Effect::Grinder(cmd) => self.drive_grinder(cmd),
                Effect::Tare => self.tare_now(),
                Effect::LearnedOffset {
                    offset_g,
                    shot_count,
                } => {
                    self.profile.offset_g = offset_g;
                    self.profile.shot_count = shot_count;
                    self.persist(ProfileField::Offset);
                    self.persist(ProfileField::ShotCount);
                }
            }
        }
        if let Some(next) = outcome.next {
            self.transition(next);
        }
    }

    fn apply_menu(&mut self, outcome: MenuOutcome) {
        if let Some(next) = outcome.next {
            self.transition(next);
        }
        for action in outcome.actions {
            match action {
                MenuAction::Persist(field) => self.persist(field),
                MenuAction::SetAcceleration(a) => self.input.set_acceleration(a),
                MenuAction::RunProcedure(p) => {
                    self.publish();
                    self.run_procedure(p);
                    let next = self.navigator.finish_procedure();
                    self.transition(next);
                }
                MenuAction::Tare => self.tare_now(),
                MenuAction::CancelGrind => {
                    let o = self.grind.cancel(self.now_ms());
                    self.apply_grind(o);
                }
                MenuAction::AcknowledgeFailure => {
                    let o = self.grind.acknowledge_failure();
                    self.apply_grind(o);
                }
                MenuAction::DiagnosticsChanged(on) => self.flags.set_diagnostics(on),
            }
        }
    }

    fn run_procedure(&mut self, procedure: Procedure) {
        let board = Arc::clone(&self.board);
        let guard = board.lock_display();
        let menu_cfg = self.cfg.menu.clone();
        let min_cup_g = self.cfg.grind.cup_tolerance_g;
        let previous_factor = self.profile.scale_factor;
        tracing::info!(?procedure, "procedure started");

        let result = {
            let mut io = ProcedureSession {
                ctl: self,
                guard: &guard,
            };
            match procedure {
                Procedure::CupWeight => procedures::measure_cup_weight(&mut io, &menu_cfg, min_cup_g),
                Procedure::Calibration => procedures::calibrate(&mut io, &menu_cfg, previous_factor),
            }
        };

        match (procedure, result) {
            (Procedure::CupWeight, Ok(cup)) => {
                self.profile.cup_weight_g = cup;
                self.persist(ProfileField::CupWeight);
            }
            (Procedure::Calibration, Ok(factor)) => {
                self.profile.scale_factor = factor;
                self.persist(ProfileField::ScaleFactor);
                let now = self.now_ms();
                self.grind.note_tare(now);
            }
            (_, Err(e)) => {
                tracing::warn!(?procedure, error = %e, "procedure failed");
                guard.set_prompt(format!("Failed:\n{e}"));
                self.clock.sleep(Duration::from_millis(ERROR_SCREEN_MS));
            }
        }
        self.dispatcher.resync(&mut self.input);
        self.last_activity_ms = self.now_ms();
    }
}

/// `ProcedureIo` over the control task, valid while the display is held.
struct ProcedureSession<'c, 'g, L, A, R, S> {
    ctl: &'c mut ControlState<L, A, R, S>,
    guard: &'g DisplayGuard<'g>,
}

impl<L, A, R, S> ProcedureIo for ProcedureSession<'_, '_, L, A, R, S>
where
    L: LoadCell,
    A: Actuator,
    R: RotaryInput,
    S: SettingsStore,
{
    fn now_ms(&self) -> u64 {
        self.ctl.now_ms()
    }

    fn sleep_ms(&self, ms: u64) {
        self.ctl.clock.sleep(Duration::from_millis(ms));
    }

    fn refresh(&mut self) -> f64 {
        self.ctl.drain_readings();
        self.ctl.weight_g
    }

    fn history(&self) -> &WeightHistory {
        &self.ctl.history
    }

    fn take_click(&mut self) -> bool {
        self.ctl.input.is_button_clicked()
    }

    fn prompt(&mut self, text: &str) {
        self.guard.set_prompt(text);
    }

    fn tare(&mut self, samples: u32) -> Result<(), BoxError> {
        self.ctl
            .sensor
            .lock()
            .map_err(|_| BoxError::from("load cell mutex poisoned"))?
            .tare(samples)
    }

    fn set_scale_factor(&mut self, factor: f64) -> Result<(), BoxError> {
        self.ctl
            .sensor
            .lock()
            .map_err(|_| BoxError::from("load cell mutex poisoned"))?
            .set_scale_factor(factor)
    }

    fn read_direct(&mut self, samples: u32) -> Result<f64, BoxError> {
        self.ctl.read_direct(samples)
    }

    fn reset_filter(&mut self) {
        self.ctl.flags.request_filter_reset();
        self.ctl.drain_readings();
        self.ctl.history.clear();
    }
}
