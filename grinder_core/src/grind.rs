//! Weight-triggered grinding lifecycle.
//!
//! `GrindProcess::tick` is a pure transition function over the current
//! `ProcessState` and the latest weight data. It never touches hardware:
//! side effects come back as `Effect`s for the control task to apply.

use crate::config::{AutoTareCfg, GrindCfg};
use crate::error::FailReason;
use crate::history::WeightHistory;
use crate::profile::CalibrationProfile;
use crate::status::ProcessState;
use crate::util::{elapsed_ms, window_start};

/// Per-shot data; exists from cup detection until the return to `Empty`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrindSession {
    pub target_weight_g: f64,
    pub offset_g: f64,
    pub cup_empty_weight_g: f64,
    pub started_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,
}

impl GrindSession {
    pub fn elapsed_ms(&self, now_ms: u64) -> Option<u64> {
        let start = self.started_at_ms?;
        Some(elapsed_ms(self.finished_at_ms.unwrap_or(now_ms), start))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrinderCommand {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    Grinder(GrinderCommand),
    Tare,
    /// New offset and shot count, to be stored.
    LearnedOffset { offset_g: f64, shot_count: u32 },
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickOutcome {
    pub next: Option<ProcessState>,
    pub effects: Vec<Effect>,
}

impl TickOutcome {
    fn stay() -> Self {
        Self::default()
    }

    fn to(next: ProcessState) -> Self {
        Self {
            next: Some(next),
            effects: Vec::new(),
        }
    }
}

/// What the process sees on each tick.
#[derive(Debug, Clone, Copy)]
pub struct GrindInputs<'a> {
    pub now_ms: u64,
    pub weight_g: f64,
    pub sensor_ready: bool,
    pub history: &'a WeightHistory,
    pub profile: &'a CalibrationProfile,
}

#[derive(Debug, Clone)]
pub struct GrindProcess {
    cfg: GrindCfg,
    auto_tare: AutoTareCfg,
    factory_offset_g: f64,
    session: Option<GrindSession>,
    offset_pending: bool,
    fail_reason: Option<FailReason>,
    drift_since_ms: Option<u64>,
    last_tare_ms: u64,
    engaged: bool,
    waiting_logged: bool,
}

impl GrindProcess {
    pub fn new(cfg: GrindCfg, auto_tare: AutoTareCfg, factory_offset_g: f64) -> Self {
        Self {
            cfg,
            auto_tare,
            factory_offset_g,
            session: None,
            offset_pending: false,
            fail_reason: None,
            drift_since_ms: None,
            last_tare_ms: 0,
            engaged: false,
            waiting_logged: false,
        }
    }

    pub const fn session(&self) -> Option<&GrindSession> {
        self.session.as_ref()
    }

    pub const fn fail_reason(&self) -> Option<FailReason> {
        self.fail_reason
    }

    /// True while the grinder has been told to run.
    pub const fn engaged(&self) -> bool {
        self.engaged
    }

    /// Record a tare issued outside the process (startup, manual).
    pub fn note_tare(&mut self, now_ms: u64) {
        self.last_tare_ms = now_ms;
        self.drift_since_ms = None;
    }

    pub fn tick(&mut self, state: ProcessState, inp: &GrindInputs<'_>) -> TickOutcome {
        match state {
            ProcessState::Empty => self.tick_empty(inp),
            ProcessState::GrindingInProgress => self.tick_in_progress(inp),
            ProcessState::GrindingFinished => self.tick_finished(inp),
            ProcessState::GrindingFailed => self.tick_failed(inp),
            ProcessState::InMenu | ProcessState::InSubmenu | ProcessState::InfoMenu => {
                self.drift_since_ms = None;
                TickOutcome::stay()
            }
        }
    }

    /// User aborted an active grind.
    pub fn cancel(&mut self, now_ms: u64) -> TickOutcome {
        tracing::info!(now_ms, "grind cancelled");
        self.fail(FailReason::Cancelled)
    }

    /// Leave `GrindingFailed` on explicit input.
    pub fn acknowledge_failure(&mut self) -> TickOutcome {
        tracing::debug!(reason = ?self.fail_reason, "failure acknowledged");
        self.clear();
        TickOutcome::to(ProcessState::Empty)
    }

    fn clear(&mut self) {
        self.session = None;
        self.offset_pending = false;
        self.fail_reason = None;
        self.waiting_logged = false;
    }

    fn stop_effects(&mut self) -> Vec<Effect> {
        if self.engaged {
            self.engaged = false;
            vec![Effect::Grinder(GrinderCommand::Stop)]
        } else {
            Vec::new()
        }
    }

    fn fail(&mut self, reason: FailReason) -> TickOutcome {
        tracing::warn!(%reason, "grinding failed");
        self.fail_reason = Some(reason);
        self.offset_pending = false;
        TickOutcome {
            next: Some(ProcessState::GrindingFailed),
            effects: self.stop_effects(),
        }
    }

    fn tick_empty(&mut self, inp: &GrindInputs<'_>) -> TickOutcome {
        let mut out = TickOutcome::stay();
        let now = inp.now_ms;
        if !inp.sensor_ready {
            self.drift_since_ms = None;
            return out;
        }

        if self.auto_tare.enabled {
            let avg = inp
                .history
                .average_since(window_start(now, self.auto_tare.average_window_ms));
            let drifting = elapsed_ms(now, self.last_tare_ms) > self.auto_tare.min_interval_ms
                && avg.abs() > self.auto_tare.min_drift_g
                && avg < self.auto_tare.band_g
                && inp.weight_g < self.auto_tare.band_g;
            if drifting {
                let since = *self.drift_since_ms.get_or_insert(now);
                if elapsed_ms(now, since) >= self.auto_tare.hold_ms {
                    tracing::info!(drift_g = avg, "auto-tare");
                    out.effects.push(Effect::Tare);
                    self.note_tare(now);
                }
            } else {
                self.drift_since_ms = None;
            }
        }

        let from = window_start(now, self.cfg.cup_detect_window_ms);
        if !inp.history.covers(from) {
            return out;
        }
        let (Some(min), Some(max)) = (inp.history.min_since(from), inp.history.max_since(from))
        else {
            return out;
        };
        let cup = inp.profile.cup_weight_g;
        let tol = self.cfg.cup_tolerance_g;
        if (min - cup).abs() >= tol || (max - cup).abs() >= tol {
            return out;
        }

        let cup_empty = inp
            .history
            .average_since(window_start(now, self.cfg.cup_snapshot_window_ms));
        let timer_only = inp.profile.scale_mode;
        self.clear();
        self.drift_since_ms = None;
        self.session = Some(GrindSession {
            target_weight_g: inp.profile.target_weight_g,
            offset_g: inp.profile.offset_g,
            cup_empty_weight_g: cup_empty,
            started_at_ms: (!timer_only).then_some(now),
            finished_at_ms: None,
        });
        tracing::info!(cup_empty_g = cup_empty, timer_only, "cup detected");
        if !timer_only {
            self.offset_pending = true;
            self.engaged = true;
            out.effects.push(Effect::Grinder(GrinderCommand::Start));
        }
        out.next = Some(ProcessState::GrindingInProgress);
        out
    }

    fn tick_in_progress(&mut self, inp: &GrindInputs<'_>) -> TickOutcome {
        let now = inp.now_ms;
        let timer_only = inp.profile.scale_mode;
        let Some(mut session) = self.session else {
            tracing::warn!("grinding without a session, returning to idle");
            self.clear();
            return TickOutcome {
                next: Some(ProcessState::Empty),
                effects: self.stop_effects(),
            };
        };

        if inp.weight_g <= 0.0 {
            return self.fail(FailReason::NonPositiveWeight);
        }
        if !inp.sensor_ready {
            return self.fail(FailReason::SensorNotReady);
        }

        if timer_only
            && session.started_at_ms.is_none()
            && inp.weight_g - session.cup_empty_weight_g >= self.cfg.timer_start_delta_g
        {
            session.started_at_ms = Some(now);
            self.session = Some(session);
            tracing::debug!(now_ms = now, "timer started");
            return TickOutcome::stay();
        }

        if !timer_only {
            let elapsed = session.elapsed_ms(now).unwrap_or(0);
            if elapsed > self.cfg.max_grinding_ms {
                return self.fail(FailReason::Timeout);
            }
            if elapsed > self.cfg.stall_window_ms {
                let back = window_start(now, self.cfg.stall_window_ms);
                let before = inp.history.first_value_older_than(back);
                if before.is_some_and(|b| inp.weight_g - b < self.cfg.stall_min_delta_g) {
                    return self.fail(FailReason::Stall);
                }
            }
            let recent_min = inp
                .history
                .min_since(window_start(now, self.cfg.removal_window_ms));
            if recent_min.is_some_and(|m| {
                m < session.cup_empty_weight_g - self.cfg.removal_tolerance_g
            }) {
                return self.fail(FailReason::CupRemoved);
            }
        }

        let effective_offset = if timer_only { 0.0 } else { session.offset_g };
        let stop_at = session.cup_empty_weight_g + session.target_weight_g + effective_offset;
        let recent_max = inp
            .history
            .max_since(window_start(now, self.cfg.finish_window_ms));
        if recent_max.is_some_and(|m| m >= stop_at) {
            session.finished_at_ms = Some(now);
            self.session = Some(session);
            self.waiting_logged = false;
            tracing::info!(
                stop_at_g = stop_at,
                elapsed_ms = session.elapsed_ms(now).unwrap_or(0),
                "target reached"
            );
            return TickOutcome {
                next: Some(ProcessState::GrindingFinished),
                effects: self.stop_effects(),
            };
        }
        TickOutcome::stay()
    }

    fn tick_finished(&mut self, inp: &GrindInputs<'_>) -> TickOutcome {
        let now = inp.now_ms;
        if inp.weight_g < self.cfg.cup_removed_g {
            tracing::debug!("cup removed after grind");
            self.clear();
            return TickOutcome::to(ProcessState::Empty);
        }
        let Some(session) = self.session else {
            return TickOutcome::to(ProcessState::Empty);
        };
        let finished_at = session.finished_at_ms.unwrap_or(now);
        let mut out = TickOutcome::stay();

        if self.offset_pending && elapsed_ms(now, finished_at) > self.cfg.settle_ms {
            let settled = inp
                .history
                .average_since(window_start(now, self.cfg.settle_window_ms));
            let miss = session.target_weight_g + session.cup_empty_weight_g - settled;
            self.offset_pending = false;
            if miss.abs() <= f64::EPSILON {
                tracing::debug!(settled_g = settled, "dose on target, offset unchanged");
            } else {
                let offset =
                    self.bounded_offset(inp.profile.offset_g + miss, session.target_weight_g);
                let shot_count = inp.profile.shot_count.saturating_add(1);
                tracing::info!(settled_g = settled, miss_g = miss, offset_g = offset, shot_count, "offset learned");
                out.effects.push(Effect::LearnedOffset {
                    offset_g: offset,
                    shot_count,
                });
            }
        }

        if elapsed_ms(now, finished_at) > self.cfg.idle_return_ms {
            if inp.weight_g < self.cfg.idle_weight_g {
                tracing::info!("grind finished, returning to idle");
                self.clear();
                out.next = Some(ProcessState::Empty);
            } else if !self.waiting_logged {
                tracing::info!(weight_g = inp.weight_g, "waiting for cup removal");
                self.waiting_logged = true;
            }
        }
        out
    }

    /// `|offset| < target` always holds for the returned value.
    fn bounded_offset(&self, offset_g: f64, target_g: f64) -> f64 {
        if offset_g.abs() < target_g {
            return offset_g;
        }
        let fallback = if self.factory_offset_g.abs() < target_g {
            self.factory_offset_g
        } else {
            0.0
        };
        tracing::warn!(offset_g, fallback_g = fallback, "learned offset out of range, resetting");
        fallback
    }

    fn tick_failed(&mut self, inp: &GrindInputs<'_>) -> TickOutcome {
        if inp.weight_g >= self.cfg.failed_reset_g {
            tracing::info!(weight_g = inp.weight_g, "failure reset by weight");
            self.clear();
            return TickOutcome::to(ProcessState::Empty);
        }
        TickOutcome::stay()
    }
}
