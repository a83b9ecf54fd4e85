//! The running controller: acquisition thread plus control loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use grinder_traits::clock::Clock;
use grinder_traits::{Actuator, LoadCell, RotaryInput, SettingsStore};

use crate::builder::ControllerBuilder;
use crate::control::ControlState;
use crate::error::Result;
use crate::sampler::Sampler;
use crate::status::{StatusBoard, StatusSnapshot};

pub struct Controller<L, A, R, S> {
    control: ControlState<L, A, R, S>,
    board: Arc<StatusBoard>,
    clock: Arc<dyn Clock + Send + Sync>,
    tick: Duration,
    // Dropped last: joins the acquisition thread.
    _sampler: Sampler,
}

impl<L, A, R, S> Controller<L, A, R, S>
where
    L: LoadCell,
    A: Actuator,
    R: RotaryInput,
    S: SettingsStore,
{
    pub fn builder() -> ControllerBuilder<L, A, R, S> {
        ControllerBuilder::default()
    }

    pub(crate) fn from_parts(
        control: ControlState<L, A, R, S>,
        sampler: Sampler,
        board: Arc<StatusBoard>,
        clock: Arc<dyn Clock + Send + Sync>,
        tick: Duration,
    ) -> Self {
        Self {
            control,
            board,
            clock,
            tick,
            _sampler: sampler,
        }
    }

    /// Shared handle for renderers.
    pub fn status(&self) -> Arc<StatusBoard> {
        Arc::clone(&self.board)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.board.snapshot()
    }

    pub const fn control(&self) -> &ControlState<L, A, R, S> {
        &self.control
    }

    pub fn startup(&mut self) -> Result<()> {
        self.control.startup()?;
        Ok(())
    }

    pub fn tick(&mut self) {
        self.control.tick();
    }

    /// Tick until `stop` is set, then switch the grinder off.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        self.startup()?;
        while !stop.load(Ordering::Relaxed) {
            self.control.tick();
            self.clock.sleep(self.tick);
        }
        tracing::info!("stopping controller");
        self.control.shutdown();
        Ok(())
    }

    /// Like `run`, but also returns once `limit` has elapsed on the clock.
    pub fn run_for(&mut self, limit: Duration, stop: &AtomicBool) -> Result<()> {
        self.startup()?;
        let start = self.clock.now();
        while !stop.load(Ordering::Relaxed)
            && self.clock.now().saturating_duration_since(start) < limit
        {
            self.control.tick();
            self.clock.sleep(self.tick);
        }
        self.control.shutdown();
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.control.shutdown();
    }
}
