#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Grind-by-weight controller logic (hardware-agnostic).
//!
//! All hardware goes through `grinder_traits`: `LoadCell`, `Actuator`,
//! `RotaryInput` and `SettingsStore`.
//!
//! ## Architecture
//!
//! - **Acquisition**: a background thread reads the load cell, filters and
//!   timestamps readings (`sampler`, `filter`)
//! - **History**: bounded window of recent weights with window queries (`history`)
//! - **Grinding**: cup detection, stop at target, failure detection, offset
//!   learning and auto-tare (`grind`)
//! - **Input and menu**: click/rotate gestures and the settings menu (`input`, `menu`)
//! - **Procedures**: guided cup weighing and calibration (`procedures`)
//! - **Control**: the single owner of mutable state, ticked periodically (`control`)
//! - **Status**: snapshots published for display (`status`)
//!
//! Timestamps are milliseconds since the controller's epoch, taken from an
//! injected `Clock`.

pub mod builder;
pub mod config;
pub mod control;
pub mod conversions;
pub mod error;
pub mod filter;
pub mod grind;
pub mod history;
pub mod hw_error;
pub mod input;
pub mod menu;
pub mod mocks;
pub mod procedures;
pub mod profile;
pub mod runner;
pub mod sampler;
pub mod status;
pub mod util;

pub use builder::ControllerBuilder;
pub use config::ControllerCfg;
pub use control::{ControlState, Devices};
pub use error::{BuildError, FailReason, GrinderError, ProcedureError, Result};
pub use grind::{GrindProcess, GrindSession};
pub use history::{WeightHistory, WeightSample};
pub use input::InputEvent;
pub use menu::MenuItem;
pub use profile::CalibrationProfile;
pub use runner::Controller;
pub use sampler::Reading;
pub use status::{ProcessState, StatusBoard, StatusSnapshot};
