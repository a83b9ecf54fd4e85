//! Hardware adapters for the grinder controller.
//!
//! The simulated bench is always available. GPIO drivers (HX711 load cell,
//! relay, rotary encoder) need the `hardware` feature and a Raspberry Pi.

pub mod error;
pub mod sim;
pub mod util;

#[cfg(feature = "hardware")]
pub mod encoder;
#[cfg(feature = "hardware")]
pub mod hx711;
#[cfg(feature = "hardware")]
pub mod relay;

pub use sim::{SimBench, SimEncoder, SimGrinder, SimLoadCell, SimParams};

#[cfg(feature = "hardware")]
pub use encoder::GpioEncoder;
#[cfg(feature = "hardware")]
pub use hx711::{Hx711, Hx711LoadCell};
#[cfg(feature = "hardware")]
pub use relay::RelayActuator;
