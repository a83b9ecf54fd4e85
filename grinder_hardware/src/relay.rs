//! Grinder relay on one GPIO output.

use grinder_traits::{Actuator, BoxError};
use rppal::gpio::{Gpio, OutputPin};

use crate::error::{HwError, Result};

pub struct RelayActuator {
    pin: OutputPin,
    active_high: bool,
    active: bool,
}

impl RelayActuator {
    /// Claims the pin and drives it to the inactive level.
    pub fn open(pin: u8, active_high: bool) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = gpio
            .get(pin)
            .map_err(|e| HwError::Gpio(format!("relay pin {pin}: {e}")))?;
        let pin = if active_high {
            pin.into_output_low()
        } else {
            pin.into_output_high()
        };
        tracing::info!(active_high, "grinder relay initialized (off)");
        Ok(Self {
            pin,
            active_high,
            active: false,
        })
    }
}

impl Actuator for RelayActuator {
    fn set_active(&mut self, active: bool) -> std::result::Result<(), BoxError> {
        if active == self.active_high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        if active != self.active {
            tracing::debug!(active, "relay");
        }
        self.active = active;
        Ok(())
    }
}

impl Drop for RelayActuator {
    fn drop(&mut self) {
        // Never leave the grinder running.
        let _ = self.set_active(false);
    }
}
