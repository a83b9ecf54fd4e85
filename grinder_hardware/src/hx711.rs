//! HX711 24-bit load-cell ADC, bit-banged over two GPIO lines.

use std::time::{Duration, Instant};
use tracing::trace;

use grinder_traits::{BoxError, LoadCell};
use rppal::gpio::{Gpio, InputPin, OutputPin};

use crate::error::{HwError, Result};
use crate::util::{sign_extend_24, wait_until_low_with_timeout};

/// 25 pulses: channel A, gain 128.
pub const GAIN_A_128: u8 = 25;
const TARE_READ_TIMEOUT: Duration = Duration::from_millis(500);

pub struct Hx711 {
    dt: InputPin,
    sck: OutputPin,
    gain_pulses: u8, // 25, 26, 27 based on gain/channel
}

impl Hx711 {
    pub fn new(dt_pin: InputPin, mut sck_pin: OutputPin, gain_pulses: u8) -> Self {
        sck_pin.set_low(); // clock idle low
        Self {
            dt: dt_pin,
            sck: sck_pin,
            gain_pulses,
        }
    }

    pub fn open(dt: u8, sck: u8, gain_pulses: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let dt = gpio
            .get(dt)
            .map_err(|e| HwError::Gpio(format!("hx711 dt pin {dt}: {e}")))?
            .into_input();
        let sck = gpio
            .get(sck)
            .map_err(|e| HwError::Gpio(format!("hx711 sck pin {sck}: {e}")))?
            .into_output_low();
        Ok(Self::new(dt, sck, gain_pulses))
    }

    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<i32> {
        // Data is ready when DT goes low.
        let dt = &self.dt;
        wait_until_low_with_timeout(|| dt.is_high(), timeout, Duration::from_micros(200))?;

        let mut value: u32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            spin_delay_100ns();
            value = (value << 1) | u32::from(self.dt.is_high());
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Extra pulses select gain and channel of the next conversion.
        for _ in 24..self.gain_pulses {
            self.sck.set_high();
            spin_delay_100ns();
            self.sck.set_low();
            spin_delay_100ns();
        }

        let raw = sign_extend_24(value);
        trace!(raw, "hx711 raw read");
        Ok(raw)
    }

    fn mean_raw(&mut self, samples: u32, timeout: Duration) -> Result<f64> {
        let n = samples.max(1);
        let mut sum = 0_i64;
        for _ in 0..n {
            sum += i64::from(self.read_with_timeout(timeout)?);
        }
        Ok(sum as f64 / f64::from(n))
    }
}

#[inline(always)]
fn spin_delay_100ns() {
    std::hint::spin_loop();
}

/// `LoadCell` over an HX711: averages `samples_per_read` conversions and
/// converts with `(raw - tare) / scale_factor`.
pub struct Hx711LoadCell {
    adc: Hx711,
    tare_raw: f64,
    scale_factor: f64,
    samples_per_read: u32,
}

impl Hx711LoadCell {
    pub fn new(adc: Hx711, samples_per_read: u32) -> Self {
        Self {
            adc,
            tare_raw: 0.0,
            scale_factor: 1.0,
            samples_per_read: samples_per_read.max(1),
        }
    }
}

impl LoadCell for Hx711LoadCell {
    fn try_read_grams(&mut self, timeout: Duration) -> std::result::Result<Option<f64>, BoxError> {
        let start = Instant::now();
        match self.adc.mean_raw(self.samples_per_read, timeout) {
            Ok(raw) => Ok(Some((raw - self.tare_raw) / self.scale_factor)),
            Err(HwError::DataReadyTimeout | HwError::Timeout) => {
                trace!(waited = ?start.elapsed(), "hx711 not ready");
                Ok(None)
            }
            Err(e) => Err(Box::new(e)),
        }
    }

    fn tare(&mut self, samples: u32) -> std::result::Result<(), BoxError> {
        self.tare_raw = self.adc.mean_raw(samples, TARE_READ_TIMEOUT)?;
        tracing::debug!(tare_raw = self.tare_raw, "hx711 tared");
        Ok(())
    }

    fn set_scale_factor(&mut self, factor: f64) -> std::result::Result<(), BoxError> {
        if !factor.is_finite() || factor == 0.0 {
            return Err(Box::new(HwError::InvalidScaleFactor(factor)));
        }
        self.scale_factor = factor;
        Ok(())
    }
}
