pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Error type used at every hardware/storage trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Load cell behind an ADC (HX711 or simulated).
pub trait LoadCell {
    /// Wait up to `timeout` for the converter to report data-ready and return
    /// the reading in grams. `Ok(None)` means the driver was not ready in time.
    fn try_read_grams(&mut self, timeout: Duration) -> Result<Option<f64>, BoxError>;
    /// Zero the baseline, averaging `samples` conversions.
    fn tare(&mut self, samples: u32) -> Result<(), BoxError>;
    fn set_scale_factor(&mut self, factor: f64) -> Result<(), BoxError>;
}

/// Grinder relay. Must be safe to call every tick with the same value.
pub trait Actuator {
    fn set_active(&mut self, active: bool) -> Result<(), BoxError>;
}

/// Rotary encoder with push button.
pub trait RotaryInput {
    /// Accumulated ticks, direction-sensitive.
    fn read_counter(&mut self) -> i32;
    /// True once per completed click.
    fn is_button_clicked(&mut self) -> bool;
    /// Level of the button right now. Encoders without a readable level report `false`.
    fn is_button_down(&self) -> bool {
        false
    }
    fn set_acceleration(&mut self, acceleration: u32);
}

/// Durable scalar key-value storage grouped by namespace. Last write wins.
pub trait SettingsStore {
    fn get_f64(&self, namespace: &str, key: &str) -> Option<f64>;
    fn get_bool(&self, namespace: &str, key: &str) -> Option<bool>;
    fn get_u32(&self, namespace: &str, key: &str) -> Option<u32>;
    fn get_i32(&self, namespace: &str, key: &str) -> Option<i32>;

    fn put_f64(&mut self, namespace: &str, key: &str, value: f64) -> Result<(), BoxError>;
    fn put_bool(&mut self, namespace: &str, key: &str, value: bool) -> Result<(), BoxError>;
    fn put_u32(&mut self, namespace: &str, key: &str, value: u32) -> Result<(), BoxError>;
    fn put_i32(&mut self, namespace: &str, key: &str, value: i32) -> Result<(), BoxError>;
}

impl<T: LoadCell + ?Sized> LoadCell for Box<T> {
    fn try_read_grams(&mut self, timeout: Duration) -> Result<Option<f64>, BoxError> {
        (**self).try_read_grams(timeout)
    }
    fn tare(&mut self, samples: u32) -> Result<(), BoxError> {
        (**self).tare(samples)
    }
    fn set_scale_factor(&mut self, factor: f64) -> Result<(), BoxError> {
        (**self).set_scale_factor(factor)
    }
}

impl<T: Actuator + ?Sized> Actuator for Box<T> {
    fn set_active(&mut self, active: bool) -> Result<(), BoxError> {
        (**self).set_active(active)
    }
}

impl<T: RotaryInput + ?Sized> RotaryInput for Box<T> {
    fn read_counter(&mut self) -> i32 {
        (**self).read_counter()
    }
    fn is_button_clicked(&mut self) -> bool {
        (**self).is_button_clicked()
    }
    fn is_button_down(&self) -> bool {
        (**self).is_button_down()
    }
    fn set_acceleration(&mut self, acceleration: u32) {
        (**self).set_acceleration(acceleration);
    }
}

impl<T: SettingsStore + ?Sized> SettingsStore for Box<T> {
    fn get_f64(&self, namespace: &str, key: &str) -> Option<f64> {
        (**self).get_f64(namespace, key)
    }
    fn get_bool(&self, namespace: &str, key: &str) -> Option<bool> {
        (**self).get_bool(namespace, key)
    }
    fn get_u32(&self, namespace: &str, key: &str) -> Option<u32> {
        (**self).get_u32(namespace, key)
    }
    fn get_i32(&self, namespace: &str, key: &str) -> Option<i32> {
        (**self).get_i32(namespace, key)
    }
    fn put_f64(&mut self, namespace: &str, key: &str, value: f64) -> Result<(), BoxError> {
        (**self).put_f64(namespace, key, value)
    }
    fn put_bool(&mut self, namespace: &str, key: &str, value: bool) -> Result<(), BoxError> {
        (**self).put_bool(namespace, key, value)
    }
    fn put_u32(&mut self, namespace: &str, key: &str, value: u32) -> Result<(), BoxError> {
        (**self).put_u32(namespace, key, value)
    }
    fn put_i32(&mut self, namespace: &str, key: &str, value: i32) -> Result<(), BoxError> {
        (**self).put_i32(namespace, key, value)
    }
}
