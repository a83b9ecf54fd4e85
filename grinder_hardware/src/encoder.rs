//! Rotary encoder with push button, decoded by a 1 kHz polling thread.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use grinder_traits::RotaryInput;
use rppal::gpio::{Gpio, InputPin};

use crate::error::{HwError, Result};
use crate::util::{accelerated_step, quadrature_step};

const POLL: Duration = Duration::from_millis(1);
const DEBOUNCE: Duration = Duration::from_millis(20);
/// Quadrature transitions per mechanical detent.
const STEPS_PER_DETENT: i32 = 4;

#[derive(Default)]
struct Shared {
    counter: AtomicI32,
    clicks: AtomicU32,
    down: AtomicBool,
    acceleration: AtomicU32,
    stop: AtomicBool,
}

pub struct GpioEncoder {
    shared: Arc<Shared>,
    join_handle: Option<JoinHandle<()>>,
}

fn input(gpio: &Gpio, pin: u8, what: &str) -> Result<InputPin> {
    Ok(gpio
        .get(pin)
        .map_err(|e| HwError::Gpio(format!("encoder {what} pin {pin}: {e}")))?
        .into_input_pullup())
}

impl GpioEncoder {
    pub fn open(pin_a: u8, pin_b: u8, pin_button: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let a = input(&gpio, pin_a, "a")?;
        let b = input(&gpio, pin_b, "b")?;
        let button = input(&gpio, pin_button, "button")?;

        let shared = Arc::new(Shared::default());
        let thread_shared = Arc::clone(&shared);
        let join_handle = std::thread::Builder::new()
            .name("encoder".into())
            .spawn(move || poll_loop(&thread_shared, &a, &b, &button))?;

        Ok(Self {
            shared,
            join_handle: Some(join_handle),
        })
    }
}

fn poll_loop(shared: &Shared, a: &InputPin, b: &InputPin, button: &InputPin) {
    let level = || (u8::from(a.is_high()) << 1) | u8::from(b.is_high());
    let mut prev = level();
    let mut sub_steps = 0_i32;
    let mut last_detent = Instant::now();
    let mut pressed = false;
    let mut changed_at = Instant::now();

    while !shared.stop.load(Ordering::Relaxed) {
        let cur = level();
        if cur != prev {
            sub_steps += i32::from(quadrature_step(prev, cur));
            prev = cur;
            if sub_steps.abs() >= STEPS_PER_DETENT {
                let now = Instant::now();
                let since = u64::try_from(now.duration_since(last_detent).as_millis()).unwrap_or(u64::MAX);
                let step = accelerated_step(shared.acceleration.load(Ordering::Relaxed), since);
                shared
                    .counter
                    .fetch_add(sub_steps.signum() * step, Ordering::Relaxed);
                sub_steps = 0;
                last_detent = now;
            }
        }

        // Button pulls the line low.
        let is_down = button.is_low();
        if is_down != pressed && changed_at.elapsed() >= DEBOUNCE {
            pressed = is_down;
            changed_at = Instant::now();
            shared.down.store(pressed, Ordering::Relaxed);
            if !pressed {
                shared.clicks.fetch_add(1, Ordering::Relaxed);
            }
        }
        std::thread::sleep(POLL);
    }
}

impl RotaryInput for GpioEncoder {
    fn read_counter(&mut self) -> i32 {
        self.shared.counter.load(Ordering::Relaxed)
    }

    fn is_button_clicked(&mut self) -> bool {
        self.shared
            .clicks
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    fn is_button_down(&self) -> bool {
        self.shared.down.load(Ordering::Relaxed)
    }

    fn set_acceleration(&mut self, acceleration: u32) {
        self.shared.acceleration.store(acceleration, Ordering::Relaxed);
    }
}

impl Drop for GpioEncoder {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            if handle.join().is_err() {
                tracing::warn!("encoder thread panicked");
            }
        }
    }
}
