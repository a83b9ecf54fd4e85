//! Test and helper mocks for grinder_core.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use grinder_traits::{Actuator, BoxError, LoadCell, RotaryInput, SettingsStore};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stored {
    F64(f64),
    Bool(bool),
    U32(u32),
    I32(i32),
}

/// In-memory settings store. `fail_writes` makes every put return an error.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<(String, String), Stored>,
    pub writes: usize,
    pub fail_writes: bool,
}

impl MemoryStore {
    fn put(&mut self, ns: &str, key: &str, v: Stored) -> Result<(), BoxError> {
        if self.fail_writes {
            return Err(Box::new(std::io::Error::other("store is read-only")));
        }
        self.writes += 1;
        self.values.insert((ns.to_string(), key.to_string()), v);
        Ok(())
    }

    fn get(&self, ns: &str, key: &str) -> Option<Stored> {
        self.values.get(&(ns.to_string(), key.to_string())).copied()
    }
}

impl SettingsStore for MemoryStore {
    fn get_f64(&self, ns: &str, key: &str) -> Option<f64> {
        match self.get(ns, key)? {
            Stored::F64(v) => Some(v),
            _ => None,
        }
    }
    fn get_bool(&self, ns: &str, key: &str) -> Option<bool> {
        match self.get(ns, key)? {
            Stored::Bool(v) => Some(v),
            _ => None,
        }
    }
    fn get_u32(&self, ns: &str, key: &str) -> Option<u32> {
        match self.get(ns, key)? {
            Stored::U32(v) => Some(v),
            _ => None,
        }
    }
    fn get_i32(&self, ns: &str, key: &str) -> Option<i32> {
        match self.get(ns, key)? {
            Stored::I32(v) => Some(v),
            _ => None,
        }
    }
    fn put_f64(&mut self, ns: &str, key: &str, value: f64) -> Result<(), BoxError> {
        self.put(ns, key, Stored::F64(value))
    }
    fn put_bool(&mut self, ns: &str, key: &str, value: bool) -> Result<(), BoxError> {
        self.put(ns, key, Stored::Bool(value))
    }
    fn put_u32(&mut self, ns: &str, key: &str, value: u32) -> Result<(), BoxError> {
        self.put(ns, key, Stored::U32(value))
    }
    fn put_i32(&mut self, ns: &str, key: &str, value: i32) -> Result<(), BoxError> {
        self.put(ns, key, Stored::I32(value))
    }
}

/// Load cell replaying a script of readings; repeats the last one when the
/// script runs out. `None` entries report "not ready".
#[derive(Debug, Default)]
pub struct ScriptedLoadCell {
    pub script: VecDeque<Option<f64>>,
    last: Option<f64>,
    pub tares: u32,
    pub scale_factors: Vec<f64>,
}

impl ScriptedLoadCell {
    pub fn new(script: impl IntoIterator<Item = Option<f64>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl LoadCell for ScriptedLoadCell {
    fn try_read_grams(&mut self, _timeout: Duration) -> Result<Option<f64>, BoxError> {
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        Ok(self.last)
    }

    fn tare(&mut self, _samples: u32) -> Result<(), BoxError> {
        self.tares += 1;
        Ok(())
    }

    fn set_scale_factor(&mut self, factor: f64) -> Result<(), BoxError> {
        self.scale_factors.push(factor);
        Ok(())
    }
}

/// Actuator recording every level it was driven to.
#[derive(Debug, Default, Clone)]
pub struct RecordingActuator {
    pub levels: Arc<Mutex<Vec<bool>>>,
}

impl RecordingActuator {
    pub fn levels(&self) -> Vec<bool> {
        self.levels.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.levels().last().copied().unwrap_or(false)
    }
}

impl Actuator for RecordingActuator {
    fn set_active(&mut self, active: bool) -> Result<(), BoxError> {
        if let Ok(mut l) = self.levels.lock() {
            l.push(active);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InputState {
    counter: i32,
    clicks: u32,
    down: bool,
    acceleration: Vec<u32>,
}

/// Rotary input driven from the outside through a cloned handle.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    state: Arc<Mutex<InputState>>,
}

impl ScriptedInput {
    pub fn rotate(&self, steps: i32) {
        if let Ok(mut s) = self.state.lock() {
            s.counter = s.counter.wrapping_add(steps);
        }
    }

    pub fn click(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.clicks += 1;
        }
    }

    pub fn hold(&self, down: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.down = down;
        }
    }

    pub fn accelerations(&self) -> Vec<u32> {
        self.state
            .lock()
            .map(|s| s.acceleration.clone())
            .unwrap_or_default()
    }
}

impl RotaryInput for ScriptedInput {
    fn read_counter(&mut self) -> i32 {
        self.state.lock().map(|s| s.counter).unwrap_or(0)
    }

    fn is_button_clicked(&mut self) -> bool {
        self.state
            .lock()
            .map(|mut s| {
                if s.clicks > 0 {
                    s.clicks -= 1;
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false)
    }

    fn is_button_down(&self) -> bool {
        self.state.lock().map(|s| s.down).unwrap_or(false)
    }

    fn set_acceleration(&mut self, acceleration: u32) {
        if let Ok(mut s) = self.state.lock() {
            s.acceleration.push(acceleration);
        }
    }
}
