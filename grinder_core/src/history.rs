//! Rolling weight history with windowed aggregate queries.
//!
//! Samples are kept oldest → newest in a bounded ring. Timestamps are
//! milliseconds on the shared monotonic epoch and never decrease: a sample
//! stamped earlier than its predecessor is clamped to the predecessor's
//! timestamp.

use std::collections::VecDeque;

/// One stabilized reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSample {
    pub ts_ms: u64,
    pub grams: f64,
}

#[derive(Debug, Clone)]
pub struct WeightHistory {
    buf: VecDeque<WeightSample>,
    capacity: usize,
}

impl Default for WeightHistory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl WeightHistory {
    pub const DEFAULT_CAPACITY: usize = 100;

    /// Capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, ts_ms: u64, grams: f64) {
        let ts_ms = self.buf.back().map_or(ts_ms, |last| ts_ms.max(last.ts_ms));
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(WeightSample { ts_ms, grams });
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn latest(&self) -> Option<WeightSample> {
        self.buf.back().copied()
    }

    /// Oldest → newest.
    pub fn iter(&self) -> impl Iterator<Item = &WeightSample> {
        self.buf.iter()
    }

    /// Samples with `ts_ms >= since_ms`.
    pub fn window(&self, since_ms: u64) -> impl Iterator<Item = &WeightSample> {
        let start = self.buf.partition_point(|s| s.ts_ms < since_ms);
        self.buf.range(start..)
    }

    /// Mean of the samples in the window; the last known value when the
    /// window is empty, 0.0 when nothing has been recorded yet.
    pub fn average_since(&self, since_ms: u64) -> f64 {
        let (sum, n) = self
            .window(since_ms)
            .fold((0.0_f64, 0_u32), |(sum, n), s| (sum + s.grams, n + 1));
        if n == 0 {
            return self.latest().map_or(0.0, |s| s.grams);
        }
        sum / f64::from(n)
    }

    pub fn min_since(&self, since_ms: u64) -> Option<f64> {
        self.window(since_ms).map(|s| s.grams).reduce(f64::min)
    }

    pub fn max_since(&self, since_ms: u64) -> Option<f64> {
        self.window(since_ms).map(|s| s.grams).reduce(f64::max)
    }

    /// Value of the newest sample stamped at or before `ts_ms`.
    pub fn first_value_older_than(&self, ts_ms: u64) -> Option<f64> {
        let end = self.buf.partition_point(|s| s.ts_ms <= ts_ms);
        end.checked_sub(1)
            .and_then(|i| self.buf.get(i))
            .map(|s| s.grams)
    }

    /// True when the history reaches back to `ts_ms`, i.e. a window starting
    /// there is fully populated.
    pub fn covers(&self, ts_ms: u64) -> bool {
        self.buf.front().is_some_and(|s| s.ts_ms <= ts_ms)
    }
}
