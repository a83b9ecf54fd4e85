//! Millisecond arithmetic shared by the state machines.
//!
//! All timestamps are milliseconds on the shared monotonic epoch; differences
//! saturate at zero so a late sample can never produce a huge elapsed time.

/// Milliseconds elapsed from `since` to `now`, 0 if `since` is in the future.
#[inline]
pub const fn elapsed_ms(now_ms: u64, since_ms: u64) -> u64 {
    now_ms.saturating_sub(since_ms)
}

/// Start of a trailing window of `len_ms` ending at `now_ms`.
#[inline]
pub const fn window_start(now_ms: u64, len_ms: u64) -> u64 {
    now_ms.saturating_sub(len_ms)
}

/// Round `v` to the nearest multiple of `quantum` (ties away from zero).
#[inline]
pub fn quantize(v: f64, quantum: f64) -> f64 {
    if quantum <= 0.0 {
        return v;
    }
    (v / quantum).round() * quantum
}
