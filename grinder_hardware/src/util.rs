use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Wait until the provided `is_high` predicate becomes false (i.e., line goes low),
/// or a timeout expires. Sleeps in small intervals to avoid CPU spinning.
pub fn wait_until_low_with_timeout(
    mut is_high: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while is_high() {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Sign-extend a 24-bit two's complement conversion result.
#[inline]
pub const fn sign_extend_24(raw: u32) -> i32 {
    ((raw << 8) as i32) >> 8
}

/// Direction of one quadrature transition from the previous to the current
/// `(a, b)` state, packed as `a << 1 | b`. Invalid jumps count as zero.
pub const fn quadrature_step(prev: u8, cur: u8) -> i8 {
    const TABLE: [i8; 16] = [0, -1, 1, 0, 1, 0, 0, -1, -1, 0, 0, 1, 0, 1, -1, 0];
    TABLE[(((prev & 0b11) << 2) | (cur & 0b11)) as usize]
}

/// Counter increment for one detent. With a non-zero `acceleration`, detents
/// closer together than 100 ms count for more.
pub fn accelerated_step(acceleration: u32, since_last_ms: u64) -> i32 {
    if acceleration == 0 || since_last_ms >= 100 {
        return 1;
    }
    let fast = 100 - since_last_ms;
    let boost = u64::from(acceleration) * fast / 1000;
    1 + i32::try_from(boost.min(99)).unwrap_or(99)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend_24(0x00_0001), 1);
        assert_eq!(sign_extend_24(0x7F_FFFF), 8_388_607);
        assert_eq!(sign_extend_24(0xFF_FFFF), -1);
        assert_eq!(sign_extend_24(0x80_0000), -8_388_608);
    }

    #[test]
    fn quadrature_full_cycle_counts_four() {
        // 00 -> 01 -> 11 -> 10 -> 00
        let seq = [0b00, 0b01, 0b11, 0b10, 0b00];
        let cw: i32 = seq.windows(2).map(|w| i32::from(quadrature_step(w[0], w[1]))).sum();
        let ccw: i32 = seq
            .windows(2)
            .map(|w| i32::from(quadrature_step(w[1], w[0])))
            .sum();
        assert_eq!(cw.abs(), 4);
        assert_eq!(cw, -ccw);
        assert_eq!(quadrature_step(0b00, 0b11), 0);
    }

    #[test]
    fn acceleration_only_for_fast_turns() {
        assert_eq!(accelerated_step(0, 5), 1);
        assert_eq!(accelerated_step(100, 150), 1);
        assert_eq!(accelerated_step(100, 10), 10);
        assert!(accelerated_step(10_000, 0) <= 100);
    }
}
