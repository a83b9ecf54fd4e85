use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use grinder_hardware::error::HwError;
use grinder_hardware::util::wait_until_low_with_timeout;

#[test]
fn data_ready_line_going_low_ends_the_wait() {
    let high = Arc::new(AtomicBool::new(true));
    let high_bg = high.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        high_bg.store(false, Ordering::Relaxed);
    });

    let res = wait_until_low_with_timeout(
        || high.load(Ordering::Relaxed),
        Duration::from_millis(200),
        Duration::from_micros(200),
    );
    assert!(res.is_ok(), "expected success, got {res:?}");
}

#[test]
fn stuck_high_line_times_out() {
    let err = wait_until_low_with_timeout(|| true, Duration::from_millis(5), Duration::from_micros(200))
        .expect_err("expected timeout error");
    assert!(matches!(err, HwError::DataReadyTimeout), "unexpected error: {err:?}");
    assert!(err.to_string().contains("timeout"));
}

#[test]
fn already_low_line_returns_immediately() {
    assert!(wait_until_low_with_timeout(|| false, Duration::ZERO, Duration::from_millis(1)).is_ok());
}
