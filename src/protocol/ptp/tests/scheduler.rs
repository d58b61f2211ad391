use std::time::Duration;

use crate::protocol::ptp::scheduler::*;
use crate::testing::{FixedRandom, MockTimer};

const INTERVAL: Duration = Duration::from_secs(10);
const TIMEOUT: Duration = Duration::from_millis(500);

fn scheduler(random: u32) -> RetryScheduler<MockTimer, FixedRandom> {
    RetryScheduler::new(MockTimer::default(), FixedRandom(random), INTERVAL, TIMEOUT)
}

#[test]
fn test_new_scheduler_leaves_timer_unarmed() {
    let s = scheduler(0);
    assert_eq!(s.timer().pending, None);
    assert_eq!(s.interval(), INTERVAL);
    assert_eq!(s.timeout(), TIMEOUT);
}

#[test]
fn test_arm_without_jitter() {
    let mut s = scheduler(0);
    assert_eq!(s.arm_interval(), INTERVAL);
    assert_eq!(s.timer().pending, Some(INTERVAL));

    assert_eq!(s.arm_timeout(), TIMEOUT);
    assert_eq!(s.timer().pending, Some(TIMEOUT));
}

#[test]
fn test_arm_cancels_before_rearming() {
    let mut s = scheduler(0);
    s.arm_interval();
    s.arm_timeout();
    assert_eq!(s.timer().cancels, 2);
    assert_eq!(s.timer().armed, vec![INTERVAL, TIMEOUT]);
}

#[test]
fn test_jitter_is_masked_to_20_bits() {
    let mut s = scheduler(u32::MAX);
    let armed = s.arm_interval();
    assert_eq!(armed, INTERVAL + Duration::from_micros(u64::from(JITTER_MASK_US)));
    assert!(armed - INTERVAL < Duration::from_micros(1_048_576));
}

#[test]
fn test_jitter_uses_low_bits_only() {
    // 0x0010_0000 has no bits below the mask.
    let mut s = scheduler(0x0010_0000);
    assert_eq!(s.arm_timeout(), TIMEOUT);

    let mut s = scheduler(0xABC1_2345);
    assert_eq!(s.arm_timeout(), TIMEOUT + Duration::from_micros(0x1_2345));
}

#[test]
fn test_arm_custom_base() {
    let mut s = scheduler(1_000);
    assert_eq!(
        s.arm(Duration::from_secs(2)),
        Duration::from_secs(2) + Duration::from_millis(1)
    );
}
