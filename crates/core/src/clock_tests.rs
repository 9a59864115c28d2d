// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_epoch_is_after_2020() {
    // 2020-01-01T00:00:00Z
    assert!(SystemClock.epoch_ms() > 1_577_836_800_000);
}

#[test]
fn fake_clock_advances_both_clocks() {
    let clock = FakeClock::new();
    let t1 = clock.now();
    let e1 = clock.epoch_ms();
    clock.advance(Duration::from_secs(90));
    assert_eq!(clock.now().duration_since(t1), Duration::from_secs(90));
    assert_eq!(clock.epoch_ms() - e1, 90_000);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    let before = clock.epoch_ms();
    other.advance(Duration::from_secs(5));
    assert_eq!(clock.epoch_ms(), before + 5_000);
}

#[test]
fn age_of_past_timestamp() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(10_000);
    assert_eq!(clock.age_of(4_000), Duration::from_secs(6));
}

#[test]
fn age_of_future_timestamp_is_zero() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(10_000);
    assert_eq!(clock.age_of(20_000), Duration::ZERO);
}
