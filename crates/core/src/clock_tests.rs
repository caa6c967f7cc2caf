// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_returns_increasing_time() {
    let clock = SystemClock;
    let t1 = clock.now();
    std::thread::sleep(Duration::from_millis(1));
    let t2 = clock.now();
    assert!(t2 > t1);
}

#[test]
fn system_clock_epoch_ms_is_plausible() {
    let clock = SystemClock;
    // Some time after 2020-01-01 and comfortably below the year 10000.
    let ms = clock.epoch_ms();
    assert!(ms > 1_577_836_800_000);
    assert!(ms < 253_402_300_800_000);
}

#[test]
fn fake_clock_can_be_advanced() {
    let clock = FakeClock::new();
    let t1 = clock.now();
    let ms1 = clock.epoch_ms();
    clock.advance(Duration::from_secs(60));
    assert!(clock.now().duration_since(t1) >= Duration::from_secs(60));
    assert_eq!(clock.epoch_ms(), ms1 + 60_000);
}

#[test]
fn fake_clock_is_cloneable_and_shared() {
    let clock1 = FakeClock::new();
    let clock2 = clock1.clone();
    clock2.advance(Duration::from_secs(30));
    assert_eq!(clock1.epoch_ms(), clock2.epoch_ms());
}

#[test]
fn fake_clock_set_epoch_ms() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(42);
    assert_eq!(clock.epoch_ms(), 42);
}
