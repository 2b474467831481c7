// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit tests for the clock abstraction

use super::*;

#[test]
fn fake_clock_advances_monotonic_and_wall_clock_together() {
    let clock = FakeClock::new();
    let start = clock.now();
    let start_utc = clock.now_utc();

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.now() - start, Duration::from_secs(90));
    assert_eq!(clock.now_utc() - start_utc, chrono::Duration::seconds(90));
}

#[test]
fn fake_clock_set_utc_overrides_wall_clock() {
    let clock = FakeClock::new();
    let when = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
    clock.set_utc(when);
    assert_eq!(clock.now_utc(), when);
}

#[test]
fn fake_clock_clones_share_state() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_secs(10));
    assert_eq!(other.now(), clock.now());
    assert_eq!(other.now_utc(), clock.now_utc());
}

#[test]
fn system_clock_is_monotonic() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}
