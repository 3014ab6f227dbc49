// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

use super::*;

#[test]
fn fake_clock_advances_both_bases() {
    let clock = FakeClock::new();
    let start_instant = clock.now();
    let start_ms = clock.epoch_ms();

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.now() - start_instant, Duration::from_secs(90));
    assert_eq!(clock.epoch_ms() - start_ms, 90_000);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();

    clock.advance(Duration::from_millis(250));

    assert_eq!(clock.now(), other.now());
    assert_eq!(clock.epoch_ms(), other.epoch_ms());
}

#[test]
fn set_epoch_ms_overrides_wall_clock_only() {
    let clock = FakeClock::new();
    let instant = clock.now();

    clock.set_epoch_ms(42);

    assert_eq!(clock.epoch_ms(), 42);
    assert_eq!(clock.now(), instant);
}

#[test]
fn system_clock_epoch_is_sane() {
    // Anything after 2020 counts as a working wall clock.
    assert!(SystemClock.epoch_ms() > 1_577_836_800_000);
}
