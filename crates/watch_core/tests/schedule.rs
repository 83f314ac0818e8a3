use std::time::Duration;

use chrono::{TimeZone, Utc};
use watch_core::{is_eligible, Clock, ManualClock};

#[test]
fn never_run_is_always_eligible() {
    let now = Utc.with_ymd_and_hms(2016, 7, 12, 0, 0, 0).unwrap();
    assert!(is_eligible(None, now, Duration::from_secs(60)));
    assert!(is_eligible(None, now, Duration::MAX));
}

#[test]
fn eligibility_boundary_is_strict() {
    let last = Utc.with_ymd_and_hms(2016, 7, 12, 0, 0, 0).unwrap();
    let timeout = Duration::from_secs(60);
    let clock = ManualClock::new(last);

    assert!(!is_eligible(Some(last), clock.now(), timeout));

    clock.advance(Duration::from_secs(59));
    assert!(!is_eligible(Some(last), clock.now(), timeout));

    clock.advance(Duration::from_secs(1));
    assert!(!is_eligible(Some(last), clock.now(), timeout));

    clock.advance(Duration::from_secs(1));
    assert!(is_eligible(Some(last), clock.now(), timeout));
}

#[test]
fn clock_going_backwards_is_not_eligible() {
    let last = Utc.with_ymd_and_hms(2016, 7, 12, 0, 0, 0).unwrap();
    let earlier = Utc.with_ymd_and_hms(2016, 7, 11, 0, 0, 0).unwrap();
    assert!(!is_eligible(Some(last), earlier, Duration::from_secs(1)));
}
