//! Tick-based time representation.
//!
//! The storage format and the wire envelope both represent instants as
//! signed 64-bit counts of 100-nanosecond intervals ("ticks") rather than
//! formatted timestamps, so that comparisons and expiry checks are plain
//! integer comparisons. Ticks are anchored to the Unix epoch
//! (1970-01-01T00:00:00Z), not a foreign epoch, so they convert to and from
//! `SystemTime` without a second translation table.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Number of ticks in one second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Sentinel meaning "never expires."
pub const NEVER: i64 = i64::MAX;

/// Convert a [`SystemTime`] to ticks since the Unix epoch, saturating at
/// the edges rather than panicking on times outside the representable range.
pub fn to_ticks(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since_epoch) => duration_to_ticks(since_epoch),
        Err(before_epoch) => -duration_to_ticks(before_epoch.duration()),
    }
}

/// Convert ticks since the Unix epoch back to a [`SystemTime`].
pub fn from_ticks(ticks: i64) -> SystemTime {
    if ticks >= 0 {
        UNIX_EPOCH + ticks_to_duration(ticks as u64)
    } else {
        UNIX_EPOCH - ticks_to_duration((-ticks) as u64)
    }
}

/// The current instant, expressed in ticks.
pub fn now_ticks() -> i64 {
    to_ticks(SystemTime::now())
}

/// Ticks representing `duration` from now, clamped to [`NEVER`] if the
/// addition would overflow.
pub fn ticks_after(duration: Duration) -> i64 {
    now_ticks().saturating_add(duration_to_ticks(duration))
}

/// True if `ticks` names an instant at or before `now` (and isn't the
/// [`NEVER`] sentinel).
pub fn is_expired(expires_at: i64, now: i64) -> bool {
    expires_at != NEVER && expires_at <= now
}

fn duration_to_ticks(d: Duration) -> i64 {
    let secs_ticks = (d.as_secs() as i128) * TICKS_PER_SECOND as i128;
    let nanos_ticks = (d.subsec_nanos() as i128) / 100;
    (secs_ticks + nanos_ticks).min(i64::MAX as i128) as i64
}

fn ticks_to_duration(ticks: u64) -> Duration {
    let secs = ticks / TICKS_PER_SECOND as u64;
    let remainder_ticks = ticks % TICKS_PER_SECOND as u64;
    Duration::new(secs, (remainder_ticks * 100) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_round_trips_to_zero() {
        assert_eq!(to_ticks(UNIX_EPOCH), 0);
        assert_eq!(from_ticks(0), UNIX_EPOCH);
    }

    #[test]
    fn one_second_is_ten_million_ticks() {
        let t = UNIX_EPOCH + Duration::from_secs(1);
        assert_eq!(to_ticks(t), TICKS_PER_SECOND);
    }

    #[test]
    fn never_is_never_expired() {
        assert!(!is_expired(NEVER, i64::MAX - 1));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        assert!(is_expired(100, 100));
        assert!(is_expired(100, 101));
        assert!(!is_expired(100, 99));
    }

    #[test]
    fn ticks_after_never_overflows() {
        let ticks = ticks_after(Duration::from_secs(u64::MAX));
        assert_eq!(ticks, i64::MAX);
    }

    #[test]
    fn round_trip_arbitrary_instant() {
        let now = SystemTime::now();
        let ticks = to_ticks(now);
        let back = from_ticks(ticks);
        // Sub-100ns precision is lost; tolerate up to one tick of drift.
        let diff = now.duration_since(back).unwrap_or_else(|e| e.duration());
        assert!(diff < Duration::from_micros(1));
    }
}
