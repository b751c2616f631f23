//! Rolling-interval arithmetic.
//!
//! Exposure keys are timestamped in 10-minute "rolling intervals": interval
//! `n` covers `[600 * n, 600 * (n + 1))` seconds since the Unix epoch. All
//! arithmetic is UTC.

use time::{Duration, OffsetDateTime, Time};

/// Length of one rolling interval.
pub const INTERVAL_LENGTH: Duration = Duration::seconds(600);

/// Number of the rolling interval containing `t`.
#[must_use]
pub fn interval_number_at(t: OffsetDateTime) -> i32 {
    (t.unix_timestamp() / INTERVAL_LENGTH.whole_seconds()) as i32
}

/// UTC instant at which interval `n` starts.
///
/// # Panics
/// Panics if `n` lies outside the representable date range; real interval
/// numbers are nowhere near it.
#[must_use]
pub fn interval_start(n: i32) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(i64::from(n) * INTERVAL_LENGTH.whole_seconds())
        .expect("interval start within the representable date range")
}

/// UTC midnight of the day containing `t`.
///
/// `t` must already be in UTC; the engine only ever constructs UTC instants.
#[must_use]
pub fn start_of_utc_day(t: OffsetDateTime) -> OffsetDateTime {
    t.replace_time(Time::MIDNIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn interval_number_floors_to_ten_minutes() {
        assert_eq!(
            interval_number_at(datetime!(1970-01-01 00:00 UTC)),
            0
        );
        assert_eq!(
            interval_number_at(datetime!(1970-01-01 00:09:59 UTC)),
            0
        );
        assert_eq!(
            interval_number_at(datetime!(1970-01-01 00:10 UTC)),
            1
        );
        assert_eq!(
            interval_number_at(datetime!(2020-11-30 00:00 UTC)),
            2_677_824
        );
    }

    #[test]
    fn interval_round_trips_through_its_start() {
        for n in [0, 1, 144, 2_677_824, 400_000_000] {
            assert_eq!(interval_number_at(interval_start(n)), n);
        }
    }

    #[test]
    fn start_of_day_truncates_to_midnight() {
        let noon = datetime!(2020-12-01 12:34:56 UTC);
        assert_eq!(start_of_utc_day(noon), datetime!(2020-12-01 00:00 UTC));
        assert_eq!(
            start_of_utc_day(datetime!(2020-12-01 00:00 UTC)),
            datetime!(2020-12-01 00:00 UTC)
        );
    }

    #[test]
    fn one_day_spans_144_intervals() {
        let midnight = datetime!(2020-12-01 00:00 UTC);
        let next = midnight + Duration::days(1);
        assert_eq!(
            interval_number_at(next) - interval_number_at(midnight),
            144
        );
    }
}
