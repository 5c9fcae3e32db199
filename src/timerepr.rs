//! Timestamp and duration wire formats
//!
//! Durations are persisted as `"{days} d, {seconds} s"`, timestamps as
//! strftime-formatted local time in a named zone. Internally everything is
//! `DateTime<Utc>`; the zone only matters at the store boundary.

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{Error, Result};

const SECS_PER_DAY: i64 = 86_400;

/// Render a duration in the store's `"{days} d, {seconds} s"` shape.
///
/// The seconds part is kept in `0..86400` so the repr is canonical even for
/// negative durations.
pub fn format_duration(delta: TimeDelta) -> String {
    let total = delta.num_seconds();
    let days = total.div_euclid(SECS_PER_DAY);
    let seconds = total.rem_euclid(SECS_PER_DAY);
    format!("{days} d, {seconds} s")
}

/// Parse a `"{days} d, {seconds} s"` duration repr.
pub fn parse_duration(raw: &str) -> Result<TimeDelta> {
    let bad = || Error::Validation(format!("malformed duration '{raw}'"));

    let parts: Vec<&str> = raw.split_whitespace().collect();
    if parts.len() != 4 || parts[1] != "d," || parts[3] != "s" {
        return Err(bad());
    }
    let days: i64 = parts[0].parse().map_err(|_| bad())?;
    let seconds: i64 = parts[2].parse().map_err(|_| bad())?;

    let days = TimeDelta::try_days(days).ok_or_else(bad)?;
    let seconds = TimeDelta::try_seconds(seconds).ok_or_else(bad)?;
    days.checked_add(&seconds).ok_or_else(bad)
}

/// Resolve an IANA zone name.
pub fn parse_zone(name: &str) -> Result<Tz> {
    name.parse()
        .map_err(|_| Error::Validation(format!("unknown timezone '{name}'")))
}

/// Format a timestamp in `zone` local time using an strftime pattern.
pub fn format_timestamp(time: DateTime<Utc>, pattern: &str, zone: Tz) -> String {
    time.with_timezone(&zone).format(pattern).to_string()
}

/// Parse an strftime-formatted local timestamp in `zone` back to UTC.
///
/// An ambiguous local time (DST fold) resolves to the earlier instant; a
/// nonexistent one (DST gap) is an error.
pub fn parse_timestamp(raw: &str, pattern: &str, zone: Tz) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, pattern)
        .map_err(|e| Error::Validation(format!("malformed timestamp '{raw}': {e}")))?;
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(t) => Ok(t.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(Error::Validation(format!(
            "timestamp '{raw}' does not exist in zone {}",
            zone.name()
        ))),
    }
}

/// Human display of a duration as `H:MM:SS`, sub-second part truncated.
pub fn format_timedelta(delta: TimeDelta) -> String {
    let total = delta.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let total = total.abs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{sign}{hours}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_repr_round_trips() {
        let delta = TimeDelta::try_days(2).unwrap() + TimeDelta::try_seconds(3661).unwrap();
        let repr = format_duration(delta);
        assert_eq!(repr, "2 d, 3661 s");
        assert_eq!(parse_duration(&repr).unwrap(), delta);
    }

    #[test]
    fn negative_duration_is_canonical() {
        let delta = TimeDelta::try_seconds(-30).unwrap();
        let repr = format_duration(delta);
        assert_eq!(repr, "-1 d, 86370 s");
        assert_eq!(parse_duration(&repr).unwrap(), delta);
    }

    #[test]
    fn malformed_durations_rejected() {
        for raw in ["", "5 d", "5 d, x s", "5 days, 3 s", "5 d, 3"] {
            assert!(parse_duration(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn timestamp_round_trips_through_zone() {
        let pattern = "%Y-%m-%d %H:%M:%S";
        let zone: Tz = "Europe/Prague".parse().unwrap();
        let utc = Utc.with_ymd_and_hms(2013, 6, 15, 12, 0, 0).unwrap();

        let repr = format_timestamp(utc, pattern, zone);
        assert_eq!(repr, "2013-06-15 14:00:00");
        assert_eq!(parse_timestamp(&repr, pattern, zone).unwrap(), utc);
    }

    #[test]
    fn ambiguous_local_time_takes_earlier_instant() {
        // 02:30 occurs twice in Prague on 2013-10-27 (fall back at 03:00).
        let zone: Tz = "Europe/Prague".parse().unwrap();
        let t = parse_timestamp("2013-10-27 02:30:00", "%Y-%m-%d %H:%M:%S", zone).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2013, 10, 27, 0, 30, 0).unwrap());
    }

    #[test]
    fn nonexistent_local_time_rejected() {
        // 02:30 is skipped in Prague on 2013-03-31 (spring forward at 02:00).
        let zone: Tz = "Europe/Prague".parse().unwrap();
        assert!(parse_timestamp("2013-03-31 02:30:00", "%Y-%m-%d %H:%M:%S", zone).is_err());
    }

    #[test]
    fn timedelta_display() {
        assert_eq!(
            format_timedelta(TimeDelta::try_seconds(3725).unwrap()),
            "1:02:05"
        );
        assert_eq!(
            format_timedelta(TimeDelta::try_seconds(-61).unwrap()),
            "-0:01:01"
        );
        assert_eq!(format_timedelta(TimeDelta::zero()), "0:00:00");
    }
}
