//! Intervals and work slots
//!
//! An [`Interval`] is a stretch of time with optionally open ends. A
//! [`WorkSlot`] binds an interval to a task: it is the unit of recorded
//! work, open from `begin` until it is closed.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{Error, Result};
use crate::timerepr;

/// A time span. A missing bound means the span is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Interval {
    /// Build an interval, rejecting `start > end` when both bounds are set.
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(Error::Validation(format!(
                    "interval start {s} is after its end {e}"
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// The interval with both ends open.
    pub fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Length of the interval, `None` when either bound is open.
    pub fn length(&self) -> Option<TimeDelta> {
        match (self.start, self.end) {
            (Some(s), Some(e)) => Some(e - s),
            _ => None,
        }
    }

    /// Recompute the absent bound so the interval has length `length`.
    ///
    /// With both bounds present the end moves; with both absent there is
    /// nothing to anchor the length to and the call fails.
    pub fn set_length(&mut self, length: TimeDelta) -> Result<()> {
        match (self.start, self.end) {
            (None, None) => Err(Error::Validation(
                "cannot set the length of a fully unbounded interval".to_string(),
            )),
            (None, Some(e)) => {
                self.start = Some(e - length);
                Ok(())
            }
            (Some(s), _) => {
                self.end = Some(s + length);
                Ok(())
            }
        }
    }

    /// Whether two intervals overlap. Open bounds extend to infinity, so
    /// this is symmetric and an unbounded interval intersects everything.
    pub fn intersects(&self, other: &Interval) -> bool {
        let starts_before_other_ends = match (self.start, other.end) {
            (Some(s), Some(e)) => s <= e,
            _ => true,
        };
        let other_starts_before_self_ends = match (other.start, self.end) {
            (Some(s), Some(e)) => s <= e,
            _ => true,
        };
        starts_before_other_ends && other_starts_before_self_ends
    }

    /// Whether `time` falls within the interval, bounds inclusive.
    pub fn includes(&self, time: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| s <= time) && self.end.map_or(true, |e| time <= e)
    }

    /// Whether the interval covers the given instant.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.includes(now)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<DateTime<Utc>>| match b {
            Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "..".to_string(),
        };
        write!(f, "{}--{}", bound(self.start), bound(self.end))
    }
}

/// A continuous stretch of work on one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkSlot {
    id: u32,
    pub task: u32,
    pub interval: Interval,
}

impl WorkSlot {
    /// Open a new slot on `task`, started at `start` and not yet ended.
    pub fn open(id: u32, task: u32, start: DateTime<Utc>) -> Self {
        Self {
            id,
            task,
            interval: Interval {
                start: Some(start),
                end: None,
            },
        }
    }

    /// Rebuild a slot from stored parts, validating the interval.
    pub fn from_parts(
        id: u32,
        task: u32,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        Ok(Self {
            id,
            task,
            interval: Interval::new(start, end)?,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.interval.start
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.interval.end
    }

    /// A slot is open until its end is set.
    pub fn is_open(&self) -> bool {
        self.interval.end.is_none()
    }

    /// Set the slot's end. Closing an already-closed slot simply moves the
    /// end; the model does not police that.
    pub fn close(&mut self, end: DateTime<Utc>) {
        self.interval.end = Some(end);
    }

    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.interval.is_current(now)
    }

    pub fn intersects(&self, other: &Interval) -> bool {
        self.interval.intersects(other)
    }

    pub fn short_repr(&self) -> String {
        format!("ws{}", self.id)
    }
}

impl fmt::Display for WorkSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: task {} {}", self.short_repr(), self.task, self.interval)?;
        if let Some(length) = self.interval.length() {
            write!(f, " ({})", timerepr::format_timedelta(length))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 6, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn interval_rejects_reversed_bounds() {
        assert!(Interval::new(Some(at(5)), Some(at(3))).is_err());
        assert!(Interval::new(Some(at(3)), Some(at(5))).is_ok());
        // Open bounds never conflict.
        assert!(Interval::new(None, Some(at(3))).is_ok());
        assert!(Interval::new(Some(at(5)), None).is_ok());
    }

    #[test]
    fn length_is_none_for_open_bounds() {
        let bounded = Interval::new(Some(at(3)), Some(at(5))).unwrap();
        assert_eq!(bounded.length(), Some(TimeDelta::try_hours(2).unwrap()));
        assert_eq!(Interval::new(Some(at(3)), None).unwrap().length(), None);
        assert_eq!(Interval::unbounded().length(), None);
    }

    #[test]
    fn set_length_anchors_on_the_present_bound() {
        let two_hours = TimeDelta::try_hours(2).unwrap();

        let mut from_start = Interval::new(Some(at(3)), None).unwrap();
        from_start.set_length(two_hours).unwrap();
        assert_eq!(from_start.end, Some(at(5)));

        let mut from_end = Interval::new(None, Some(at(5))).unwrap();
        from_end.set_length(two_hours).unwrap();
        assert_eq!(from_end.start, Some(at(3)));

        // Both bounds present: the end moves.
        let mut bounded = Interval::new(Some(at(3)), Some(at(4))).unwrap();
        bounded.set_length(two_hours).unwrap();
        assert_eq!(bounded.end, Some(at(5)));

        assert!(Interval::unbounded().set_length(two_hours).is_err());
    }

    #[test]
    fn intersects_is_symmetric() {
        let a = Interval::new(Some(at(1)), Some(at(4))).unwrap();
        let b = Interval::new(Some(at(3)), Some(at(6))).unwrap();
        let c = Interval::new(Some(at(5)), Some(at(8))).unwrap();
        let open = Interval::new(Some(at(2)), None).unwrap();

        assert!(a.intersects(&b) && b.intersects(&a));
        assert!(!a.intersects(&c) && !c.intersects(&a));
        assert!(open.intersects(&c) && c.intersects(&open));
        assert!(Interval::unbounded().intersects(&a));
        // Touching endpoints count as overlap.
        let d = Interval::new(Some(at(4)), Some(at(5))).unwrap();
        assert!(a.intersects(&d) && d.intersects(&a));
    }

    #[test]
    fn includes_is_inclusive_and_open_ended() {
        let i = Interval::new(Some(at(3)), Some(at(5))).unwrap();
        assert!(i.includes(at(3)));
        assert!(i.includes(at(5)));
        assert!(!i.includes(at(6)));

        let half_open = Interval::new(Some(at(3)), None).unwrap();
        assert!(half_open.includes(at(23)));
        assert!(!half_open.includes(at(2)));
    }

    #[test]
    fn slot_lifecycle() {
        let mut slot = WorkSlot::open(7, 2, at(9));
        assert!(slot.is_open());
        assert!(slot.is_current(at(10)));
        assert_eq!(slot.short_repr(), "ws7");

        slot.close(at(11));
        assert!(!slot.is_open());
        assert_eq!(slot.interval.length(), Some(TimeDelta::try_hours(2).unwrap()));
        assert!(!slot.is_current(at(12)));

        // Re-closing is allowed and just moves the end.
        slot.close(at(12));
        assert_eq!(slot.end(), Some(at(12)));
    }

    #[test]
    fn from_parts_validates() {
        assert!(WorkSlot::from_parts(0, 1, Some(at(5)), Some(at(3))).is_err());
        let slot = WorkSlot::from_parts(0, 1, Some(at(3)), None).unwrap();
        assert!(slot.is_open());
    }

    #[test]
    fn interval_display() {
        let i = Interval::new(Some(at(3)), None).unwrap();
        assert_eq!(i.to_string(), "2013-06-01 03:00:00--..");
    }

    #[test]
    fn slot_display_shows_length_once_closed() {
        let mut slot = WorkSlot::open(4, 2, at(9));
        assert_eq!(slot.to_string(), "ws4: task 2 2013-06-01 09:00:00--..");

        slot.close(at(11));
        assert_eq!(
            slot.to_string(),
            "ws4: task 2 2013-06-01 09:00:00--2013-06-01 11:00:00 (2:00:00)"
        );
    }
}
