use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::mem::replace;

/// Half-open averaging window `[start, end)` for one target date.
#[derive(Clone, Eq, PartialEq, Copy, Debug)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        TimeWindow { start, end }
    }

    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        *ts >= self.start && *ts < self.end
    }

    /// Calendar date the window is labelled with.
    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }
}

/// Iterator over averaging windows: each window is `interval` long and
/// successive windows start `spacing` apart, until `end` is reached.
#[derive(Clone, Eq, PartialEq, Copy, Debug)]
pub struct WindowSchedule {
    next: NaiveDateTime,
    end: NaiveDateTime,
    interval: TimeDelta,
    spacing: TimeDelta,
}

impl WindowSchedule {
    /// `spacing` must be positive; callers validate this when loading config.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, interval: TimeDelta, spacing: TimeDelta) -> Self {
        WindowSchedule {
            next: start,
            end,
            interval,
            spacing,
        }
    }
}

impl Iterator for WindowSchedule {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next < self.end && self.spacing > TimeDelta::zero() {
            let following = self.next + self.spacing;
            let start = replace(&mut self.next, following);
            Some(TimeWindow::new(start, start + self.interval))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_schedule_iteration() {
        let schedule = WindowSchedule::new(
            ts(2015, 7, 20, 0),
            ts(2015, 7, 23, 0),
            TimeDelta::try_hours(6).unwrap(),
            TimeDelta::try_days(1).unwrap(),
        );
        let windows: Vec<TimeWindow> = schedule.collect();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].start, ts(2015, 7, 20, 0));
        assert_eq!(windows[0].end, ts(2015, 7, 20, 6));
        assert_eq!(windows[2].date(), NaiveDate::from_ymd_opt(2015, 7, 22).unwrap());
    }

    #[test]
    fn test_schedule_empty() {
        let schedule = WindowSchedule::new(
            ts(2015, 7, 23, 0),
            ts(2015, 7, 23, 0),
            TimeDelta::try_hours(6).unwrap(),
            TimeDelta::try_days(1).unwrap(),
        );
        assert_eq!(schedule.count(), 0);
    }

    #[test]
    fn test_window_is_half_open() {
        let window = TimeWindow::new(ts(2015, 7, 22, 0), ts(2015, 7, 22, 6));
        assert!(window.contains(&ts(2015, 7, 22, 0)));
        assert!(window.contains(&ts(2015, 7, 22, 5)));
        assert!(!window.contains(&ts(2015, 7, 22, 6)));
    }
}
