//! Partitioning of positions into local calendar days.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::models::Position;

/// Where one analysis day starts, expressed as a fixed UTC offset plus an
/// hour at which the working day rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    pub utc_offset_minutes: i32,
    pub day_start_hour: u32,
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            day_start_hour: 0,
        }
    }
}

impl DayBoundary {
    pub fn new(utc_offset_minutes: i32, day_start_hour: u32) -> Self {
        Self {
            utc_offset_minutes,
            day_start_hour: day_start_hour.min(23),
        }
    }

    /// Calendar day an instant belongs to.
    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        (ts.naive_utc() + self.shift()).date()
    }

    /// Half-open UTC interval `[start, end)` covering `date`.
    pub fn utc_range(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc.from_utc_datetime(&(date.and_time(NaiveTime::MIN) - self.shift()));
        (start, start + Duration::days(1))
    }

    /// Today's date at this boundary.
    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    fn shift(&self) -> Duration {
        Duration::minutes(i64::from(self.utc_offset_minutes))
            - Duration::hours(i64::from(self.day_start_hour))
    }
}

/// Positions that fall on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub positions: Vec<Position>,
}

/// Splits positions into per-day windows, ordered by date.
///
/// Input is stable-sorted by timestamp, so fixes sharing a timestamp keep
/// their arrival order. Days with fewer than `min_points` fixes are dropped.
pub fn window(positions: &[Position], boundary: &DayBoundary, min_points: usize) -> Vec<DayWindow> {
    let mut sorted: Vec<Position> = positions.to_vec();
    sorted.sort_by_key(|p| p.timestamp);

    let mut windows: Vec<DayWindow> = Vec::new();
    for position in sorted {
        let date = boundary.local_date(position.timestamp);
        match windows.last_mut() {
            Some(current) if current.date == date => current.positions.push(position),
            _ => windows.push(DayWindow {
                date,
                positions: vec![position],
            }),
        }
    }

    windows.retain(|w| w.positions.len() >= min_points.max(1));
    windows
}

/// Inclusive list of dates from `from` to `to`.
pub fn dates_between(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days().take_while(|d| *d <= to).collect()
}
