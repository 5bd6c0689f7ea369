//! Calendar month buckets.
//!
//! Every chart covers a contiguous run of calendar months. Bucketing
//! pre-creates one bucket per month in the window so empty months chart as
//! zero instead of vanishing, then assigns each entity by its timestamp.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::error::{Error, Result};

/// Full English month name for a zero-based month number.
pub fn month_name(month0: u32) -> &'static str {
    match month0 {
        0 => "January",
        1 => "February",
        2 => "March",
        3 => "April",
        4 => "May",
        5 => "June",
        6 => "July",
        7 => "August",
        8 => "September",
        9 => "October",
        10 => "November",
        11 => "December",
        _ => "Unknown",
    }
}

/// Midnight UTC on the first day of the timestamp's month.
pub fn start_of_month(ts: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(ts.year(), ts.month(), 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Last represented instant of the timestamp's day (millisecond precision).
pub fn end_of_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap()
        .and_utc()
}

/// Shift a timestamp by whole calendar months, clamping the day to the
/// target month's length (March 31 minus one month is February 28 or 29).
pub fn shift_months(ts: DateTime<Utc>, months: i32) -> DateTime<Utc> {
    let total = ts.year() * 12 + ts.month0() as i32 + months;
    let year = total.div_euclid(12);
    let month0 = total.rem_euclid(12) as u32;

    let day = ts.day().min(days_in_month(year, month0));
    NaiveDate::from_ymd_opt(year, month0 + 1, day)
        .unwrap()
        .and_time(ts.time())
        .and_utc()
}

fn days_in_month(year: i32, month0: u32) -> u32 {
    let (next_year, next_month0) = if month0 == 11 {
        (year + 1, 0)
    } else {
        (year, month0 + 1)
    };

    NaiveDate::from_ymd_opt(next_year, next_month0 + 1, 1)
        .unwrap()
        .pred_opt()
        .unwrap()
        .day()
}

/// One calendar month of entities inside a reporting window.
#[derive(Debug, Clone)]
pub struct MonthBucket<T> {
    /// Calendar year
    pub year: i32,
    /// Zero-based month number (0 = January)
    pub month0: u32,
    /// Entities whose timestamp falls inside this month
    pub entities: Vec<T>,
}

impl<T> MonthBucket<T> {
    fn empty(year: i32, month0: u32) -> Self {
        Self {
            year,
            month0,
            entities: Vec::new(),
        }
    }

    /// Chart label for this bucket
    pub fn label(&self) -> &'static str {
        month_name(self.month0)
    }
}

/// Distribute entities over the calendar months of the reporting window.
///
/// The window runs from the start of `from`'s month up to but excluding
/// `to`. One bucket exists for every month in between, in chronological
/// order, whether or not anything landed in it. Entities dated outside the
/// window are dropped silently.
///
/// An entity for which `timestamp` yields nothing fails the whole call with
/// [`Error::InvalidTimestamp`]; mis-bucketing is worse than no chart.
pub fn bucket_by_month<T, F>(
    entities: Vec<T>,
    timestamp: F,
    entity_name: &str,
    field_name: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<MonthBucket<T>>>
where
    F: Fn(&T) -> Option<DateTime<Utc>>,
{
    let window_start = start_of_month(from);
    let base = window_start.year() * 12 + window_start.month0() as i32;

    let mut buckets: Vec<MonthBucket<T>> = Vec::new();
    let mut cursor = window_start;
    while cursor < to {
        buckets.push(MonthBucket::empty(cursor.year(), cursor.month0()));
        cursor = shift_months(cursor, 1);
    }

    for entity in entities {
        let ts = timestamp(&entity).ok_or_else(|| Error::InvalidTimestamp {
            entity: entity_name.to_string(),
            field: field_name.to_string(),
        })?;

        if ts < window_start || ts >= to {
            continue;
        }

        let index = (ts.year() * 12 + ts.month0() as i32) - base;
        if index < 0 || index as usize >= buckets.len() {
            continue;
        }
        buckets[index as usize].entities.push(entity);
    }

    Ok(buckets)
}
