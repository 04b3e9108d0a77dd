//! Sleep intervals and their attribution to logical days.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  time::{Bucket, DayBoundary, Period},
};

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A stored sleep interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sleep {
  pub id:    i64,
  pub start: NaiveDateTime,
  pub end:   NaiveDateTime,
}

impl Sleep {
  pub fn duration(&self) -> TimeDelta { self.end - self.start }
}

// ─── Validated input ─────────────────────────────────────────────────────────

/// A sleep interval that satisfies `start < end` and spans less than a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepInterval {
  start: NaiveDateTime,
  end:   NaiveDateTime,
}

impl SleepInterval {
  pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
    if start >= end {
      return Err(Error::InvalidSleep("end should be later than start"));
    }
    if end - start >= TimeDelta::days(1) {
      return Err(Error::InvalidSleep("sleep over 24 hours"));
    }
    Ok(Self { start, end })
  }

  /// Build from clock times on `date`. An end earlier than the start rolls
  /// over to the next day.
  pub fn from_clock(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Result<Self> {
    if start == end {
      return Err(Error::InvalidSleep("start is equal to end"));
    }
    let start_at = date.and_time(start);
    let mut end_at = date.and_time(end);
    if end < start {
      end_at += TimeDelta::days(1);
    }
    Self::new(start_at, end_at)
  }

  pub fn start(&self) -> NaiveDateTime { self.start }

  pub fn end(&self) -> NaiveDateTime { self.end }

  pub fn duration(&self) -> TimeDelta { self.end - self.start }
}

/// The two ways a sleep can be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepInput {
  Interval {
    start: NaiveDateTime,
    end:   NaiveDateTime,
  },
  Clock {
    date:  NaiveDate,
    start: NaiveTime,
    end:   NaiveTime,
  },
}

impl SleepInput {
  pub fn into_interval(self) -> Result<SleepInterval> {
    match self {
      SleepInput::Interval { start, end } => SleepInterval::new(start, end),
      SleepInput::Clock { date, start, end } => SleepInterval::from_clock(date, start, end),
    }
  }
}

/// What changed on the attributed day after a sleep was added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepFeedback {
  pub date:   NaiveDate,
  pub total:  TimeDelta,
  pub growth: TimeDelta,
}

// ─── Per-day and per-bucket views ────────────────────────────────────────────

/// Total sleep attributed to one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepDay {
  pub date:     NaiveDate,
  pub duration: TimeDelta,
  pub count:    u32,
}

/// Collapse sleeps into per-day totals, ascending by date.
pub fn sleep_days(sleeps: &[Sleep], boundary: DayBoundary) -> Vec<SleepDay> {
  let mut days: BTreeMap<NaiveDate, SleepDay> = BTreeMap::new();
  for sleep in sleeps {
    let date = boundary.date_of(sleep.end);
    let day = days.entry(date).or_insert(SleepDay {
      date,
      duration: TimeDelta::zero(),
      count: 0,
    });
    day.duration += sleep.duration();
    day.count += 1;
  }
  days.into_values().collect()
}

/// Total sleep attributed to `date`; zero when there is none.
pub fn duration_on(sleeps: &[Sleep], boundary: DayBoundary, date: NaiveDate) -> TimeDelta {
  sleeps
    .iter()
    .filter(|s| boundary.date_of(s.end) == date)
    .map(Sleep::duration)
    .sum()
}

/// Sleep statistics over one bucket of days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepBucket {
  pub bucket: Bucket,
  /// Sum over the bucket's days.
  pub total:  TimeDelta,
  /// Mean of the daily totals.
  pub mean:   TimeDelta,
  /// Smallest daily total.
  pub min:    TimeDelta,
  /// Number of sleeps.
  pub count:  u32,
  /// Number of days with any sleep.
  pub days:   u32,
}

pub fn summarize_sleep(days: &[SleepDay], period: Period) -> Vec<SleepBucket> {
  let mut buckets: BTreeMap<Bucket, Vec<&SleepDay>> = BTreeMap::new();
  for day in days {
    buckets.entry(period.bucket_of(day.date)).or_default().push(day);
  }

  buckets
    .into_iter()
    .map(|(bucket, days)| {
      let total: TimeDelta = days.iter().map(|d| d.duration).sum();
      let n = days.len() as i64;
      let min = days
        .iter()
        .map(|d| d.duration)
        .min()
        .unwrap_or_else(TimeDelta::zero);
      SleepBucket {
        bucket,
        total,
        mean: TimeDelta::seconds(total.num_seconds() / n.max(1)),
        min,
        count: days.iter().map(|d| d.count).sum(),
        days: days.len() as u32,
      }
    })
    .collect()
}

/// `HH:MM`, hours not wrapped at 24.
pub fn format_duration(duration: TimeDelta) -> String {
  let minutes = duration.num_minutes();
  format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
      .unwrap()
      .and_hms_opt(h, min, 0)
      .unwrap()
  }

  fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

  fn t(h: u32, m: u32) -> NaiveTime { NaiveTime::from_hms_opt(h, m, 0).unwrap() }

  fn sleep(id: i64, start: NaiveDateTime, end: NaiveDateTime) -> Sleep { Sleep { id, start, end } }

  #[test]
  fn interval_rejects_reversed_and_long_spans() {
    assert!(SleepInterval::new(dt(2024, 6, 1, 8, 0), dt(2024, 6, 1, 7, 0)).is_err());
    assert!(SleepInterval::new(dt(2024, 6, 1, 8, 0), dt(2024, 6, 1, 8, 0)).is_err());
    assert!(SleepInterval::new(dt(2024, 6, 1, 8, 0), dt(2024, 6, 2, 8, 0)).is_err());
    let ok = SleepInterval::new(dt(2024, 6, 1, 23, 0), dt(2024, 6, 2, 7, 30)).unwrap();
    assert_eq!(ok.duration(), TimeDelta::minutes(510));
  }

  #[test]
  fn clock_input_rolls_over_midnight() {
    let interval = SleepInterval::from_clock(date(2024, 6, 1), t(23, 0), t(7, 0)).unwrap();
    assert_eq!(interval.start(), dt(2024, 6, 1, 23, 0));
    assert_eq!(interval.end(), dt(2024, 6, 2, 7, 0));

    let nap = SleepInterval::from_clock(date(2024, 6, 1), t(13, 15), t(13, 30)).unwrap();
    assert_eq!(nap.duration(), TimeDelta::minutes(15));

    assert!(SleepInterval::from_clock(date(2024, 6, 1), t(1, 0), t(1, 0)).is_err());
  }

  #[test]
  fn days_sum_per_attributed_date() {
    let boundary = DayBoundary::default();
    let sleeps = vec![
      sleep(1, dt(2024, 6, 1, 23, 0), dt(2024, 6, 2, 7, 0)),
      sleep(2, dt(2024, 6, 2, 13, 0), dt(2024, 6, 2, 14, 0)),
      sleep(3, dt(2024, 6, 2, 20, 0), dt(2024, 6, 2, 21, 0)),
    ];
    let days = sleep_days(&sleeps, boundary);
    assert_eq!(days.len(), 2);
    assert_eq!(days[0].date, date(2024, 6, 1));
    assert_eq!(days[0].duration, TimeDelta::hours(9));
    assert_eq!(days[0].count, 2);
    assert_eq!(days[1].date, date(2024, 6, 2));
    assert_eq!(duration_on(&sleeps, boundary, date(2024, 6, 2)), TimeDelta::hours(1));
    assert_eq!(duration_on(&sleeps, boundary, date(2024, 6, 9)), TimeDelta::zero());
  }

  #[test]
  fn weekly_mean_and_min() {
    let days = vec![
      SleepDay { date: date(2024, 6, 3), duration: TimeDelta::hours(8), count: 1 },
      SleepDay { date: date(2024, 6, 4), duration: TimeDelta::hours(6), count: 2 },
      SleepDay { date: date(2024, 6, 10), duration: TimeDelta::hours(7), count: 1 },
    ];
    let weeks = summarize_sleep(&days, Period::Weekly);
    assert_eq!(weeks.len(), 2);
    assert_eq!(weeks[0].mean, TimeDelta::hours(7));
    assert_eq!(weeks[0].min, TimeDelta::hours(6));
    assert_eq!(weeks[0].count, 3);
    assert_eq!(weeks[0].days, 2);
    assert_eq!(weeks[1].total, TimeDelta::hours(7));
  }

  #[test]
  fn duration_formatting() {
    assert_eq!(format_duration(TimeDelta::minutes(450)), "07:30");
    assert_eq!(format_duration(TimeDelta::hours(26)), "26:00");
  }
}
