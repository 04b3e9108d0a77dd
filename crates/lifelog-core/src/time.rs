//! Time bucketing: mapping calendar dates onto day, week and month buckets.
//!
//! Everything here is pure and deterministic. Weeks start on Monday; months
//! are keyed by their first day.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result};

// ─── Period ──────────────────────────────────────────────────────────────────

/// The granularity a summary table is aggregated at.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Display,
  EnumString,
  Serialize,
  Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Period {
  #[default]
  Daily,
  Weekly,
  Monthly,
}

impl Period {
  pub const ALL: [Period; 3] = [Period::Daily, Period::Weekly, Period::Monthly];

  /// Map `date` to the bucket that contains it at this granularity.
  pub fn bucket_of(self, date: NaiveDate) -> Bucket {
    match self {
      Period::Daily => Bucket::Day(day_bucket(date)),
      Period::Weekly => {
        let (monday, sunday) = week_bounds(date);
        Bucket::Week { monday, sunday }
      }
      Period::Monthly => Bucket::Month(month_start(date)),
    }
  }

  /// Labels of the date-like columns identifying a bucket of this period.
  pub fn date_columns(self) -> &'static [&'static str] {
    match self {
      Period::Daily => &["date"],
      Period::Weekly => &["monday", "sunday"],
      Period::Monthly => &["month"],
    }
  }
}

// ─── Bucket ──────────────────────────────────────────────────────────────────

/// A bucket key. Buckets of the same period order by their start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
  Day(NaiveDate),
  Week { monday: NaiveDate, sunday: NaiveDate },
  Month(NaiveDate),
}

impl Bucket {
  pub fn period(&self) -> Period {
    match self {
      Bucket::Day(_) => Period::Daily,
      Bucket::Week { .. } => Period::Weekly,
      Bucket::Month(_) => Period::Monthly,
    }
  }

  /// First date covered by the bucket.
  pub fn start(&self) -> NaiveDate {
    match *self {
      Bucket::Day(d) => d,
      Bucket::Week { monday, .. } => monday,
      Bucket::Month(first) => first,
    }
  }

  /// Last date covered by the bucket.
  pub fn end(&self) -> NaiveDate {
    match *self {
      Bucket::Day(d) => d,
      Bucket::Week { sunday, .. } => sunday,
      Bucket::Month(first) => month_end(first),
    }
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start() <= date && date <= self.end()
  }

  /// Values of the date-like columns, in [`Period::date_columns`] order.
  pub fn date_values(&self) -> Vec<NaiveDate> {
    match *self {
      Bucket::Day(d) => vec![d],
      Bucket::Week { monday, sunday } => vec![monday, sunday],
      Bucket::Month(first) => vec![first],
    }
  }
}

// ─── Bucket functions ────────────────────────────────────────────────────────

pub fn day_bucket(date: NaiveDate) -> NaiveDate { date }

/// The Monday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
  let offset = date.weekday().num_days_from_monday();
  date - TimeDelta::days(i64::from(offset))
}

/// `(monday, sunday)` of the week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
  let monday = week_start(date);
  (monday, monday + TimeDelta::days(6))
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
  date - TimeDelta::days(i64::from(date.day0()))
}

/// Last day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
  let first = month_start(date);
  // first + 31 days always lands in the following month.
  let next = month_start(first + TimeDelta::days(31));
  next - TimeDelta::days(1)
}

// ─── Day boundary ────────────────────────────────────────────────────────────

/// A logical day starts `offset` after midnight, so late-night activity stays
/// with the previous calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
  offset: TimeDelta,
}

impl DayBoundary {
  pub const DEFAULT_HOURS: u32 = 17;

  /// The offset must lie in `[0h, 24h)`.
  pub fn new(offset: TimeDelta) -> Result<Self> {
    if offset < TimeDelta::zero() || offset >= TimeDelta::days(1) {
      return Err(Error::InvalidDayBoundary(offset));
    }
    Ok(Self { offset })
  }

  pub fn from_hours(hours: u32) -> Result<Self> {
    Self::new(TimeDelta::hours(i64::from(hours)))
  }

  pub fn offset(&self) -> TimeDelta { self.offset }

  /// The calendar day an instant is attributed to.
  pub fn date_of(&self, at: NaiveDateTime) -> NaiveDate {
    (at - self.offset).date()
  }
}

impl Default for DayBoundary {
  fn default() -> Self {
    Self { offset: TimeDelta::hours(i64::from(Self::DEFAULT_HOURS)) }
  }
}

// ─── Date filter ─────────────────────────────────────────────────────────────

/// How far back summary tables reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub enum DateFilter {
  #[strum(serialize = "1m")]
  OneMonth,
  #[strum(serialize = "6m")]
  SixMonths,
  #[strum(serialize = "2y")]
  TwoYears,
  #[default]
  #[strum(serialize = "all")]
  All,
}

impl DateFilter {
  /// Earliest date still shown, or `None` when nothing is filtered out.
  pub fn earliest(self, today: NaiveDate) -> Option<NaiveDate> {
    let days = match self {
      DateFilter::OneMonth => 30,
      DateFilter::SixMonths => 183,
      DateFilter::TwoYears => 730,
      DateFilter::All => return None,
    };
    Some(today - TimeDelta::days(days))
  }

  pub fn accepts(self, today: NaiveDate, date: NaiveDate) -> bool {
    self.earliest(today).is_none_or(|earliest| earliest <= date)
  }
}
