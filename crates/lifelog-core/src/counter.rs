//! Daily-capped counters ("flesh" events).
//!
//! A day holds at most one counter row; adding to it replaces the row with
//! the new running total, which may never exceed the configured ceiling.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  time::{Bucket, Period},
};

pub const DEFAULT_CEILING: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Counter {
  pub date:  NaiveDate,
  pub count: f64,
}

/// Validate adding `delta` to `current` and return the new total.
pub fn next_total(date: NaiveDate, current: f64, delta: f64, ceiling: f64) -> Result<f64> {
  if delta.is_nan() || delta <= 0.0 {
    return Err(Error::CounterNonPositive(delta));
  }
  let total = current + delta;
  if total > ceiling {
    return Err(Error::CeilingExceeded { date, total, ceiling });
  }
  Ok(total)
}

/// Summed counters over one bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterBucket {
  pub bucket: Bucket,
  pub count:  f64,
}

pub fn summarize_counters(counters: &[Counter], period: Period) -> Vec<CounterBucket> {
  let mut buckets: BTreeMap<Bucket, f64> = BTreeMap::new();
  for counter in counters {
    *buckets.entry(period.bucket_of(counter.date)).or_insert(0.0) += counter.count;
  }
  buckets
    .into_iter()
    .map(|(bucket, count)| CounterBucket { bucket, count })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, day).unwrap() }

  #[test]
  fn increments_up_to_ceiling() {
    let day = d(2024, 6, 1);
    assert_eq!(next_total(day, 0.0, 1.0, 2.0).unwrap(), 1.0);
    assert_eq!(next_total(day, 1.0, 1.0, 2.0).unwrap(), 2.0);
    assert!(matches!(
      next_total(day, 2.0, 1.0, 2.0),
      Err(Error::CeilingExceeded { total, .. }) if total == 3.0
    ));
  }

  #[test]
  fn rejects_non_positive() {
    let day = d(2024, 6, 1);
    assert!(matches!(next_total(day, 0.0, 0.0, 2.0), Err(Error::CounterNonPositive(_))));
    assert!(next_total(day, 0.0, -1.0, 2.0).is_err());
  }

  #[test]
  fn weekly_sum() {
    let counters = vec![
      Counter { date: d(2024, 6, 3), count: 1.0 },
      Counter { date: d(2024, 6, 5), count: 2.0 },
      Counter { date: d(2024, 6, 12), count: 1.0 },
    ];
    let weeks = summarize_counters(&counters, Period::Weekly);
    assert_eq!(weeks.len(), 2);
    assert_eq!(weeks[0].count, 3.0);
    assert_eq!(weeks[0].bucket.start(), d(2024, 6, 3));
    assert_eq!(weeks[1].count, 1.0);
  }
}
