//! Record aggregation: merging records into per-bucket, per-category totals.
//!
//! Within one `(bucket, category)` cell, records whose description sets are
//! equal merge into a single [`Tally`]; any other description set starts a
//! new tally in the same cell.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
  category::{CategoryHierarchy, CategoryId},
  record::{Measure, RecordEntry},
  time::{Bucket, Period},
};

// ─── Tally ───────────────────────────────────────────────────────────────────

/// Running totals for records sharing one description set.
#[derive(Debug, Clone, PartialEq)]
pub struct Tally {
  /// Descriptions in the order first seen.
  pub descriptions: Vec<String>,
  /// Sum of `magnitude * scale`.
  pub volume:       f64,
  /// Occurrences that carried no volume, time or distance.
  pub times:        u64,
  pub time:         f64,
  pub distance:     f64,
  key:              BTreeSet<String>,
}

impl Tally {
  pub fn from_measure(measure: &Measure) -> Self {
    let volume = measure.volume();
    let bare = volume == 0.0 && measure.time == 0.0 && measure.distance == 0.0;
    Self {
      descriptions: measure.descriptions.clone(),
      volume,
      times: u64::from(bare),
      time: measure.time,
      distance: measure.distance,
      key: measure.descriptions.iter().cloned().collect(),
    }
  }

  /// Whether `descriptions` is set-equal to this tally's descriptions.
  pub fn matches(&self, descriptions: &[String]) -> bool {
    descriptions.iter().all(|d| self.key.contains(d))
      && self.key.iter().all(|k| descriptions.contains(k))
  }

  /// Fold `other`'s totals into this tally.
  pub fn merge(&mut self, other: &Tally) {
    self.volume += other.volume;
    self.times += other.times;
    self.time += other.time;
    self.distance += other.distance;
  }

  pub fn is_empty(&self) -> bool {
    self.volume == 0.0 && self.times == 0 && self.time == 0.0 && self.distance == 0.0
  }

  /// Display text: `(V+T)`, `V`, `tim:X, dis:Y` or `T`, followed by
  /// `*['desc', ...]` when descriptions are present.
  pub fn render(&self) -> String {
    let mut out = if self.volume != 0.0 && self.times > 0 {
      format!("({}+{})", format_number(self.volume), self.times)
    } else if self.volume != 0.0 {
      format_number(self.volume)
    } else if self.time != 0.0 || self.distance != 0.0 {
      let mut parts = Vec::with_capacity(2);
      if self.time != 0.0 {
        parts.push(format!("tim:{}", format_number(self.time)));
      }
      if self.distance != 0.0 {
        parts.push(format!("dis:{}", format_number(self.distance)));
      }
      parts.join(", ")
    } else {
      self.times.to_string()
    };

    if !self.descriptions.is_empty() {
      let quoted: Vec<String> =
        self.descriptions.iter().map(|d| format!("'{d}'")).collect();
      out.push_str(&format!("*[{}]", quoted.join(", ")));
    }
    out
  }
}

/// Shortest representation, always with a fractional part (`5.0`, `2.5`).
pub fn format_number(value: f64) -> String {
  if value.fract() == 0.0 && value.abs() < 1e15 {
    format!("{value:.1}")
  } else {
    value.to_string()
  }
}

// ─── Cell ────────────────────────────────────────────────────────────────────

/// Every tally for one `(bucket, category)` pair, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
  pub tallies: Vec<Tally>,
}

impl Cell {
  pub fn add(&mut self, tally: Tally) {
    match self.tallies.iter_mut().find(|t| t.matches(&tally.descriptions)) {
      Some(existing) => existing.merge(&tally),
      None => self.tallies.push(tally),
    }
  }

  pub fn is_empty(&self) -> bool { self.tallies.is_empty() }

  /// Rendered tallies joined with `"; "`; blank for an empty cell.
  pub fn render(&self) -> String {
    self
      .tallies
      .iter()
      .map(Tally::render)
      .collect::<Vec<_>>()
      .join("; ")
  }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// Aggregated records keyed by bucket, then category.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSummary {
  period:  Period,
  buckets: BTreeMap<Bucket, BTreeMap<CategoryId, Cell>>,
}

impl RecordSummary {
  pub fn period(&self) -> Period { self.period }

  /// Populated buckets in ascending order.
  pub fn buckets(&self) -> impl Iterator<Item = &Bucket> { self.buckets.keys() }

  pub fn len(&self) -> usize { self.buckets.len() }

  pub fn is_empty(&self) -> bool { self.buckets.is_empty() }

  /// The cell for `(bucket, category)`; empty when nothing was recorded.
  pub fn cell(&self, bucket: &Bucket, category: CategoryId) -> Cell {
    self
      .buckets
      .get(bucket)
      .and_then(|cats| cats.get(&category))
      .cloned()
      .unwrap_or_default()
  }

  pub fn render(&self, bucket: &Bucket, category: CategoryId) -> String {
    self
      .buckets
      .get(bucket)
      .and_then(|cats| cats.get(&category))
      .map(Cell::render)
      .unwrap_or_default()
  }
}

// ─── Aggregator ──────────────────────────────────────────────────────────────

/// Groups records into buckets of one [`Period`].
#[derive(Debug, Clone, Copy)]
pub struct RecordAggregator {
  period: Period,
}

impl RecordAggregator {
  pub fn new(period: Period) -> Self { Self { period } }

  /// Aggregate a snapshot of records. The result depends only on the set of
  /// records, not on the order they are supplied in.
  pub fn aggregate(
    &self,
    hierarchy: &CategoryHierarchy,
    records: &[RecordEntry],
  ) -> RecordSummary {
    let mut ordered: Vec<&RecordEntry> = records.iter().collect();
    ordered.sort_by_key(|r| (r.date, r.id));

    let mut buckets: BTreeMap<Bucket, BTreeMap<CategoryId, Cell>> = BTreeMap::new();
    for record in ordered {
      let countable = hierarchy
        .get(record.category_id)
        .is_some_and(|c| c.countable);
      let measure = Measure::collapse(&record.extras, countable);
      buckets
        .entry(self.period.bucket_of(record.date))
        .or_default()
        .entry(record.category_id)
        .or_default()
        .add(Tally::from_measure(&measure));
    }

    tracing::debug!(
      period = %self.period,
      records = records.len(),
      buckets = buckets.len(),
      "aggregated records"
    );
    RecordSummary { period: self.period, buckets }
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::{
    category::Category,
    record::{Extra, ExtraKey},
  };

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  fn hierarchy() -> CategoryHierarchy {
    CategoryHierarchy::from_parts(
      vec![
        Category { id: 1, description: "Yoga".into(), countable: false },
        Category { id: 2, description: "Reading".into(), countable: true },
        Category { id: 3, description: "Swim".into(), countable: false },
      ],
      &[],
    )
  }

  fn entry(id: i64, date: NaiveDate, category_id: CategoryId, extras: Vec<Extra>) -> RecordEntry {
    RecordEntry { id, date, category_id, extras }
  }

  fn num(key: ExtraKey, v: f64) -> Extra { Extra::number(key, v).unwrap() }

  #[test]
  fn equal_descriptions_count_occurrences() {
    let day = d(2024, 6, 1);
    let records = vec![
      entry(1, day, 1, vec![Extra::description("yoga")]),
      entry(2, day, 1, vec![Extra::description("yoga")]),
    ];
    let summary = RecordAggregator::new(Period::Daily).aggregate(&hierarchy(), &records);
    let bucket = Bucket::Day(day);
    assert_eq!(summary.cell(&bucket, 1).tallies.len(), 1);
    assert_eq!(summary.render(&bucket, 1), "2*['yoga']");
  }

  #[test]
  fn bare_occurrences_render_as_count() {
    let day = d(2024, 6, 1);
    let records = vec![entry(1, day, 1, vec![]), entry(2, day, 1, vec![])];
    let summary = RecordAggregator::new(Period::Daily).aggregate(&hierarchy(), &records);
    assert_eq!(summary.render(&Bucket::Day(day), 1), "2");
  }

  #[test]
  fn volume_with_description() {
    let day = d(2024, 6, 1);
    let records = vec![entry(
      1,
      day,
      3,
      vec![
        Extra::description("50m"),
        num(ExtraKey::Magnitude, 10.0),
        num(ExtraKey::Scale, 0.5),
      ],
    )];
    let summary = RecordAggregator::new(Period::Daily).aggregate(&hierarchy(), &records);
    assert_eq!(summary.render(&Bucket::Day(day), 3), "5.0*['50m']");
  }

  #[test]
  fn description_sets_are_order_insensitive() {
    let day = d(2024, 6, 3);
    let records = vec![
      entry(1, day, 1, vec![Extra::description("a"), Extra::description("b")]),
      entry(2, day, 1, vec![Extra::description("b"), Extra::description("a")]),
      entry(3, day, 1, vec![Extra::description("a")]),
    ];
    let summary = RecordAggregator::new(Period::Daily).aggregate(&hierarchy(), &records);
    let cell = summary.cell(&Bucket::Day(day), 1);
    assert_eq!(cell.tallies.len(), 2);
    assert_eq!(cell.render(), "2*['a', 'b']; 1*['a']");
  }

  #[test]
  fn countable_defaults_to_volume() {
    let day = d(2024, 6, 3);
    let records = vec![entry(1, day, 2, vec![]), entry(2, day, 2, vec![])];
    let summary = RecordAggregator::new(Period::Daily).aggregate(&hierarchy(), &records);
    assert_eq!(summary.render(&Bucket::Day(day), 2), "2.0");
  }

  #[test]
  fn mixed_volume_and_count() {
    let day = d(2024, 6, 3);
    let records = vec![
      entry(1, day, 1, vec![num(ExtraKey::Magnitude, 3.0)]),
      entry(2, day, 1, vec![]),
    ];
    let summary = RecordAggregator::new(Period::Daily).aggregate(&hierarchy(), &records);
    assert_eq!(summary.render(&Bucket::Day(day), 1), "(3.0+1)");
  }

  #[test]
  fn auxiliary_metrics_render_abbreviated() {
    let day = d(2024, 6, 3);
    let records = vec![
      entry(1, day, 3, vec![num(ExtraKey::Time, 30.0), num(ExtraKey::Distance, 1.5)]),
      entry(2, day, 3, vec![num(ExtraKey::Time, 15.0)]),
    ];
    let summary = RecordAggregator::new(Period::Daily).aggregate(&hierarchy(), &records);
    assert_eq!(summary.render(&Bucket::Day(day), 3), "tim:45.0, dis:1.5");
  }

  #[test]
  fn weekly_and_monthly_buckets() {
    let records = vec![
      entry(1, d(2024, 6, 3), 1, vec![]),
      entry(2, d(2024, 6, 9), 1, vec![]),
      entry(3, d(2024, 6, 10), 1, vec![]),
      entry(4, d(2024, 7, 1), 1, vec![]),
    ];
    let weekly = RecordAggregator::new(Period::Weekly).aggregate(&hierarchy(), &records);
    assert_eq!(weekly.len(), 3);
    let first = Period::Weekly.bucket_of(d(2024, 6, 3));
    assert_eq!(weekly.render(&first, 1), "2");

    let monthly = RecordAggregator::new(Period::Monthly).aggregate(&hierarchy(), &records);
    assert_eq!(monthly.len(), 2);
    assert_eq!(monthly.render(&Bucket::Month(d(2024, 6, 1)), 1), "3");
  }

  #[test]
  fn missing_cell_is_blank() {
    let summary = RecordAggregator::new(Period::Daily).aggregate(&hierarchy(), &[]);
    let bucket = Bucket::Day(d(2024, 1, 1));
    assert!(summary.is_empty());
    assert!(summary.cell(&bucket, 1).is_empty());
    assert_eq!(summary.render(&bucket, 1), "");
  }

  #[test]
  fn aggregation_is_idempotent_and_order_free() {
    let day = d(2024, 6, 1);
    let mut records = vec![
      entry(1, day, 1, vec![Extra::description("x"), num(ExtraKey::Magnitude, 2.0)]),
      entry(2, day, 1, vec![Extra::description("y")]),
      entry(3, d(2024, 6, 2), 3, vec![num(ExtraKey::Distance, 4.0)]),
      entry(4, day, 1, vec![Extra::description("x")]),
    ];
    let aggregator = RecordAggregator::new(Period::Weekly);
    let first = aggregator.aggregate(&hierarchy(), &records);
    let second = aggregator.aggregate(&hierarchy(), &records);
    assert_eq!(first, second);

    records.reverse();
    let reversed = aggregator.aggregate(&hierarchy(), &records);
    assert_eq!(first, reversed);
  }

  #[test]
  fn merge_is_commutative() {
    let a = Tally::from_measure(&Measure {
      descriptions: vec!["swim".into()],
      magnitude:    4.0,
      scale:        2.0,
      time:         1.0,
      distance:     0.0,
    });
    let b = Tally::from_measure(&Measure {
      descriptions: vec!["swim".into()],
      magnitude:    0.0,
      scale:        1.0,
      time:         0.0,
      distance:     0.0,
    });

    let mut ab = a.clone();
    ab.merge(&b);
    let mut ba = b.clone();
    ba.merge(&a);
    assert_eq!(ab.volume, ba.volume);
    assert_eq!(ab.times, ba.times);
    assert_eq!(ab.time, ba.time);
    assert_eq!(ab.distance, ba.distance);
    assert_eq!(ab.render(), "(8.0+1)*['swim']");
  }

  #[test]
  fn negative_volume_is_rendered() {
    let day = d(2024, 6, 3);
    let records = vec![entry(1, day, 1, vec![num(ExtraKey::Magnitude, -5.0)])];
    let summary = RecordAggregator::new(Period::Daily).aggregate(&hierarchy(), &records);
    assert_eq!(summary.render(&Bucket::Day(day), 1), "-5.0");
  }

  #[test]
  fn number_formatting() {
    assert_eq!(format_number(5.0), "5.0");
    assert_eq!(format_number(2.5), "2.5");
    assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
  }
}
