//! Column-labelled tables for the view layer.
//!
//! Each row kind carries a static table of `(column, accessor)` pairs. The
//! column list of a [`Table`] is taken from the same source as the values,
//! so headers and cells cannot drift apart.

use std::{collections::BTreeMap, fmt};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
  aggregate::{RecordSummary, format_number},
  category::{CategoryHierarchy, Relation},
  counter::CounterBucket,
  record::RecordEntry,
  sleep::{Sleep, SleepBucket, format_duration},
  time::{Bucket, Period},
};

// ─── Values ──────────────────────────────────────────────────────────────────

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Id(i64),
  Date(NaiveDate),
  DateTime(NaiveDateTime),
  Text(String),
  Number(f64),
  Duration(TimeDelta),
  Bool(bool),
  Empty,
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Id(id) => write!(f, "{id}"),
      Value::Date(d) => write!(f, "{d}"),
      Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
      Value::Text(s) => f.write_str(s),
      Value::Number(n) => f.write_str(&format_number(*n)),
      Value::Duration(d) => f.write_str(&format_duration(*d)),
      Value::Bool(b) => write!(f, "{b}"),
      Value::Empty => Ok(()),
    }
  }
}

// ─── Views ───────────────────────────────────────────────────────────────────

/// Every table the view layer can ask for.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum View {
  /// Raw sleep intervals.
  Sleeps,
  /// Sleep totals per bucket.
  Sleep,
  /// Counter totals per bucket.
  Counters,
  /// Aggregated records, one column per category.
  Records,
  /// Raw records with their extras.
  RawRecords,
  Categories,
  Relations,
}

impl View {
  /// Whether the table changes with the requested [`Period`].
  pub fn is_periodic(self) -> bool {
    matches!(self, View::Sleep | View::Counters | View::Records)
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

type Accessor<T> = fn(&T) -> Value;

/// One aggregated record bucket; cells are keyed by category description.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRow {
  pub id:     i64,
  pub bucket: Bucket,
  pub cells:  BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SleepRow {
  pub id:      i64,
  pub summary: SleepBucket,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CounterRow {
  pub id:      i64,
  pub summary: CounterBucket,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRecordRow {
  pub id:    i64,
  pub date:  NaiveDate,
  pub group: String,
  pub extra: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRow {
  pub id:          i64,
  pub description: String,
  pub countable:   bool,
  pub parents:     Vec<String>,
  pub children:    Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationRow {
  pub id:     i64,
  pub parent: String,
  pub child:  String,
}

const SLEEP_COLUMNS: &[(&str, Accessor<Sleep>)] = &[
  ("id", |s| Value::Id(s.id)),
  ("start", |s| Value::DateTime(s.start)),
  ("end", |s| Value::DateTime(s.end)),
  ("duration", |s| Value::Duration(s.duration())),
];

const SLEEP_SUMMARY_COLUMNS: &[(&str, Accessor<SleepRow>)] = &[
  ("duration", |r| Value::Duration(r.summary.mean)),
  ("count", |r| Value::Number(f64::from(r.summary.count))),
  ("min", |r| Value::Duration(r.summary.min)),
];

const COUNTER_COLUMNS: &[(&str, Accessor<CounterRow>)] =
  &[("count", |r| Value::Number(r.summary.count))];

const RAW_RECORD_COLUMNS: &[(&str, Accessor<RawRecordRow>)] = &[
  ("id", |r| Value::Id(r.id)),
  ("date", |r| Value::Date(r.date)),
  ("group", |r| Value::Text(r.group.clone())),
  ("extra", |r| Value::Text(r.extra.clone())),
];

const CATEGORY_COLUMNS: &[(&str, Accessor<CategoryRow>)] = &[
  ("id", |r| Value::Id(r.id)),
  ("description", |r| Value::Text(r.description.clone())),
  ("countable", |r| Value::Bool(r.countable)),
  ("parents", |r| Value::Text(r.parents.join(", "))),
  ("children", |r| Value::Text(r.children.join(", "))),
];

const RELATION_COLUMNS: &[(&str, Accessor<RelationRow>)] = &[
  ("id", |r| Value::Id(r.id)),
  ("parent", |r| Value::Text(r.parent.clone())),
  ("child", |r| Value::Text(r.child.clone())),
];

fn lookup<T>(columns: &[(&str, Accessor<T>)], row: &T, column: &str) -> Option<Value> {
  columns
    .iter()
    .find(|(name, _)| *name == column)
    .map(|(_, get)| get(row))
}

fn names<'a, T>(
  columns: &'a [(&'static str, Accessor<T>)],
) -> impl Iterator<Item = &'static str> + 'a {
  columns.iter().map(|(name, _)| *name)
}

/// Sleep metrics shown at each period.
fn sleep_metrics(period: Period) -> &'static [&'static str] {
  match period {
    Period::Daily => &["duration", "count"],
    Period::Weekly => &["duration", "min"],
    Period::Monthly => &["duration"],
  }
}

/// Value of a date-like column for `bucket`, or `None` if the column does not
/// belong to the bucket's period.
fn bucket_attr(bucket: &Bucket, column: &str) -> Option<Value> {
  let period = bucket.period();
  period
    .date_columns()
    .iter()
    .position(|c| *c == column)
    .map(|i| Value::Date(bucket.date_values()[i]))
}

/// A table row. Columns are resolved through a per-variant accessor table.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
  Sleep(Sleep),
  SleepSummary(SleepRow),
  Counter(CounterRow),
  Record(RecordRow),
  RawRecord(RawRecordRow),
  Category(CategoryRow),
  Relation(RelationRow),
}

impl Row {
  /// The value under `column`, or `None` if the row has no such column.
  /// Known columns without data yield [`Value::Empty`].
  pub fn attr(&self, column: &str) -> Option<Value> {
    match self {
      Row::Sleep(s) => lookup(SLEEP_COLUMNS, s, column),
      Row::SleepSummary(r) => match column {
        "id" => Some(Value::Id(r.id)),
        _ => bucket_attr(&r.summary.bucket, column).or_else(|| {
          sleep_metrics(r.summary.bucket.period())
            .contains(&column)
            .then(|| lookup(SLEEP_SUMMARY_COLUMNS, r, column))
            .flatten()
        }),
      },
      Row::Counter(r) => match column {
        "id" => Some(Value::Id(r.id)),
        _ => bucket_attr(&r.summary.bucket, column)
          .or_else(|| lookup(COUNTER_COLUMNS, r, column)),
      },
      Row::Record(r) => match column {
        "id" => Some(Value::Id(r.id)),
        _ => bucket_attr(&r.bucket, column).or_else(|| {
          r.cells.get(column).map(|text| {
            if text.is_empty() {
              Value::Empty
            } else {
              Value::Text(text.clone())
            }
          })
        }),
      },
      Row::RawRecord(r) => lookup(RAW_RECORD_COLUMNS, r, column),
      Row::Category(r) => lookup(CATEGORY_COLUMNS, r, column),
      Row::Relation(r) => lookup(RELATION_COLUMNS, r, column),
    }
  }

  /// The date used for date filtering, if the row has one.
  pub fn date(&self) -> Option<NaiveDate> {
    match self {
      Row::Sleep(s) => Some(s.end.date()),
      Row::SleepSummary(r) => Some(r.summary.bucket.end()),
      Row::Counter(r) => Some(r.summary.bucket.end()),
      Row::Record(r) => Some(r.bucket.end()),
      Row::RawRecord(r) => Some(r.date),
      Row::Category(_) | Row::Relation(_) => None,
    }
  }
}

// ─── Table ───────────────────────────────────────────────────────────────────

/// Column labels plus rows, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
  pub columns: Vec<String>,
  pub rows:    Vec<Row>,
}

impl Table {
  /// `get_record_attr`: the value of `column` in `row`, blank if absent.
  pub fn value(row: &Row, column: &str) -> Value { row.attr(column).unwrap_or(Value::Empty) }

  /// All cells of `row` in column order.
  pub fn cells(&self, row: &Row) -> Vec<Value> {
    self.columns.iter().map(|c| Self::value(row, c)).collect()
  }

  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  /// Keep rows dated on or after `earliest`; undated rows are always kept.
  pub fn retain_since(&mut self, earliest: NaiveDate) {
    self
      .rows
      .retain(|row| row.date().is_none_or(|date| date >= earliest));
  }
}

/// Whether `name` is one of the fixed columns that precede the category
/// columns of the records table at some period.
pub fn is_reserved_column(name: &str) -> bool {
  name == "id" || Period::ALL.iter().any(|p| p.date_columns().contains(&name))
}

fn bucket_columns<'a>(
  period: Period,
  rest: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
  std::iter::once("id")
    .chain(period.date_columns().iter().copied())
    .chain(rest)
    .map(str::to_owned)
    .collect()
}

// ─── Duration projector ──────────────────────────────────────────────────────

/// Renders a [`RecordSummary`] as rows with one column per category.
#[derive(Debug, Clone, Copy)]
pub struct DurationColumnProjector<'a> {
  hierarchy: &'a CategoryHierarchy,
}

impl<'a> DurationColumnProjector<'a> {
  pub fn new(hierarchy: &'a CategoryHierarchy) -> Self { Self { hierarchy } }

  /// `id`, the period's date columns, then every category description in
  /// ascending id order.
  pub fn column_names(&self, period: Period) -> Vec<String> {
    bucket_columns(
      period,
      self.hierarchy.categories().map(|c| c.description.as_str()),
    )
  }

  /// One row per populated bucket, ascending.
  pub fn rows(&self, summary: &RecordSummary) -> Vec<Row> {
    summary
      .buckets()
      .enumerate()
      .map(|(i, bucket)| {
        let cells = self
          .hierarchy
          .categories()
          .map(|c| (c.description.clone(), summary.render(bucket, c.id)))
          .collect();
        Row::Record(RecordRow { id: i as i64 + 1, bucket: *bucket, cells })
      })
      .collect()
  }

  pub fn table(&self, summary: &RecordSummary) -> Table {
    Table {
      columns: self.column_names(summary.period()),
      rows:    self.rows(summary),
    }
  }
}

// ─── Other tables ────────────────────────────────────────────────────────────

impl Table {
  pub fn sleeps(sleeps: Vec<Sleep>) -> Self {
    Self {
      columns: names(SLEEP_COLUMNS).map(str::to_owned).collect(),
      rows:    sleeps.into_iter().map(Row::Sleep).collect(),
    }
  }

  pub fn sleep_summary(period: Period, buckets: Vec<SleepBucket>) -> Self {
    Self {
      columns: bucket_columns(period, sleep_metrics(period).iter().copied()),
      rows:    buckets
        .into_iter()
        .enumerate()
        .map(|(i, summary)| Row::SleepSummary(SleepRow { id: i as i64 + 1, summary }))
        .collect(),
    }
  }

  pub fn counters(period: Period, buckets: Vec<CounterBucket>) -> Self {
    Self {
      columns: bucket_columns(period, names(COUNTER_COLUMNS)),
      rows:    buckets
        .into_iter()
        .enumerate()
        .map(|(i, summary)| Row::Counter(CounterRow { id: i as i64 + 1, summary }))
        .collect(),
    }
  }

  pub fn raw_records(hierarchy: &CategoryHierarchy, records: &[RecordEntry]) -> Self {
    let rows = records
      .iter()
      .map(|r| {
        let group = hierarchy
          .description_of(r.category_id)
          .map(str::to_owned)
          .unwrap_or_else(|_| r.category_id.to_string());
        let extra = r
          .extras
          .iter()
          .map(|e| format!("{}={}", e.key, e.value))
          .collect::<Vec<_>>()
          .join(", ");
        Row::RawRecord(RawRecordRow { id: r.id, date: r.date, group, extra })
      })
      .collect();
    Self {
      columns: names(RAW_RECORD_COLUMNS).map(str::to_owned).collect(),
      rows,
    }
  }

  pub fn categories(hierarchy: &CategoryHierarchy) -> Self {
    let describe = |ids: Vec<i64>| -> Vec<String> {
      ids
        .into_iter()
        .filter_map(|id| hierarchy.description_of(id).ok().map(str::to_owned))
        .collect()
    };
    let rows = hierarchy
      .categories()
      .map(|c| {
        Row::Category(CategoryRow {
          id:          c.id,
          description: c.description.clone(),
          countable:   c.countable,
          parents:     describe(hierarchy.parents_of(c.id)),
          children:    describe(hierarchy.children_of(c.id)),
        })
      })
      .collect();
    Self {
      columns: names(CATEGORY_COLUMNS).map(str::to_owned).collect(),
      rows,
    }
  }

  pub fn relations(hierarchy: &CategoryHierarchy, relations: &[Relation]) -> Self {
    let name = |id: i64| {
      hierarchy
        .description_of(id)
        .map(str::to_owned)
        .unwrap_or_else(|_| id.to_string())
    };
    let rows = relations
      .iter()
      .map(|r| {
        Row::Relation(RelationRow { id: r.id, parent: name(r.parent), child: name(r.child) })
      })
      .collect();
    Self {
      columns: names(RELATION_COLUMNS).map(str::to_owned).collect(),
      rows,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    aggregate::RecordAggregator,
    category::Category,
    record::{Extra, ExtraKey},
    sleep::SleepDay,
  };

  fn d(y: i32, m: u32, day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, day).unwrap() }

  fn hierarchy() -> CategoryHierarchy {
    CategoryHierarchy::from_parts(
      vec![
        Category { id: 1, description: "Root".into(), countable: false },
        Category { id: 2, description: "Sport".into(), countable: false },
        Category { id: 3, description: "Swim".into(), countable: false },
      ],
      &[
        Relation { id: 1, parent: 1, child: 2 },
        Relation { id: 2, parent: 2, child: 3 },
      ],
    )
  }

  fn records() -> Vec<RecordEntry> {
    vec![
      RecordEntry {
        id:          1,
        date:        d(2024, 6, 1),
        category_id: 3,
        extras:      vec![
          Extra::description("50m"),
          Extra::number(ExtraKey::Magnitude, 10.0).unwrap(),
          Extra::number(ExtraKey::Scale, 0.5).unwrap(),
        ],
      },
      RecordEntry { id: 2, date: d(2024, 6, 4), category_id: 2, extras: vec![] },
    ]
  }

  #[test]
  fn fixed_columns_are_reserved() {
    for label in ["id", "date", "monday", "sunday", "month"] {
      assert!(is_reserved_column(label), "{label}");
    }
    assert!(!is_reserved_column("Date"));
    assert!(!is_reserved_column("duration"));
  }

  #[test]
  fn column_names_per_period() {
    let h = hierarchy();
    let p = DurationColumnProjector::new(&h);
    assert_eq!(p.column_names(Period::Daily), ["id", "date", "Root", "Sport", "Swim"]);
    assert_eq!(
      p.column_names(Period::Weekly),
      ["id", "monday", "sunday", "Root", "Sport", "Swim"]
    );
    assert_eq!(p.column_names(Period::Monthly), ["id", "month", "Root", "Sport", "Swim"]);
  }

  #[test]
  fn daily_rows_render_cells() {
    let h = hierarchy();
    let summary = RecordAggregator::new(Period::Daily).aggregate(&h, &records());
    let table = DurationColumnProjector::new(&h).table(&summary);

    assert_eq!(table.len(), 2);
    let first = &table.rows[0];
    assert_eq!(Table::value(first, "date"), Value::Date(d(2024, 6, 1)));
    assert_eq!(Table::value(first, "Swim"), Value::Text("5.0*['50m']".into()));
    assert_eq!(Table::value(first, "Sport"), Value::Empty);
    assert_eq!(Table::value(&table.rows[1], "Sport"), Value::Text("1".into()));
  }

  #[test]
  fn cells_follow_column_order() {
    let h = hierarchy();
    let summary = RecordAggregator::new(Period::Weekly).aggregate(&h, &records());
    let table = DurationColumnProjector::new(&h).table(&summary);

    assert_eq!(table.len(), 2);
    let cells = table.cells(&table.rows[0]);
    assert_eq!(cells.len(), table.columns.len());
    assert_eq!(
      cells,
      vec![
        Value::Id(1),
        Value::Date(d(2024, 5, 27)),
        Value::Date(d(2024, 6, 2)),
        Value::Empty,
        Value::Empty,
        Value::Text("5.0*['50m']".into()),
      ]
    );
  }

  #[test]
  fn date_columns_of_other_periods_are_absent() {
    let h = hierarchy();
    let summary = RecordAggregator::new(Period::Monthly).aggregate(&h, &records());
    let rows = DurationColumnProjector::new(&h).rows(&summary);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].attr("month"), Some(Value::Date(d(2024, 6, 1))));
    assert_eq!(rows[0].attr("monday"), None);
    assert_eq!(rows[0].attr("nonexistent"), None);
  }

  #[test]
  fn sleep_summary_columns() {
    let days = vec![SleepDay { date: d(2024, 6, 3), duration: TimeDelta::hours(7), count: 1 }];
    let weekly = crate::sleep::summarize_sleep(&days, Period::Weekly);
    let table = Table::sleep_summary(Period::Weekly, weekly);
    assert_eq!(table.columns, ["id", "monday", "sunday", "duration", "min"]);
    let row = &table.rows[0];
    assert_eq!(row.attr("count"), None);
    assert_eq!(table.cells(row)[3].to_string(), "07:00");
  }

  #[test]
  fn category_table_lists_relations() {
    let table = Table::categories(&hierarchy());
    assert_eq!(table.columns, ["id", "description", "countable", "parents", "children"]);
    let sport = &table.rows[1];
    assert_eq!(Table::value(sport, "parents"), Value::Text("Root".into()));
    assert_eq!(Table::value(sport, "children"), Value::Text("Swim".into()));
  }

  #[test]
  fn raw_records_show_extras() {
    let table = Table::raw_records(&hierarchy(), &records());
    assert_eq!(
      Table::value(&table.rows[0], "extra").to_string(),
      "description=50m, magnitude=10, scale=0.5"
    );
    assert_eq!(Table::value(&table.rows[0], "group"), Value::Text("Swim".into()));
  }

  #[test]
  fn retain_since_drops_old_rows() {
    let h = hierarchy();
    let summary = RecordAggregator::new(Period::Daily).aggregate(&h, &records());
    let mut table = DurationColumnProjector::new(&h).table(&summary);
    table.retain_since(d(2024, 6, 2));
    assert_eq!(table.len(), 1);
  }
}
