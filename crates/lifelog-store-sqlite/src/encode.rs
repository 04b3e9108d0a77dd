//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Dates are stored as `YYYY-MM-DD` and timestamps as `YYYY-MM-DD HH:MM:SS`,
//! so lexical order matches chronological order. Alias patterns are stored as
//! a compact JSON array.

use chrono::{NaiveDate, NaiveDateTime};
use lifelog_core::{
  alias::AliasRule,
  category::{Category, Relation},
  counter::Counter,
  record::{Extra, ExtraKey, RecordEntry},
  sleep::Sleep,
  store::Day,
};

use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(date: NaiveDate) -> String { date.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

// ─── NaiveDateTime ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: NaiveDateTime) -> String { dt.format(DATETIME_FORMAT).to_string() }

pub fn decode_dt(s: &str) -> Result<NaiveDateTime> {
  NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

// ─── Alias patterns ──────────────────────────────────────────────────────────

pub fn encode_patterns(patterns: &[String]) -> Result<String> {
  Ok(serde_json::to_string(patterns)?)
}

pub fn decode_patterns(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

// ─── Extras ──────────────────────────────────────────────────────────────────

pub fn decode_extra(key: &str, value: String) -> Result<Extra> {
  let key: ExtraKey = key
    .parse()
    .map_err(|_| Error::Decode(format!("unknown extra key: {key:?}")))?;
  Ok(Extra { key, value })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `days` row.
pub struct RawDay {
  pub day_id: i64,
  pub date:   String,
}

impl RawDay {
  pub fn into_day(self) -> Result<Day> {
    Ok(Day { id: self.day_id, date: decode_date(&self.date)? })
  }
}

pub struct RawSleep {
  pub sleep_id: i64,
  pub start_at: String,
  pub end_at:   String,
}

impl RawSleep {
  pub fn into_sleep(self) -> Result<Sleep> {
    Ok(Sleep {
      id:    self.sleep_id,
      start: decode_dt(&self.start_at)?,
      end:   decode_dt(&self.end_at)?,
    })
  }
}

/// A `counters` row joined with its day.
pub struct RawCounter {
  pub date:  String,
  pub count: f64,
}

impl RawCounter {
  pub fn into_counter(self) -> Result<Counter> {
    Ok(Counter { date: decode_date(&self.date)?, count: self.count })
  }
}

pub struct RawCategory {
  pub group_id:    i64,
  pub description: String,
  pub countable:   bool,
}

impl RawCategory {
  pub fn into_category(self) -> Category {
    Category {
      id:          self.group_id,
      description: self.description,
      countable:   self.countable,
    }
  }
}

pub struct RawRelation {
  pub relation_id: i64,
  pub parent_id:   i64,
  pub child_id:    i64,
}

impl RawRelation {
  pub fn into_relation(self) -> Relation {
    Relation { id: self.relation_id, parent: self.parent_id, child: self.child_id }
  }
}

pub struct RawAliasRule {
  pub alias_id: i64,
  pub group_id: i64,
  pub name:     String,
  pub patterns: String,
}

impl RawAliasRule {
  pub fn into_rule(self) -> Result<AliasRule> {
    Ok(AliasRule {
      id:          self.alias_id,
      category_id: self.group_id,
      name:        self.name,
      patterns:    decode_patterns(&self.patterns)?,
    })
  }
}

/// One `basic_records` row left-joined with a single extra. A record without
/// extras appears once with `key` and `value` unset.
pub struct RawRecordExtra {
  pub record_id: i64,
  pub date:      String,
  pub group_id:  i64,
  pub key:       Option<String>,
  pub value:     Option<String>,
}

/// Fold joined rows (ordered by record) into one entry per record.
pub fn group_record_rows(rows: Vec<RawRecordExtra>) -> Result<Vec<RecordEntry>> {
  let mut entries: Vec<RecordEntry> = Vec::new();
  for row in rows {
    let extra = match (row.key, row.value) {
      (Some(key), Some(value)) => Some(decode_extra(&key, value)?),
      _ => None,
    };

    match entries.last_mut() {
      Some(last) if last.id == row.record_id => last.extras.extend(extra),
      _ => entries.push(RecordEntry {
        id:          row.record_id,
        date:        decode_date(&row.date)?,
        category_id: row.group_id,
        extras:      extra.into_iter().collect(),
      }),
    }
  }
  Ok(entries)
}
