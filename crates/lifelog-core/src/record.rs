//! Activity records: a `(date, category)` occurrence plus typed extras.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{Error, Result, category::CategoryId};

pub type RecordId = i64;

// ─── Extras ──────────────────────────────────────────────────────────────────

/// The closed set of qualifiers an extra may carry.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Display,
  EnumString,
  IntoStaticStr,
  Serialize,
  Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExtraKey {
  Description,
  Magnitude,
  Scale,
  Time,
  Distance,
}

impl ExtraKey {
  pub const ALL: [ExtraKey; 5] = [
    ExtraKey::Description,
    ExtraKey::Magnitude,
    ExtraKey::Scale,
    ExtraKey::Time,
    ExtraKey::Distance,
  ];

  pub fn is_numeric(self) -> bool { !matches!(self, ExtraKey::Description) }

  pub fn as_str(self) -> &'static str { self.into() }
}

/// A key/value qualifier attached to a record. Values are kept as text, the
/// way they are stored; numeric keys are checked to parse on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extra {
  pub key:   ExtraKey,
  pub value: String,
}

impl Extra {
  pub fn new(key: ExtraKey, value: impl Into<String>) -> Result<Self> {
    let value = value.into();
    if key.is_numeric() {
      parse_number(&value).ok_or_else(|| Error::InvalidExtraValue {
        key:   key.to_string(),
        value: value.clone(),
      })?;
    }
    Ok(Self { key, value })
  }

  pub fn description(text: impl Into<String>) -> Self {
    Self { key: ExtraKey::Description, value: text.into() }
  }

  pub fn number(key: ExtraKey, value: f64) -> Result<Self> {
    Self::new(key, value.to_string())
  }

  /// Parse a raw `(key, value)` pair as entered by a user.
  pub fn parse(key: &str, value: &str) -> Result<Self> {
    let key: ExtraKey = key
      .trim()
      .parse()
      .map_err(|_| Error::UnknownExtraKey(key.to_owned()))?;
    Self::new(key, value.trim())
  }

  /// The numeric value, if this is a numeric key holding a finite number.
  pub fn as_number(&self) -> Option<f64> {
    self.key.is_numeric().then(|| parse_number(&self.value)).flatten()
  }
}

fn parse_number(s: &str) -> Option<f64> {
  s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// The atomic fact "this activity happened on this day".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicRecord {
  pub id:          RecordId,
  pub date:        NaiveDate,
  pub category_id: CategoryId,
}

/// Input to [`crate::store::LifeStore::insert_record`].
#[derive(Debug, Clone)]
pub struct NewRecord {
  pub date:        NaiveDate,
  pub category_id: CategoryId,
  pub extras:      Vec<Extra>,
}

/// A record joined with its owning date and all of its extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
  pub id:          RecordId,
  pub date:        NaiveDate,
  pub category_id: CategoryId,
  pub extras:      Vec<Extra>,
}

/// Filters for [`crate::store::LifeStore::select_records`]. All bounds are
/// inclusive.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
  pub category_id: Option<CategoryId>,
  pub since:       Option<NaiveDate>,
  pub until:       Option<NaiveDate>,
}

// ─── Measure ─────────────────────────────────────────────────────────────────

/// The extras of one record collapsed into typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
  pub descriptions: Vec<String>,
  pub magnitude:    f64,
  pub scale:        f64,
  pub time:         f64,
  pub distance:     f64,
}

impl Measure {
  /// Defaults for a record with no numeric extras.
  pub fn defaults(countable: bool) -> Self {
    Self {
      descriptions: Vec::new(),
      magnitude:    if countable { 1.0 } else { 0.0 },
      scale:        1.0,
      time:         0.0,
      distance:     0.0,
    }
  }

  /// Collapse `extras` over the defaults. Descriptions accumulate in order;
  /// a repeated numeric key keeps its last value.
  pub fn collapse(extras: &[Extra], countable: bool) -> Self {
    let mut measure = Self::defaults(countable);
    for extra in extras {
      if extra.key == ExtraKey::Description {
        measure.descriptions.push(extra.value.clone());
        continue;
      }
      let Some(value) = extra.as_number() else {
        tracing::warn!(key = %extra.key, value = %extra.value, "ignoring malformed extra");
        continue;
      };
      match extra.key {
        ExtraKey::Magnitude => measure.magnitude = value,
        ExtraKey::Scale => measure.scale = value,
        ExtraKey::Time => measure.time = value,
        ExtraKey::Distance => measure.distance = value,
        ExtraKey::Description => {}
      }
    }
    measure
  }

  pub fn volume(&self) -> f64 { self.magnitude * self.scale }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_known_keys() {
    let e = Extra::parse("magnitude", " 10 ").unwrap();
    assert_eq!(e.key, ExtraKey::Magnitude);
    assert_eq!(e.as_number(), Some(10.0));
    assert_eq!(Extra::parse("description", "50m").unwrap().as_number(), None);
    for key in ExtraKey::ALL {
      assert_eq!(key.as_str().parse::<ExtraKey>().unwrap(), key);
    }
  }

  #[test]
  fn unknown_key_is_rejected() {
    assert!(matches!(
      Extra::parse("colour", "red"),
      Err(Error::UnknownExtraKey(k)) if k == "colour"
    ));
  }

  #[test]
  fn malformed_number_is_rejected() {
    assert!(matches!(
      Extra::parse("scale", "half"),
      Err(Error::InvalidExtraValue { .. })
    ));
    assert!(Extra::parse("time", "NaN").is_err());
  }

  #[test]
  fn defaults_depend_on_countable() {
    assert_eq!(Measure::collapse(&[], true).volume(), 1.0);
    assert_eq!(Measure::collapse(&[], false).volume(), 0.0);
  }

  #[test]
  fn collapse_typed_fields() {
    let extras = vec![
      Extra::description("50m"),
      Extra::number(ExtraKey::Magnitude, 10.0).unwrap(),
      Extra::number(ExtraKey::Scale, 0.5).unwrap(),
      Extra::description("pool"),
      Extra::number(ExtraKey::Distance, 2.0).unwrap(),
    ];
    let m = Measure::collapse(&extras, false);
    assert_eq!(m.descriptions, vec!["50m", "pool"]);
    assert_eq!(m.volume(), 5.0);
    assert_eq!(m.distance, 2.0);
    assert_eq!(m.time, 0.0);
  }
}
