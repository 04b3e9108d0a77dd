//! The `LifeStore` trait and the timeline row type.
//!
//! The trait is implemented by storage backends (e.g. `lifelog-store-sqlite`).
//! [`crate::recorder::Recorder`] depends on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  alias::{AliasRule, NewAliasRule},
  category::{Category, CategoryId, NewCategory, Relation},
  counter::Counter,
  record::{BasicRecord, NewRecord, RecordEntry, RecordQuery},
  sleep::{Sleep, SleepInterval},
};

// ─── Timeline ────────────────────────────────────────────────────────────────

/// One calendar date; the join key binding all daily facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
  pub id:   i64,
  pub date: NaiveDate,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a lifelog store backend.
///
/// Every method that writes more than one row does so atomically: either all
/// rows become visible or none do. Timeline days are created on demand by any
/// write that references a new date.
pub trait LifeStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  // ── Timeline ──────────────────────────────────────────────────────────

  /// Return the day for `date`, creating it if absent. The flag is `true`
  /// when the row was created by this call.
  fn get_or_create_day(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<(Day, bool), Self::Error>> + Send + '_;

  fn list_days(&self) -> impl Future<Output = Result<Vec<Day>, Self::Error>> + Send + '_;

  // ── Sleep ─────────────────────────────────────────────────────────────

  /// Persist a sleep and make sure `attributed` exists on the timeline.
  fn insert_sleep(
    &self,
    interval: SleepInterval,
    attributed: NaiveDate,
  ) -> impl Future<Output = Result<Sleep, Self::Error>> + Send + '_;

  fn list_sleeps(&self) -> impl Future<Output = Result<Vec<Sleep>, Self::Error>> + Send + '_;

  // ── Counters ──────────────────────────────────────────────────────────

  /// The stored count for `date`, or `None` if nothing was recorded.
  fn counter_on(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<f64>, Self::Error>> + Send + '_;

  /// Upsert the count for `date`.
  fn replace_counter(
    &self,
    date: NaiveDate,
    count: f64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Add `delta` to the count for `date` and return the new total. The read,
  /// the [`crate::counter::next_total`] check against `ceiling` and the write
  /// share one transaction; a rejected delta leaves the count unchanged.
  fn add_to_counter(
    &self,
    date: NaiveDate,
    delta: f64,
    ceiling: f64,
  ) -> impl Future<Output = Result<f64, Self::Error>> + Send + '_;

  fn list_counters(&self) -> impl Future<Output = Result<Vec<Counter>, Self::Error>> + Send + '_;

  // ── Categories ────────────────────────────────────────────────────────

  fn list_categories(
    &self,
  ) -> impl Future<Output = Result<Vec<Category>, Self::Error>> + Send + '_;

  fn list_relations(&self) -> impl Future<Output = Result<Vec<Relation>, Self::Error>> + Send + '_;

  /// Create a category and, if a parent is given, its relation edge.
  /// A taken description is reported as a duplicate.
  fn insert_category(
    &self,
    input: NewCategory,
  ) -> impl Future<Output = Result<Category, Self::Error>> + Send + '_;

  fn insert_relation(
    &self,
    parent: CategoryId,
    child: CategoryId,
  ) -> impl Future<Output = Result<Relation, Self::Error>> + Send + '_;

  // ── Alias rules ───────────────────────────────────────────────────────

  /// All rules in insertion order.
  fn list_alias_rules(
    &self,
  ) -> impl Future<Output = Result<Vec<AliasRule>, Self::Error>> + Send + '_;

  fn insert_alias_rule(
    &self,
    input: NewAliasRule,
  ) -> impl Future<Output = Result<AliasRule, Self::Error>> + Send + '_;

  // ── Records ───────────────────────────────────────────────────────────

  /// Create a basic record with all of its extras.
  fn insert_record(
    &self,
    input: NewRecord,
  ) -> impl Future<Output = Result<BasicRecord, Self::Error>> + Send + '_;

  /// Records joined with their date and extras, ordered by date then id.
  fn select_records<'a>(
    &'a self,
    query: &'a RecordQuery,
  ) -> impl Future<Output = Result<Vec<RecordEntry>, Self::Error>> + Send + 'a;

  fn count_records(
    &self,
    date: NaiveDate,
    category: CategoryId,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

/// Lift a backend error into the core [`Error`](crate::Error).
pub fn lift<E: Into<crate::Error>>(error: E) -> crate::Error { error.into() }
