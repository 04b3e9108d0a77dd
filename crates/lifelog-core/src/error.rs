//! Error types for `lifelog-core`.
//!
//! Only the write path raises domain errors. Reads turn "no data" into empty
//! or zero values instead of failing.

use chrono::{NaiveDate, TimeDelta};
use thiserror::Error;

use crate::category::CategoryId;

#[derive(Debug, Error)]
pub enum Error {
  // ── Not found ───────────────────────────────────────────────────────────

  #[error("category not found: {0}")]
  CategoryNotFound(String),

  #[error("no timeline entry for {0}")]
  DayNotFound(NaiveDate),

  // ── Uniqueness ──────────────────────────────────────────────────────────

  #[error("category {0:?} already exists")]
  DuplicateCategory(String),

  #[error("duplicate key: {0}")]
  DuplicateKey(String),

  // ── Validation ──────────────────────────────────────────────────────────

  #[error("invalid sleep interval: {0}")]
  InvalidSleep(&'static str),

  #[error("count should be greater than 0 (got {0})")]
  CounterNonPositive(f64),

  #[error("count on {date} would be {total} (over {ceiling})")]
  CeilingExceeded {
    date:    NaiveDate,
    total:   f64,
    ceiling: f64,
  },

  #[error("unknown extra key: {0:?}")]
  UnknownExtraKey(String),

  #[error("invalid value {value:?} for extra {key:?}")]
  InvalidExtraValue { key: String, value: String },

  #[error("invalid alias pattern {pattern:?}: {reason}")]
  InvalidAlias { pattern: String, reason: String },

  #[error("linking {parent} -> {child} would create a cycle")]
  CyclicRelation {
    parent: CategoryId,
    child:  CategoryId,
  },

  #[error("description must not be empty")]
  EmptyDescription,

  #[error("{0:?} is reserved for a table column")]
  ReservedDescription(String),

  #[error("invalid day boundary offset: {0}")]
  InvalidDayBoundary(TimeDelta),

  // ── Backend ─────────────────────────────────────────────────────────────

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Whether the error is a user-correctable input problem rather than a
  /// backend failure.
  pub fn is_validation(&self) -> bool { !matches!(self, Self::Store(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
