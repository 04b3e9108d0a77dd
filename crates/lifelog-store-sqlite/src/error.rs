//! Error type for `lifelog-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] lifelog_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("decode error: {0}")]
  Decode(String),

  /// A row collided with a `UNIQUE` constraint.
  #[error("duplicate key: {0}")]
  Duplicate(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for lifelog_core::Error {
  fn from(error: Error) -> Self {
    match error {
      Error::Core(e) => e,
      Error::Duplicate(key) => lifelog_core::Error::DuplicateKey(key),
      other => lifelog_core::Error::Store(Box::new(other)),
    }
  }
}

/// Turn unique-constraint failures into [`Error::Duplicate`].
pub(crate) fn classify(error: tokio_rusqlite::Error) -> Error {
  match error {
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, message))
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
    {
      Error::Duplicate(message.unwrap_or_else(|| e.to_string()))
    }
    other => Error::Database(other),
  }
}
