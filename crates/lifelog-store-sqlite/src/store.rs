//! [`SqliteStore`], the SQLite implementation of [`LifeStore`].

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::OptionalExtension as _;

use lifelog_core::{
  alias::{AliasRule, NewAliasRule},
  category::{Category, CategoryId, NewCategory, Relation},
  counter::{self, Counter},
  record::{BasicRecord, NewRecord, RecordEntry, RecordQuery},
  sleep::{Sleep, SleepInterval},
  store::{Day, LifeStore},
};

use crate::{
  Result,
  encode::{
    RawAliasRule, RawCategory, RawCounter, RawDay, RawRecordExtra, RawRelation, RawSleep,
    encode_date, encode_dt, encode_patterns, group_record_rows,
  },
  error::{Error, classify},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A lifelog store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("schema initialised");
    Ok(())
  }
}

/// Look up the day row for `date`, inserting it if absent. The flag is `true`
/// when this call created it.
fn ensure_day(conn: &rusqlite::Connection, date: &str) -> rusqlite::Result<(i64, bool)> {
  let created =
    conn.execute("INSERT OR IGNORE INTO days (date) VALUES (?1)", rusqlite::params![date])? == 1;
  let day_id =
    conn.query_row("SELECT day_id FROM days WHERE date = ?1", rusqlite::params![date], |r| {
      r.get(0)
    })?;
  Ok((day_id, created))
}

fn count_on(conn: &rusqlite::Connection, date: &str) -> rusqlite::Result<Option<f64>> {
  conn
    .query_row(
      "SELECT c.count FROM counters c
       JOIN days d ON d.day_id = c.day_id
       WHERE d.date = ?1",
      rusqlite::params![date],
      |r| r.get(0),
    )
    .optional()
}

fn upsert_counter(conn: &rusqlite::Connection, date: &str, count: f64) -> rusqlite::Result<()> {
  let (day_id, _) = ensure_day(conn, date)?;
  conn.execute(
    "INSERT INTO counters (day_id, count) VALUES (?1, ?2)
     ON CONFLICT (day_id) DO UPDATE SET count = excluded.count",
    rusqlite::params![day_id, count],
  )?;
  Ok(())
}

// ─── LifeStore impl ──────────────────────────────────────────────────────────

impl LifeStore for SqliteStore {
  type Error = Error;

  // ── Timeline ──────────────────────────────────────────────────────────────

  async fn get_or_create_day(&self, date: NaiveDate) -> Result<(Day, bool)> {
    let date_str = encode_date(date);

    let (day_id, created) = self
      .conn
      .call(move |conn| Ok(ensure_day(conn, &date_str)?))
      .await?;

    if created {
      tracing::debug!(%date, day_id, "day created");
    }
    Ok((Day { id: day_id, date }, created))
  }

  async fn list_days(&self) -> Result<Vec<Day>> {
    let raws: Vec<RawDay> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT day_id, date FROM days ORDER BY date")?;
        let rows = stmt
          .query_map([], |row| Ok(RawDay { day_id: row.get(0)?, date: row.get(1)? }))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDay::into_day).collect()
  }

  // ── Sleep ─────────────────────────────────────────────────────────────────

  async fn insert_sleep(&self, interval: SleepInterval, attributed: NaiveDate) -> Result<Sleep> {
    let date_str  = encode_date(attributed);
    let start_str = encode_dt(interval.start());
    let end_str   = encode_dt(interval.end());

    let sleep_id: i64 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        ensure_day(&tx, &date_str)?;
        tx.execute(
          "INSERT INTO sleeps (start_at, end_at) VALUES (?1, ?2)",
          rusqlite::params![start_str, end_str],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
      })
      .await?;

    Ok(Sleep { id: sleep_id, start: interval.start(), end: interval.end() })
  }

  async fn list_sleeps(&self) -> Result<Vec<Sleep>> {
    let raws: Vec<RawSleep> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT sleep_id, start_at, end_at FROM sleeps ORDER BY start_at, sleep_id")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawSleep {
              sleep_id: row.get(0)?,
              start_at: row.get(1)?,
              end_at:   row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSleep::into_sleep).collect()
  }

  // ── Counters ──────────────────────────────────────────────────────────────

  async fn counter_on(&self, date: NaiveDate) -> Result<Option<f64>> {
    let date_str = encode_date(date);

    let count = self
      .conn
      .call(move |conn| Ok(count_on(conn, &date_str)?))
      .await?;

    Ok(count)
  }

  async fn replace_counter(&self, date: NaiveDate, count: f64) -> Result<()> {
    let date_str = encode_date(date);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        upsert_counter(&tx, &date_str, count)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn add_to_counter(&self, date: NaiveDate, delta: f64, ceiling: f64) -> Result<f64> {
    let date_str = encode_date(date);

    let total = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let current = count_on(&tx, &date_str)?.unwrap_or(0.0);
        let total = match counter::next_total(date, current, delta, ceiling) {
          Ok(total) => total,
          Err(e) => return Ok(Err(e)),
        };
        upsert_counter(&tx, &date_str, total)?;
        tx.commit()?;
        Ok(Ok(total))
      })
      .await??;

    Ok(total)
  }

  async fn list_counters(&self) -> Result<Vec<Counter>> {
    let raws: Vec<RawCounter> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT d.date, c.count FROM counters c
           JOIN days d ON d.day_id = c.day_id
           ORDER BY d.date",
        )?;
        let rows = stmt
          .query_map([], |row| Ok(RawCounter { date: row.get(0)?, count: row.get(1)? }))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCounter::into_counter).collect()
  }

  // ── Categories ────────────────────────────────────────────────────────────

  async fn list_categories(&self) -> Result<Vec<Category>> {
    let raws: Vec<RawCategory> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare("SELECT group_id, description, countable FROM record_groups ORDER BY group_id")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawCategory {
              group_id:    row.get(0)?,
              description: row.get(1)?,
              countable:   row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawCategory::into_category).collect())
  }

  async fn list_relations(&self) -> Result<Vec<Relation>> {
    let raws: Vec<RawRelation> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT relation_id, parent_id, child_id FROM group_relations ORDER BY relation_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawRelation {
              relation_id: row.get(0)?,
              parent_id:   row.get(1)?,
              child_id:    row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawRelation::into_relation).collect())
  }

  async fn insert_category(&self, input: NewCategory) -> Result<Category> {
    let description = input.description.clone();
    let countable   = input.countable;
    let parent      = input.parent;

    // The category row and its parent edge commit together, so a duplicate
    // description never leaves a dangling relation behind.
    let group_id: i64 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO record_groups (description, countable) VALUES (?1, ?2)",
          rusqlite::params![description, countable],
        )?;
        let id = tx.last_insert_rowid();
        if let Some(parent_id) = parent {
          tx.execute(
            "INSERT INTO group_relations (parent_id, child_id) VALUES (?1, ?2)",
            rusqlite::params![parent_id, id],
          )?;
        }
        tx.commit()?;
        Ok(id)
      })
      .await
      .map_err(classify)?;

    Ok(Category {
      id:          group_id,
      description: input.description,
      countable:   input.countable,
    })
  }

  async fn insert_relation(&self, parent: CategoryId, child: CategoryId) -> Result<Relation> {
    let relation_id: i64 = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO group_relations (parent_id, child_id) VALUES (?1, ?2)",
          rusqlite::params![parent, child],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await
      .map_err(classify)?;

    Ok(Relation { id: relation_id, parent, child })
  }

  // ── Alias rules ───────────────────────────────────────────────────────────

  async fn list_alias_rules(&self) -> Result<Vec<AliasRule>> {
    let raws: Vec<RawAliasRule> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT alias_id, group_id, name, patterns FROM group_aliases ORDER BY alias_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawAliasRule {
              alias_id: row.get(0)?,
              group_id: row.get(1)?,
              name:     row.get(2)?,
              patterns: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAliasRule::into_rule).collect()
  }

  async fn insert_alias_rule(&self, input: NewAliasRule) -> Result<AliasRule> {
    let patterns_str = encode_patterns(&input.patterns)?;
    let group_id     = input.category_id;
    let name         = input.name.clone();

    let alias_id: i64 = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO group_aliases (group_id, name, patterns) VALUES (?1, ?2, ?3)",
          rusqlite::params![group_id, name, patterns_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(AliasRule {
      id:          alias_id,
      category_id: input.category_id,
      name:        input.name,
      patterns:    input.patterns,
    })
  }

  // ── Records ───────────────────────────────────────────────────────────────

  async fn insert_record(&self, input: NewRecord) -> Result<BasicRecord> {
    let date_str = encode_date(input.date);
    let group_id = input.category_id;
    let extras: Vec<(&'static str, String)> =
      input.extras.into_iter().map(|e| (e.key.as_str(), e.value)).collect();

    // A failing extra rolls back the basic record with it.
    let record_id: i64 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let (day_id, _) = ensure_day(&tx, &date_str)?;
        tx.execute(
          "INSERT INTO basic_records (day_id, group_id) VALUES (?1, ?2)",
          rusqlite::params![day_id, group_id],
        )?;
        let record_id = tx.last_insert_rowid();
        {
          let mut stmt =
            tx.prepare("INSERT INTO extra_records (record_id, key, value) VALUES (?1, ?2, ?3)")?;
          for (key, value) in &extras {
            stmt.execute(rusqlite::params![record_id, key, value])?;
          }
        }
        tx.commit()?;
        Ok(record_id)
      })
      .await?;

    Ok(BasicRecord { id: record_id, date: input.date, category_id: group_id })
  }

  async fn select_records(&self, query: &RecordQuery) -> Result<Vec<RecordEntry>> {
    let group_id  = query.category_id;
    let since_str = query.since.map(encode_date);
    let until_str = query.until.map(encode_date);

    let raws: Vec<RawRecordExtra> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT r.record_id, d.date, r.group_id, e.key, e.value
           FROM basic_records r
           JOIN days d               ON d.day_id    = r.day_id
           LEFT JOIN extra_records e ON e.record_id = r.record_id
           WHERE (?1 IS NULL OR r.group_id = ?1)
             AND (?2 IS NULL OR d.date >= ?2)
             AND (?3 IS NULL OR d.date <= ?3)
           ORDER BY d.date, r.record_id, e.extra_id",
        )?;

        let rows = stmt
          .query_map(rusqlite::params![group_id, since_str, until_str], |row| {
            Ok(RawRecordExtra {
              record_id: row.get(0)?,
              date:      row.get(1)?,
              group_id:  row.get(2)?,
              key:       row.get(3)?,
              value:     row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    group_record_rows(raws)
  }

  async fn count_records(&self, date: NaiveDate, category: CategoryId) -> Result<usize> {
    let date_str = encode_date(date);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM basic_records r
           JOIN days d ON d.day_id = r.day_id
           WHERE d.date = ?1 AND r.group_id = ?2",
          rusqlite::params![date_str, category],
          |r| r.get(0),
        )?)
      })
      .await?;

    usize::try_from(count).map_err(|e| Error::Decode(e.to_string()))
  }
}
