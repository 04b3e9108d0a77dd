//! [`Recorder`]: the write and read façade the view layer talks to.
//!
//! The recorder owns the category hierarchy and alias caches. Every write
//! that changes categories or alias rules refreshes them before returning, so
//! callers never observe a stale hierarchy.

use chrono::{NaiveDate, TimeDelta};

use crate::{
  Error, Result,
  aggregate::RecordAggregator,
  alias::{AliasRewriter, AliasRule, NewAliasRule},
  category::{CategoryHierarchy, CategoryId, NewCategory},
  counter::{self, DEFAULT_CEILING},
  record::{BasicRecord, Extra, ExtraKey, NewRecord, RecordQuery},
  sleep::{self, SleepFeedback, SleepInput},
  store::{LifeStore, lift},
  table::{self, DurationColumnProjector, Table, View},
  time::{DayBoundary, Period},
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecorderConfig {
  /// How sleep end times map to calendar days.
  pub day_boundary:    DayBoundary,
  /// Highest running total a day's counter may reach.
  pub counter_ceiling: f64,
}

impl Default for RecorderConfig {
  fn default() -> Self {
    Self {
      day_boundary:    DayBoundary::default(),
      counter_ceiling: DEFAULT_CEILING,
    }
  }
}

// ─── Recorder ────────────────────────────────────────────────────────────────

pub struct Recorder<S> {
  store:     S,
  config:    RecorderConfig,
  hierarchy: CategoryHierarchy,
  aliases:   AliasRewriter,
}

impl<S: LifeStore> Recorder<S> {
  /// Wrap `store`, loading the category hierarchy and alias rules.
  pub async fn open(store: S, config: RecorderConfig) -> Result<Self> {
    let hierarchy = CategoryHierarchy::load(&store).await?;
    let aliases = AliasRewriter::load(&store).await?;
    Ok(Self { store, config, hierarchy, aliases })
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn config(&self) -> &RecorderConfig { &self.config }

  pub fn hierarchy(&self) -> &CategoryHierarchy { &self.hierarchy }

  /// Reload categories and alias rules from the store.
  pub async fn refresh(&mut self) -> Result<()> {
    self.hierarchy.refresh(&self.store).await?;
    self.aliases = AliasRewriter::load(&self.store).await?;
    Ok(())
  }

  // ── Counters ──────────────────────────────────────────────────────────

  /// The count stored for `date`; zero when nothing was recorded.
  pub async fn counter_on(&self, date: NaiveDate) -> Result<f64> {
    Ok(self.store.counter_on(date).await.map_err(lift)?.unwrap_or(0.0))
  }

  /// Add `count` to `date`'s counter and return the new total.
  pub async fn add_counter(&self, date: NaiveDate, count: f64) -> Result<f64> {
    let total = self
      .store
      .add_to_counter(date, count, self.config.counter_ceiling)
      .await
      .map_err(lift)
      .inspect_err(|e| tracing::warn!(%date, count, "counter rejected: {e}"))?;
    tracing::info!(%date, total, "counter updated");
    Ok(total)
  }

  // ── Sleep ─────────────────────────────────────────────────────────────

  /// Total sleep attributed to `date`; zero when there is none.
  pub async fn sleep_on(&self, date: NaiveDate) -> Result<TimeDelta> {
    let sleeps = self.store.list_sleeps().await.map_err(lift)?;
    Ok(sleep::duration_on(&sleeps, self.config.day_boundary, date))
  }

  /// Record a sleep and report the attributed day's new total.
  pub async fn add_sleep(&self, input: SleepInput) -> Result<SleepFeedback> {
    let interval = input
      .into_interval()
      .inspect_err(|e| tracing::warn!("sleep rejected: {e}"))?;
    let date = self.config.day_boundary.date_of(interval.end());

    let before = self.sleep_on(date).await?;
    self.store.insert_sleep(interval, date).await.map_err(lift)?;
    let total = self.sleep_on(date).await?;

    tracing::info!(%date, duration = %sleep::format_duration(interval.duration()), "sleep added");
    Ok(SleepFeedback { date, total, growth: total - before })
  }

  // ── Records ───────────────────────────────────────────────────────────

  /// Record that `category` happened on `date`, with raw `(key, value)`
  /// extras. Descriptions are rewritten through the category's alias chain.
  ///
  /// All extras are validated before anything is written; the record and its
  /// extras are stored atomically.
  pub async fn add_basic_record_with_extras<I, K, V>(
    &self,
    date: NaiveDate,
    category: CategoryId,
    extras: I,
  ) -> Result<BasicRecord>
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
  {
    let extras = extras
      .into_iter()
      .map(|(k, v)| Extra::parse(k.as_ref(), v.as_ref()))
      .collect::<Result<Vec<_>>>()?;
    self.add_record(date, category, extras).await
  }

  /// Typed variant of [`Self::add_basic_record_with_extras`].
  pub async fn add_record(
    &self,
    date: NaiveDate,
    category: CategoryId,
    extras: Vec<Extra>,
  ) -> Result<BasicRecord> {
    if !self.hierarchy.contains(category) {
      tracing::warn!(category, "record rejected: unknown category");
      return Err(Error::CategoryNotFound(category.to_string()));
    }

    let extras = extras
      .into_iter()
      .map(|mut extra| {
        if extra.key == ExtraKey::Description {
          extra.value = self.aliases.rewrite(&self.hierarchy, category, &extra.value);
        }
        extra
      })
      .collect();

    let record = self
      .store
      .insert_record(NewRecord { date, category_id: category, extras })
      .await
      .map_err(lift)?;
    tracing::info!(id = record.id, %date, category, "record added");
    Ok(record)
  }

  /// How many records `category` has on `date`.
  pub async fn count_records(&self, date: NaiveDate, category: CategoryId) -> Result<usize> {
    self.store.count_records(date, category).await.map_err(lift)
  }

  // ── Categories ────────────────────────────────────────────────────────

  /// Create a category (optionally under `parent`) and return the refreshed
  /// hierarchy.
  pub async fn add_category(
    &mut self,
    description: &str,
    countable: bool,
    parent: Option<CategoryId>,
  ) -> Result<&CategoryHierarchy> {
    let description = description.trim();
    if description.is_empty() {
      return Err(Error::EmptyDescription);
    }
    if table::is_reserved_column(description) {
      return Err(Error::ReservedDescription(description.to_owned()));
    }
    if let Some(p) = parent.filter(|p| !self.hierarchy.contains(*p)) {
      return Err(Error::CategoryNotFound(p.to_string()));
    }

    let input = NewCategory { description: description.to_owned(), countable, parent };
    let category = self
      .store
      .insert_category(input)
      .await
      .map_err(|e| match lift(e) {
        Error::DuplicateKey(_) => Error::DuplicateCategory(description.to_owned()),
        other => other,
      })?;
    tracing::info!(id = category.id, description, ?parent, "category added");

    self.refresh().await?;
    Ok(&self.hierarchy)
  }

  /// Add a further parent → child edge and return the refreshed hierarchy.
  pub async fn link_categories(
    &mut self,
    parent: CategoryId,
    child: CategoryId,
  ) -> Result<&CategoryHierarchy> {
    for id in [parent, child] {
      if !self.hierarchy.contains(id) {
        return Err(Error::CategoryNotFound(id.to_string()));
      }
    }
    if parent == child || self.hierarchy.is_ancestor(child, parent) {
      return Err(Error::CyclicRelation { parent, child });
    }

    self.store.insert_relation(parent, child).await.map_err(lift)?;
    tracing::info!(parent, child, "categories linked");

    self.refresh().await?;
    Ok(&self.hierarchy)
  }

  // ── Alias rules ───────────────────────────────────────────────────────

  pub async fn add_alias_rule(&mut self, input: NewAliasRule) -> Result<AliasRule> {
    if !self.hierarchy.contains(input.category_id) {
      return Err(Error::CategoryNotFound(input.category_id.to_string()));
    }
    input.validate()?;

    let rule = self.store.insert_alias_rule(input).await.map_err(lift)?;
    tracing::info!(id = rule.id, category = rule.category_id, name = %rule.name, "alias added");

    self.refresh().await?;
    Ok(rule)
  }

  /// Rewrite `text` the way a description under `category` would be stored.
  pub fn normalize(&self, category: CategoryId, text: &str) -> String {
    self.aliases.rewrite(&self.hierarchy, category, text)
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Column labels of `view` at `period`, in the order [`Self::data`] uses.
  pub fn column_names(&self, view: View, period: Period) -> Vec<String> {
    match view {
      View::Records => DurationColumnProjector::new(&self.hierarchy).column_names(period),
      View::Sleeps => Table::sleeps(Vec::new()).columns,
      View::Sleep => Table::sleep_summary(period, Vec::new()).columns,
      View::Counters => Table::counters(period, Vec::new()).columns,
      View::RawRecords => Table::raw_records(&self.hierarchy, &[]).columns,
      View::Categories => Table::categories(&CategoryHierarchy::default()).columns,
      View::Relations => Table::relations(&self.hierarchy, &[]).columns,
    }
  }

  /// Build `view` at `period`, dropping dated rows before `since`.
  ///
  /// Absence of data yields an empty table, never an error.
  pub async fn data(&self, view: View, period: Period, since: Option<NaiveDate>) -> Result<Table> {
    let mut table = match view {
      View::Records => {
        let records = self.store.select_records(&RecordQuery::default()).await.map_err(lift)?;
        let summary = RecordAggregator::new(period).aggregate(&self.hierarchy, &records);
        DurationColumnProjector::new(&self.hierarchy).table(&summary)
      }
      View::Sleeps => Table::sleeps(self.store.list_sleeps().await.map_err(lift)?),
      View::Sleep => {
        let sleeps = self.store.list_sleeps().await.map_err(lift)?;
        let days = sleep::sleep_days(&sleeps, self.config.day_boundary);
        Table::sleep_summary(period, sleep::summarize_sleep(&days, period))
      }
      View::Counters => {
        let counters = self.store.list_counters().await.map_err(lift)?;
        Table::counters(period, counter::summarize_counters(&counters, period))
      }
      View::RawRecords => {
        let query = RecordQuery { since, ..RecordQuery::default() };
        let records = self.store.select_records(&query).await.map_err(lift)?;
        Table::raw_records(&self.hierarchy, &records)
      }
      View::Categories => Table::categories(&self.hierarchy),
      View::Relations => {
        let relations = self.store.list_relations().await.map_err(lift)?;
        Table::relations(&self.hierarchy, &relations)
      }
    };

    if let Some(earliest) = since {
      table.retain_since(earliest);
    }
    tracing::debug!(%view, %period, rows = table.len(), "table built");
    Ok(table)
  }
}
