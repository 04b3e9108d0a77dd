//! Layered configuration: an optional TOML file under `LIFELOG_*` variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use lifelog_core::{counter::DEFAULT_CEILING, recorder::RecorderConfig, time::DayBoundary};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub store_path: PathBuf,
  pub sleep:      SleepSettings,
  pub counter:    CounterSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SleepSettings {
  /// Hours after midnight at which a new logical day starts.
  pub day_boundary_hours: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CounterSettings {
  pub ceiling: f64,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      store_path: PathBuf::from("~/.local/share/lifelog/lifelog.db"),
      sleep:      SleepSettings::default(),
      counter:    CounterSettings::default(),
    }
  }
}

impl Default for SleepSettings {
  fn default() -> Self { Self { day_boundary_hours: DayBoundary::DEFAULT_HOURS } }
}

impl Default for CounterSettings {
  fn default() -> Self { Self { ceiling: DEFAULT_CEILING } }
}

impl Settings {
  /// Read `path` (if it exists), then apply `LIFELOG_*` overrides. Nested
  /// keys use a double underscore: `LIFELOG_SLEEP__DAY_BOUNDARY_HOURS`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("LIFELOG")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  pub fn recorder_config(&self) -> anyhow::Result<RecorderConfig> {
    let day_boundary = DayBoundary::from_hours(self.sleep.day_boundary_hours)
      .context("invalid sleep.day_boundary_hours")?;
    anyhow::ensure!(
      self.counter.ceiling > 0.0,
      "counter.ceiling must be positive (got {})",
      self.counter.ceiling
    );
    Ok(RecorderConfig { day_boundary, counter_ceiling: self.counter.ceiling })
  }

  /// `store_path` with a leading `~` expanded to the home directory.
  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use chrono::TimeDelta;
  use config::{Config, File, FileFormat};

  use super::*;

  fn parse(toml: &str) -> Settings {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_file_uses_defaults() {
    let settings = parse("");
    assert_eq!(settings.sleep.day_boundary_hours, 17);
    assert_eq!(settings.counter.ceiling, 2.0);
    assert_eq!(settings.recorder_config().unwrap(), RecorderConfig::default());
  }

  #[test]
  fn nested_sections_override_defaults() {
    let settings = parse(
      r#"
        store_path = "/tmp/life.db"
        [sleep]
        day_boundary_hours = 14
        [counter]
        ceiling = 3.5
      "#,
    );
    assert_eq!(settings.store_path(), PathBuf::from("/tmp/life.db"));
    let config = settings.recorder_config().unwrap();
    assert_eq!(config.day_boundary.offset(), TimeDelta::hours(14));
    assert_eq!(config.counter_ceiling, 3.5);
  }

  #[test]
  fn out_of_range_values_are_rejected() {
    assert!(parse("[sleep]\nday_boundary_hours = 24").recorder_config().is_err());
    assert!(parse("[counter]\nceiling = 0.0").recorder_config().is_err());
  }

  #[test]
  fn tilde_is_expanded() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    assert_eq!(expand_tilde(Path::new("/abs/x.db")), PathBuf::from("/abs/x.db"));
  }
}
