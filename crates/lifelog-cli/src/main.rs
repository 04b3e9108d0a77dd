//! `lifelog`: record sleep, counters and activities, then view them as
//! daily, weekly or monthly tables.
//!
//! # Usage
//!
//! ```
//! lifelog sleep add 23:30 07:15
//! lifelog counter add 1
//! lifelog group add Swim --parent Sport
//! lifelog record add Swim -e description=50m -e magnitude=10 -e scale=0.5
//! lifelog show records --period weekly --range 6m
//! ```

mod output;
mod settings;

use std::path::PathBuf;

use anyhow::{Context as _, bail};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use lifelog_core::{
  alias::NewAliasRule,
  recorder::Recorder,
  sleep::{SleepInput, format_duration},
  table::View,
  time::{DateFilter, Period},
};
use lifelog_store_sqlite::SqliteStore;
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "lifelog", version, about = "Personal activity log")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "lifelog.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Sleep intervals.
  #[command(subcommand)]
  Sleep(SleepCommand),
  /// The daily-capped counter.
  #[command(subcommand)]
  Counter(CounterCommand),
  /// Record groups and their hierarchy.
  #[command(subcommand)]
  Group(GroupCommand),
  /// Description alias rules.
  #[command(subcommand)]
  Alias(AliasCommand),
  /// Activity records.
  #[command(subcommand)]
  Record(RecordCommand),
  /// Print a table.
  Show {
    view:   View,
    #[arg(short, long, default_value = "daily")]
    period: Period,
    /// How far back to look: 1m, 6m, 2y or all.
    #[arg(short, long, default_value = "all")]
    range:  DateFilter,
  },
}

#[derive(Subcommand, Debug)]
enum SleepCommand {
  /// Add a sleep. Give two clock times (`23:30 07:15`, rolling over past
  /// midnight) or two timestamps (`"2024-06-09 23:30" "2024-06-10 07:15"`).
  Add {
    from: String,
    to:   String,
    /// Date the clock times start on; defaults to today.
    #[arg(short, long)]
    date: Option<NaiveDate>,
  },
}

#[derive(Subcommand, Debug)]
enum CounterCommand {
  Add {
    #[arg(default_value_t = 1.0)]
    count: f64,
    #[arg(short, long)]
    date:  Option<NaiveDate>,
  },
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
  Add {
    description: String,
    /// Occurrences without a magnitude count as 1.
    #[arg(long)]
    countable:   bool,
    /// Description of the parent group.
    #[arg(short, long)]
    parent:      Option<String>,
  },
  /// Give CHILD a further parent.
  Link { parent: String, child: String },
  /// Print the hierarchy as a tree.
  List,
}

#[derive(Subcommand, Debug)]
enum AliasCommand {
  /// Rewrite every match of PATTERNS to NAME in GROUP's descriptions.
  Add {
    group:    String,
    name:     String,
    #[arg(required = true)]
    patterns: Vec<String>,
  },
}

#[derive(Subcommand, Debug)]
enum RecordCommand {
  Add {
    group:  String,
    #[arg(short, long)]
    date:   Option<NaiveDate>,
    /// `key=value`, repeatable. Keys: description, magnitude, scale, time,
    /// distance.
    #[arg(short, long = "extra", value_parser = parse_extra)]
    extras: Vec<(String, String)>,
  },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let settings = Settings::load(&cli.config)?;
  let store_path = settings.store_path();
  if let Some(dir) = store_path.parent().filter(|d| !d.as_os_str().is_empty()) {
    std::fs::create_dir_all(dir)
      .with_context(|| format!("failed to create {}", dir.display()))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let recorder = Recorder::open(store, settings.recorder_config()?)
    .await
    .context("failed to load categories")?;

  run(recorder, cli.command).await
}

async fn run(mut recorder: Recorder<SqliteStore>, command: Command) -> anyhow::Result<()> {
  let today = Local::now().date_naive();

  match command {
    Command::Sleep(SleepCommand::Add { from, to, date }) => {
      let input = sleep_input(&from, &to, date.unwrap_or(today))?;
      let feedback = recorder.add_sleep(input).await?;
      println!(
        "{}: {} (+{})",
        feedback.date,
        format_duration(feedback.total),
        format_duration(feedback.growth)
      );
    }

    Command::Counter(CounterCommand::Add { count, date }) => {
      let date = date.unwrap_or(today);
      let total = recorder.add_counter(date, count).await?;
      println!("{date}: {total}");
    }

    Command::Group(GroupCommand::Add { description, countable, parent }) => {
      let parent = parent
        .map(|p| recorder.hierarchy().id_of(&p))
        .transpose()?;
      let hierarchy = recorder.add_category(&description, countable, parent).await?;
      println!("{} {description}", hierarchy.id_of(description.trim())?);
    }

    Command::Group(GroupCommand::Link { parent, child }) => {
      let parent = recorder.hierarchy().id_of(&parent)?;
      let child = recorder.hierarchy().id_of(&child)?;
      recorder.link_categories(parent, child).await?;
    }

    Command::Group(GroupCommand::List) => output::print_tree(recorder.hierarchy()),

    Command::Alias(AliasCommand::Add { group, name, patterns }) => {
      let category_id = recorder.hierarchy().id_of(&group)?;
      let rule = recorder
        .add_alias_rule(NewAliasRule { category_id, name, patterns })
        .await?;
      println!("{} {group}: {} <- {}", rule.id, rule.name, rule.patterns.join(" | "));
    }

    Command::Record(RecordCommand::Add { group, date, extras }) => {
      let date = date.unwrap_or(today);
      let category = recorder.hierarchy().id_of(&group)?;
      let record = recorder
        .add_basic_record_with_extras(date, category, extras)
        .await?;
      let count = recorder.count_records(date, category).await?;
      println!("{} {group} on {date} ({count} that day)", record.id);
    }

    Command::Show { view, period, range } => {
      let since = range.earliest(today);
      let table = recorder.data(view, period, since).await?;
      output::print_table(&table);
    }
  }

  Ok(())
}

// ─── Argument parsing ────────────────────────────────────────────────────────

fn parse_extra(s: &str) -> Result<(String, String), String> {
  let (key, value) = s
    .split_once('=')
    .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
  Ok((key.trim().to_owned(), value.trim().to_owned()))
}

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
  DATETIME_FORMATS
    .iter()
    .find_map(|f| NaiveDateTime::parse_from_str(s.trim(), f).ok())
}

fn parse_time(s: &str) -> Option<NaiveTime> {
  ["%H:%M", "%H:%M:%S"]
    .iter()
    .find_map(|f| NaiveTime::parse_from_str(s.trim(), f).ok())
}

fn sleep_input(from: &str, to: &str, date: NaiveDate) -> anyhow::Result<SleepInput> {
  if let (Some(start), Some(end)) = (parse_datetime(from), parse_datetime(to)) {
    return Ok(SleepInput::Interval { start, end });
  }
  match (parse_time(from), parse_time(to)) {
    (Some(start), Some(end)) => Ok(SleepInput::Clock { date, start, end }),
    _ => bail!("expected two clock times or two timestamps, got {from:?} and {to:?}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, day).unwrap() }

  #[test]
  fn cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
  }

  #[test]
  fn parses_show_arguments() {
    let cli =
      Cli::try_parse_from(["lifelog", "show", "raw-records", "-p", "weekly", "-r", "6m"]).unwrap();
    match cli.command {
      Command::Show { view, period, range } => {
        assert_eq!(view, View::RawRecords);
        assert_eq!(period, Period::Weekly);
        assert_eq!(range, DateFilter::SixMonths);
      }
      other => panic!("unexpected command {other:?}"),
    }
  }

  #[test]
  fn parses_repeated_extras() {
    let cli = Cli::try_parse_from([
      "lifelog", "record", "add", "Swim", "-e", "description=50m", "-e", "magnitude = 10",
    ])
    .unwrap();
    let Command::Record(RecordCommand::Add { extras, .. }) = cli.command else {
      panic!("expected record add");
    };
    assert_eq!(extras, vec![
      ("description".to_owned(), "50m".to_owned()),
      ("magnitude".to_owned(), "10".to_owned()),
    ]);
    assert!(parse_extra("magnitude").is_err());
  }

  #[test]
  fn sleep_input_accepts_clock_times_or_timestamps() {
    let date = d(2024, 6, 9);
    assert_eq!(sleep_input("23:30", "07:15", date).unwrap(), SleepInput::Clock {
      date,
      start: NaiveTime::from_hms_opt(23, 30, 0).unwrap(),
      end:   NaiveTime::from_hms_opt(7, 15, 0).unwrap(),
    });
    assert_eq!(
      sleep_input("2024-06-09 23:30", "2024-06-10 07:15", date).unwrap(),
      SleepInput::Interval {
        start: date.and_hms_opt(23, 30, 0).unwrap(),
        end:   d(2024, 6, 10).and_hms_opt(7, 15, 0).unwrap(),
      }
    );
    assert!(sleep_input("23:30", "2024-06-10 07:15", date).is_err());
    assert!(sleep_input("late", "early", date).is_err());
  }
}
