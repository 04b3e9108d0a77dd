//! Alias rules: regex rewriting of free-text descriptions.
//!
//! Each category may declare an ordered list of `(canonical name, patterns)`
//! rules. A description written under a category is rewritten by that
//! category's rules first, then by each ancestor's rules up to the root.

use std::collections::HashMap;

use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  category::{CategoryHierarchy, CategoryId},
  store::{LifeStore, lift},
};

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A stored rule: every match of any pattern becomes `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRule {
  pub id:          i64,
  pub category_id: CategoryId,
  pub name:        String,
  pub patterns:    Vec<String>,
}

/// Input to [`LifeStore::insert_alias_rule`].
#[derive(Debug, Clone)]
pub struct NewAliasRule {
  pub category_id: CategoryId,
  pub name:        String,
  pub patterns:    Vec<String>,
}

impl NewAliasRule {
  /// Compile every pattern so a bad rule is rejected before it is stored.
  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::EmptyDescription);
    }
    compile(&self.patterns).map(|_| ())
  }
}

// ─── Compilation ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct CompiledAlias {
  name:  String,
  regex: Regex,
}

/// One case-insensitive alternation over all `patterns`; `None` if empty.
fn compile(patterns: &[String]) -> Result<Option<Regex>> {
  for pattern in patterns {
    Regex::new(pattern).map_err(|e| Error::InvalidAlias {
      pattern: pattern.clone(),
      reason:  e.to_string(),
    })?;
  }
  if patterns.is_empty() {
    return Ok(None);
  }

  let alternation = patterns
    .iter()
    .map(|p| format!("(?:{p})"))
    .collect::<Vec<_>>()
    .join("|");
  let combined = format!("(?i){alternation}");
  Regex::new(&combined).map(Some).map_err(|e| Error::InvalidAlias {
    pattern: combined,
    reason:  e.to_string(),
  })
}

// ─── Rewriter ────────────────────────────────────────────────────────────────

/// Compiled alias rules, keyed by category, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct AliasRewriter {
  rules: HashMap<CategoryId, Vec<CompiledAlias>>,
}

impl AliasRewriter {
  /// Compile `rules`. They are applied in the order given.
  pub fn new(rules: &[AliasRule]) -> Result<Self> {
    let mut compiled: HashMap<CategoryId, Vec<CompiledAlias>> = HashMap::new();
    for rule in rules {
      if let Some(regex) = compile(&rule.patterns)? {
        compiled
          .entry(rule.category_id)
          .or_default()
          .push(CompiledAlias { name: rule.name.clone(), regex });
      }
    }
    Ok(Self { rules: compiled })
  }

  pub async fn load<S: LifeStore>(store: &S) -> Result<Self> {
    let rules = store.list_alias_rules().await.map_err(lift)?;
    tracing::debug!(rules = rules.len(), "loaded alias rules");
    Self::new(&rules)
  }

  /// Apply only `category`'s own rules, sequentially.
  pub fn apply_own(&self, category: CategoryId, text: &str) -> String {
    let mut text = text.to_owned();
    for alias in self.rules.get(&category).into_iter().flatten() {
      text = alias
        .regex
        .replace_all(&text, NoExpand(&alias.name))
        .into_owned();
    }
    text
  }

  /// Rewrite `text` with `category`'s rules, then with each ancestor's rules
  /// walking the lowest-id parent chain up to the root.
  pub fn rewrite(
    &self,
    hierarchy: &CategoryHierarchy,
    category: CategoryId,
    text: &str,
  ) -> String {
    let mut lineage = hierarchy.lineage(category);
    if lineage.is_empty() {
      lineage.push(category);
    }
    lineage
      .into_iter()
      .fold(text.to_owned(), |acc, id| self.apply_own(id, &acc))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::category::{Category, Relation};

  fn rule(id: i64, category_id: CategoryId, name: &str, patterns: &[&str]) -> AliasRule {
    AliasRule {
      id,
      category_id,
      name: name.into(),
      patterns: patterns.iter().map(|p| p.to_string()).collect(),
    }
  }

  fn hierarchy() -> CategoryHierarchy {
    let cats = [(1, "Cardio"), (2, "Running"), (3, "Other")]
      .into_iter()
      .map(|(id, d)| Category { id, description: d.into(), countable: false })
      .collect();
    CategoryHierarchy::from_parts(cats, &[Relation { id: 1, parent: 1, child: 2 }])
  }

  #[test]
  fn two_level_chain() {
    let rewriter = AliasRewriter::new(&[
      rule(1, 2, "Run", &["jog", "running"]),
      rule(2, 1, "Cardio", &["run"]),
    ])
    .unwrap();
    let h = hierarchy();

    assert_eq!(rewriter.apply_own(2, "morning jog"), "morning Run");
    assert_eq!(rewriter.rewrite(&h, 2, "morning jog"), "morning Cardio");
    assert_eq!(rewriter.rewrite(&h, 2, "Running late"), "Cardio late");
  }

  #[test]
  fn matching_is_case_insensitive() {
    let rewriter = AliasRewriter::new(&[rule(1, 3, "Tea", &["tea", "chai"])]).unwrap();
    assert_eq!(rewriter.apply_own(3, "CHAI and Tea"), "Tea and Tea");
  }

  #[test]
  fn later_rules_see_earlier_output() {
    let rewriter = AliasRewriter::new(&[
      rule(1, 3, "walk", &["stroll"]),
      rule(2, 3, "hike", &["walk"]),
    ])
    .unwrap();
    assert_eq!(rewriter.apply_own(3, "stroll"), "hike");
  }

  #[test]
  fn parent_rules_do_not_leak_down() {
    let rewriter = AliasRewriter::new(&[rule(1, 2, "Run", &["jog"])]).unwrap();
    let h = hierarchy();
    assert_eq!(rewriter.rewrite(&h, 1, "jog"), "jog");
  }

  #[test]
  fn replacement_is_literal() {
    let rewriter = AliasRewriter::new(&[rule(1, 3, "$1 cash", &["money"])]).unwrap();
    assert_eq!(rewriter.apply_own(3, "money"), "$1 cash");
  }

  #[test]
  fn category_without_rules_is_untouched() {
    let rewriter = AliasRewriter::default();
    assert_eq!(rewriter.rewrite(&hierarchy(), 3, "anything"), "anything");
  }

  #[test]
  fn invalid_pattern_is_rejected() {
    let bad = NewAliasRule {
      category_id: 1,
      name:        "x".into(),
      patterns:    vec!["(unclosed".into()],
    };
    assert!(matches!(bad.validate(), Err(Error::InvalidAlias { .. })));
    assert!(AliasRewriter::new(&[rule(1, 1, "x", &["(unclosed"])]).is_err());
  }
}
