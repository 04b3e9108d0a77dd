//! Record groups ("categories") and the in-memory hierarchy cache.
//!
//! Categories form a DAG: a category may have several parents. Walks that need
//! a single parent (alias inheritance, tree display) follow the parent with the
//! lowest id.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  store::{LifeStore, lift},
};

pub type CategoryId = i64;

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A named activity classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
  pub id:          CategoryId,
  pub description: String,
  /// Occurrences without an explicit magnitude count as 1 rather than 0.
  pub countable:   bool,
}

/// A parent → child edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
  pub id:     i64,
  pub parent: CategoryId,
  pub child:  CategoryId,
}

/// Input to [`LifeStore::insert_category`].
#[derive(Debug, Clone)]
pub struct NewCategory {
  pub description: String,
  pub countable:   bool,
  pub parent:      Option<CategoryId>,
}

// ─── Hierarchy ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct Node {
  category: Option<Category>,
  parents:  BTreeSet<CategoryId>,
  children: BTreeSet<CategoryId>,
}

/// Snapshot of every category and relation edge in the store.
///
/// The cache is not invalidated by writes made elsewhere; it is rebuilt
/// wholesale by [`CategoryHierarchy::refresh`].
#[derive(Debug, Clone, Default)]
pub struct CategoryHierarchy {
  nodes:          BTreeMap<CategoryId, Node>,
  by_description: HashMap<String, CategoryId>,
}

impl CategoryHierarchy {
  pub fn from_parts(categories: Vec<Category>, relations: &[Relation]) -> Self {
    let mut nodes: BTreeMap<CategoryId, Node> = BTreeMap::new();
    let mut by_description = HashMap::with_capacity(categories.len());

    for category in categories {
      let id = category.id;
      by_description.insert(category.description.clone(), id);
      nodes.entry(id).or_default().category = Some(category);
    }
    for edge in relations {
      // Edges pointing at unknown rows are ignored rather than invented.
      if !nodes.contains_key(&edge.parent) || !nodes.contains_key(&edge.child) {
        continue;
      }
      if let Some(node) = nodes.get_mut(&edge.child) {
        node.parents.insert(edge.parent);
      }
      if let Some(node) = nodes.get_mut(&edge.parent) {
        node.children.insert(edge.child);
      }
    }

    Self { nodes, by_description }
  }

  /// Load a fresh snapshot from `store`.
  pub async fn load<S: LifeStore>(store: &S) -> Result<Self> {
    let categories = store.list_categories().await.map_err(lift)?;
    let relations = store.list_relations().await.map_err(lift)?;
    tracing::debug!(
      categories = categories.len(),
      relations = relations.len(),
      "loaded category hierarchy"
    );
    Ok(Self::from_parts(categories, &relations))
  }

  /// Replace this snapshot with the store's current contents.
  pub async fn refresh<S: LifeStore>(&mut self, store: &S) -> Result<()> {
    *self = Self::load(store).await?;
    Ok(())
  }

  pub fn len(&self) -> usize { self.nodes.len() }

  pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

  pub fn contains(&self, id: CategoryId) -> bool { self.nodes.contains_key(&id) }

  pub fn get(&self, id: CategoryId) -> Option<&Category> {
    self.nodes.get(&id).and_then(|n| n.category.as_ref())
  }

  /// All categories in ascending id order.
  pub fn categories(&self) -> impl Iterator<Item = &Category> {
    self.nodes.values().filter_map(|n| n.category.as_ref())
  }

  pub fn description_of(&self, id: CategoryId) -> Result<&str> {
    self
      .get(id)
      .map(|c| c.description.as_str())
      .ok_or_else(|| Error::CategoryNotFound(id.to_string()))
  }

  /// Exact, case-sensitive lookup.
  pub fn id_of(&self, description: &str) -> Result<CategoryId> {
    self
      .by_description
      .get(description)
      .copied()
      .ok_or_else(|| Error::CategoryNotFound(description.to_owned()))
  }

  /// Every parent of `id`, ascending. Unknown ids have none.
  pub fn parents_of(&self, id: CategoryId) -> Vec<CategoryId> {
    self
      .nodes
      .get(&id)
      .map(|n| n.parents.iter().copied().collect())
      .unwrap_or_default()
  }

  /// The parent followed by single-parent walks: the one with the lowest id.
  pub fn parent_of(&self, id: CategoryId) -> Option<CategoryId> {
    self.nodes.get(&id)?.parents.first().copied()
  }

  pub fn children_of(&self, id: CategoryId) -> Vec<CategoryId> {
    self
      .nodes
      .get(&id)
      .map(|n| n.children.iter().copied().collect())
      .unwrap_or_default()
  }

  /// `id` followed by its single-parent ancestors up to the root.
  ///
  /// Stops early if the stored edges contain a cycle.
  pub fn lineage(&self, id: CategoryId) -> Vec<CategoryId> {
    let mut seen = BTreeSet::new();
    let mut chain = Vec::new();
    let mut current = Some(id);
    while let Some(cur) = current {
      if !self.contains(cur) || !seen.insert(cur) {
        break;
      }
      chain.push(cur);
      current = self.parent_of(cur);
    }
    chain
  }

  /// Whether `ancestor` is reachable from `id` through any parent edges.
  pub fn is_ancestor(&self, ancestor: CategoryId, id: CategoryId) -> bool {
    let mut stack = self.parents_of(id);
    let mut seen = BTreeSet::new();
    while let Some(cur) = stack.pop() {
      if cur == ancestor {
        return true;
      }
      if seen.insert(cur) {
        stack.extend(self.parents_of(cur));
      }
    }
    false
  }

  /// Categories with no parent.
  pub fn roots(&self) -> Vec<CategoryId> {
    self
      .nodes
      .iter()
      .filter(|(_, n)| n.parents.is_empty())
      .map(|(id, _)| *id)
      .collect()
  }

  /// Depth-first `(id, depth)` listing for tree display. A category with
  /// several parents is listed under its lowest-id parent only.
  pub fn walk(&self) -> Vec<(CategoryId, usize)> {
    let mut out = Vec::with_capacity(self.nodes.len());
    let mut stack: Vec<(CategoryId, usize)> =
      self.roots().into_iter().rev().map(|id| (id, 0)).collect();
    let mut seen = BTreeSet::new();

    while let Some((id, depth)) = stack.pop() {
      if !seen.insert(id) {
        continue;
      }
      out.push((id, depth));
      let children = self
        .children_of(id)
        .into_iter()
        .filter(|c| self.parent_of(*c) == Some(id));
      let mut children: Vec<_> = children.collect();
      children.reverse();
      stack.extend(children.into_iter().map(|c| (c, depth + 1)));
    }
    out
  }
}
