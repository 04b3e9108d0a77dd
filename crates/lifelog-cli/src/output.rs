//! Plain-text rendering of tables and the category tree.

use lifelog_core::{category::CategoryHierarchy, table::Table};

/// Render `table` with every column padded to its widest cell.
pub fn format_table(table: &Table) -> String {
  let rows: Vec<Vec<String>> = table
    .rows
    .iter()
    .map(|row| table.cells(row).iter().map(ToString::to_string).collect())
    .collect();

  let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
  for row in &rows {
    for (width, cell) in widths.iter_mut().zip(row) {
      *width = (*width).max(cell.chars().count());
    }
  }

  let line = |cells: &[String]| {
    cells
      .iter()
      .zip(&widths)
      .map(|(cell, &width)| format!("{cell:<width$}"))
      .collect::<Vec<_>>()
      .join("  ")
      .trim_end()
      .to_owned()
  };

  let mut out = line(&table.columns);
  for row in &rows {
    out.push('\n');
    out.push_str(&line(row));
  }
  out
}

pub fn print_table(table: &Table) { println!("{}", format_table(table)); }

/// One line per category, indented by depth under its lowest-id parent.
pub fn format_tree(hierarchy: &CategoryHierarchy) -> String {
  hierarchy
    .walk()
    .into_iter()
    .filter_map(|(id, depth)| {
      let category = hierarchy.get(id)?;
      let mark = if category.countable { " (countable)" } else { "" };
      Some(format!("{}{} {}{mark}", "  ".repeat(depth), id, category.description))
    })
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn print_tree(hierarchy: &CategoryHierarchy) {
  if hierarchy.is_empty() {
    println!("no groups yet");
  } else {
    println!("{}", format_tree(hierarchy));
  }
}

#[cfg(test)]
mod tests {
  use lifelog_core::category::{Category, Relation};

  use super::*;

  fn hierarchy() -> CategoryHierarchy {
    CategoryHierarchy::from_parts(
      vec![
        Category { id: 1, description: "Root".into(), countable: false },
        Category { id: 2, description: "Sport".into(), countable: false },
        Category { id: 3, description: "Reading".into(), countable: true },
      ],
      &[Relation { id: 1, parent: 1, child: 2 }],
    )
  }

  #[test]
  fn tree_is_indented_by_depth() {
    assert_eq!(format_tree(&hierarchy()), "1 Root\n  2 Sport\n3 Reading (countable)");
  }

  #[test]
  fn table_columns_are_aligned() {
    let table = Table::categories(&hierarchy());
    let text = format_table(&table);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("id  description  countable  parents  children"));
    assert!(lines[2].starts_with("2   Sport        false      Root"));
  }
}
