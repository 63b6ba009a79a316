use std::collections::HashSet;

use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::table::{unique_name, Cell, Column, ColumnKind, TaggedTable, UnifiedTable};

// Two columns of one table must not share a slot of the merged row.
fn rename_duplicates(t: &mut TaggedTable) {
    let mut taken: HashSet<String> = HashSet::new();
    for c in t.columns.iter_mut() {
        if taken.contains(&c.name) {
            let name = unique_name(&c.name, &taken);
            warn!(
                "merge: {}: column {:?} appears twice, renamed to {:?}",
                t.metadata.source_id, c.name, name
            );
            c.name = name;
        }
        taken.insert(c.name.clone());
    }
}

/// Outer union of the tagged tables.
///
/// Columns appear in the order they are first seen, scanning the tables in
/// the given order. Rows keep the table order, then the row order within each
/// table. A row gets `None` for every column its file did not have. A name
/// repeated within one table is renamed with a ` #n` suffix, so that no cell
/// is lost.
pub fn merge(mut tables: Vec<TaggedTable>) -> UnifiedTable {
    for t in tables.iter_mut() {
        rename_duplicates(t);
    }
    // name -> (kind, source ids)
    let mut all_columns: IndexMap<String, (ColumnKind, Vec<String>)> = IndexMap::new();
    for t in tables.iter() {
        for c in t.columns.iter() {
            let entry = all_columns
                .entry(c.name.clone())
                .or_insert_with(|| (c.kind, Vec::new()));
            if entry.0 != c.kind {
                warn!(
                    "merge: column {:?} is {:?} in {} but was first seen as {:?}",
                    c.name, c.kind, t.metadata.source_id, entry.0
                );
            }
            entry.1.push(t.metadata.source_id.clone());
        }
    }

    let num_rows: usize = tables.iter().map(|t| t.rows.len()).sum();
    let width = all_columns.len();
    let mut rows: Vec<Vec<Cell>> = Vec::with_capacity(num_rows);
    for t in tables {
        let positions: Vec<usize> = t
            .columns
            .iter()
            .map(|c| all_columns.get_index_of(&c.name).unwrap_or_default())
            .collect();
        debug!(
            "merge: {}: {} rows, {} columns",
            t.metadata.source_id,
            t.rows.len(),
            positions.len()
        );
        for row in t.rows {
            let mut unified: Vec<Cell> = vec![None; width];
            for (pos, v) in positions.iter().zip(row) {
                unified[*pos] = v;
            }
            rows.push(unified);
        }
    }

    let (columns, column_sources): (Vec<Column>, Vec<Vec<String>>) = all_columns
        .into_iter()
        .map(|(name, (kind, sources))| (Column { name, kind }, sources))
        .unzip();
    info!("merge: {} rows, {} columns", rows.len(), columns.len());
    UnifiedTable {
        columns,
        rows,
        column_sources,
    }
}

/// A question column whose header was found in a single source file.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CoverageWarning {
    pub column: String,
    pub source_id: String,
}

/// Lists the question columns provided by exactly one source file.
///
/// When several files are merged, such a column is most likely a variant
/// spelling of a question that the canonicalizer did not align. Nothing is
/// reported when the table comes from a single file.
pub fn single_source_columns(table: &UnifiedTable) -> Vec<CoverageWarning> {
    let mut all_sources: Vec<&String> = table.column_sources.iter().flatten().collect();
    all_sources.sort();
    all_sources.dedup();
    if all_sources.len() < 2 {
        return Vec::new();
    }
    let res: Vec<CoverageWarning> = table
        .columns
        .iter()
        .zip(table.column_sources.iter())
        .filter(|(c, sources)| c.kind == ColumnKind::Question && sources.len() == 1)
        .map(|(c, sources)| CoverageWarning {
            column: c.name.clone(),
            source_id: sources[0].clone(),
        })
        .collect();
    for w in res.iter() {
        warn!(
            "Column {:?} only appears in {}: possible unaligned question",
            w.column, w.source_id
        );
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagger::CohortMetadata;
    use std::collections::HashSet;

    fn cell(s: &str) -> Cell {
        Some(s.to_string())
    }

    fn table(source: &str, cols: &[&str], rows: Vec<Vec<Cell>>) -> TaggedTable {
        TaggedTable {
            metadata: CohortMetadata {
                source_id: source.to_string(),
                role_tag: "r".to_string(),
                school_name: "s".to_string(),
            },
            columns: cols.iter().map(|c| Column::question(c)).collect(),
            rows,
        }
    }

    #[test]
    fn outer_union() {
        let a = table(
            "a.csv",
            &["q1", "q2"],
            vec![vec![cell("1"), cell("2")], vec![cell("3"), None]],
        );
        let b = table("b.csv", &["q3", "q1"], vec![vec![cell("x"), cell("y")]]);
        let u = merge(vec![a.clone(), b.clone()]);

        assert_eq!(u.column_names(), vec!["q1", "q2", "q3"]);
        assert_eq!(u.num_rows(), 3);
        assert_eq!(u.rows[0], vec![cell("1"), cell("2"), None]);
        assert_eq!(u.rows[1], vec![cell("3"), None, None]);
        assert_eq!(u.rows[2], vec![cell("y"), None, cell("x")]);

        let merged: HashSet<String> = u.column_names().into_iter().collect();
        for t in [a, b] {
            for c in t.columns {
                assert!(merged.contains(&c.name));
            }
        }
    }

    #[test]
    fn repeated_name_within_a_table_keeps_both_cells() {
        let a = table(
            "a.csv",
            &["q", "q", "q #2"],
            vec![vec![cell("1"), cell("2"), cell("3")]],
        );
        let b = table("b.csv", &["q"], vec![vec![cell("4")]]);
        let u = merge(vec![a, b]);
        assert_eq!(u.column_names(), vec!["q", "q #2", "q #3"]);
        assert_eq!(u.rows[0], vec![cell("1"), cell("2"), cell("3")]);
        assert_eq!(u.rows[1], vec![cell("4"), None, None]);
    }

    #[test]
    fn empty_input() {
        let u = merge(vec![]);
        assert_eq!(u.num_rows(), 0);
        assert!(u.columns.is_empty());
    }

    #[test]
    fn table_without_rows_still_contributes_columns() {
        let a = table("a.csv", &["q1"], vec![vec![cell("1")]]);
        let b = table("b.csv", &["q9"], vec![]);
        let u = merge(vec![a, b]);
        assert_eq!(u.column_names(), vec!["q1", "q9"]);
        assert_eq!(u.num_rows(), 1);
    }

    #[test]
    fn coverage() {
        let a = table("a.csv", &["shared", "typo"], vec![]);
        let b = table("b.csv", &["shared"], vec![]);
        let u = merge(vec![a, b]);
        assert_eq!(u.sources_of("shared"), &["a.csv".to_string(), "b.csv".to_string()]);
        assert_eq!(
            single_source_columns(&u),
            vec![CoverageWarning {
                column: "typo".to_string(),
                source_id: "a.csv".to_string()
            }]
        );
    }

    #[test]
    fn coverage_single_file() {
        let a = table("a.csv", &["q1", "q2"], vec![]);
        assert!(single_source_columns(&merge(vec![a])).is_empty());
    }
}
