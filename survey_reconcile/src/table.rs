// ********* Tables ***********

use std::collections::HashSet;

use log::{debug, warn};

use crate::tagger::CohortMetadata;

/// A cell as read from a source file. Empty fields are `None`.
pub type Cell = Option<String>;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ColumnKind {
    /// Cohort or respondent information. Never renamed nor scored.
    Metadata,
    /// A survey question. Renamed by the canonicalizer and scored.
    Question,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn metadata(name: &str) -> Column {
        Column {
            name: name.to_string(),
            kind: ColumnKind::Metadata,
        }
    }

    pub fn question(name: &str) -> Column {
        Column {
            name: name.to_string(),
            kind: ColumnKind::Question,
        }
    }
}

/// The first `"{base} #n"`, counting from 2, that is not taken yet.
pub(crate) fn unique_name(base: &str, taken: &HashSet<String>) -> String {
    let mut n = 2;
    loop {
        let name = format!("{} #{}", base, n);
        if !taken.contains(&name) {
            return name;
        }
        n += 1;
    }
}

/// One export file, as read from disk: the header row and the raw cells.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Builds a table, padding short rows with empty cells and dropping the
    /// cells of long rows that have no header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> RawTable {
        RawTable::from_source("<memory>", headers, rows)
    }

    /// Same as [`RawTable::new`]. `source` names the file in the warnings.
    pub fn from_source(source: &str, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> RawTable {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(idx, mut row)| {
                let dropped = row[width.min(row.len())..]
                    .iter()
                    .filter(|c| c.is_some())
                    .count();
                if dropped > 0 {
                    // Data rows are numbered from 1, after the header line.
                    warn!(
                        "{}: row {} has {} cells for {} columns, dropping {} values",
                        source,
                        idx + 1,
                        row.len(),
                        width,
                        dropped
                    );
                }
                row.resize(width, None);
                row
            })
            .collect();
        RawTable { headers, rows }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

/// A file after tagging and canonicalization, ready to be merged.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TaggedTable {
    pub metadata: CohortMetadata,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
}

/// The outer union of all the tagged tables.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct UnifiedTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
    // For every column, the source ids of the files whose header had it.
    pub(crate) column_sources: Vec<Vec<String>>,
}

impl UnifiedTable {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// The source ids of the files that contributed the given column.
    pub fn sources_of(&self, column: &str) -> &[String] {
        match self.column_index(column) {
            Some(idx) => self.column_sources[idx].as_slice(),
            None => &[],
        }
    }
}

/// An ordinal score. Only the values 1 to 5 can be constructed.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct Score(u8);

impl Score {
    pub fn new(value: u32) -> Option<Score> {
        match value {
            1..=5 => Some(Score(value as u8)),
            _ => None,
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// The unified table after quantification: metadata cells keep their text,
/// every question cell is a score or missing.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct QuantifiedTable {
    pub metadata_columns: Vec<String>,
    pub metric_columns: Vec<String>,
    pub metadata: Vec<Vec<Cell>>,
    pub scores: Vec<Vec<Option<Score>>>,
}

impl QuantifiedTable {
    pub fn num_rows(&self) -> usize {
        self.metadata.len()
    }

    pub fn metadata_index(&self, name: &str) -> Option<usize> {
        self.metadata_columns.iter().position(|c| c == name)
    }

    pub fn metric_index(&self, name: &str) -> Option<usize> {
        self.metric_columns.iter().position(|c| c == name)
    }

    pub fn metadata_value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.metadata_index(column)?;
        self.metadata.get(row)?.get(idx)?.as_deref()
    }

    pub fn score(&self, row: usize, metric: &str) -> Option<Score> {
        let idx = self.metric_index(metric)?;
        *self.scores.get(row)?.get(idx)?
    }

    /// Appends a metadata column computed from the `from` column of each
    /// row, or replaces it if it already exists. `f` gets `None` when the
    /// cell is empty or the table has no `from` column.
    pub fn derive_metadata_column<F>(&mut self, name: &str, from: &str, f: F)
    where
        F: Fn(Option<&str>) -> Cell,
    {
        let src = self.metadata_index(from);
        let dest = self.metadata_index(name);
        if dest.is_none() {
            self.metadata_columns.push(name.to_string());
        }
        for row in self.metadata.iter_mut() {
            let v = f(src.and_then(|i| row[i].as_deref()));
            match dest {
                Some(idx) => row[idx] = v,
                None => row.push(v),
            }
        }
    }

    /// The rows for which the predicate holds. The predicate sees the table
    /// and the row index.
    pub fn filter_rows<F>(&self, pred: F) -> QuantifiedTable
    where
        F: Fn(&QuantifiedTable, usize) -> bool,
    {
        let keep: Vec<usize> = (0..self.num_rows()).filter(|&r| pred(self, r)).collect();
        QuantifiedTable {
            metadata_columns: self.metadata_columns.clone(),
            metric_columns: self.metric_columns.clone(),
            metadata: keep.iter().map(|&r| self.metadata[r].clone()).collect(),
            scores: keep.iter().map(|&r| self.scores[r].clone()).collect(),
        }
    }

    /// Removes the metric columns that have no score at all.
    pub fn drop_empty_metrics(&self) -> QuantifiedTable {
        let keep: Vec<usize> = (0..self.metric_columns.len())
            .filter(|&m| self.scores.iter().any(|row| row[m].is_some()))
            .collect();
        debug!(
            "drop_empty_metrics: keeping {} of {} metrics",
            keep.len(),
            self.metric_columns.len()
        );
        QuantifiedTable {
            metadata_columns: self.metadata_columns.clone(),
            metric_columns: keep
                .iter()
                .map(|&m| self.metric_columns[m].clone())
                .collect(),
            metadata: self.metadata.clone(),
            scores: self
                .scores
                .iter()
                .map(|row| keep.iter().map(|&m| row[m]).collect())
                .collect(),
        }
    }

    /// The metric columns whose name contains one of the keywords. No
    /// keyword selects every metric.
    pub fn select_metrics(&self, keywords: &[String]) -> Vec<String> {
        self.metric_columns
            .iter()
            .filter(|m| keywords.is_empty() || keywords.iter().any(|k| m.contains(k.as_str())))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(s: &str) -> Cell {
        Some(s.to_string())
    }

    fn small_table() -> QuantifiedTable {
        QuantifiedTable {
            metadata_columns: vec!["school_name".to_string()],
            metric_columns: vec!["q1".to_string(), "q2".to_string()],
            metadata: vec![vec![cell("A")], vec![cell("B")]],
            scores: vec![vec![Score::new(3), None], vec![Score::new(5), None]],
        }
    }

    #[test]
    fn score_range() {
        assert_eq!(Score::new(0), None);
        assert_eq!(Score::new(1).map(Score::value), Some(1));
        assert_eq!(Score::new(5).map(Score::value), Some(5));
        assert_eq!(Score::new(6), None);
    }

    #[test]
    fn raw_table_pads_and_truncates() {
        let _ = env_logger::builder().is_test(true).try_init();
        let t = RawTable::from_source(
            "a.csv",
            vec!["a".to_string(), "b".to_string()],
            vec![
                vec![cell("1")],
                vec![cell("1"), cell("2"), cell("3")],
                vec![cell("1"), cell("2"), None, None],
            ],
        );
        assert_eq!(t.num_rows(), 3);
        assert_eq!(t.rows[0], vec![cell("1"), None]);
        assert_eq!(t.rows[1], vec![cell("1"), cell("2")]);
        assert_eq!(t.rows[2], vec![cell("1"), cell("2")]);
    }

    #[test]
    fn unique_names_skip_taken_suffixes() {
        let taken: HashSet<String> = ["q", "q #2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique_name("q", &taken), "q #3");
        assert_eq!(unique_name("r", &taken), "r #2");
    }

    #[test]
    fn drop_empty_metrics_keeps_populated() {
        let t = small_table().drop_empty_metrics();
        assert_eq!(t.metric_columns, vec!["q1".to_string()]);
        assert_eq!(t.scores[1], vec![Score::new(5)]);
    }

    #[test]
    fn filter_and_derive_metadata() {
        let mut t = small_table();
        t.derive_metadata_column("level", "school_name", |v| v.map(|s| s.to_lowercase()));
        assert_eq!(t.metadata_columns, vec!["school_name", "level"]);
        let f = t.filter_rows(|t, r| t.metadata_value(r, "school_name") == Some("B"));
        assert_eq!(f.num_rows(), 1);
        assert_eq!(f.metadata_value(0, "level"), Some("b"));
        assert_eq!(f.score(0, "q1"), Score::new(5));
    }

    #[test]
    fn derive_metadata_replaces_and_handles_missing_source() {
        let mut t = small_table();
        t.derive_metadata_column("school_name", "school_name", |v| {
            v.map(|s| format!("{}!", s))
        });
        assert_eq!(t.metadata_columns.len(), 1);
        assert_eq!(t.metadata_value(1, "school_name"), Some("B!"));
        t.derive_metadata_column("level", "nowhere", |v| {
            Some(v.unwrap_or("none").to_string())
        });
        assert_eq!(t.metadata_value(0, "level"), Some("none"));
        assert_eq!(t.metadata_value(1, "level"), Some("none"));
    }

    #[test]
    fn select_metrics_by_keyword() {
        let t = small_table();
        assert_eq!(t.select_metrics(&[]).len(), 2);
        assert_eq!(t.select_metrics(&["2".to_string()]), vec!["q2".to_string()]);
        assert!(t.select_metrics(&["zzz".to_string()]).is_empty());
    }
}
