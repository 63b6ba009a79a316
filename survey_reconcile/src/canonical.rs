use std::collections::HashSet;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ColumnNames;
use crate::table::{unique_name, Column, ColumnKind};

// A leading category tag such as "[步驟 ①：教學力自評] ".
static CATEGORY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[.*?\]\s*").unwrap());

// A leading item number such as "1.1 ", "2.3 ", "A1 - " or "C13 - ".
static ITEM_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{0,2}\d+(?:\.\d+)*(\s*-\s*|\s+)?").unwrap());

/// Rewrites the question columns of a source file into their canonical names.
///
/// The rules, applied in this order:
///
/// 1. a leading `[...]` category tag (up to the first `]`) and the spaces
///    after it are removed,
/// 2. a leading item number (up to two letters, digits, optional `.n`
///    sub-numbers) is removed, with the hyphen or spaces that follow it. The
///    number must be followed by such a separator or directly by non-ASCII
///    text, so that "3D printing" is left alone,
/// 3. surrounding whitespace is trimmed.
///
/// The rules are repeated until the name stops changing, which makes the
/// transformation idempotent. A rule that would leave an empty name is not
/// applied.
///
/// Passthrough columns (see [`ColumnNames`]) are metadata and keep their name.
/// [`ColumnCanonicalizer::columns`] makes the names unique within a file.
pub struct ColumnCanonicalizer<'a> {
    names: &'a ColumnNames,
}

impl<'a> ColumnCanonicalizer<'a> {
    pub fn new(names: &'a ColumnNames) -> ColumnCanonicalizer<'a> {
        ColumnCanonicalizer { names }
    }

    /// The column for a single header, before any collision is resolved.
    pub fn column(&self, header: &str) -> Column {
        if self.names.is_passthrough(header) {
            Column::metadata(header)
        } else {
            Column::question(&canonicalize(header))
        }
    }

    /// The columns for a header row, with names unique within the file.
    ///
    /// The generated column names (see [`ColumnNames::generated_columns`])
    /// are reserved. The first occurrence of each passthrough header keeps
    /// its name, wherever it is in the row. A question never takes a
    /// passthrough name, so that it lands in the same column in every file.
    /// Every other clash is resolved with a ` #n` suffix, in header order.
    pub fn columns(&self, headers: &[String]) -> Vec<Column> {
        let mut res: Vec<Column> = headers.iter().map(|h| self.column(h)).collect();
        let mut taken: HashSet<String> = self
            .names
            .generated_columns()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut settled = vec![false; res.len()];
        for (col, done) in res.iter().zip(settled.iter_mut()) {
            if col.kind == ColumnKind::Metadata && !taken.contains(&col.name) {
                taken.insert(col.name.clone());
                *done = true;
            }
        }
        for ((h, col), done) in headers.iter().zip(res.iter_mut()).zip(settled) {
            if !done {
                let reserved =
                    col.kind == ColumnKind::Question && self.names.is_passthrough(&col.name);
                if reserved || taken.contains(&col.name) {
                    let name = unique_name(&col.name, &taken);
                    warn!(
                        "columns: {:?} clashes with an existing column, renamed to {:?}",
                        h, name
                    );
                    col.name = name;
                }
                taken.insert(col.name.clone());
            }
            debug!("columns: {:?} -> {:?}", h, col);
        }
        res
    }
}

/// The canonical name of a column.
///
/// ```
/// use survey_reconcile::canonical::canonicalize;
/// assert_eq!(canonicalize("[分類A] 1.1 原始欄位X"), "原始欄位X");
/// assert_eq!(canonicalize("A1 - 原始欄位X"), "原始欄位X");
/// ```
pub fn canonicalize(name: &str) -> String {
    let mut current = name.to_string();
    loop {
        let next = apply_rules(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn apply_rules(name: &str) -> String {
    let untagged = CATEGORY_TAG.replace(name, "");
    let untagged = if untagged.trim().is_empty() {
        name
    } else {
        &*untagged
    };
    strip_item_number(untagged).trim().to_string()
}

fn strip_item_number(name: &str) -> &str {
    let caps = match ITEM_NUMBER.captures(name) {
        Some(c) => c,
        None => return name,
    };
    let end = caps.get(0).map_or(0, |m| m.end());
    let rest = &name[end..];
    let separated = caps.get(1).map_or(false, |m| !m.as_str().is_empty());
    let joined_to_text = rest.chars().next().map_or(false, |c| !c.is_ascii());
    if rest.trim().is_empty() || !(separated || joined_to_text) {
        name
    } else {
        rest
    }
}
