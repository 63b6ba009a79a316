pub use crate::config::*;

use log::debug;

use crate::canonical::ColumnCanonicalizer;
use crate::merge::merge;
use crate::table::{RawTable, TaggedTable, UnifiedTable};
use crate::tagger::{CohortMetadata, MetadataTagger};

/// A builder for merging survey exports.
///
/// [`Builder::prepare`] only reads the builder, so the files can be
/// prepared in parallel and added afterwards in a fixed order.
///
/// ```
/// use survey_reconcile::builder::Builder;
/// use survey_reconcile::{ColumnNames, RawTable, TaggingRules};
///
/// let rules = TaggingRules::default();
/// let names = ColumnNames::default();
/// let mut builder = Builder::new(&rules, &names);
///
/// let raw = RawTable::new(
///     vec!["教師姓名".to_string(), "[分類A] 1.1 原始欄位X".to_string()],
///     vec![vec![Some("王".to_string()), Some("階段三".to_string())]],
/// );
/// builder.add_table("三民國小新進.csv", raw);
///
/// let unified = builder.build();
/// assert_eq!(
///     unified.column_names(),
///     vec!["source_id", "role_tag", "school_name", "教師姓名", "原始欄位X"]
/// );
/// assert_eq!(unified.value(0, "school_name"), Some("三民國小"));
/// ```
pub struct Builder<'a> {
    rules: &'a TaggingRules,
    names: &'a ColumnNames,
    tables: Vec<TaggedTable>,
}

impl<'a> Builder<'a> {
    pub fn new(rules: &'a TaggingRules, names: &'a ColumnNames) -> Builder<'a> {
        Builder {
            rules,
            names,
            tables: Vec::new(),
        }
    }

    /// Tags and canonicalizes one file, without adding it.
    pub fn prepare(&self, basename: &str, raw: RawTable) -> TaggedTable {
        let metadata = MetadataTagger::new(self.rules).tag(basename);
        let mut columns = ColumnCanonicalizer::new(self.names).columns(&raw.headers);
        let mut rows = raw.rows;
        MetadataTagger::attach(&metadata, self.names, &mut columns, &mut rows);
        debug!(
            "prepare: {}: {} columns, {} rows",
            basename,
            columns.len(),
            rows.len()
        );
        TaggedTable {
            metadata,
            columns,
            rows,
        }
    }

    pub fn add_prepared(&mut self, table: TaggedTable) {
        self.tables.push(table);
    }

    /// Prepares and adds one file. Returns its cohort.
    pub fn add_table(&mut self, basename: &str, raw: RawTable) -> CohortMetadata {
        let t = self.prepare(basename, raw);
        let metadata = t.metadata.clone();
        self.add_prepared(t);
        metadata
    }

    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    /// Merges all the tables added so far, in the order they were added.
    pub fn build(self) -> UnifiedTable {
        merge(self.tables)
    }
}
