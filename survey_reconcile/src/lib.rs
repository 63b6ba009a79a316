//! Schema reconciliation and quantification of survey exports.
//!
//! Each cohort (a school and a role) exports its own table, with its own
//! spelling of the questions. This crate tags every row with the cohort
//! found in the file name, aligns the question columns by canonicalizing
//! their names, merges all the tables, turns the free-text answers into
//! scores from 1 to 5, and summarizes them by group.
//!
//! Reading and writing files is left to the caller.

mod config;
pub mod aggregate;
pub mod builder;
pub mod canonical;
pub mod merge;
pub mod score;
pub mod table;
pub mod tagger;
pub mod taxonomy;

pub use crate::aggregate::{AggregationEngine, GroupKey, GroupReport, MetricSummary, SAMPLE_SIZE};
pub use crate::canonical::{canonicalize, ColumnCanonicalizer};
pub use crate::config::*;
pub use crate::merge::{merge, single_source_columns, CoverageWarning};
pub use crate::score::{find_placeholders, PlaceholderFinding, ScoreExtractor};
pub use crate::table::{
    Cell, Column, ColumnKind, QuantifiedTable, RawTable, Score, TaggedTable, UnifiedTable,
};
pub use crate::tagger::{CohortMetadata, MetadataTagger};
pub use crate::taxonomy::{Fallback, Taxonomy, TaxonomyMapper};
