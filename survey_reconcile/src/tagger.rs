use log::debug;
use std::path::Path;

use crate::config::{ColumnNames, SubstringRule, TaggingRules};
use crate::table::{Cell, Column};

/// The cohort of one source file, derived from its name.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct CohortMetadata {
    pub source_id: String,
    pub role_tag: String,
    pub school_name: String,
}

impl CohortMetadata {
    /// The metadata values, in the order of `ColumnNames::cohort_columns`.
    pub fn values(&self) -> [&str; 3] {
        [
            self.source_id.as_str(),
            self.role_tag.as_str(),
            self.school_name.as_str(),
        ]
    }
}

/// Derives the cohort metadata of a file from its name.
///
/// Precedence: the school rules and the role rules are scanned
/// independently, each in the given order, and the first rule whose
/// substring occurs in the file stem wins. With no match, the default
/// applies. The source id is the full basename.
pub struct MetadataTagger<'a> {
    rules: &'a TaggingRules,
}

impl<'a> MetadataTagger<'a> {
    pub fn new(rules: &'a TaggingRules) -> MetadataTagger<'a> {
        MetadataTagger { rules }
    }

    pub fn tag(&self, basename: &str) -> CohortMetadata {
        let stem = Path::new(basename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(basename);
        let school_name = first_match(&self.rules.schools, stem)
            .unwrap_or(self.rules.default_school.as_str())
            .to_string();
        let role_tag = first_match(&self.rules.roles, stem)
            .unwrap_or(self.rules.default_role.as_str())
            .to_string();
        debug!(
            "tag: {:?} -> school: {:?} role: {:?}",
            basename, school_name, role_tag
        );
        CohortMetadata {
            source_id: basename.to_string(),
            role_tag,
            school_name,
        }
    }

    /// Inserts the three cohort columns in front of the given columns and
    /// fills them on every row.
    pub fn attach(
        metadata: &CohortMetadata,
        names: &ColumnNames,
        columns: &mut Vec<Column>,
        rows: &mut [Vec<Cell>],
    ) {
        let prefix: Vec<Column> = names
            .cohort_columns()
            .iter()
            .map(|n| Column::metadata(n))
            .collect();
        columns.splice(0..0, prefix);
        let values = metadata.values();
        for row in rows.iter_mut() {
            row.splice(0..0, values.iter().map(|v| Some(v.to_string())));
        }
    }
}

fn first_match<'r>(rules: &'r [SubstringRule], text: &str) -> Option<&'r str> {
    rules
        .iter()
        .find(|r| !r.contains.is_empty() && text.contains(r.contains.as_str()))
        .map(|r| r.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn school_and_role_from_name() {
        let rules = TaggingRules::default();
        let m = MetadataTagger::new(&rules).tag("三民國小新進.csv");
        assert_eq!(m.source_id, "三民國小新進.csv");
        assert_eq!(m.school_name, "三民國小");
        assert_eq!(m.role_tag, "新進教師");
    }

    #[test]
    fn defaults_when_nothing_matches() {
        let rules = TaggingRules::default();
        let m = MetadataTagger::new(&rules).tag("survey_export.csv");
        assert_eq!(m.school_name, "Unknown");
        assert_eq!(m.role_tag, "一般教師");
    }

    #[test]
    fn first_rule_wins() {
        let rules = TaggingRules {
            schools: vec![
                SubstringRule::new("北門國中", "north-middle"),
                SubstringRule::new("北門", "north"),
            ],
            roles: vec![],
            default_school: "x".to_string(),
            default_role: "y".to_string(),
        };
        let tagger = MetadataTagger::new(&rules);
        assert_eq!(tagger.tag("北門國中行政.csv").school_name, "north-middle");
        assert_eq!(tagger.tag("北門國小.csv").school_name, "north");
        assert_eq!(tagger.tag("北門國小.csv").role_tag, "y");
    }

    #[test]
    fn extension_is_not_matched() {
        let rules = TaggingRules {
            schools: vec![SubstringRule::new("csv", "wrong")],
            roles: vec![],
            default_school: "Unknown".to_string(),
            default_role: "一般教師".to_string(),
        };
        let m = MetadataTagger::new(&rules).tag("data.csv");
        assert_eq!(m.school_name, "Unknown");
    }

    #[test]
    fn attach_prepends_cohort_columns() {
        let rules = TaggingRules::default();
        let names = ColumnNames::default();
        let m = MetadataTagger::new(&rules).tag("坪林熟手.csv");
        let mut columns = vec![Column::question("q")];
        let mut rows = vec![vec![Some("4".to_string())], vec![None]];
        MetadataTagger::attach(&m, &names, &mut columns, &mut rows);
        let col_names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(col_names, vec!["source_id", "role_tag", "school_name", "q"]);
        assert_eq!(
            rows[1],
            vec![
                Some("坪林熟手.csv".to_string()),
                Some("熟手教師".to_string()),
                Some("坪林實中".to_string()),
                None
            ]
        );
    }

    #[test]
    fn senior_tier_in_name() {
        let rules = TaggingRules::default();
        let m = MetadataTagger::new(&rules).tag("峨眉國中3年以上.csv");
        assert_eq!(m.school_name, "峨眉國中");
        assert_eq!(m.role_tag, "資深教師(3y+)");
    }
}
