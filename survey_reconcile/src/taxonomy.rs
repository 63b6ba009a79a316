use log::debug;

use crate::config::ColumnNames;
use crate::table::QuantifiedTable;

/// What a mapper returns for a value that is not in its table.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Fallback {
    /// A fixed category.
    Category(String),
    /// The value itself.
    Identity,
}

/// A total lookup table: every input, known or not, has a category.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TaxonomyMapper {
    entries: Vec<(String, String)>,
    fallback: Fallback,
}

impl TaxonomyMapper {
    pub fn new(entries: &[(&str, &str)], fallback: Fallback) -> TaxonomyMapper {
        TaxonomyMapper {
            entries: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fallback,
        }
    }

    pub fn from_entries(entries: Vec<(String, String)>, fallback: Fallback) -> TaxonomyMapper {
        TaxonomyMapper { entries, fallback }
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn fallback(&self) -> &Fallback {
        &self.fallback
    }

    /// Exact lookup. A missing value is mapped like an empty string.
    pub fn map(&self, value: Option<&str>) -> String {
        let value = value.unwrap_or("");
        if let Some((_, v)) = self.entries.iter().find(|(k, _)| k == value) {
            return v.clone();
        }
        match &self.fallback {
            Fallback::Category(c) => c.clone(),
            Fallback::Identity => value.to_string(),
        }
    }
}

/// The role and school tables applied after quantification.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Taxonomy {
    /// Role tag -> standardized role.
    pub roles: TaxonomyMapper,
    /// School name -> school level.
    pub school_levels: TaxonomyMapper,
    /// Role tag -> group used in the role comparison reports.
    pub role_groups: TaxonomyMapper,
}

pub const GENERAL_TEACHER: &str = "一般教師 (待年資核對)";
pub const ADMINISTRATION: &str = "行政/領導";
pub const OTHER_LEVEL: &str = "4.其他";

impl Default for Taxonomy {
    fn default() -> Taxonomy {
        Taxonomy {
            // Seniority is not verified yet: every teaching tier is collapsed.
            roles: TaxonomyMapper::new(
                &[
                    ("新進教師", GENERAL_TEACHER),
                    ("初任教師(1-3y)", GENERAL_TEACHER),
                    ("熟手教師", GENERAL_TEACHER),
                    ("資深教師(3y+)", GENERAL_TEACHER),
                    ("一般教師", GENERAL_TEACHER),
                    ("行政人員", ADMINISTRATION),
                    ("教師領導人", ADMINISTRATION),
                    ("主任", ADMINISTRATION),
                    ("校長", ADMINISTRATION),
                ],
                Fallback::Category(GENERAL_TEACHER.to_string()),
            ),
            school_levels: TaxonomyMapper::new(
                &[
                    ("三民國小", "1.國小"),
                    ("仙草實小", "1.國小"),
                    ("老梅實小", "1.國小"),
                    ("拯民國小", "1.國小"),
                    ("樟湖生態國中小", "2.國中小"),
                    ("三民國中", "3.國中"),
                    ("坪林實中", "3.國中"),
                    ("峨眉國中", "3.國中"),
                ],
                Fallback::Category(OTHER_LEVEL.to_string()),
            ),
            role_groups: TaxonomyMapper::new(
                &[
                    ("熟手教師", "熟手/資深教師"),
                    ("資深教師(3y+)", "熟手/資深教師"),
                ],
                Fallback::Identity,
            ),
        }
    }
}

impl Taxonomy {
    /// Adds the school level, standardized role and role group columns,
    /// derived from the cohort columns.
    pub fn annotate(&self, table: &mut QuantifiedTable, names: &ColumnNames) {
        debug!("annotate: {} rows", table.num_rows());
        table.derive_metadata_column(&names.school_level, &names.school_name, |v| {
            Some(self.school_levels.map(v))
        });
        table.derive_metadata_column(&names.standardized_role, &names.role_tag, |v| {
            Some(self.roles.map(v))
        });
        table.derive_metadata_column(&names.role_group, &names.role_tag, |v| {
            Some(self.role_groups.map(v))
        });
    }
}
