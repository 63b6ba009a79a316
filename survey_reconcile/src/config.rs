// ********* Configuration **********

// All the tables below default to the cohort conventions of the 114-1 IDP
// survey exports. They are plain data: build them once and pass them by
// reference to the components that need them.

/// An ordered `(substring, value)` rule. The first rule whose substring is
/// found wins, so more specific substrings must come first.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SubstringRule {
    pub contains: String,
    pub value: String,
}

impl SubstringRule {
    pub fn new(contains: &str, value: &str) -> SubstringRule {
        SubstringRule {
            contains: contains.to_string(),
            value: value.to_string(),
        }
    }
}

/// Names of the columns the pipeline creates or treats as metadata.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnNames {
    pub source_id: String,
    pub role_tag: String,
    pub school_name: String,
    pub school_level: String,
    pub standardized_role: String,
    pub role_group: String,
    /// Respondent column used to count the sample size of a group.
    pub identity: Option<String>,
    /// Columns of the source files that describe the respondent rather than
    /// answer a question. They keep their original name.
    pub passthrough: Vec<String>,
}

impl ColumnNames {
    /// The three cohort columns, in the order they are prepended to a table.
    pub fn cohort_columns(&self) -> [&str; 3] {
        [
            self.source_id.as_str(),
            self.role_tag.as_str(),
            self.school_name.as_str(),
        ]
    }

    /// The cohort columns followed by the three taxonomy columns. No column
    /// read from a source file may take one of these names.
    pub fn generated_columns(&self) -> [&str; 6] {
        [
            self.source_id.as_str(),
            self.role_tag.as_str(),
            self.school_name.as_str(),
            self.school_level.as_str(),
            self.standardized_role.as_str(),
            self.role_group.as_str(),
        ]
    }

    pub fn is_passthrough(&self, name: &str) -> bool {
        self.passthrough.iter().any(|p| p == name)
    }
}

impl Default for ColumnNames {
    fn default() -> ColumnNames {
        ColumnNames {
            source_id: "source_id".to_string(),
            role_tag: "role_tag".to_string(),
            school_name: "school_name".to_string(),
            school_level: "school_level".to_string(),
            standardized_role: "standardized_role".to_string(),
            role_group: "role_group".to_string(),
            identity: Some("教師姓名".to_string()),
            passthrough: [
                "教師姓名",
                "教師信箱",
                "學校",
                "職位",
                "科目",
                "提交時間",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Rules to derive the cohort of a file from its name.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TaggingRules {
    pub schools: Vec<SubstringRule>,
    pub roles: Vec<SubstringRule>,
    pub default_school: String,
    pub default_role: String,
}

impl Default for TaggingRules {
    fn default() -> TaggingRules {
        TaggingRules {
            // "三民國小" and "三民國中" share a prefix: both are listed in full.
            schools: vec![
                SubstringRule::new("三民國小", "三民國小"),
                SubstringRule::new("三民國中", "三民國中"),
                SubstringRule::new("仙草", "仙草實小"),
                SubstringRule::new("樟湖", "樟湖生態國中小"),
                SubstringRule::new("坪林", "坪林實中"),
                SubstringRule::new("老梅", "老梅實小"),
                SubstringRule::new("拯民", "拯民國小"),
                SubstringRule::new("峨眉", "峨眉國中"),
            ],
            roles: vec![
                SubstringRule::new("新進", "新進教師"),
                SubstringRule::new("熟手", "熟手教師"),
                SubstringRule::new("行政", "行政人員"),
                SubstringRule::new("領導人", "教師領導人"),
                SubstringRule::new("3年以上", "資深教師(3y+)"),
                SubstringRule::new("1~3年", "初任教師(1-3y)"),
            ],
            default_school: "Unknown".to_string(),
            default_role: "一般教師".to_string(),
        }
    }
}

/// Tokens recognized by the score extractor.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ScoreRules {
    /// Any cell containing this text is unanswered. Empty disables the rule.
    pub placeholder: String,
    /// Marker that must be immediately followed by one of `stage_tokens`.
    pub stage_marker: String,
    /// Ordinal tokens for the stages 1 to 5, in order.
    pub stage_tokens: [String; 5],
}

impl Default for ScoreRules {
    fn default() -> ScoreRules {
        ScoreRules {
            placeholder: "__TEMP__".to_string(),
            stage_marker: "階段".to_string(),
            stage_tokens: [
                "一".to_string(),
                "二".to_string(),
                "三".to_string(),
                "四".to_string(),
                "五".to_string(),
            ],
        }
    }
}
