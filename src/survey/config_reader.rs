use crate::survey::*;

use std::collections::BTreeMap;

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use survey_reconcile::taxonomy::GENERAL_TEACHER;

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "writeBom")]
    pub write_bom: Option<bool>,
    #[serde(rename = "sampleSizeLabel")]
    pub sample_size_label: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub contains: String,
    pub value: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnsConfig {
    #[serde(rename = "sourceId")]
    pub source_id: Option<String>,
    #[serde(rename = "roleTag")]
    pub role_tag: Option<String>,
    #[serde(rename = "schoolName")]
    pub school_name: Option<String>,
    #[serde(rename = "schoolLevel")]
    pub school_level: Option<String>,
    #[serde(rename = "standardizedRole")]
    pub standardized_role: Option<String>,
    #[serde(rename = "roleGroup")]
    pub role_group: Option<String>,
    /// An empty string disables the respondent count.
    pub identity: Option<String>,
    pub passthrough: Option<Vec<String>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub placeholder: Option<String>,
    #[serde(rename = "stageMarker")]
    pub stage_marker: Option<String>,
    #[serde(rename = "stageTokens")]
    pub stage_tokens: Option<Vec<String>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    pub roles: Option<BTreeMap<String, String>>,
    #[serde(rename = "schoolLevels")]
    pub school_levels: Option<BTreeMap<String, String>>,
    #[serde(rename = "roleGroups")]
    pub role_groups: Option<BTreeMap<String, String>>,
    #[serde(rename = "defaultRole")]
    pub default_role: Option<String>,
    #[serde(rename = "defaultSchoolLevel")]
    pub default_school_level: Option<String>,
    #[serde(rename = "teacherCategory")]
    pub teacher_category: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub name: String,
    #[serde(rename = "schoolContains")]
    pub school_contains: Option<String>,
    #[serde(rename = "schoolExcludes")]
    pub school_excludes: Option<String>,
    #[serde(rename = "excludeRoles")]
    pub exclude_roles: Option<Vec<String>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: Option<OutputSettings>,
    #[serde(rename = "sourceDirectory")]
    pub source_directory: Option<String>,
    #[serde(rename = "legacyEncoding")]
    pub legacy_encoding: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "schoolRules")]
    pub school_rules: Option<Vec<RuleConfig>>,
    #[serde(rename = "roleRules")]
    pub role_rules: Option<Vec<RuleConfig>>,
    #[serde(rename = "defaultSchool")]
    pub default_school: Option<String>,
    #[serde(rename = "defaultRole")]
    pub default_role: Option<String>,
    pub columns: Option<ColumnsConfig>,
    pub scoring: Option<ScoringConfig>,
    pub taxonomy: Option<TaxonomyConfig>,
    #[serde(rename = "metricKeywords")]
    pub metric_keywords: Option<Vec<String>>,
    pub partitions: Option<Vec<PartitionConfig>>,
}

/// A named subset of the respondents, reported on its own.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Partition {
    pub name: String,
    pub school_contains: Option<String>,
    pub school_excludes: Option<String>,
    pub exclude_roles: Vec<String>,
}

impl Partition {
    /// A missing school name never contains anything.
    pub fn matches(&self, school: Option<&str>, role: Option<&str>) -> bool {
        let contains = |pattern: &str| school.map(|s| s.contains(pattern)).unwrap_or(false);
        if let Some(p) = &self.school_contains {
            if !contains(p) {
                return false;
            }
        }
        if let Some(p) = &self.school_excludes {
            if contains(p) {
                return false;
            }
        }
        match role {
            Some(r) => !self.exclude_roles.iter().any(|x| x == r),
            None => true,
        }
    }
}

fn default_partitions() -> Vec<Partition> {
    vec![
        Partition {
            name: "zhanghu".to_string(),
            school_contains: Some("樟湖".to_string()),
            school_excludes: None,
            exclude_roles: vec!["行政人員".to_string()],
        },
        Partition {
            name: "kist".to_string(),
            school_contains: None,
            school_excludes: Some("樟湖".to_string()),
            exclude_roles: Vec::new(),
        },
    ]
}

/// The validated configuration of a run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub write_bom: bool,
    pub sample_size_label: String,
    pub legacy_encoding: &'static Encoding,
    pub excel_worksheet: Option<String>,
    pub tagging: TaggingRules,
    pub names: ColumnNames,
    pub scoring: ScoreRules,
    pub taxonomy: Taxonomy,
    pub teacher_category: String,
    pub metric_keywords: Vec<String>,
    pub partitions: Vec<Partition>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> SurveyResult<T> {
    let p = path.display().to_string();
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path: p.clone() })?;
    debug!("read content: {:?}", contents);
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path: p })
}

pub fn read_config(path: &Path) -> SurveyResult<SurveyConfig> {
    read_json(path)
}

pub fn read_summary(path: &Path) -> SurveyResult<JSValue> {
    read_json(path)
}

fn invalid<T>(message: String) -> SurveyResult<T> {
    InvalidConfigSnafu { message }.fail()
}

fn validate_rules(rules: &[RuleConfig], what: &str) -> SurveyResult<Vec<SubstringRule>> {
    let mut res: Vec<SubstringRule> = Vec::new();
    for (idx, r) in rules.iter().enumerate() {
        if r.contains.is_empty() || r.value.is_empty() {
            return invalid(format!(
                "{} rule #{} needs a non-empty contains and value: {:?}",
                what,
                idx + 1,
                r
            ));
        }
        res.push(SubstringRule::new(&r.contains, &r.value));
    }
    Ok(res)
}

fn validate_columns(cc: &ColumnsConfig) -> SurveyResult<ColumnNames> {
    let default = ColumnNames::default();
    let pick = |x: &Option<String>, d: &str| x.clone().unwrap_or_else(|| d.to_string());
    let names = ColumnNames {
        source_id: pick(&cc.source_id, &default.source_id),
        role_tag: pick(&cc.role_tag, &default.role_tag),
        school_name: pick(&cc.school_name, &default.school_name),
        school_level: pick(&cc.school_level, &default.school_level),
        standardized_role: pick(&cc.standardized_role, &default.standardized_role),
        role_group: pick(&cc.role_group, &default.role_group),
        identity: match &cc.identity {
            Some(s) if s.is_empty() => None,
            Some(s) => Some(s.clone()),
            None => default.identity.clone(),
        },
        passthrough: cc.passthrough.clone().unwrap_or(default.passthrough),
    };
    let generated = names.generated_columns();
    for (idx, n) in generated.iter().enumerate() {
        if n.is_empty() {
            return invalid("column names may not be empty".to_string());
        }
        if generated[..idx].contains(n) {
            return invalid(format!("column name {:?} is used twice", n));
        }
    }
    Ok(names)
}

fn validate_scoring(sc: &ScoringConfig) -> SurveyResult<ScoreRules> {
    let default = ScoreRules::default();
    let stage_tokens: [String; 5] = match &sc.stage_tokens {
        Some(tokens) => match tokens.clone().try_into() {
            Ok(arr) => arr,
            Err(v) => {
                let v: Vec<String> = v;
                return invalid(format!("stageTokens needs 5 tokens, found {}", v.len()));
            }
        },
        None => default.stage_tokens,
    };
    if stage_tokens.iter().any(|t| t.is_empty()) {
        return invalid("stageTokens may not be empty".to_string());
    }
    let stage_marker = sc.stage_marker.clone().unwrap_or(default.stage_marker);
    if stage_marker.is_empty() {
        return invalid("stageMarker may not be empty".to_string());
    }
    Ok(ScoreRules {
        placeholder: sc.placeholder.clone().unwrap_or(default.placeholder),
        stage_marker,
        stage_tokens,
    })
}

fn validate_taxonomy(tc: &TaxonomyConfig) -> Taxonomy {
    let default = Taxonomy::default();
    let mapper = |entries: &Option<BTreeMap<String, String>>,
                  fallback: Option<Fallback>,
                  base: &TaxonomyMapper| {
        let fallback = fallback.unwrap_or_else(|| base.fallback().clone());
        let entries: Vec<(String, String)> = entries
            .as_ref()
            .map(|m| m.clone().into_iter().collect())
            .unwrap_or_else(|| base.entries().to_vec());
        TaxonomyMapper::from_entries(entries, fallback)
    };
    Taxonomy {
        roles: mapper(
            &tc.roles,
            tc.default_role.clone().map(Fallback::Category),
            &default.roles,
        ),
        school_levels: mapper(
            &tc.school_levels,
            tc.default_school_level.clone().map(Fallback::Category),
            &default.school_levels,
        ),
        role_groups: mapper(&tc.role_groups, None, &default.role_groups),
    }
}

fn validate_partitions(pcs: &[PartitionConfig]) -> SurveyResult<Vec<Partition>> {
    let mut res: Vec<Partition> = Vec::new();
    for pc in pcs.iter() {
        let valid_name = !pc.name.is_empty()
            && pc
                .name
                .chars()
                .all(|c| !std::path::is_separator(c) && !c.is_control());
        if !valid_name {
            return invalid(format!("invalid partition name {:?}", pc.name));
        }
        if res.iter().any(|p: &Partition| p.name == pc.name) {
            return invalid(format!("partition {:?} is defined twice", pc.name));
        }
        let non_empty = |x: &Option<String>| x.clone().filter(|s| !s.is_empty());
        res.push(Partition {
            name: pc.name.clone(),
            school_contains: non_empty(&pc.school_contains),
            school_excludes: non_empty(&pc.school_excludes),
            exclude_roles: pc.exclude_roles.clone().unwrap_or_default(),
        });
    }
    Ok(res)
}

/// Checks the configuration and turns it into the objects used by the run.
/// Relative directories in the configuration are resolved against
/// `config_dir`; the command line directories are used as given.
pub fn validate_config(
    config: &SurveyConfig,
    config_dir: &Path,
    args: &Args,
) -> SurveyResult<Settings> {
    let output_settings = config.output_settings.clone().unwrap_or_default();

    let source_dir = match (&args.input, &config.source_directory) {
        (Some(p), _) => PathBuf::from(p),
        (None, Some(p)) => config_dir.join(p),
        (None, None) => return SourceNotConfiguredSnafu {}.fail(),
    };
    let output_dir = match (&args.out, &output_settings.output_directory) {
        (Some(p), _) => PathBuf::from(p),
        (None, Some(p)) => config_dir.join(p),
        (None, None) => config_dir.join("output"),
    };

    let label = config
        .legacy_encoding
        .clone()
        .unwrap_or_else(|| "big5".to_string());
    let legacy_encoding =
        Encoding::for_label(label.trim().as_bytes()).context(UnknownEncodingSnafu { label })?;

    let default_rules = TaggingRules::default();
    let tagging = TaggingRules {
        schools: match &config.school_rules {
            Some(rules) => validate_rules(rules, "school")?,
            None => default_rules.schools,
        },
        roles: match &config.role_rules {
            Some(rules) => validate_rules(rules, "role")?,
            None => default_rules.roles,
        },
        default_school: config
            .default_school
            .clone()
            .unwrap_or(default_rules.default_school),
        default_role: config
            .default_role
            .clone()
            .unwrap_or(default_rules.default_role),
    };

    let taxonomy_config = config.taxonomy.clone().unwrap_or_default();
    let partitions = match &config.partitions {
        Some(pcs) => validate_partitions(pcs)?,
        None => default_partitions(),
    };

    let settings = Settings {
        source_dir,
        output_dir,
        write_bom: output_settings.write_bom.unwrap_or(true),
        sample_size_label: output_settings
            .sample_size_label
            .unwrap_or_else(|| "有效樣本數 (N)".to_string()),
        legacy_encoding,
        excel_worksheet: config
            .excel_worksheet_name
            .clone()
            .filter(|s| !s.is_empty()),
        tagging,
        names: validate_columns(&config.columns.clone().unwrap_or_default())?,
        scoring: validate_scoring(&config.scoring.clone().unwrap_or_default())?,
        taxonomy: validate_taxonomy(&taxonomy_config),
        teacher_category: taxonomy_config
            .teacher_category
            .clone()
            .unwrap_or_else(|| GENERAL_TEACHER.to_string()),
        metric_keywords: config.metric_keywords.clone().unwrap_or_default(),
        partitions,
    };
    debug!("validate_config: {:?}", settings);
    Ok(settings)
}
