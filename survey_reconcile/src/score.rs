use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{ColumnNames, ScoreRules};
use crate::table::{Cell, ColumnKind, QuantifiedTable, Score, UnifiedTable};

static LEVEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)level\s*(\d)(?:\.0)?").unwrap());

static LEADING_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d)(?:\.0)?").unwrap());

/// Turns free-text answers into ordinal scores.
///
/// The rules are tried in this order on the trimmed text, and the first one
/// that matches decides:
///
/// | # | rule                                                   | result      |
/// |---|--------------------------------------------------------|-------------|
/// | 1 | contains the placeholder                               | missing     |
/// | 2 | stage marker immediately followed by a stage token     | 1 to 5      |
/// | 3 | `Level N` (any case, optional `.0`), N a single digit   | N           |
/// | 4 | starts with a digit (optional `.0`)                    | that digit  |
/// | 5 | anything else                                          | missing     |
///
/// Rules 3 and 4 only produce a score for digits 1 to 5: "Level 7" is missing.
/// Changing the order changes the outcome: "階段二 (Level 4)" is a 2.
pub struct ScoreExtractor<'a> {
    rules: &'a ScoreRules,
}

impl<'a> ScoreExtractor<'a> {
    pub fn new(rules: &'a ScoreRules) -> ScoreExtractor<'a> {
        ScoreExtractor { rules }
    }

    pub fn extract(&self, cell: Option<&str>) -> Option<Score> {
        let text = cell?.trim();
        if !self.rules.placeholder.is_empty() && text.contains(self.rules.placeholder.as_str()) {
            return None;
        }
        if let Some(stage) = self.stage(text) {
            return Score::new(stage);
        }
        if let Some(caps) = LEVEL.captures(text) {
            return caps
                .get(1)
                .and_then(|d| d.as_str().parse::<u32>().ok())
                .and_then(Score::new);
        }
        LEADING_DIGIT
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|d| d.as_str().parse::<u32>().ok())
            .and_then(Score::new)
    }

    fn stage(&self, text: &str) -> Option<u32> {
        let marker = self.rules.stage_marker.as_str();
        if marker.is_empty() {
            return None;
        }
        for (pos, _) in text.match_indices(marker) {
            let rest = &text[pos + marker.len()..];
            let found = self
                .rules
                .stage_tokens
                .iter()
                .position(|tok| !tok.is_empty() && rest.starts_with(tok.as_str()));
            if let Some(idx) = found {
                return Some(idx as u32 + 1);
            }
        }
        None
    }

    /// Scores every question column of the table. Metadata columns are
    /// copied as they are.
    pub fn quantify(&self, table: &UnifiedTable) -> QuantifiedTable {
        let (meta_idx, metric_idx): (Vec<usize>, Vec<usize>) = (0..table.columns.len())
            .partition(|&i| table.columns[i].kind == ColumnKind::Metadata);
        let metadata: Vec<Vec<Cell>> = table
            .rows
            .iter()
            .map(|row| meta_idx.iter().map(|&i| row[i].clone()).collect())
            .collect();
        let scores: Vec<Vec<Option<Score>>> = table
            .rows
            .iter()
            .map(|row| {
                metric_idx
                    .iter()
                    .map(|&i| self.extract(row[i].as_deref()))
                    .collect()
            })
            .collect();
        let filled: usize = scores.iter().flatten().filter(|s| s.is_some()).count();
        info!(
            "quantify: {} rows, {} metrics, {} scores",
            table.num_rows(),
            metric_idx.len(),
            filled
        );
        QuantifiedTable {
            metadata_columns: meta_idx
                .iter()
                .map(|&i| table.columns[i].name.clone())
                .collect(),
            metric_columns: metric_idx
                .iter()
                .map(|&i| table.columns[i].name.clone())
                .collect(),
            metadata,
            scores,
        }
    }
}

/// A raw answer that still holds the placeholder of an unanswered question.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PlaceholderFinding {
    pub source_id: Option<String>,
    pub school_name: Option<String>,
    pub respondent: Option<String>,
    pub column: String,
    pub content: String,
}

/// Finds every question cell that contains the placeholder. These cells
/// are scored as missing; the list tells where they came from.
pub fn find_placeholders(
    table: &UnifiedTable,
    rules: &ScoreRules,
    names: &ColumnNames,
) -> Vec<PlaceholderFinding> {
    if rules.placeholder.is_empty() {
        return Vec::new();
    }
    let mut res: Vec<PlaceholderFinding> = Vec::new();
    for (r, row) in table.rows.iter().enumerate() {
        for (c, column) in table.columns.iter().enumerate() {
            if column.kind != ColumnKind::Question {
                continue;
            }
            if let Some(content) = row[c].as_deref() {
                if content.contains(rules.placeholder.as_str()) {
                    let get = |n: &str| table.value(r, n).map(|s| s.to_string());
                    let finding = PlaceholderFinding {
                        source_id: get(names.source_id.as_str()),
                        school_name: get(names.school_name.as_str()),
                        respondent: names.identity.as_deref().and_then(get),
                        column: column.name.clone(),
                        content: content.to_string(),
                    };
                    debug!("find_placeholders: {:?}", finding);
                    res.push(finding);
                }
            }
        }
    }
    if !res.is_empty() {
        warn!(
            "Found {} answers holding the placeholder {:?}; they are counted as missing",
            res.len(),
            rules.placeholder
        );
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge;
    use crate::table::{Column, TaggedTable};
    use crate::tagger::CohortMetadata;

    fn score(text: &str) -> Option<u8> {
        let rules = ScoreRules::default();
        ScoreExtractor::new(&rules).extract(Some(text)).map(Score::value)
    }

    #[test]
    fn stages() {
        let cases = [
            ("階段一：尚在摸索", 1),
            ("階段二：開始嘗試", 2),
            ("階段三：穩定執行", 3),
            ("階段四：老師幾乎都能做到", 4),
            ("階段五：能帶領他人", 5),
        ];
        for (text, expected) in cases {
            assert_eq!(score(text), Some(expected), "{}", text);
        }
    }

    #[test]
    fn stage_marker_must_be_followed_by_token() {
        assert_eq!(score("目前階段：三"), None);
        assert_eq!(score("階段 三"), None);
        assert_eq!(score("下一階段 階段四"), Some(4));
    }

    #[test]
    fn placeholder_wins() {
        assert_eq!(score("__TEMP__"), None);
        assert_eq!(score("階段五 __TEMP__"), None);
        assert_eq!(score("Level 4 __TEMP__"), None);
        assert_eq!(score("5__TEMP__"), None);
    }

    #[test]
    fn levels() {
        assert_eq!(score("Level 3"), Some(3));
        assert_eq!(score("level 4 - 穩定"), Some(4));
        assert_eq!(score("LEVEL2.0"), Some(2));
        assert_eq!(score("我的 Level 5"), Some(5));
        assert_eq!(score("Level 7"), None);
        assert_eq!(score("Level 0"), None);
    }

    #[test]
    fn leading_digits() {
        assert_eq!(score("5"), Some(5));
        assert_eq!(score("4.0"), Some(4));
        assert_eq!(score(" 1 "), Some(1));
        assert_eq!(score("3 分"), Some(3));
        assert_eq!(score("0"), None);
        assert_eq!(score("9"), None);
    }

    #[test]
    fn precedence_stage_before_level() {
        assert_eq!(score("階段二 (Level 4)"), Some(2));
        assert_eq!(score("Level 1, 5 分"), Some(1));
    }

    #[test]
    fn missing() {
        let rules = ScoreRules::default();
        let ex = ScoreExtractor::new(&rules);
        assert_eq!(ex.extract(None), None);
        assert_eq!(score("unrelated text"), None);
        assert_eq!(score(""), None);
        assert_eq!(score("   "), None);
    }

    #[test]
    fn custom_tokens() {
        let rules = ScoreRules {
            placeholder: "".to_string(),
            stage_marker: "stage ".to_string(),
            stage_tokens: [
                "one".to_string(),
                "two".to_string(),
                "three".to_string(),
                "four".to_string(),
                "five".to_string(),
            ],
        };
        let ex = ScoreExtractor::new(&rules);
        for (idx, tok) in ["one", "two", "three", "four", "five"].iter().enumerate() {
            let text = format!("I am at stage {} now", tok);
            assert_eq!(
                ex.extract(Some(&text)).map(Score::value),
                Some(idx as u8 + 1)
            );
        }
        // An empty placeholder never matches.
        assert_eq!(ex.extract(Some("4")).map(Score::value), Some(4));
    }

    fn unified() -> UnifiedTable {
        let mut columns = vec![
            Column::metadata("source_id"),
            Column::metadata("role_tag"),
            Column::metadata("school_name"),
            Column::metadata("教師姓名"),
        ];
        columns.push(Column::question("q1"));
        columns.push(Column::question("q2"));
        let s = |x: &str| Some(x.to_string());
        merge(vec![TaggedTable {
            metadata: CohortMetadata {
                source_id: "a.csv".to_string(),
                role_tag: "r".to_string(),
                school_name: "S".to_string(),
            },
            columns,
            rows: vec![
                vec![s("a.csv"), s("r"), s("S"), s("王"), s("階段三"), s("__TEMP__")],
                vec![s("a.csv"), s("r"), s("S"), s("李"), s("Level 5"), None],
            ],
        }])
    }

    #[test]
    fn quantify_keeps_metadata() {
        let rules = ScoreRules::default();
        let q = ScoreExtractor::new(&rules).quantify(&unified());
        assert_eq!(
            q.metadata_columns,
            vec!["source_id", "role_tag", "school_name", "教師姓名"]
        );
        assert_eq!(q.metric_columns, vec!["q1", "q2"]);
        assert_eq!(q.metadata_value(1, "教師姓名"), Some("李"));
        assert_eq!(q.score(0, "q1"), Score::new(3));
        assert_eq!(q.score(0, "q2"), None);
        assert_eq!(q.score(1, "q1"), Score::new(5));
    }

    #[test]
    fn placeholder_findings() {
        let found = find_placeholders(&unified(), &ScoreRules::default(), &ColumnNames::default());
        assert_eq!(
            found,
            vec![PlaceholderFinding {
                source_id: Some("a.csv".to_string()),
                school_name: Some("S".to_string()),
                respondent: Some("王".to_string()),
                column: "q2".to_string(),
                content: "__TEMP__".to_string(),
            }]
        );
    }
}
