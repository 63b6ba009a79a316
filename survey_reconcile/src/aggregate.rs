use log::{debug, info, warn};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::table::QuantifiedTable;

/// Name of the column holding [`MetricSummary::count`] in a descriptive
/// report.
pub const SAMPLE_SIZE: &str = "sample_size";

/// The values of the grouping columns for one group.
pub type GroupKey = Vec<String>;

/// Descriptive statistics over the non-missing scores of one metric.
#[derive(PartialEq, Debug, Clone)]
pub struct MetricSummary {
    pub metric: String,
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation; needs at least two values.
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl MetricSummary {
    fn from_values(metric: &str, values: &[f64]) -> MetricSummary {
        let count = values.len();
        if count == 0 {
            return MetricSummary {
                metric: metric.to_string(),
                count,
                mean: None,
                std: None,
                min: None,
                max: None,
            };
        }
        let mean = values.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
            Some((ss / (count - 1) as f64).sqrt())
        } else {
            None
        };
        MetricSummary {
            metric: metric.to_string(),
            count,
            mean: Some(mean),
            std,
            min: values.iter().cloned().reduce(f64::min),
            max: values.iter().cloned().reduce(f64::max),
        }
    }
}

/// Metrics as rows, groups as columns.
#[derive(PartialEq, Debug, Clone)]
pub struct GroupReport {
    pub group_columns: Vec<String>,
    pub groups: Vec<GroupKey>,
    /// One entry per group, in the order of `groups`.
    pub sample_sizes: Vec<usize>,
    pub metrics: Vec<String>,
    /// `cells[m][g]` summarizes metric `m` within group `g`.
    pub cells: Vec<Vec<MetricSummary>>,
}

impl GroupReport {
    pub fn group_index(&self, key: &[&str]) -> Option<usize> {
        self.groups
            .iter()
            .position(|g| g.iter().map(|s| s.as_str()).eq(key.iter().cloned()))
    }

    pub fn mean(&self, metric: &str, key: &[&str]) -> Option<f64> {
        let m = self.metrics.iter().position(|x| x == metric)?;
        let g = self.group_index(key)?;
        self.cells[m][g].mean
    }

    pub fn sample_size(&self, key: &[&str]) -> Option<usize> {
        self.group_index(key).map(|g| self.sample_sizes[g])
    }

    /// Removes the metrics that have no value in any group.
    pub fn drop_empty_metrics(&mut self) {
        let keep: Vec<bool> = self
            .cells
            .iter()
            .map(|row| row.iter().any(|c| c.count > 0))
            .collect();
        let mut it = keep.iter();
        self.metrics.retain(|_| *it.next().unwrap_or(&false));
        let mut it = keep.iter();
        self.cells.retain(|_| *it.next().unwrap_or(&false));
    }
}

/// Computes descriptive statistics and group comparisons over the scores.
pub struct AggregationEngine<'a> {
    identity_column: Option<&'a str>,
}

impl<'a> AggregationEngine<'a> {
    /// `identity_column` is the respondent column counted for the sample
    /// size of a group. Without it, or if the table does not have it, the
    /// sample size is the number of rows.
    pub fn new(identity_column: Option<&'a str>) -> AggregationEngine<'a> {
        AggregationEngine { identity_column }
    }

    /// Statistics for every metric, sorted by decreasing mean. Metrics
    /// without any value come last. `None` if there is no metric.
    pub fn describe(
        &self,
        table: &QuantifiedTable,
        metrics: &[String],
    ) -> Option<Vec<MetricSummary>> {
        if metrics.is_empty() {
            warn!("describe: no metric to summarize, skipping");
            return None;
        }
        let rows: Vec<usize> = (0..table.num_rows()).collect();
        let mut res: Vec<MetricSummary> = metrics
            .iter()
            .map(|m| MetricSummary::from_values(m, &values_of(table, m, &rows)))
            .collect();
        res.sort_by(|a, b| match (a.mean, b.mean) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        info!("describe: {} metrics over {} rows", res.len(), rows.len());
        Some(res)
    }

    /// Per-group statistics. Groups are sorted by key; rows with a missing
    /// grouping value are left out. `None` if there is no metric.
    pub fn group_report(
        &self,
        table: &QuantifiedTable,
        group_by: &[&str],
        metrics: &[String],
    ) -> Option<GroupReport> {
        if metrics.is_empty() {
            warn!(
                "group_report: no metric to summarize by {:?}, skipping",
                group_by
            );
            return None;
        }
        let groups = group_rows(table, group_by);
        let sample_sizes: Vec<usize> = groups
            .values()
            .map(|rows| self.sample_size(table, rows))
            .collect();
        let cells: Vec<Vec<MetricSummary>> = metrics
            .iter()
            .map(|m| {
                groups
                    .values()
                    .map(|rows| MetricSummary::from_values(m, &values_of(table, m, rows)))
                    .collect()
            })
            .collect();
        debug!(
            "group_report: by {:?}: {} groups, {} metrics",
            group_by,
            groups.len(),
            metrics.len()
        );
        Some(GroupReport {
            group_columns: group_by.iter().map(|s| s.to_string()).collect(),
            groups: groups.into_keys().collect(),
            sample_sizes,
            metrics: metrics.to_vec(),
            cells,
        })
    }

    /// Number of rows per group, sorted by key.
    pub fn count_by(&self, table: &QuantifiedTable, group_by: &[&str]) -> Vec<(GroupKey, usize)> {
        group_rows(table, group_by)
            .into_iter()
            .map(|(k, rows)| (k, rows.len()))
            .collect()
    }

    fn sample_size(&self, table: &QuantifiedTable, rows: &[usize]) -> usize {
        match self.identity_column {
            Some(id) if table.metadata_index(id).is_some() => rows
                .iter()
                .filter(|&&r| table.metadata_value(r, id).is_some())
                .count(),
            _ => rows.len(),
        }
    }
}

fn group_rows(table: &QuantifiedTable, group_by: &[&str]) -> BTreeMap<GroupKey, Vec<usize>> {
    let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
    let mut skipped = 0usize;
    for r in 0..table.num_rows() {
        let key: Option<GroupKey> = group_by
            .iter()
            .map(|c| table.metadata_value(r, c).map(|s| s.to_string()))
            .collect();
        match key {
            Some(k) => groups.entry(k).or_default().push(r),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(
            "group_rows: {} rows without a value for {:?}",
            skipped, group_by
        );
    }
    groups
}

fn values_of(table: &QuantifiedTable, metric: &str, rows: &[usize]) -> Vec<f64> {
    match table.metric_index(metric) {
        Some(m) => rows
            .iter()
            .filter_map(|&r| table.scores[r][m])
            .map(|s| s.value() as f64)
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Score;

    fn table() -> QuantifiedTable {
        let s = |x: &str| Some(x.to_string());
        QuantifiedTable {
            metadata_columns: vec!["school".to_string(), "name".to_string()],
            metric_columns: vec!["q1".to_string(), "q2".to_string(), "q3".to_string()],
            metadata: vec![
                vec![s("A"), s("a1")],
                vec![s("A"), None],
                vec![s("B"), s("b1")],
                vec![None, s("x")],
            ],
            scores: vec![
                vec![Score::new(2), Score::new(5), None],
                vec![None, Score::new(3), None],
                vec![Score::new(4), Score::new(1), None],
                vec![Score::new(1), None, None],
            ],
        }
    }

    fn metrics() -> Vec<String> {
        vec!["q1".to_string(), "q2".to_string(), "q3".to_string()]
    }

    #[test]
    fn describe_excludes_missing() {
        let engine = AggregationEngine::new(None);
        let stats = engine.describe(&table(), &metrics()).unwrap();
        // q2: 5, 3, 1 -> mean 3, q1: 2, 4, 1 -> mean 7/3, q3: nothing
        assert_eq!(stats[0].metric, "q2");
        assert_eq!(stats[0].count, 3);
        assert_eq!(stats[0].mean, Some(3.0));
        assert_eq!(stats[0].std, Some(2.0));
        assert_eq!(stats[0].min, Some(1.0));
        assert_eq!(stats[0].max, Some(5.0));
        assert_eq!(stats[1].metric, "q1");
        assert!((stats[1].mean.unwrap() - 7.0 / 3.0).abs() < 1e-12);
        assert_eq!(stats[2].metric, "q3");
        assert_eq!(stats[2].count, 0);
        assert_eq!(stats[2].mean, None);
    }

    #[test]
    fn single_value_has_no_std() {
        let engine = AggregationEngine::new(None);
        let t = table().filter_rows(|_, r| r == 0);
        let stats = engine.describe(&t, &["q1".to_string()]).unwrap();
        assert_eq!(stats[0].mean, Some(2.0));
        assert_eq!(stats[0].std, None);
    }

    #[test]
    fn group_means_and_sample_sizes() {
        let engine = AggregationEngine::new(Some("name"));
        let r = engine.group_report(&table(), &["school"], &metrics()).unwrap();
        assert_eq!(r.groups, vec![vec!["A".to_string()], vec!["B".to_string()]]);
        // Row 1 has no name, row 3 has no school.
        assert_eq!(r.sample_size(&["A"]), Some(1));
        assert_eq!(r.sample_size(&["B"]), Some(1));
        assert_eq!(r.mean("q1", &["A"]), Some(2.0));
        assert_eq!(r.mean("q2", &["A"]), Some(4.0));
        assert_eq!(r.mean("q3", &["A"]), None);
        assert_eq!(r.cells[1][0].count, 2);
    }

    #[test]
    fn row_count_without_identity() {
        let engine = AggregationEngine::new(Some("missing column"));
        let r = engine.group_report(&table(), &["school"], &metrics()).unwrap();
        assert_eq!(r.sample_size(&["A"]), Some(2));
    }

    #[test]
    fn tuple_grouping_and_counts() {
        let engine = AggregationEngine::new(None);
        let counts = engine.count_by(&table(), &["school", "name"]);
        assert_eq!(
            counts,
            vec![
                (vec!["A".to_string(), "a1".to_string()], 1),
                (vec!["B".to_string(), "b1".to_string()], 1),
            ]
        );
    }

    #[test]
    fn empty_metric_set_is_skipped() {
        let engine = AggregationEngine::new(None);
        assert!(engine.describe(&table(), &[]).is_none());
        assert!(engine.group_report(&table(), &["school"], &[]).is_none());
    }

    #[test]
    fn drop_empty_report_metrics() {
        let engine = AggregationEngine::new(None);
        let mut r = engine.group_report(&table(), &["school"], &metrics()).unwrap();
        r.drop_empty_metrics();
        assert_eq!(r.metrics, vec!["q1".to_string(), "q2".to_string()]);
        assert_eq!(r.cells.len(), 2);
    }
}
