// Writers for the output tables. Every table is a CSV file, optionally
// prefixed with a UTF-8 byte order mark so that spreadsheets pick the right
// encoding.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::survey::*;

const BOM: &[u8] = b"\xEF\xBB\xBF";

pub struct ReportWriter {
    dir: PathBuf,
    bom: bool,
    sample_size_label: String,
}

fn format_value(x: Option<f64>) -> String {
    x.map(|v| v.to_string()).unwrap_or_default()
}

fn group_label(key: &[String]) -> String {
    key.join(" / ")
}

impl ReportWriter {
    pub fn new(dir: &Path, bom: bool, sample_size_label: &str) -> ReportWriter {
        ReportWriter {
            dir: dir.to_path_buf(),
            bom,
            sample_size_label: sample_size_label.to_string(),
        }
    }

    fn create(&self, name: &str) -> SurveyResult<(csv::Writer<File>, String)> {
        let p = self.dir.join(name);
        let path = p.display().to_string();
        let mut file = File::create(&p).context(WritingFileSnafu { path: path.clone() })?;
        if self.bom {
            file.write_all(BOM)
                .context(WritingFileSnafu { path: path.clone() })?;
        }
        Ok((csv::Writer::from_writer(file), path))
    }

    fn write_rows<I, R>(&self, name: &str, header: &[String], rows: I) -> SurveyResult<()>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = String>,
    {
        let (mut wtr, path) = self.create(name)?;
        wtr.write_record(header)
            .context(WritingReportSnafu { path: path.clone() })?;
        let mut count = 0usize;
        for row in rows {
            let record: Vec<String> = row.into_iter().collect();
            wtr.write_record(&record)
                .context(WritingReportSnafu { path: path.clone() })?;
            count += 1;
        }
        wtr.flush().context(WritingFileSnafu { path: path.clone() })?;
        info!("Wrote {} ({} rows)", path, count);
        Ok(())
    }

    pub fn write_text(&self, name: &str, contents: &str) -> SurveyResult<()> {
        let p = self.dir.join(name);
        let path = p.display().to_string();
        fs::write(&p, contents).context(WritingFileSnafu { path: path.clone() })?;
        info!("Wrote {}", path);
        Ok(())
    }

    /// The merged table, cells as read.
    pub fn write_unified(&self, name: &str, table: &UnifiedTable) -> SurveyResult<()> {
        let rows = table
            .rows
            .iter()
            .map(|row| row.iter().map(|c| c.clone().unwrap_or_default()));
        self.write_rows(name, &table.column_names(), rows)
    }

    /// Metadata columns first, then one column per metric.
    pub fn write_quantified(&self, name: &str, table: &QuantifiedTable) -> SurveyResult<()> {
        let header: Vec<String> = table
            .metadata_columns
            .iter()
            .chain(table.metric_columns.iter())
            .cloned()
            .collect();
        let rows = table.metadata.iter().zip(table.scores.iter()).map(|(m, s)| {
            m.iter()
                .map(|c| c.clone().unwrap_or_default())
                .chain(
                    s.iter()
                        .map(|x| x.map(|v| v.value().to_string()).unwrap_or_default()),
                )
                .collect::<Vec<String>>()
        });
        self.write_rows(name, &header, rows)
    }

    pub fn write_counts(
        &self,
        name: &str,
        group_columns: &[&str],
        counts: &[(GroupKey, usize)],
    ) -> SurveyResult<()> {
        let mut header: Vec<String> = group_columns.iter().map(|s| s.to_string()).collect();
        header.push("count".to_string());
        let rows = counts.iter().map(|(key, n)| {
            let mut row = key.clone();
            row.push(n.to_string());
            row
        });
        self.write_rows(name, &header, rows)
    }

    /// One row per metric, in the order given: the number of scores, then
    /// their mean, sample standard deviation, minimum and maximum.
    pub fn write_describe(&self, name: &str, stats: &[MetricSummary]) -> SurveyResult<()> {
        let header: Vec<String> = ["metric", SAMPLE_SIZE, "mean", "std", "min", "max"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows = stats.iter().map(|s| {
            vec![
                s.metric.clone(),
                s.count.to_string(),
                format_value(s.mean),
                format_value(s.std),
                format_value(s.min),
                format_value(s.max),
            ]
        });
        self.write_rows(name, &header, rows)
    }

    /// Metrics as rows and groups as columns, the sample sizes in the first
    /// row.
    pub fn write_group_report(&self, name: &str, report: &GroupReport) -> SurveyResult<()> {
        let mut header: Vec<String> = vec![report.group_columns.join(" / ")];
        header.extend(report.groups.iter().map(|g| group_label(g)));
        let mut sizes: Vec<String> = vec![self.sample_size_label.clone()];
        sizes.extend(report.sample_sizes.iter().map(|n| n.to_string()));
        let means = report.metrics.iter().zip(report.cells.iter()).map(|(m, cells)| {
            let mut row = vec![m.clone()];
            row.extend(cells.iter().map(|c| format_value(c.mean)));
            row
        });
        self.write_rows(name, &header, std::iter::once(sizes).chain(means))
    }

    /// Groups as rows, labelled with their size, and metrics as columns.
    pub fn write_matrix(&self, name: &str, report: &GroupReport) -> SurveyResult<()> {
        let mut header: Vec<String> = vec!["group".to_string()];
        header.extend(report.metrics.iter().cloned());
        let rows = report.groups.iter().enumerate().map(|(g, key)| {
            let mut row = vec![format!(
                "{} (n={})",
                group_label(key),
                report.sample_sizes[g]
            )];
            row.extend(report.cells.iter().map(|cells| format_value(cells[g].mean)));
            row
        });
        self.write_rows(name, &header, rows)
    }
}
