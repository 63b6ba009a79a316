use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use survey_reconcile::builder::Builder;
use survey_reconcile::*;

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::survey::config_reader::*;
use crate::survey::io_common::{discover_sources, prepare_output_dir, simplify_file_name};
use crate::survey::report::ReportWriter;

mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;
mod report;

/// Failure to read one source file. The file is skipped, the run goes on.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum IngestError {
    #[snafu(display("Error reading file {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("File {path} is neither UTF-8 nor {encoding}"))]
    Decoding { path: String, encoding: String },
    #[snafu(display("Error parsing CSV file {path}"))]
    ParsingCsv { source: csv::Error, path: String },
    #[snafu(display("Error opening workbook {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Workbook {path} has no worksheet {sheet}"))]
    MissingWorksheet { path: String, sheet: String },
    #[snafu(display("File {path} has no header row"))]
    MissingHeader { path: String },
    #[snafu(display("Unsupported file type: {path}"))]
    UnsupportedFile { path: String },
}

type IngestResult<T> = Result<T, IngestError>;

/// Failure of the whole run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SurveyError {
    #[snafu(display("Error opening JSON file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing the run summary"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("No source directory: pass --input or set sourceDirectory"))]
    SourceNotConfigured {},
    #[snafu(display("Source directory {path} does not exist"))]
    NoSourceDirectory { path: String },
    #[snafu(display("Error listing source directory {path}"))]
    ListingSourceDir {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("No .csv or .xlsx file found in {path}"))]
    NoSourceFiles { path: String },
    #[snafu(display("Output directory {path} is not writable"))]
    OutputNotWritable {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Unknown encoding label {label:?}"))]
    UnknownEncoding { label: String },
    #[snafu(display("Invalid configuration: {message}"))]
    InvalidConfig { message: String },
    #[snafu(display("None of the source files could be read ({skipped} skipped)"))]
    NothingIngested { skipped: usize },
    #[snafu(display("Error writing report {path}"))]
    WritingReport { source: csv::Error, path: String },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

type SurveyResult<T> = Result<T, SurveyError>;

fn ingest_file(path: &Path, settings: &Settings) -> IngestResult<RawTable> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "csv" => io_csv::read_csv_table(path, settings.legacy_encoding),
        "xlsx" => io_excel::read_excel_table(path, settings.excel_worksheet.as_deref()),
        _ => UnsupportedFileSnafu {
            path: path.display().to_string(),
        }
        .fail(),
    }
}

fn partition_summary_js(name: &str, table: &QuantifiedTable, num_metrics: usize) -> JSValue {
    json!({"name": name, "rows": table.num_rows(), "metrics": num_metrics})
}

/// Runs the full pipeline with the given command line arguments.
pub fn run(args: &Args) -> SurveyResult<()> {
    let (config, config_dir) = match &args.config {
        Some(config_path) => {
            let config_p = Path::new(config_path.as_str());
            let config = read_config(config_p)?;
            let parent = config_p.parent().context(MissingParentDirSnafu {})?;
            (config, parent.to_path_buf())
        }
        None => (SurveyConfig::default(), PathBuf::from(".")),
    };
    info!("config: {:?}", config);

    // Validate once, before touching any file.
    let settings = validate_config(&config, &config_dir, args)?;
    run_survey(&settings, args.reference.as_deref())?;
    Ok(())
}

/// Reads, merges, quantifies and reports. Returns the run summary.
pub fn run_survey(settings: &Settings, reference_path: Option<&str>) -> SurveyResult<JSValue> {
    let names = &settings.names;
    let source_dir = settings.source_dir.as_path();
    ensure!(
        source_dir.is_dir(),
        NoSourceDirectorySnafu {
            path: source_dir.display().to_string()
        }
    );
    let sources = discover_sources(source_dir)?;
    ensure!(
        !sources.is_empty(),
        NoSourceFilesSnafu {
            path: source_dir.display().to_string()
        }
    );
    prepare_output_dir(&settings.output_dir)?;
    info!(
        "Found {} source files in {}",
        sources.len(),
        source_dir.display()
    );

    // Reading and tagging are independent per file. The merge itself is
    // done afterwards, in the sorted file order.
    let mut builder = Builder::new(&settings.tagging, names);
    let prepared: Vec<(String, IngestResult<TaggedTable>)> = sources
        .par_iter()
        .map(|p| {
            let name = simplify_file_name(p);
            let table = ingest_file(p, settings).map(|raw| builder.prepare(&name, raw));
            (name, table)
        })
        .collect();

    let mut ingested: Vec<String> = Vec::new();
    let mut skipped: Vec<String> = Vec::new();
    for (name, table) in prepared {
        match table {
            Ok(t) => {
                info!(
                    "Read {}: {} rows, school {:?}, role {:?}",
                    name,
                    t.rows.len(),
                    t.metadata.school_name,
                    t.metadata.role_tag
                );
                builder.add_prepared(t);
                ingested.push(name);
            }
            Err(e) => {
                warn!("Skipping {}: {}", name, e);
                skipped.push(name);
            }
        }
    }
    ensure!(
        builder.num_tables() > 0,
        NothingIngestedSnafu {
            skipped: skipped.len()
        }
    );

    let unified = builder.build();
    info!(
        "Merged {} rows and {} columns from {} files",
        unified.num_rows(),
        unified.columns.len(),
        ingested.len()
    );
    let coverage = single_source_columns(&unified);
    let placeholders = find_placeholders(&unified, &settings.scoring, names);

    let writer = ReportWriter::new(
        &settings.output_dir,
        settings.write_bom,
        &settings.sample_size_label,
    );
    writer.write_unified("merged.csv", &unified)?;

    let mut quantified = ScoreExtractor::new(&settings.scoring).quantify(&unified);
    settings.taxonomy.annotate(&mut quantified, names);
    writer.write_quantified("quantified.csv", &quantified)?;

    // Demographics count rows, not named respondents.
    let counter = AggregationEngine::new(None);
    let school_cols = [names.school_level.as_str(), names.school_name.as_str()];
    writer.write_counts(
        "demographics_schools.csv",
        &school_cols,
        &counter.count_by(&quantified, &school_cols),
    )?;
    let role_cols = [
        names.school_level.as_str(),
        names.school_name.as_str(),
        names.standardized_role.as_str(),
        names.source_id.as_str(),
    ];
    writer.write_counts(
        "demographics_roles.csv",
        &role_cols,
        &counter.count_by(&quantified, &role_cols),
    )?;

    // School level matrix, on the teacher rows only.
    let teachers = quantified.filter_rows(|t, r| {
        t.metadata_value(r, names.standardized_role.as_str())
            == Some(settings.teacher_category.as_str())
    });
    let matrix_source = if teachers.num_rows() == 0 {
        warn!(
            "No row in category {:?}, the school level matrix uses all the rows",
            settings.teacher_category
        );
        quantified.drop_empty_metrics()
    } else {
        teachers.drop_empty_metrics()
    };
    let matrix_metrics = matrix_source.select_metrics(&settings.metric_keywords);
    if let Some(matrix) = counter.group_report(&matrix_source, &school_cols, &matrix_metrics) {
        writer.write_matrix("school_level_matrix.csv", &matrix)?;
    }

    let engine = AggregationEngine::new(names.identity.as_deref());
    let mut partitions_js: Vec<JSValue> = Vec::new();
    for partition in settings.partitions.iter() {
        let subset = quantified
            .filter_rows(|t, r| {
                partition.matches(
                    t.metadata_value(r, names.school_name.as_str()),
                    t.metadata_value(r, names.role_tag.as_str()),
                )
            })
            .drop_empty_metrics();
        let metrics = subset.select_metrics(&settings.metric_keywords);
        info!(
            "Partition {}: {} rows, {} metrics",
            partition.name,
            subset.num_rows(),
            metrics.len()
        );
        if let Some(stats) = engine.describe(&subset, &metrics) {
            writer.write_describe(&format!("{}_overall.csv", partition.name), &stats)?;
        }
        if let Some(report) = engine.group_report(&subset, &[names.school_name.as_str()], &metrics)
        {
            writer.write_group_report(&format!("{}_by_school.csv", partition.name), &report)?;
        }
        if let Some(report) = engine.group_report(&subset, &[names.role_group.as_str()], &metrics) {
            writer.write_group_report(&format!("{}_by_role.csv", partition.name), &report)?;
        }
        partitions_js.push(partition_summary_js(
            &partition.name,
            &subset,
            metrics.len(),
        ));
    }

    let coverage_js: Vec<JSValue> = coverage
        .iter()
        .map(|w| json!({"column": w.column, "sourceId": w.source_id}))
        .collect();
    let summary_js = json!({
        "files": {"ingested": ingested, "skipped": skipped},
        "rows": unified.num_rows(),
        "columns": unified.columns.len(),
        "metrics": quantified.metric_columns.len(),
        "coverageWarnings": coverage_js,
        "placeholders": placeholders.len(),
        "partitions": partitions_js,
    });
    let pretty_js_stats =
        serde_json::to_string_pretty(&summary_js).context(SerializingJsonSnafu {})?;
    debug!("summary: {}", pretty_js_stats);
    writer.write_text("summary.json", &pretty_js_stats)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = reference_path {
        let summary_ref = read_summary(Path::new(summary_p))?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(SerializingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
        info!("The summary matches the reference {}", summary_p);
    }

    Ok(summary_js)
}
