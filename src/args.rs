use clap::Parser;

/// Merges survey exports of several cohorts, scores the answers and writes
/// comparison reports.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file describing the cohorts, the column names, the score tokens,
    /// the taxonomy tables and the partitions. The built-in tables are used for anything it does not set.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (directory) The directory holding the .csv and .xlsx exports, one per cohort. Setting this option
    /// overrides the source directory that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (directory) Where the merged table, the quantified table and the reports are written. Setting this
    /// option overrides the output directory that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference run summary in JSON format. If provided, svrc will check that the summary
    /// of this run matches the reference and print the differences otherwise.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
