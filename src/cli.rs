use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Reconcile deal exports and answer filter-and-aggregate queries",
    long_about = None
)]
pub struct Cli {
    /// YAML settings file (anchors, sheet allow-list, flag markers, ...)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Normalize a CSV export or workbook and optionally save a snapshot
    Ingest(IngestArgs),
    /// Filter a dataset and print its summary
    Analyze(AnalyzeArgs),
    /// List the values available for each filter
    Filters(CatalogArgs),
    /// List distinct regions across every region-like column
    Regions(CatalogArgs),
    /// Show normalized column names, source labels and semantic keys
    Columns(SourceArgs),
    /// Print the first rows of a filtered dataset
    Preview(PreviewArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Where the dataset comes from: a source file, or a snapshot written by `ingest`.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// CSV export or workbook (.xlsx, .xls, .ods); `-` reads delimited text from stdin
    #[arg(
        short = 'i',
        long = "input",
        required_unless_present = "snapshot",
        conflicts_with = "snapshot"
    )]
    pub input: Option<PathBuf>,
    /// Snapshot produced by `deal-lens ingest --snapshot`
    #[arg(short = 's', long = "snapshot")]
    pub snapshot: Option<PathBuf>,
    /// Sheet to query when the dataset holds several
    #[arg(long)]
    pub sheet: Option<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|'); sniffed when omitted
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of delimited input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Only read these workbook sheets (comma-separated)
    #[arg(long = "sheets", value_delimiter = ',')]
    pub sheets: Vec<String>,
    /// Merge all workbook sheets into a single table
    #[arg(long)]
    pub unify: bool,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Write the normalized dataset to this snapshot file
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Filter specification as a JSON object, e.g. '{"region": ["North"], "amount_min": 100}'
    #[arg(short = 'f', long = "filters", conflicts_with = "filters_file")]
    pub filters: Option<String>,
    /// Read the filter specification from a JSON file
    #[arg(long = "filters-file")]
    pub filters_file: Option<PathBuf>,
    /// Region column override (normalized name or source label)
    #[arg(long = "region-col")]
    pub region_col: Option<String>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Source label of the region column preferred for the region ranking
    #[arg(long = "region-fallback")]
    pub region_fallback: Option<String>,
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct CatalogArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Region column override (normalized name or source label)
    #[arg(long = "region-col")]
    pub region_col: Option<String>,
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// Write the filtered rows as CSV to this path (`-` for stdout) instead of a table
    #[arg(long = "csv")]
    pub csv: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" | "\\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err(format!("Delimiter '{other}' must be a single character"));
            }
            if !first.is_ascii() {
                return Err(format!("Delimiter '{other}' must be ASCII"));
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_delimiter_accepts_names_and_characters() {
        assert_eq!(parse_delimiter("semicolon"), Ok(b';'));
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter(";;").is_err());
        assert!(parse_delimiter("¦").is_err());
    }

    #[test]
    fn input_and_snapshot_are_exclusive() {
        assert!(Cli::try_parse_from(["deal-lens", "columns"]).is_err());
        assert!(
            Cli::try_parse_from(["deal-lens", "columns", "-i", "a.csv", "-s", "a.json"]).is_err()
        );
        let cli = Cli::try_parse_from([
            "deal-lens",
            "analyze",
            "-s",
            "a.json",
            "--filters",
            "{}",
            "--format",
            "json",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Analyze(_)));
    }
}
