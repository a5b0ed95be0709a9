pub mod catalog;
pub mod cli;
pub mod coerce;
pub mod columns;
pub mod config;
pub mod data;
pub mod dataset;
pub mod decode;
pub mod error;
pub mod filter;
pub mod frequency;
pub mod header;
pub mod ingest;
pub mod io_utils;
pub mod query;
pub mod resolver;
pub mod snapshot;
pub mod store;
pub mod summary;
pub mod table;

use std::{env, fs, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug, info, warn};
use serde_json::json;

use crate::{
    catalog::FilterCatalog,
    cli::{Cli, Commands, FilterArgs, OutputFormat, SourceArgs},
    config::Settings,
    dataset::{Dataset, Table},
    filter::FilterSpec,
    frequency::Tally,
    ingest::IngestReport,
    query::Query,
    snapshot::Snapshot,
    store::{DatasetId, DatasetStore, MemoryStore},
    summary::Summary,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("deal_lens", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let settings = Settings::load_optional(cli.config.as_deref())?;
    match cli.command {
        Commands::Ingest(args) => handle_ingest(&args, &settings),
        Commands::Analyze(args) => handle_analyze(&args, &settings),
        Commands::Filters(args) => handle_filters(&args, &settings),
        Commands::Regions(args) => handle_regions(&args, &settings),
        Commands::Columns(args) => handle_columns(&args, &settings),
        Commands::Preview(args) => handle_preview(&args, &settings),
    }
}

/// A dataset loaded into a fresh store for the duration of one command.
struct Loaded {
    store: MemoryStore,
    id: DatasetId,
    source: String,
    report: IngestReport,
}

fn load_dataset(args: &SourceArgs, settings: &Settings) -> Result<Loaded> {
    let store = MemoryStore::new();
    if let Some(path) = &args.snapshot {
        let snapshot =
            Snapshot::load(path).with_context(|| format!("Loading snapshot {path:?}"))?;
        let source = snapshot.source.clone();
        let report = snapshot.report.clone();
        let id = snapshot.restore(&store);
        info!("Restored dataset {id} from snapshot {path:?}");
        return Ok(Loaded {
            store,
            id,
            source,
            report,
        });
    }
    let path = args
        .input
        .as_deref()
        .context("Either --input or --snapshot is required")?;
    let decode_options =
        settings.decode_options(args.delimiter, args.input_encoding.as_deref())?;
    let ingest_options = settings.ingest_options(&args.sheets, args.unify);
    info!("Ingesting '{}'", path.display());
    let ingested = ingest::ingest_path(path, &decode_options, &ingest_options)
        .with_context(|| format!("Ingesting {path:?}"))?;
    let id = store.store(ingested.dataset);
    Ok(Loaded {
        store,
        id,
        source: path.display().to_string(),
        report: ingested.report,
    })
}

fn read_filters(args: &FilterArgs) -> Result<FilterSpec> {
    let mut spec = match (&args.filters, &args.filters_file) {
        (Some(text), _) => FilterSpec::parse_str(text)?,
        (None, Some(path)) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Reading filters from {path:?}"))?;
            FilterSpec::parse_str(&text).with_context(|| format!("Parsing filters in {path:?}"))?
        }
        (None, None) => FilterSpec::default(),
    };
    if let Some(region_col) = &args.region_col {
        spec.region_column = Some(region_col.trim().to_string());
    }
    debug!("Filter predicates: {:?}", spec.predicates);
    Ok(spec)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Serializing output")?;
    println!("{rendered}");
    Ok(())
}

fn handle_ingest(args: &cli::IngestArgs, settings: &Settings) -> Result<()> {
    let loaded = load_dataset(&args.source, settings)?;
    let dataset = loaded
        .store
        .fetch(&loaded.id)
        .context("Ingested dataset missing from store")?;
    if let Some(output) = &args.output {
        Snapshot::new(
            loaded.id,
            loaded.source.clone(),
            dataset.as_ref().clone(),
            loaded.report.clone(),
        )
        .save(output)
        .with_context(|| format!("Writing snapshot to {output:?}"))?;
        info!("Snapshot for dataset {} written to {output:?}", loaded.id);
    }
    match args.format {
        OutputFormat::Json => print_json(&json!({
            "dataset_id": loaded.id,
            "source": loaded.source,
            "sheets": dataset.sheet_names(),
            "rows": dataset.row_count(),
            "report": loaded.report,
        })),
        OutputFormat::Table => {
            print_ingest_report(&loaded.report);
            Ok(())
        }
    }
}

fn print_ingest_report(report: &IngestReport) {
    let headers = ["sheet", "header_row", "rows", "columns", "unparsed_cells", "dropped_rows"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = report
        .sheets
        .iter()
        .map(|sheet| {
            vec![
                sheet.name.clone(),
                (sheet.header_row + 1).to_string(),
                sheet.rows.to_string(),
                sheet.columns.to_string(),
                sheet.coercion.missing_cells.values().sum::<usize>().to_string(),
                sheet.coercion.dropped_rows.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    if !report.skipped_sheets.is_empty() {
        println!("skipped (no header): {}", report.skipped_sheets.iter().join(", "));
    }
    if !report.ignored_sheets.is_empty() {
        println!("ignored: {}", report.ignored_sheets.iter().join(", "));
    }
}

fn handle_analyze(args: &cli::AnalyzeArgs, settings: &Settings) -> Result<()> {
    let filters = read_filters(&args.filter)?;
    let loaded = load_dataset(&args.source, settings)?;
    let query = Query {
        dataset_id: loaded.id,
        sheet: args.source.sheet.clone(),
        filters,
    };
    let options = settings.summary_options(args.region_fallback.as_deref());
    let outcome = query::run_query(&loaded.store, &query, &options)
        .with_context(|| format!("Analyzing {}", loaded.source))?;
    for diagnostic in &outcome.diagnostics {
        warn!("Filter skipped: {diagnostic}");
    }
    match args.format {
        OutputFormat::Json => print_json(&outcome),
        OutputFormat::Table => {
            print!("{}", render_summary(&outcome.summary));
            Ok(())
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn tally_pairs<T, F>(tally: &Tally<T>, format: F) -> Vec<(String, String)>
where
    F: Fn(&T) -> String,
{
    tally
        .0
        .iter()
        .map(|(label, metric)| (label.clone(), format(metric)))
        .collect()
}

fn render_summary(summary: &Summary) -> String {
    let count = |n: &usize| n.to_string();
    let sum = |n: &f64| format_number(*n);
    let totals = vec![
        ("total_deals".to_string(), summary.total_deals.to_string()),
        ("total_amount".to_string(), format_number(summary.total_amount)),
        ("avg_amount".to_string(), format_number(summary.avg_amount)),
        ("unique_companies".to_string(), summary.unique_companies.to_string()),
        ("repeats".to_string(), summary.repeats.to_string()),
        ("recontacts".to_string(), summary.recontacts.to_string()),
        ("total_cost".to_string(), format_number(summary.total_cost)),
        ("avg_cost".to_string(), format_number(summary.avg_cost)),
        ("total_area".to_string(), format_number(summary.total_area)),
    ];
    let region_title = match &summary.top_regions_by_sum_note {
        Some(note) => format!("top_regions_by_sum ({})", note.region_col),
        None => "top_regions_by_sum".to_string(),
    };
    let sections = [
        ("summary".to_string(), totals),
        ("deals_by_stage".to_string(), tally_pairs(&summary.deals_by_stage, count)),
        ("deals_by_status".to_string(), tally_pairs(&summary.deals_by_status, count)),
        ("deals_by_funnel".to_string(), tally_pairs(&summary.deals_by_funnel, count)),
        ("top_companies_by_sum".to_string(), tally_pairs(&summary.top_companies_by_sum, sum)),
        ("top_companies_by_count".to_string(), tally_pairs(&summary.top_companies_by_count, count)),
        (region_title, tally_pairs(&summary.top_regions_by_sum, sum)),
        ("by_region".to_string(), tally_pairs(&summary.by_region, count)),
        ("by_sheet".to_string(), tally_pairs(&summary.by_sheet, count)),
        ("by_year".to_string(), tally_pairs(&summary.by_year, count)),
        ("top_builders_by_cost".to_string(), tally_pairs(&summary.top_builders_by_cost, sum)),
    ];
    sections
        .iter()
        .map(|(title, pairs)| table::render_pairs(title, pairs))
        .join("\n")
}

fn handle_filters(args: &cli::CatalogArgs, settings: &Settings) -> Result<()> {
    let loaded = load_dataset(&args.source, settings)?;
    let catalog = query::run_catalog(
        &loaded.store,
        &loaded.id,
        args.source.sheet.as_deref(),
        args.region_col.as_deref(),
    )
    .with_context(|| format!("Listing filters for {}", loaded.source))?;
    match args.format {
        OutputFormat::Json => print_json(&catalog),
        OutputFormat::Table => {
            print!("{}", render_catalog(&catalog));
            Ok(())
        }
    }
}

fn render_catalog(catalog: &FilterCatalog) -> String {
    let list = |values: &[String]| values.iter().join(", ");
    let year = |year: Option<i32>| year.map(|y| y.to_string()).unwrap_or_default();
    let pairs = vec![
        ("regions".to_string(), list(&catalog.regions)),
        ("statuses".to_string(), list(&catalog.statuses)),
        ("stages".to_string(), list(&catalog.stages)),
        ("responsibles".to_string(), list(&catalog.responsibles)),
        ("funnels".to_string(), list(&catalog.funnels)),
        ("deal_types".to_string(), list(&catalog.deal_types)),
        ("sheets".to_string(), list(&catalog.sheets)),
        ("years".to_string(), list(&catalog.years)),
        ("region_columns".to_string(), list(&catalog.region_columns)),
        ("start_year".to_string(), year(catalog.start_year)),
        ("end_year".to_string(), year(catalog.end_year)),
    ];
    table::render_pairs("filters", &pairs)
}

fn handle_regions(args: &cli::CatalogArgs, settings: &Settings) -> Result<()> {
    let loaded = load_dataset(&args.source, settings)?;
    let regions = query::run_regions(&loaded.store, &loaded.id, args.source.sheet.as_deref())
        .with_context(|| format!("Listing regions for {}", loaded.source))?;
    match args.format {
        OutputFormat::Json => print_json(&regions),
        OutputFormat::Table => {
            for region in &regions {
                println!("{region}");
            }
            Ok(())
        }
    }
}

fn handle_columns(args: &SourceArgs, settings: &Settings) -> Result<()> {
    let loaded = load_dataset(args, settings)?;
    let dataset = loaded
        .store
        .fetch(&loaded.id)
        .context("Dataset missing from store")?;
    let tables: Vec<(String, std::sync::Arc<Table>)> = match (dataset.as_ref(), &args.sheet) {
        (Dataset::Sheets(sheets), None) => sheets
            .iter()
            .map(|(name, table)| (name.clone(), table.clone()))
            .collect(),
        _ => {
            let table = resolver::select_table(&dataset, args.sheet.as_deref())?;
            vec![(args.sheet.clone().unwrap_or_default(), table)]
        }
    };
    let headers = ["sheet", "name", "label", "key"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = tables
        .iter()
        .flat_map(|(sheet, table)| {
            table.columns().iter().map(move |column| {
                vec![
                    sheet.clone(),
                    column.name.clone(),
                    column.label.clone(),
                    column.key.map(|k| k.as_str().to_string()).unwrap_or_default(),
                ]
            })
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs, settings: &Settings) -> Result<()> {
    let spec = read_filters(&args.filter)?.with_markers(settings.markers.clone());
    let loaded = load_dataset(&args.source, settings)?;
    let table = resolver::resolve(&loaded.store, &loaded.id, args.source.sheet.as_deref())
        .with_context(|| format!("Previewing {}", loaded.source))?;
    let filtered = filter::apply(&table, &spec);
    for diagnostic in &filtered.diagnostics {
        warn!("Filter skipped: {diagnostic}");
    }
    let headers = filtered
        .table
        .column_names()
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    let render_row = |row: &[Option<data::Value>]| {
        row.iter()
            .map(|cell| cell.as_ref().map(|v| v.as_display()).unwrap_or_default())
            .collect::<Vec<_>>()
    };

    if let Some(path) = &args.csv {
        write_csv(path, &headers, filtered.table.rows().iter().map(|r| render_row(r.as_slice())))?;
        info!("Wrote {} row(s) to {path:?}", filtered.table.len());
        return Ok(());
    }
    let rows = filtered
        .table
        .rows()
        .iter()
        .take(args.rows)
        .map(|r| render_row(r.as_slice()))
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!("Displayed {} of {} row(s)", rows.len(), filtered.table.len());
    Ok(())
}

fn write_csv<I>(path: &Path, headers: &[String], rows: I) -> Result<()>
where
    I: Iterator<Item = Vec<String>>,
{
    let mut writer = io_utils::open_csv_writer(Some(path), b',')?;
    writer.write_record(headers).context("Writing CSV header")?;
    for (idx, row) in rows.enumerate() {
        writer
            .write_record(&row)
            .with_context(|| format!("Writing row {}", idx + 1))?;
    }
    writer.flush().context("Flushing CSV output")?;
    Ok(())
}
