pub mod auth;
mod canvas;
pub mod cli;
pub mod columns;
pub mod config;
mod doc_template;
mod error;
pub mod filter;
pub mod finalize;
mod flowable;
mod font;
mod frame;
pub mod inspect;
mod page_template;
mod pdf;
pub mod preprocess;
pub mod report;
pub mod source;
pub mod status;
pub mod table;
mod types;

pub use canvas::{Canvas, Command, Document, Page};
pub use doc_template::DocTemplate;
pub use error::{ReportError, Result as ReportResult};
pub use flowable::{
    EdgeSizes, Flowable, TableCell, TableFlowable, TableRule, TextAlign, TextStyle, VerticalAlign,
};
pub use font::FontRegistry;
pub use frame::{AddResult, Frame};
pub use page_template::{DocContext, OnPageCallback, PageTemplate};
pub use pdf::{PdfOptions, document_to_pdf};
pub use types::{Color, Margins, Pt, Rect, Size};

use std::path::Path;
use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::auth::gate_for;
use crate::cli::{Cli, Commands, RenderTarget, SelectionArgs};
use crate::config::ReportConfig;
use crate::filter::{TableFilter, client_options};
use crate::preprocess::{Hub, preprocess};
use crate::report::{ReportFonts, ReportLayout, finalize_for_render, prepare_operator_view, render_report};
use crate::source::{CachedSource, CsvSheetSource, TableSource, read_table_csv, write_table_csv};
use crate::status::{Language, StatusCode};
use crate::table::Table;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("shipment_report", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = ReportConfig::load(cli.config.as_deref())
        .with_context(|| format!("Loading configuration from {:?}", cli.config))?;

    if let Commands::Statuses(args) = &cli.command {
        handle_statuses(args.lang);
        return Ok(());
    }

    gate_for(config.access_key.as_deref(), cli.access_key.clone())
        .check()
        .context("Checking access key")?;

    match &cli.command {
        Commands::Statuses(_) => Ok(()),
        Commands::Clients(args) => handle_clients(&config, args.hub),
        Commands::Export(args) => handle_export(&config, &args.selection, &args.output),
        Commands::Render(args) => handle_render(&config, &args.input, &args.target, args.lang),
        Commands::Report(args) => handle_report(&config, &args.selection, &args.target),
    }
}

fn handle_statuses(lang: Language) {
    for code in StatusCode::ALL {
        println!("{}", code.option_label(lang));
    }
}

fn sheet_source(config: &ReportConfig) -> CachedSource<CsvSheetSource> {
    CachedSource::new(
        CsvSheetSource::new(config.source_paths(), config.delimiter_byte()),
        config.cache_ttl(),
    )
}

fn load_hub(config: &ReportConfig, hub: Hub) -> Result<Table> {
    let raw = sheet_source(config)
        .load(hub)
        .with_context(|| format!("Loading shipments for hub {hub}"))?;
    Ok(preprocess(&raw, hub))
}

fn handle_clients(config: &ReportConfig, hub: Hub) -> Result<()> {
    let table = load_hub(config, hub)?;
    for client in client_options(&table) {
        println!("{client}");
    }
    Ok(())
}

/// Loads, preprocesses and filters a hub, then builds the operator view.
fn operator_view(config: &ReportConfig, selection: &SelectionArgs) -> Result<Table> {
    let table = load_hub(config, selection.hub)?;
    let filter = TableFilter::new(selection.clients.iter().cloned(), selection.statuses.iter().copied());
    let filtered = filter.apply(&table);
    info!(
        "{} of {} row(s) selected for hub {}",
        filtered.len(),
        table.len(),
        selection.hub
    );

    let columns = if selection.columns.is_empty() {
        columns::default_selection(&filtered)
    } else {
        let requested: Vec<String> = selection
            .columns
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        for missing in requested.iter().filter(|c| !filtered.has_column(c)) {
            if missing != columns::COMMENTS {
                warn!("column '{missing}' is not in the {} sheet", selection.hub);
            }
        }
        requested
    };
    debug!("operator columns: {:?}", columns);
    Ok(prepare_operator_view(&filtered, &columns, selection.lang))
}

fn handle_export(config: &ReportConfig, selection: &SelectionArgs, output: &Path) -> Result<()> {
    let view = operator_view(config, selection)?;
    write_table_csv(&view, output, config.delimiter_byte())
        .with_context(|| format!("Writing operator table to {output:?}"))?;
    info!("{} row(s) written to {:?}", view.len(), output);
    println!("{}", output.display());
    Ok(())
}

fn handle_render(config: &ReportConfig, input: &Path, target: &RenderTarget, lang: Language) -> Result<()> {
    let table = read_table_csv(input, config.delimiter_byte())
        .with_context(|| format!("Reading operator table from {input:?}"))?;
    render_and_write(config, &table, target, lang)
}

fn handle_report(config: &ReportConfig, selection: &SelectionArgs, target: &RenderTarget) -> Result<()> {
    let view = operator_view(config, selection)?;
    render_and_write(config, &view, target, selection.lang)
}

fn render_and_write(config: &ReportConfig, table: &Table, target: &RenderTarget, lang: Language) -> Result<()> {
    let template = target.template.as_ref().unwrap_or(&config.template);
    let output_dir = target.output_dir.as_ref().unwrap_or(&config.output_dir);

    let fonts = ReportFonts::load(&config.fonts.regular, &config.fonts.bold)
        .context("Loading report fonts")?;
    let table = finalize_for_render(table, lang);
    let date = chrono::Local::now().date_naive();
    let bytes = render_report(
        &table,
        &target.client_name,
        lang,
        template,
        &ReportLayout::default(),
        &fonts,
        date,
    )
    .with_context(|| format!("Rendering report onto {template:?}"))?;
    let path = finalize::write_report(output_dir, &bytes)
        .with_context(|| format!("Writing report into {output_dir:?}"))?;
    info!("report written to {:?} ({} bytes)", path, bytes.len());
    println!("{}", path.display());
    Ok(())
}
