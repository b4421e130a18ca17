use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::preprocess::Hub;
use crate::status::{Language, StatusCode};

#[derive(Debug, Parser)]
#[command(author, version, about = "Shipment status reports rendered onto a PDF template", long_about = None)]
pub struct Cli {
    /// YAML configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Access key checked before any shipment data is shown
    #[arg(long = "access-key", env = "SHIPMENT_REPORT_KEY", global = true, hide_env_values = true)]
    pub access_key: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the status vocabulary as selectable options
    Statuses(StatusesArgs),
    /// List the clients (shippers and consignees) of a hub
    Clients(ClientsArgs),
    /// Write the filtered operator table of a hub as CSV for annotation
    Export(ExportArgs),
    /// Render an operator table onto the report template
    Render(RenderArgs),
    /// Load, filter and render a hub in one step
    Report(ReportArgs),
}

#[derive(Debug, Args)]
pub struct StatusesArgs {
    /// Label language
    #[arg(long, value_enum, default_value_t = Language::Es)]
    pub lang: Language,
}

#[derive(Debug, Args)]
pub struct ClientsArgs {
    /// Hub to read (IMPO, EXPO 1 or EXPO 2)
    #[arg(long)]
    pub hub: Hub,
}

/// Row selection shared by `export` and `report`.
#[derive(Debug, Args)]
pub struct SelectionArgs {
    /// Hub to read (IMPO, EXPO 1 or EXPO 2)
    #[arg(long)]
    pub hub: Hub,
    /// Keep rows whose shipper or consignee is this client (repeatable)
    #[arg(long = "client", action = clap::ArgAction::Append)]
    pub clients: Vec<String>,
    /// Keep rows with this status code (repeatable)
    #[arg(long = "status", action = clap::ArgAction::Append)]
    pub statuses: Vec<StatusCode>,
    /// Columns to show, in order (defaults to the standard set)
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Status label language
    #[arg(long, value_enum, default_value_t = Language::Es)]
    pub lang: Language,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
    /// Destination CSV file
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Output options shared by `render` and `report`.
#[derive(Debug, Args)]
pub struct RenderTarget {
    /// Client name printed in the page header
    #[arg(long = "client-name")]
    pub client_name: String,
    /// Template PDF (overrides the configured one)
    #[arg(long)]
    pub template: Option<PathBuf>,
    /// Directory receiving the report (overrides the configured one)
    #[arg(long = "output-dir")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Operator table CSV, as written by `export`
    #[arg(short, long)]
    pub input: PathBuf,
    #[command(flatten)]
    pub target: RenderTarget,
    /// Status label language
    #[arg(long, value_enum, default_value_t = Language::Es)]
    pub lang: Language,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
    #[command(flatten)]
    pub target: RenderTarget,
}
