//! ibintra CLI — download hourly bars from the local gateway into CSV files.
//!
//! Commands:
//! - `recent` — one most-recent window per symbol
//! - `historical` — ten fixed windows per symbol reaching back to 2006
//! - `plan` — print the windows and filenames a download would produce
//! - `catalog` — print the built-in instrument catalog as TOML

mod obs;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ibintra_core::{
    download_historical, download_recent, plan_historical, plan_recent, AppConfig, Catalog,
    DownloadOptions, GatewaySession, InstrumentClass, RequestDescriptor, RunReport, SymbolInfo,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ibintra",
    about = "ibintra — hourly bar downloads from the brokerage gateway to CSV"
)]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// TOML catalog file. Defaults to the built-in catalog.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the most recent N days for every symbol of a class.
    Recent {
        /// Instrument class: forex, cfd, index, cont_futures.
        #[arg(long)]
        class: InstrumentClass,

        /// Days to download (0-360). Defaults to the configured value.
        #[arg(long)]
        days: Option<i64>,

        /// Restrict to these symbols (e.g., EURUSD GBPUSD).
        #[arg(long, num_args = 1..)]
        symbols: Vec<String>,

        /// Output directory. Defaults to the configured recent_dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Put today's date in the filenames.
        #[arg(long, default_value_t = false)]
        start_date_marker: bool,
    },
    /// Download the full fixed-checkpoint history for every symbol of a class.
    Historical {
        /// Instrument class: forex, cfd, index, cont_futures.
        #[arg(long)]
        class: InstrumentClass,

        /// Restrict to these symbols.
        #[arg(long, num_args = 1..)]
        symbols: Vec<String>,

        /// Output directory. Defaults to the configured historical_dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the download plan without contacting the gateway.
    Plan {
        /// Instrument class: forex, cfd, index, cont_futures.
        #[arg(long)]
        class: InstrumentClass,

        /// Plan a most-recent window of this many days.
        #[arg(long, conflicts_with = "historical")]
        days: Option<i64>,

        /// Plan the fixed-checkpoint history instead.
        #[arg(long, default_value_t = false)]
        historical: bool,

        /// Restrict to these symbols.
        #[arg(long, num_args = 1..)]
        symbols: Vec<String>,
    },
    /// Print the built-in instrument catalog as TOML.
    Catalog,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Catalog => {
            print!("{}", Catalog::default_catalog().to_toml()?);
            Ok(())
        }
        Commands::Plan {
            class,
            days,
            historical,
            symbols,
        } => {
            let catalog = load_catalog(cli.catalog.as_ref())?;
            let days = days.unwrap_or(config.download.recent_days);
            run_plan_cmd(&catalog, class, days, historical, &symbols)
        }
        Commands::Recent {
            class,
            days,
            symbols,
            output_dir,
            start_date_marker,
        } => {
            init_logging(&config)?;
            let catalog = load_catalog(cli.catalog.as_ref())?;
            let days = days.unwrap_or(config.download.recent_days);
            let mut options =
                DownloadOptions::new(output_dir.unwrap_or(config.download.recent_dir.clone()));
            if start_date_marker || config.download.start_date_marker {
                options = options.with_start_marker(chrono::Local::now().date_naive());
            }
            let selected = catalog.select(class, &symbols)?;
            run_download(&config, class, &selected, |session| {
                download_recent(session, &selected, class, days, &options)
            })
        }
        Commands::Historical {
            class,
            symbols,
            output_dir,
        } => {
            init_logging(&config)?;
            let catalog = load_catalog(cli.catalog.as_ref())?;
            let options =
                DownloadOptions::new(output_dir.unwrap_or(config.download.historical_dir.clone()));
            let selected = catalog.select(class, &symbols)?;
            run_download(&config, class, &selected, |session| {
                download_historical(session, &selected, class, &options)
            })
        }
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    obs::init_logging(&config.logging.level, config.logging.file.as_deref())
}

fn load_catalog(path: Option<&PathBuf>) -> Result<Catalog> {
    match path {
        Some(path) => Catalog::from_file(path)
            .with_context(|| format!("load catalog {}", path.display())),
        None => Ok(Catalog::default_catalog()),
    }
}

/// Open a gateway session, run the download, print the summary.
///
/// The session logs out when it goes out of scope, whichever way the run ends.
fn run_download<F>(
    config: &AppConfig,
    class: InstrumentClass,
    symbols: &[SymbolInfo],
    download: F,
) -> Result<()>
where
    F: FnOnce(&GatewaySession) -> Result<RunReport, ibintra_core::DownloadError>,
{
    if symbols.is_empty() {
        bail!("no {class} symbols to download");
    }

    tracing::info!(
        class = %class,
        symbols = symbols.len(),
        gateway = %config.gateway.base_url(),
        "starting download"
    );

    let report = {
        let session = GatewaySession::connect(&config.gateway)
            .context("connect to the gateway (is it running and logged in?)")?;
        download(&session)?
    };

    print_summary(&report);

    if !report.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_plan_cmd(
    catalog: &Catalog,
    class: InstrumentClass,
    days: i64,
    historical: bool,
    symbols: &[String],
) -> Result<()> {
    let selected = catalog.select(class, symbols)?;
    let mut plan: Vec<RequestDescriptor> = Vec::new();
    for info in &selected {
        if historical {
            plan.extend(plan_historical(info, class));
        } else {
            plan.extend(plan_recent(info, class, days)?);
        }
    }

    println!(
        "{:<10} {:<20} {:<8} {:<8} {:<9} File",
        "Symbol", "End", "Duration", "Bar", "Field"
    );
    println!("{}", "-".repeat(90));
    for request in &plan {
        println!(
            "{:<10} {:<20} {:<8} {:<8} {:<9} {}",
            request.symbol(),
            request.end_timestamp().unwrap_or("(most recent)"),
            request.duration(),
            request.bar_size(),
            request.field_selector(),
            request.csv_filename(None)
        );
    }
    println!();
    println!("{} window(s) for {} symbol(s)", plan.len(), selected.len());
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!();
    println!("=== Download Summary ===");
    println!("Windows:        {}", report.total());
    println!("Written:        {}", report.succeeded());
    println!("Failed:         {}", report.failed());

    let rows: usize = report
        .outcomes
        .iter()
        .map(|o| match o {
            ibintra_core::WindowOutcome::Written { rows, .. } => *rows,
            ibintra_core::WindowOutcome::Failed { .. } => 0,
        })
        .sum();
    println!("Rows:           {rows}");

    if !report.all_succeeded() {
        println!();
        println!("--- Failed windows ---");
        for (file, error) in report.failures() {
            println!("  {file}: {error}");
        }
    }
}
