//! `stocktake run` — batch reconciliation of a scan sheet.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use stocktake_recon::config::normalize_plants;
use stocktake_recon::{Cell, ReconSession, ReferenceData, ResultRow};

use crate::exit_codes::EXIT_VARIANCE;
use crate::{output, settings, CliError, Context};

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum SortOrder {
    /// Scan sheet order
    #[default]
    Scan,
    /// Most urgent stock first (damage, expired, near expiry, ...)
    Urgency,
    /// Worst match status first (errors, variance, warnings, ...)
    Status,
}

#[derive(Args)]
pub struct RunArgs {
    /// System inventory extract (.xlsx, .xls, .csv)
    pub system: PathBuf,

    /// Scan sheet (.xlsx, .xls, .csv)
    pub scans: PathBuf,

    /// Material master sheet (material + description) for missing descriptions
    #[arg(long)]
    pub material_master: Option<PathBuf>,

    /// Customer master sheet (code + name) for missing customer names
    #[arg(long)]
    pub customer_master: Option<PathBuf>,

    /// Print the full report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Write the full JSON report to a file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Write result rows to a CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Row order for the table and CSV output
    #[arg(long, value_enum, default_value_t = SortOrder::Scan)]
    pub sort: SortOrder,

    /// Date used for expiry classification (default: today)
    #[arg(long)]
    pub today: Option<NaiveDate>,

    /// Index numeric materials without leading zeros too (overrides config)
    #[arg(long)]
    pub smart_zero: bool,

    /// Preferred plants, comma separated (overrides config)
    #[arg(long)]
    pub plant_priority: Option<String>,

    /// Take quantities from a Qty column in the scan sheet (overrides config)
    #[arg(long)]
    pub scan_qty: bool,

    /// Exit with code 6 when any scanned quantity is in variance
    #[arg(long)]
    pub strict: bool,

    /// Do not record this run in the history file
    #[arg(long)]
    pub no_history: bool,
}

pub fn read_sheet(path: &Path, what: &str) -> Result<Vec<Vec<Cell>>, CliError> {
    if !stocktake_io::is_supported(path) {
        return Err(CliError::args(format!("{what}: unsupported file type {}", path.display()))
            .with_hint("use .xlsx, .xls, .ods, .csv or .tsv"));
    }
    stocktake_io::read_rows(path).map_err(|e| CliError::io(format!("{what}: {e}")))
}

fn load_reference(args: &RunArgs) -> Result<ReferenceData, CliError> {
    let mut reference = ReferenceData::default();
    if let Some(path) = &args.material_master {
        let rows = read_sheet(path, "material master")?;
        reference.load_materials(&rows).map_err(CliError::recon)?;
    }
    if let Some(path) = &args.customer_master {
        let rows = read_sheet(path, "customer master")?;
        reference.load_customers(&rows).map_err(CliError::recon)?;
    }
    Ok(reference)
}

pub fn cmd_run(ctx: &Context, args: RunArgs) -> Result<(), CliError> {
    let mut config = settings::load_config(ctx.config.as_deref())?;
    if args.smart_zero {
        config.matching.smart_zero = true;
    }
    if let Some(plants) = &args.plant_priority {
        config.matching.plant_priority = normalize_plants(plants.split(','));
    }
    if args.scan_qty {
        config.scan.use_scan_qty = true;
    }

    let system_rows = read_sheet(&args.system, "system extract")?;
    let scan_rows = read_sheet(&args.scans, "scan sheet")?;
    if scan_rows.is_empty() {
        return Err(CliError::input(format!("scan sheet {} has no rows", args.scans.display())));
    }
    let reference = load_reference(&args)?;

    let started = Instant::now();
    let mut session = ReconSession::new(config, &system_rows)
        .map_err(CliError::recon)?
        .with_reference(reference);
    let today = args.today.unwrap_or_else(|| chrono::Local::now().date_naive());
    let report = session.run_on(&scan_rows, today);
    let duration_ms = started.elapsed().as_millis() as u64;

    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
    if let Some(path) = &args.output {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::io(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    let mut ordered: Vec<&ResultRow> = match args.sort {
        SortOrder::Scan => report.rows.iter().collect(),
        SortOrder::Urgency => report.rows_by_urgency(),
        SortOrder::Status => report.rows.iter().collect(),
    };
    if let SortOrder::Status = args.sort {
        ordered.sort_by_key(|r| r.status_priority);
    }

    if let Some(path) = &args.csv {
        output::write_csv(&ordered, path)?;
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        println!("{json_str}");
    } else {
        output::print_rows(&ordered, &mut std::io::stdout().lock())
            .map_err(|e| CliError::io(e.to_string()))?;
    }
    output::print_summary(&report, &mut std::io::stderr().lock())
        .map_err(|e| CliError::io(e.to_string()))?;

    if !args.no_history {
        let entry = stocktake_io::HistoryEntry::from_report(&report, &args.system, &args.scans, duration_ms);
        // A history write failure shouldn't fail a finished run
        if let Err(e) = ctx.history().record(entry) {
            log::warn!("could not save history: {e}");
        }
    }

    if args.strict && report.stats.variance > 0.0 {
        return Err(CliError {
            code: EXIT_VARIANCE,
            message: format!("variance found: {} scanned units unmatched", report.stats.variance),
            hint: None,
        });
    }
    Ok(())
}
