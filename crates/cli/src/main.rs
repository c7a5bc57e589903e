// stocktake CLI - reconcile barcode scans against a system inventory extract

mod exit_codes;
mod history;
mod live;
mod output;
mod run;
mod settings;
mod validate;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{EXIT_INPUT_INVALID, EXIT_INVALID_CONFIG, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};
use stocktake_recon::ReconError;

#[derive(Parser)]
#[command(name = "stocktake")]
#[command(about = "Reconcile physical barcode scans against a system inventory extract")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("STOCKTAKE_GIT_HASH"), ")"))]
struct Cli {
    /// Config file (TOML). Defaults to <config dir>/stocktake/config.toml when present.
    #[arg(long, global = true, env = "STOCKTAKE_CONFIG")]
    config: Option<PathBuf>,

    /// History file. Defaults to <config dir>/stocktake/history.json.
    #[arg(long, global = true, env = "STOCKTAKE_HISTORY")]
    history_file: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a scan sheet against a system extract
    #[command(after_help = "\
Examples:
  stocktake run sap.xlsx scans.csv
  stocktake run sap.xlsx scans.csv --json
  stocktake run sap.xlsx scans.csv --csv results.csv --sort urgency
  stocktake run sap.csv scans.csv --material-master materials.xlsx --strict")]
    Run(run::RunArgs),

    /// Check both input files without reconciling
    #[command(after_help = "\
Examples:
  stocktake validate sap.xlsx scans.xlsx")]
    Validate {
        /// System inventory extract (.xlsx, .xls, .csv)
        system: PathBuf,

        /// Scan sheet (.xlsx, .xls, .csv)
        scans: PathBuf,

        /// Output JSON instead of a checklist
        #[arg(long)]
        json: bool,
    },

    /// Reconcile scans one at a time from stdin
    #[command(after_help = "\
Type or pipe one barcode per line. `:good` and `:damage` switch the
condition applied to the following scans; `:stats` prints the counters.

Examples:
  stocktake live sap.xlsx
  cat scans.txt | stocktake live sap.csv --json")]
    Live {
        /// System inventory extract (.xlsx, .xls, .csv)
        system: PathBuf,

        /// Starting condition (good or damage)
        #[arg(long, default_value = "good")]
        condition: stocktake_recon::Condition,

        /// Emit one JSON object per scan
        #[arg(long)]
        json: bool,
    },

    /// Inspect saved runs
    #[command(subcommand)]
    History(history::HistoryCommands),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = Context {
        config: cli.config,
        history_file: cli.history_file,
    };

    let result = match cli.command {
        Commands::Run(args) => run::cmd_run(&ctx, args),
        Commands::Validate { system, scans, json } => validate::cmd_validate(system, scans, json),
        Commands::Live { system, condition, json } => live::cmd_live(&ctx, system, condition, json),
        Commands::History(cmd) => history::cmd_history(&ctx, cmd),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Global options shared by every subcommand.
pub struct Context {
    pub config: Option<PathBuf>,
    pub history_file: Option<PathBuf>,
}

impl Context {
    pub fn history(&self) -> stocktake_io::HistoryStore {
        match &self.history_file {
            Some(path) => stocktake_io::HistoryStore::at(path),
            None => stocktake_io::HistoryStore::open_default(),
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INPUT_INVALID, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INVALID_CONFIG, message: msg.into(), hint: None }
    }

    /// Map an engine error to its exit code.
    pub fn recon(err: ReconError) -> Self {
        match &err {
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => Self::config(err.to_string()),
            ReconError::HeaderNotFound { .. } => Self::input(err.to_string())
                .with_hint("the system extract needs a header row naming the material column"),
            ReconError::EmptyInput { .. } => Self::input(err.to_string()),
            ReconError::Io(_) => Self::io(err.to_string()),
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
