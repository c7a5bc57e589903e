//! `stocktake history` — list, show and prune saved runs.

use clap::Subcommand;
use stocktake_io::{HistoryEntry, HistoryStore};

use crate::{CliError, Context};

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List saved runs, newest first
    List {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the result rows of one run
    #[command(after_help = "\
The id may be abbreviated to any unique prefix.

Examples:
  stocktake history show 3f2a
  stocktake history show 3f2a --json")]
    Show {
        /// Run id (or unique prefix)
        id: String,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove one run
    Delete {
        /// Run id (or unique prefix)
        id: String,
    },

    /// Remove every saved run
    Clear,
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::io(format!("JSON serialization error: {e}")))
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Unreadable or corrupt history is an IO failure; a bad id is a usage error.
fn ensure_readable(store: &HistoryStore) -> Result<(), CliError> {
    store.list().map(|_| ()).map_err(CliError::io)
}

fn summary_line(entry: &HistoryEntry) -> String {
    format!(
        "{}  {}  {} vs {}  scanned {} matched {} ({:.1}%)  {} ms",
        short_id(&entry.id),
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        entry.scan_file,
        entry.system_file,
        entry.total_scanned,
        entry.matched,
        entry.match_rate * 100.0,
        entry.duration_ms
    )
}

pub fn cmd_history(ctx: &Context, cmd: HistoryCommands) -> Result<(), CliError> {
    let store = ctx.history();
    match cmd {
        HistoryCommands::List { json } => {
            let entries = store.list().map_err(CliError::io)?;
            if json {
                println!("{}", to_json(&entries)?);
            } else if entries.is_empty() {
                eprintln!("no saved runs in {}", store.path().display());
            } else {
                for entry in &entries {
                    println!("{}", summary_line(entry));
                }
            }
        }
        HistoryCommands::Show { id, json } => {
            ensure_readable(&store)?;
            let entry = store
                .get(&id)
                .map_err(CliError::args)?
                .ok_or_else(|| CliError::args(format!("no saved run with id '{id}'")))?;
            if json {
                println!("{}", to_json(&entry)?);
            } else {
                println!("{}", summary_line(&entry));
                for row in &entry.rows {
                    println!(
                        "{:>5}  {:<18}  {:<13}  {:<18}  {:<12}  {:<12}  {}",
                        row.row, row.status, row.tier, row.material, row.batch, row.serial, row.detail
                    );
                }
                if entry.total_rows > entry.rows.len() {
                    println!("... {} more rows not stored", entry.total_rows - entry.rows.len());
                }
            }
        }
        HistoryCommands::Delete { id } => {
            ensure_readable(&store)?;
            if !store.delete(&id).map_err(CliError::args)? {
                return Err(CliError::args(format!("no saved run with id '{id}'")));
            }
            eprintln!("deleted {id}");
        }
        HistoryCommands::Clear => {
            store.clear().map_err(CliError::io)?;
            eprintln!("history cleared");
        }
    }
    Ok(())
}
