//! `stocktake live` — reconcile scans one line at a time from stdin.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use stocktake_recon::live::{LiveEntry, LiveStats};
use stocktake_recon::{Condition, LiveOutcome, ReconSession};

use crate::run::read_sheet;
use crate::{settings, CliError, Context};

fn outcome_label(outcome: &LiveOutcome) -> String {
    match outcome {
        LiveOutcome::Matched { tier } => format!("Matched ({tier})"),
        LiveOutcome::Variance => "Variance".into(),
        LiveOutcome::Duplicate => "Duplicate".into(),
        LiveOutcome::Invalid { reason } => format!("Invalid: {reason}"),
    }
}

fn print_entry(entry: &LiveEntry, json: bool, out: &mut impl Write) -> Result<(), CliError> {
    let line = if json {
        serde_json::to_string(entry).map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?
    } else {
        format!(
            "{}  {:<24} {:<18} {:<12} {:<12} {}/{}  {}",
            entry.timestamp,
            outcome_label(&entry.outcome),
            entry.material,
            entry.batch,
            entry.serial,
            entry.plant,
            entry.sloc,
            entry.description
        )
    };
    writeln!(out, "{line}").map_err(|e| CliError::io(e.to_string()))
}

fn stats_line(stats: LiveStats) -> String {
    format!(
        "total {} | matched {} | variance {} | duplicate {}",
        stats.total, stats.matched, stats.variance, stats.duplicate
    )
}

pub fn cmd_live(ctx: &Context, system: PathBuf, condition: Condition, json: bool) -> Result<(), CliError> {
    let config = settings::load_config(ctx.config.as_deref())?;
    let system_rows = read_sheet(&system, "system extract")?;
    let session = ReconSession::new(config, &system_rows).map_err(CliError::recon)?;

    let mut live = session.live();
    live.set_condition(condition);
    eprintln!(
        "live session over {} records, condition {}; one barcode per line, :good / :damage / :stats",
        live.index().len(),
        live.condition()
    );

    let stdin = std::io::stdin();
    let mut out = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| CliError::io(format!("cannot read stdin: {e}")))?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix(':') {
            match command.to_ascii_lowercase().as_str() {
                "stats" => eprintln!("{}", stats_line(live.stats())),
                other => match other.parse::<Condition>() {
                    Ok(c) => {
                        live.set_condition(c);
                        eprintln!("condition: {c}");
                    }
                    Err(e) => eprintln!("warning: {e}"),
                },
            }
            continue;
        }

        let entry = live.scan(input);
        print_entry(entry, json, &mut out)?;
    }

    eprintln!("{}", stats_line(live.stats()));
    Ok(())
}
