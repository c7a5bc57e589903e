//! `stocktake validate` — pre-flight checks on both input files.

use std::path::{Path, PathBuf};

use serde::Serialize;
use stocktake_recon::header::SystemColumns;

use crate::CliError;

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    passed: bool,
    message: String,
}

impl Check {
    fn pass(name: &'static str, message: impl Into<String>) -> Self {
        Self { name, passed: true, message: message.into() }
    }

    fn fail(name: &'static str, message: impl Into<String>) -> Self {
        Self { name, passed: false, message: message.into() }
    }
}

fn check_extension(name: &'static str, path: &Path) -> Check {
    if stocktake_io::is_supported(path) {
        Check::pass(name, format!("{} is a supported sheet", path.display()))
    } else {
        Check::fail(name, format!("{} is not .xlsx, .xls, .ods, .csv or .tsv", path.display()))
    }
}

fn check_system(path: &Path) -> Check {
    const NAME: &str = "system_header";
    let rows = match stocktake_io::read_rows(path) {
        Ok(rows) => rows,
        Err(e) => return Check::fail(NAME, e),
    };
    let columns = match SystemColumns::detect(&rows) {
        Ok(columns) => columns,
        Err(e) => return Check::fail(NAME, e.to_string()),
    };

    let mut missing = Vec::new();
    if columns.batch.is_none() {
        missing.push("batch");
    }
    if columns.serial.is_none() {
        missing.push("serial");
    }
    if missing.is_empty() {
        Check::pass(
            NAME,
            format!(
                "header on row {}, {} data rows",
                columns.header_row + 1,
                columns.extract(&rows).len()
            ),
        )
    } else {
        Check::fail(
            NAME,
            format!("header on row {} has no {} column", columns.header_row + 1, missing.join(" or ")),
        )
    }
}

fn check_scans(path: &Path) -> Check {
    const NAME: &str = "scan_rows";
    match stocktake_io::read_rows(path) {
        Ok(rows) if rows.iter().any(|r| r.iter().any(|c| !c.is_empty())) => {
            Check::pass(NAME, format!("{} rows", rows.len()))
        }
        Ok(_) => Check::fail(NAME, "scan sheet is empty"),
        Err(e) => Check::fail(NAME, e),
    }
}

pub fn cmd_validate(system: PathBuf, scans: PathBuf, json: bool) -> Result<(), CliError> {
    let mut checks = vec![
        check_extension("system_file_type", &system),
        check_extension("scan_file_type", &scans),
    ];
    // Content checks only make sense for files we can read
    if checks[0].passed {
        checks.push(check_system(&system));
    }
    if checks[1].passed {
        checks.push(check_scans(&scans));
    }

    let failed = checks.iter().filter(|c| !c.passed).count();
    if json {
        let out = serde_json::json!({
            "valid": failed == 0,
            "checks": checks,
        });
        let text = serde_json::to_string_pretty(&out)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{text}");
    } else {
        for check in &checks {
            let mark = if check.passed { "ok  " } else { "FAIL" };
            println!("{mark}  {:<18} {}", check.name, check.message);
        }
    }

    if failed > 0 {
        return Err(CliError::input(format!("{failed} check(s) failed")));
    }
    Ok(())
}
