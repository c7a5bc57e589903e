//! Human summary and CSV export of a report.

use std::io::Write;
use std::path::Path;

use stocktake_recon::model::format_number as num;
use stocktake_recon::{ReconReport, ResultRow};

use crate::CliError;

const CSV_HEADER: &[&str] = &[
    "row",
    "status",
    "match",
    "detail",
    "material",
    "description",
    "customer",
    "customer_code",
    "scan_batch",
    "scan_serial",
    "system_batch",
    "system_serial",
    "plant",
    "system_sloc",
    "assigned_sloc",
    "expiry",
    "ageing",
    "billing_doc",
    "billing_date",
    "condition",
    "stock_status",
    "days_left",
    "requested",
    "consumed",
    "shortfall",
    "raw",
];

fn csv_record(row: &ResultRow) -> Vec<String> {
    vec![
        row.row.to_string(),
        row.status.to_string(),
        row.tier.to_string(),
        row.detail.clone(),
        row.material.clone(),
        row.description.clone(),
        row.customer_name.clone(),
        row.customer_code.clone(),
        row.scan_batch.clone(),
        row.scan_serial.clone(),
        row.system_batch.clone(),
        row.system_serial.clone(),
        row.system_plant.clone(),
        row.system_sloc.clone(),
        row.assigned_sloc.clone(),
        row.expiry.map(|d| d.to_string()).unwrap_or_else(|| row.system_expiry.clone()),
        row.system_age.clone(),
        row.billing_doc.clone(),
        row.billing_date.clone(),
        row.condition.clone(),
        row.stock.status.to_string(),
        row.stock.days_left.map(|d| d.to_string()).unwrap_or_default(),
        num(row.requested),
        num(row.consumed),
        num(row.shortfall),
        row.raw.clone(),
    ]
}

pub fn write_csv(rows: &[&ResultRow], path: &Path) -> Result<(), CliError> {
    let mut writer = csv::WriterBuilder::new()
        .from_path(path)
        .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;

    writer.write_record(CSV_HEADER).map_err(|e| CliError::io(e.to_string()))?;
    for row in rows {
        writer.write_record(csv_record(row)).map_err(|e| CliError::io(e.to_string()))?;
    }
    writer.flush().map_err(|e| CliError::io(e.to_string()))?;
    Ok(())
}

/// Summary on stderr, so stdout stays clean for `--json`.
pub fn print_summary(report: &ReconReport, out: &mut impl Write) -> std::io::Result<()> {
    let s = &report.stats;
    writeln!(
        out,
        "scanned {} | serial {} | batch {} | material {} | variance {} | match rate {:.1}%",
        num(s.total_scanned),
        num(s.serial_level),
        num(s.batch_level),
        num(s.material_level),
        num(s.variance),
        s.match_rate * 100.0
    )?;
    writeln!(
        out,
        "system qty {} -> remaining {} ({} records)",
        num(s.system_initial),
        num(s.system_remaining),
        report.meta.inventory_records
    )?;

    let c = &report.stock_counts;
    writeln!(
        out,
        "stock: {} damage, {} expired, {} near expiry, {} short expiry, {} good, {} no expiry",
        c.damage, c.expired, c.near_expiry, c.short_expiry, c.good_stock, c.no_expiry
    )?;

    if !report.top_variance.is_empty() {
        let top: Vec<String> = report
            .top_variance
            .iter()
            .map(|v| format!("{} ({})", v.material, v.rows))
            .collect();
        writeln!(out, "top variance: {}", top.join(", "))?;
    }

    for dup in &report.duplicates {
        writeln!(
            out,
            "warning: serial {} / batch {} / material {} appears {} times in system data",
            dup.serial, dup.batch, dup.material, dup.count
        )?;
    }
    for issue in &report.issues {
        writeln!(out, "{issue}")?;
    }
    Ok(())
}

/// Aligned table of result rows on stdout.
pub fn print_rows(rows: &[&ResultRow], out: &mut impl Write) -> std::io::Result<()> {
    writeln!(
        out,
        "{:>5}  {:<18}  {:<13}  {:<18}  {:<12}  {:<12}  {:<12}  {}",
        "ROW", "STATUS", "MATCH", "MATERIAL", "BATCH", "SERIAL", "STOCK", "DETAIL"
    )?;
    for row in rows {
        writeln!(
            out,
            "{:>5}  {:<18}  {:<13}  {:<18}  {:<12}  {:<12}  {:<12}  {}",
            row.row,
            row.status.to_string(),
            row.tier.to_string(),
            row.material,
            row.scan_batch,
            row.scan_serial,
            row.stock.status.to_string(),
            row.detail
        )?;
    }
    Ok(())
}
