//! Folding allocation results into result rows and totals.

use std::collections::BTreeMap;

use crate::config::{MessageConfig, SlocConfig};
use crate::index::InventoryIndex;
use crate::model::{
    format_number, AggregateStats, InventoryRecord, MatchResult, MatchTier, ResultRow, RowStatus,
    ScanRecord, StockCounts, StockStatus, VarianceMaterial,
};
use crate::reference::ReferenceData;

/// Number of materials listed in the variance summary.
pub const TOP_VARIANCE: usize = 3;

/// Quantity totals for one run. Variance counts every shortfall, including
/// invalid scans and scans that matched nothing.
pub fn aggregate(scans: &[ScanRecord], results: &[MatchResult], index: &InventoryIndex) -> AggregateStats {
    let mut stats = AggregateStats {
        total_scanned: scans.iter().map(|s| s.quantity).sum(),
        system_initial: index.total_quantity(),
        ..AggregateStats::default()
    };

    for result in results {
        match result.tier {
            MatchTier::Exact | MatchTier::Concat => stats.serial_level += result.consumed,
            MatchTier::BatchMatch => stats.batch_level += result.consumed,
            MatchTier::MaterialOnly => stats.material_level += result.consumed,
            MatchTier::None => {}
        }
        stats.variance += result.shortfall;
    }

    stats.system_remaining = stats.system_initial - index.total_consumed();
    stats.match_rate = if stats.total_scanned > 0.0 {
        stats.matched() / stats.total_scanned
    } else {
        0.0
    };
    stats
}

/// Status for an allocation outcome.
pub fn row_status(scan: &ScanRecord, result: &MatchResult) -> RowStatus {
    if !scan.is_valid() {
        return RowStatus::Error;
    }
    match result.tier {
        MatchTier::None => RowStatus::Variance,
        _ if result.shortfall > 0.0 => RowStatus::VariancePartial,
        MatchTier::Exact | MatchTier::Concat => RowStatus::Matched,
        MatchTier::BatchMatch => RowStatus::Partial,
        MatchTier::MaterialOnly => RowStatus::Warning,
    }
}

fn tier_message(tier: MatchTier, messages: &MessageConfig) -> &str {
    match tier {
        MatchTier::Exact | MatchTier::Concat => &messages.matched,
        MatchTier::BatchMatch => &messages.batch,
        MatchTier::MaterialOnly => &messages.material,
        MatchTier::None => &messages.variance,
    }
}

fn or_dash(value: &str) -> String {
    if value.is_empty() { "-".into() } else { value.to_string() }
}

fn first_non_empty<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

pub struct RowContext<'a> {
    pub index: &'a InventoryIndex,
    pub messages: &'a MessageConfig,
    pub sloc: &'a SlocConfig,
    pub reference: &'a ReferenceData,
}

/// One row per scan, in scan order.
pub fn build_rows(scans: &[ScanRecord], results: &[MatchResult], ctx: &RowContext<'_>) -> Vec<ResultRow> {
    results.iter().map(|result| build_row(&scans[result.scan], result, ctx)).collect()
}

fn build_row(scan: &ScanRecord, result: &MatchResult, ctx: &RowContext<'_>) -> ResultRow {
    let status = row_status(scan, result);
    let record: Option<&InventoryRecord> = match status {
        RowStatus::Error | RowStatus::Variance => None,
        _ => result.record.map(|id| ctx.index.record(id)),
    };
    let b = &scan.barcode;

    let detail = match status {
        RowStatus::Error => b.error.clone().unwrap_or_else(|| "Invalid barcode".into()),
        RowStatus::VariancePartial => format!(
            "{} | Stock Exhausted. Matched: {}, Variance: {}",
            ctx.messages.variance,
            format_number(result.consumed),
            format_number(result.shortfall)
        ),
        _ => tier_message(result.tier, ctx.messages).to_string(),
    };

    let description = first_non_empty([
        record.map(|r| r.description.as_str()),
        Some(scan.description.as_str()),
        ctx.reference.description(&b.material),
    ]);
    let customer_code = first_non_empty([
        Some(scan.customer_code.as_str()),
        record.map(|r| r.customer_code.as_str()),
    ]);
    let customer_name = first_non_empty([
        record.map(|r| r.customer_name.as_str()),
        Some(scan.customer_name.as_str()),
        ctx.reference.customer_name(&customer_code),
    ]);

    let assigned_sloc = if ctx.sloc.auto {
        if scan.stock.status == StockStatus::GoodStock {
            ctx.sloc.good.clone()
        } else {
            ctx.sloc.damage.clone()
        }
    } else {
        record.map(|r| or_dash(&r.sloc)).unwrap_or_default()
    };

    ResultRow {
        row: scan.row,
        raw: scan.raw.clone(),
        status,
        status_priority: status.priority(),
        tier: result.tier,
        detail,
        material: if b.material.is_empty() { "???".into() } else { b.material.clone() },
        description,
        customer_name,
        customer_code,
        scan_batch: b.batch.clone(),
        scan_serial: b.serial.clone(),
        is_default_serial: b.is_default_serial,
        system_batch: system_field(record, |r| r.batch.as_str()),
        system_serial: system_field(record, |r| r.serial.as_str()),
        system_plant: system_field(record, |r| r.plant.as_str()),
        system_sloc: system_field(record, |r| r.sloc.as_str()),
        system_expiry: system_field(record, |r| r.expiry.as_str()),
        system_age: system_field(record, |r| r.age.as_str()),
        billing_doc: system_field(record, |r| r.billing_doc.as_str()),
        billing_date: system_field(record, |r| r.billing_date.as_str()),
        assigned_sloc,
        condition: scan.condition.clone(),
        expiry: b.expiry,
        stock: scan.stock,
        requested: result.requested,
        consumed: result.consumed,
        shortfall: result.shortfall,
    }
}

fn system_field(record: Option<&InventoryRecord>, field: impl Fn(&InventoryRecord) -> &str) -> String {
    record.map(|r| or_dash(field(r))).unwrap_or_else(|| "-".into())
}

pub fn stock_counts(rows: &[ResultRow]) -> StockCounts {
    let mut counts = StockCounts::default();
    for row in rows {
        let slot = match row.stock.status {
            StockStatus::Damage => &mut counts.damage,
            StockStatus::Expired => &mut counts.expired,
            StockStatus::NearExpiry => &mut counts.near_expiry,
            StockStatus::ShortExpiry => &mut counts.short_expiry,
            StockStatus::GoodStock => &mut counts.good_stock,
            StockStatus::NoExpiry => &mut counts.no_expiry,
        };
        *slot += 1;
    }
    counts
}

/// Materials with the most Variance/Error rows. Ties go to the smaller
/// material code.
pub fn top_variance(rows: &[ResultRow], limit: usize) -> Vec<VarianceMaterial> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.status.is_variance()) {
        *counts.entry(row.material.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<VarianceMaterial> = counts
        .into_iter()
        .map(|(material, rows)| VarianceMaterial { material: material.to_string(), rows })
        .collect();
    // BTreeMap order is already by material, so a stable sort keeps ties there.
    ranked.sort_by(|a, b| b.rows.cmp(&a.rows));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{allocate, AllocationOptions};
    use crate::barcode::BarcodeParser;
    use crate::model::{StockAssessment, SystemRow};

    fn sys(mat: &str, batch: &str, ser: &str, qty: f64) -> SystemRow {
        SystemRow {
            material: mat.into(),
            batch: batch.into(),
            serial: ser.into(),
            quantity: Some(qty),
            plant: "P1".into(),
            sloc: "A001".into(),
            description: "SYSTEM DESC".into(),
            ..SystemRow::default()
        }
    }

    fn scan(row: usize, raw: &str, qty: f64, status: StockStatus) -> ScanRecord {
        ScanRecord {
            row,
            raw: raw.into(),
            barcode: BarcodeParser::default().parse(raw),
            quantity: qty,
            condition: String::new(),
            description: String::new(),
            customer_name: String::new(),
            customer_code: String::new(),
            stock: StockAssessment { status, priority: status.priority(), days_left: None },
        }
    }

    fn run(
        rows: Vec<SystemRow>,
        scans: &[ScanRecord],
        sloc: &SlocConfig,
        reference: &ReferenceData,
    ) -> (AggregateStats, Vec<ResultRow>) {
        let mut index = InventoryIndex::build(rows, false);
        let results = allocate(scans, &mut index, &AllocationOptions::first_available());
        let stats = aggregate(scans, &results, &index);
        let messages = MessageConfig::default();
        let ctx = RowContext { index: &index, messages: &messages, sloc, reference };
        (stats, build_rows(scans, &results, &ctx))
    }

    #[test]
    fn statuses_and_totals() {
        let scans = vec![
            scan(1, "(240)100(10)B1(21)S1", 1.0, StockStatus::GoodStock),
            scan(2, "(240)100(10)B1(21)S9", 1.0, StockStatus::GoodStock),
            scan(3, "(240)100(10)B7(21)S9", 1.0, StockStatus::NoExpiry),
            scan(4, "(240)999", 2.0, StockStatus::NoExpiry),
            scan(5, "ab", 1.0, StockStatus::NoExpiry),
        ];
        let (stats, rows) = run(
            vec![sys("100", "B1", "S1", 5.0)],
            &scans,
            &SlocConfig::default(),
            &ReferenceData::default(),
        );

        let statuses: Vec<RowStatus> = rows.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                RowStatus::Matched,
                RowStatus::Partial,
                RowStatus::Warning,
                RowStatus::Variance,
                RowStatus::Error
            ]
        );
        assert_eq!(rows[0].detail, "Serial verified");
        assert_eq!(rows[3].detail, "Not found in system");
        assert_eq!(rows[4].detail, "unparseable");
        assert_eq!(rows[4].status_priority, -1);

        assert_eq!(stats.total_scanned, 6.0);
        assert_eq!(stats.serial_level, 1.0);
        assert_eq!(stats.batch_level, 1.0);
        assert_eq!(stats.material_level, 1.0);
        assert_eq!(stats.variance, 3.0);
        assert_eq!(stats.system_initial, 5.0);
        assert_eq!(stats.system_remaining, 2.0);
        assert!((stats.match_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn partial_detail_and_system_fields() {
        let scans = vec![scan(1, "(240)100(10)B1(21)S1", 5.0, StockStatus::GoodStock)];
        let (stats, rows) = run(
            vec![sys("100", "B1", "S1", 2.0)],
            &scans,
            &SlocConfig::default(),
            &ReferenceData::default(),
        );
        let row = &rows[0];
        assert_eq!(row.status, RowStatus::VariancePartial);
        assert_eq!(row.status_priority, 4);
        assert_eq!(row.tier, MatchTier::Exact);
        assert_eq!(row.detail, "Not found in system | Stock Exhausted. Matched: 2, Variance: 3");
        assert_eq!(row.system_plant, "P1");
        assert_eq!(row.system_expiry, "-");
        assert_eq!(row.description, "SYSTEM DESC");
        assert_eq!(stats.variance, 3.0);
        assert_eq!(stats.serial_level, 2.0);
    }

    #[test]
    fn assigned_sloc() {
        let scans = vec![
            scan(1, "(240)100(10)B1(21)S1", 1.0, StockStatus::GoodStock),
            scan(2, "(240)100(10)B1(21)S1", 1.0, StockStatus::Damage),
            scan(3, "(240)555", 1.0, StockStatus::GoodStock),
        ];
        let rows_data = || vec![sys("100", "B1", "S1", 5.0)];

        let (_, rows) = run(rows_data(), &scans, &SlocConfig::default(), &ReferenceData::default());
        let slocs: Vec<&str> = rows.iter().map(|r| r.assigned_sloc.as_str()).collect();
        assert_eq!(slocs, vec!["RT01", "DMG1", "RT01"]);

        let manual = SlocConfig { auto: false, ..SlocConfig::default() };
        let (_, rows) = run(rows_data(), &scans, &manual, &ReferenceData::default());
        let slocs: Vec<&str> = rows.iter().map(|r| r.assigned_sloc.as_str()).collect();
        assert_eq!(slocs, vec!["A001", "A001", ""]);
    }

    #[test]
    fn description_and_customer_fallbacks() {
        let mut reference = ReferenceData::default();
        reference.descriptions.insert("555".into(), "Master widget".into());
        reference.customers.insert("77".into(), "Acme".into());

        let mut unknown = scan(1, "(240)555", 1.0, StockStatus::NoExpiry);
        unknown.customer_code = "0077".into();
        let mut labelled = scan(2, "(240)556", 1.0, StockStatus::NoExpiry);
        labelled.description = "FROM SHEET".into();

        let (_, rows) = run(vec![], &[unknown, labelled], &SlocConfig::default(), &reference);
        assert_eq!(rows[0].description, "Master widget");
        assert_eq!(rows[0].customer_code, "0077");
        assert_eq!(rows[0].customer_name, "Acme");
        assert_eq!(rows[1].description, "FROM SHEET");
        assert_eq!(rows[1].customer_name, "");
    }

    #[test]
    fn counts_and_top_variance() {
        let scans = vec![
            scan(1, "(240)B", 1.0, StockStatus::Damage),
            scan(2, "(240)A", 1.0, StockStatus::Expired),
            scan(3, "(240)C", 1.0, StockStatus::Damage),
            scan(4, "(240)C", 1.0, StockStatus::GoodStock),
            scan(5, "(240)D", 1.0, StockStatus::GoodStock),
            scan(6, "(240)B", 1.0, StockStatus::NoExpiry),
        ];
        let (_, rows) = run(vec![], &scans, &SlocConfig::default(), &ReferenceData::default());

        let counts = stock_counts(&rows);
        assert_eq!(counts.damage, 2);
        assert_eq!(counts.expired, 1);
        assert_eq!(counts.good_stock, 2);
        assert_eq!(counts.no_expiry, 1);

        let top = top_variance(&rows, TOP_VARIANCE);
        let names: Vec<(&str, usize)> = top.iter().map(|v| (v.material.as_str(), v.rows)).collect();
        assert_eq!(names, vec![("B", 2), ("C", 2), ("A", 1)]);
    }

    #[test]
    fn empty_run_has_zero_match_rate() {
        let (stats, rows) = run(vec![], &[], &SlocConfig::default(), &ReferenceData::default());
        assert!(rows.is_empty());
        assert_eq!(stats.match_rate, 0.0);
    }
}
