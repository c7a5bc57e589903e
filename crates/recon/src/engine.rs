use chrono::NaiveDate;

use crate::allocator::{allocate, AllocationOptions};
use crate::barcode::BarcodeParser;
use crate::classify::classify_stock;
use crate::config::ReconConfig;
use crate::duplicates::find_duplicate_serials;
use crate::error::{ReconError, ScanIssue};
use crate::header::{ScanColumns, SystemColumns};
use crate::index::InventoryIndex;
use crate::live::LiveSession;
use crate::model::{Cell, ReconInput, ReconMeta, ReconReport, ScanRecord, SystemRow};
use crate::reference::ReferenceData;
use crate::report::{aggregate, build_rows, stock_counts, top_variance, RowContext, TOP_VARIANCE};

/// Owns the inventory index for a series of runs over the same system extract.
///
/// Every run starts from zero consumption, so running the same scan sheet
/// twice gives the same report. Consumption from the last run is kept until
/// the next one, for live sessions to continue from.
pub struct ReconSession {
    config: ReconConfig,
    parser: BarcodeParser,
    index: InventoryIndex,
    reference: ReferenceData,
}

impl ReconSession {
    /// Detect the system header, map columns and build the index.
    pub fn new(config: ReconConfig, system_rows: &[Vec<Cell>]) -> Result<Self, ReconError> {
        let columns = SystemColumns::detect(system_rows)?;
        Self::from_system_rows(config, columns.extract(system_rows))
    }

    /// Build from rows that are already column-mapped.
    pub fn from_system_rows(config: ReconConfig, rows: Vec<SystemRow>) -> Result<Self, ReconError> {
        config.validate()?;
        let index = InventoryIndex::build(rows, config.matching.smart_zero);
        Ok(Self {
            parser: BarcodeParser::new(&config.ai),
            config,
            index,
            reference: ReferenceData::default(),
        })
    }

    pub fn with_reference(mut self, reference: ReferenceData) -> Self {
        self.reference = reference;
        self
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    pub fn index(&self) -> &InventoryIndex {
        &self.index
    }

    /// Parse and classify every scan line, collecting per-row issues.
    pub fn prepare_scans(&self, scan_rows: &[Vec<Cell>], today: NaiveDate) -> (Vec<ScanRecord>, Vec<ScanIssue>) {
        let use_scan_qty = self.config.scan.use_scan_qty;
        let columns = ScanColumns::detect(scan_rows, use_scan_qty);

        let mut scans = Vec::new();
        let mut issues = Vec::new();
        for line in columns.lines(scan_rows) {
            let barcode = self.parser.parse(&line.raw);

            if !barcode.is_valid {
                let message = barcode.error.clone().unwrap_or_else(|| "invalid barcode".into());
                issues.push(ScanIssue::error(line.row, message));
            }
            issues.extend(barcode.warnings.iter().map(|w| ScanIssue::warning(line.row, w.clone())));

            let quantity = line
                .quantity
                .filter(|q| use_scan_qty && *q > 0.0)
                .or(barcode.quantity.filter(|q| *q > 0.0))
                .unwrap_or(1.0);
            let stock = classify_stock(&line.condition, barcode.expiry, &self.config.expiry, today);

            scans.push(ScanRecord {
                row: line.row,
                raw: line.raw,
                barcode,
                quantity,
                condition: line.condition,
                description: line.description,
                customer_name: line.customer_name,
                customer_code: line.customer_code,
                stock,
            });
        }
        (scans, issues)
    }

    pub fn run(&mut self, scan_rows: &[Vec<Cell>]) -> ReconReport {
        self.run_on(scan_rows, chrono::Local::now().date_naive())
    }

    /// Run with an explicit "today" for expiry classification.
    pub fn run_on(&mut self, scan_rows: &[Vec<Cell>], today: NaiveDate) -> ReconReport {
        self.index.reset_consumption();

        let duplicates = find_duplicate_serials(&self.index);
        let (scans, issues) = self.prepare_scans(scan_rows, today);

        let options = AllocationOptions::from_config(&self.config.matching);
        let results = allocate(&scans, &mut self.index, &options);

        let stats = aggregate(&scans, &results, &self.index);
        let ctx = RowContext {
            index: &self.index,
            messages: &self.config.messages,
            sloc: &self.config.sloc,
            reference: &self.reference,
        };
        let rows = build_rows(&scans, &results, &ctx);

        log::info!(
            "reconciled {} scans ({} qty): match rate {:.1}%, variance {}",
            scans.len(),
            stats.total_scanned,
            stats.match_rate * 100.0,
            stats.variance
        );

        ReconReport {
            meta: ReconMeta {
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
                run_at: chrono::Utc::now().to_rfc3339(),
                today,
                inventory_keys: self.index.key_count(),
                inventory_records: self.index.len(),
            },
            stock_counts: stock_counts(&rows),
            top_variance: top_variance(&rows, TOP_VARIANCE),
            stats,
            duplicates,
            issues,
            rows,
        }
    }

    /// Start a live session over a copy of the index. Stock consumed by the
    /// last run stays consumed, so live scanning picks up where it ended.
    pub fn live(&self) -> LiveSession {
        self.live_on(chrono::Local::now().date_naive())
    }

    pub fn live_on(&self, today: NaiveDate) -> LiveSession {
        self.live_from(self.index.clone(), today)
    }

    /// Live session over a copy with every record back at full stock.
    pub fn fresh_live_on(&self, today: NaiveDate) -> LiveSession {
        let mut index = self.index.clone();
        index.reset_consumption();
        self.live_from(index, today)
    }

    fn live_from(&self, index: InventoryIndex, today: NaiveDate) -> LiveSession {
        LiveSession::new(
            index,
            self.parser.clone(),
            self.config.expiry,
            self.reference.clone(),
            today,
        )
        .with_smart_zero(self.config.matching.smart_zero)
    }
}

/// One-shot reconciliation of a scan sheet against a system extract.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconReport, ReconError> {
    run_on(config, input, chrono::Local::now().date_naive())
}

pub fn run_on(config: &ReconConfig, input: &ReconInput, today: NaiveDate) -> Result<ReconReport, ReconError> {
    let mut session =
        ReconSession::new(config.clone(), &input.system_rows)?.with_reference(input.reference.clone());
    Ok(session.run_on(&input.scan_rows, today))
}
