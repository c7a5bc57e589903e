use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{ReconError, ScanIssue};
use crate::reference::ReferenceData;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single cell from an imported sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Cell rendered as text. Whole numbers drop the trailing `.0` so that a
    /// material stored as a number (`100`) reads the same as one stored as text.
    pub fn as_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_number(*n),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Empty => None,
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Number(_) => None,
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s)
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// Whole numbers without a decimal point, everything else as `f64` prints.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Trim + uppercase. Every key segment and stored field goes through this.
pub fn clean(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Parse CSV text into raw rows. No header handling: header detection runs
/// on the rows afterwards.
pub fn rows_from_csv(text: &str) -> Result<Vec<Vec<Cell>>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Io(format!("CSV parse error: {e}")))?;
        rows.push(record.iter().map(Cell::from).collect());
    }
    Ok(rows)
}

/// Both sheets plus the optional lookups, as raw rows.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub scan_rows: Vec<Vec<Cell>>,
    pub system_rows: Vec<Vec<Cell>>,
    pub reference: ReferenceData,
}

/// A system-of-record row after column mapping, before cleaning.
#[derive(Debug, Clone, Default)]
pub struct SystemRow {
    pub material: String,
    pub batch: String,
    pub serial: String,
    pub quantity: Option<f64>,
    pub plant: String,
    pub sloc: String,
    pub expiry: String,
    pub age: String,
    pub description: String,
    pub customer_name: String,
    pub customer_code: String,
    pub billing_doc: String,
    pub billing_date: String,
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Stable handle into the inventory arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub(crate) usize);

impl RecordId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryRecord {
    pub id: RecordId,
    pub material: String,
    pub batch: String,
    pub serial: String,
    pub quantity: f64,
    pub consumed: f64,
    pub plant: String,
    pub sloc: String,
    pub expiry: String,
    pub age: String,
    pub description: String,
    pub customer_name: String,
    pub customer_code: String,
    pub billing_doc: String,
    pub billing_date: String,
}

impl InventoryRecord {
    pub fn available(&self) -> f64 {
        self.quantity - self.consumed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateSerial {
    pub material: String,
    pub batch: String,
    pub serial: String,
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Scans
// ---------------------------------------------------------------------------

/// Decoded barcode fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedBarcode {
    pub material: String,
    pub batch: String,
    pub serial: String,
    pub is_default_serial: bool,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<NaiveDate>,
    /// Non-fatal decoding problems (missing batch AI, impossible expiry date).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    Damage,
    Expired,
    NearExpiry,
    ShortExpiry,
    GoodStock,
    NoExpiry,
}

impl StockStatus {
    pub fn priority(self) -> u8 {
        match self {
            Self::Damage => 1,
            Self::Expired => 2,
            Self::NearExpiry => 3,
            Self::ShortExpiry => 4,
            Self::GoodStock => 5,
            Self::NoExpiry => 6,
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Damage => write!(f, "DAMAGE"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::NearExpiry => write!(f, "NEAR EXPIRY"),
            Self::ShortExpiry => write!(f, "SHORT EXPIRY"),
            Self::GoodStock => write!(f, "GOOD STOCK"),
            Self::NoExpiry => write!(f, "NO EXPIRY"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockAssessment {
    pub status: StockStatus,
    pub priority: u8,
    pub days_left: Option<i64>,
}

/// One scan, ready for allocation.
#[derive(Debug, Clone, Serialize)]
pub struct ScanRecord {
    /// 1-based row number in the scan sheet.
    pub row: usize,
    pub raw: String,
    pub barcode: ParsedBarcode,
    /// Requested quantity (scan column, AI quantity, or 1).
    pub quantity: f64,
    pub condition: String,
    pub description: String,
    pub customer_name: String,
    pub customer_code: String,
    pub stock: StockAssessment,
}

impl ScanRecord {
    pub fn is_valid(&self) -> bool {
        self.barcode.is_valid && !self.barcode.material.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Concat,
    BatchMatch,
    MaterialOnly,
    None,
}

impl MatchTier {
    /// Exact and Concat both resolve to a single serial.
    pub fn is_serial_level(self) -> bool {
        matches!(self, Self::Exact | Self::Concat)
    }
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "Exact"),
            Self::Concat => write!(f, "Concat"),
            Self::BatchMatch => write!(f, "Batch Match"),
            Self::MaterialOnly => write!(f, "Material Only"),
            Self::None => write!(f, "-"),
        }
    }
}

/// Outcome of allocating one scan. `consumed + shortfall == requested`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Index into the scan slice handed to the allocator.
    pub scan: usize,
    pub record: Option<RecordId>,
    pub tier: MatchTier,
    pub requested: f64,
    pub consumed: f64,
    pub shortfall: f64,
}

impl MatchResult {
    pub(crate) fn unmatched(scan: usize, requested: f64) -> Self {
        Self {
            scan,
            record: None,
            tier: MatchTier::None,
            requested,
            consumed: 0.0,
            shortfall: requested,
        }
    }

    /// Hit a bucket but could not cover the whole request.
    pub fn is_partial(&self) -> bool {
        self.tier != MatchTier::None && self.shortfall > 0.0
    }
}

// ---------------------------------------------------------------------------
// Result rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowStatus {
    Matched,
    Partial,
    Warning,
    #[serde(rename = "Variance (Partial)")]
    VariancePartial,
    Variance,
    Error,
}

impl RowStatus {
    pub fn priority(self) -> i8 {
        match self {
            Self::Error => -1,
            Self::Variance => 0,
            Self::Warning => 1,
            Self::Partial => 2,
            Self::Matched => 3,
            Self::VariancePartial => 4,
        }
    }

    pub fn is_variance(self) -> bool {
        matches!(self, Self::Variance | Self::Error)
    }
}

impl std::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Matched => write!(f, "Matched"),
            Self::Partial => write!(f, "Partial"),
            Self::Warning => write!(f, "Warning"),
            Self::VariancePartial => write!(f, "Variance (Partial)"),
            Self::Variance => write!(f, "Variance"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// One output line per scan, with the matched system fields folded in.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    pub row: usize,
    pub raw: String,
    pub status: RowStatus,
    pub status_priority: i8,
    pub tier: MatchTier,
    pub detail: String,
    pub material: String,
    pub description: String,
    pub customer_name: String,
    pub customer_code: String,
    pub scan_batch: String,
    pub scan_serial: String,
    pub is_default_serial: bool,
    pub system_batch: String,
    pub system_serial: String,
    pub system_plant: String,
    pub system_sloc: String,
    pub system_expiry: String,
    pub system_age: String,
    pub billing_doc: String,
    pub billing_date: String,
    pub assigned_sloc: String,
    pub condition: String,
    pub expiry: Option<NaiveDate>,
    pub stock: StockAssessment,
    pub requested: f64,
    pub consumed: f64,
    pub shortfall: f64,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

/// Quantity-weighted totals for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    pub total_scanned: f64,
    pub serial_level: f64,
    pub batch_level: f64,
    pub material_level: f64,
    pub variance: f64,
    pub system_initial: f64,
    pub system_remaining: f64,
    /// Matched share of scanned quantity, 0.0..=1.0.
    pub match_rate: f64,
}

impl AggregateStats {
    pub fn matched(&self) -> f64 {
        self.serial_level + self.batch_level + self.material_level
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StockCounts {
    pub damage: usize,
    pub expired: usize,
    pub near_expiry: usize,
    pub short_expiry: usize,
    pub good_stock: usize,
    pub no_expiry: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VarianceMaterial {
    pub material: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub engine_version: String,
    pub run_at: String,
    pub today: NaiveDate,
    pub inventory_keys: usize,
    pub inventory_records: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconReport {
    pub meta: ReconMeta,
    pub stats: AggregateStats,
    pub stock_counts: StockCounts,
    pub top_variance: Vec<VarianceMaterial>,
    pub duplicates: Vec<DuplicateSerial>,
    pub issues: Vec<ScanIssue>,
    pub rows: Vec<ResultRow>,
}

impl ReconReport {
    /// Rows ordered most-urgent stock first. Stable, so scan order breaks ties.
    pub fn rows_by_urgency(&self) -> Vec<&ResultRow> {
        let mut rows: Vec<&ResultRow> = self.rows.iter().collect();
        rows.sort_by_key(|r| r.stock.priority);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_text_and_numbers() {
        assert_eq!(Cell::Number(100.0).as_text(), "100");
        assert_eq!(Cell::Number(1.5).as_text(), "1.5");
        assert_eq!(Cell::from("").as_text(), "");
        assert_eq!(Cell::from(" 7 ").as_number(), Some(7.0));
        assert_eq!(Cell::from("seven").as_number(), None);
        assert!(Cell::from("   ").is_empty());
        assert!(!Cell::Number(0.0).is_empty());
    }

    #[test]
    fn csv_rows_are_ragged() {
        let rows = rows_from_csv("Material,Batch\n100,B1,extra\n\"2,5\"\n").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].len(), 3);
        assert_eq!(rows[2], vec![Cell::Text("2,5".into())]);
    }

    #[test]
    fn status_priorities() {
        let order: Vec<i8> = [
            RowStatus::Error,
            RowStatus::Variance,
            RowStatus::Warning,
            RowStatus::Partial,
            RowStatus::Matched,
            RowStatus::VariancePartial,
        ]
        .iter()
        .map(|s| s.priority())
        .collect();
        assert_eq!(order, vec![-1, 0, 1, 2, 3, 4]);
        assert!(RowStatus::Error.is_variance());
        assert!(!RowStatus::VariancePartial.is_variance());
        assert_eq!(RowStatus::VariancePartial.to_string(), "Variance (Partial)");
    }
}
