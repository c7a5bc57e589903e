//! Header detection and column mapping for the two input sheets.
//!
//! Both sheets arrive as raw rows of cells with no guarantee about where the
//! header sits (title rows, blank rows and report banners are common), so the
//! header row and each column are located by keyword.

use crate::error::ReconError;
use crate::model::{Cell, SystemRow};

const MATERIAL_TERMS: &[&str] = &[
    "material", "mat", "matnr", "article", "product", "item", "sku", "part", "code", "model",
    "identifier",
];
/// A real header row names something besides the material; title rows like
/// "Material Report" don't.
const COMPANION_TERMS: &[&str] = &["batch", "qty", "quantity", "desc", "plant", "billing"];

// ---------------------------------------------------------------------------
// System extract
// ---------------------------------------------------------------------------

/// How the system header row was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMatch {
    /// Material keyword plus a companion column.
    Strict,
    /// Material keyword alone.
    MaterialOnly,
    /// No material keyword; a batch/lot and a serial term together.
    BatchSerial,
}

/// Column positions in the system extract. Only `material` is mandatory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemColumns {
    pub header_row: usize,
    pub matched_by: HeaderMatch,
    pub material: usize,
    pub batch: Option<usize>,
    pub serial: Option<usize>,
    pub quantity: Option<usize>,
    pub plant: Option<usize>,
    pub sloc: Option<usize>,
    pub expiry: Option<usize>,
    pub age: Option<usize>,
    pub description: Option<usize>,
    pub customer_name: Option<usize>,
    pub customer_code: Option<usize>,
    pub billing_doc: Option<usize>,
    pub billing_date: Option<usize>,
}

fn joined_lower(row: &[Cell], sep: &str) -> String {
    row.iter().map(Cell::as_text).collect::<Vec<_>>().join(sep).to_lowercase()
}

fn contains_any(haystack: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| haystack.contains(t))
}

/// Locate the system header row.
pub fn find_system_header(rows: &[Vec<Cell>]) -> Option<(usize, HeaderMatch)> {
    let lines: Vec<String> = rows.iter().map(|r| joined_lower(r, " ")).collect();

    let strict = lines
        .iter()
        .position(|s| contains_any(s, MATERIAL_TERMS) && contains_any(s, COMPANION_TERMS));
    if let Some(i) = strict {
        return Some((i, HeaderMatch::Strict));
    }

    if let Some(i) = lines.iter().position(|s| contains_any(s, MATERIAL_TERMS)) {
        return Some((i, HeaderMatch::MaterialOnly));
    }

    lines
        .iter()
        .position(|s| contains_any(s, &["batch", "lot"]) && contains_any(s, &["serial", "sno", "ser"]))
        .map(|i| (i, HeaderMatch::BatchSerial))
}

impl SystemColumns {
    pub fn detect(rows: &[Vec<Cell>]) -> Result<Self, ReconError> {
        if rows.is_empty() {
            return Err(ReconError::EmptyInput { source: "system extract".into() });
        }

        let (header_row, matched_by) = find_system_header(rows).ok_or_else(|| {
            ReconError::HeaderNotFound { source: "system extract".into() }
        })?;
        match matched_by {
            HeaderMatch::Strict => log::info!("system header at row {}", header_row + 1),
            _ => log::warn!("system header at row {} found by loose match ({matched_by:?})", header_row + 1),
        }

        let headers: Vec<String> = rows[header_row].iter().map(|c| c.as_text().to_lowercase()).collect();
        let find = |pred: &dyn Fn(&str) -> bool| headers.iter().position(|h| pred(h));

        let material = find(&|h| contains_any(h, MATERIAL_TERMS)).unwrap_or_else(|| {
            log::warn!("no explicit material column; using column A");
            0
        });

        let description = find(&|h| contains_any(h, &["desc", "text", "material description"]))
            .or_else(|| find(&|h| h.contains("name")));

        Ok(Self {
            header_row,
            matched_by,
            material,
            batch: find(&|h| contains_any(h, &["batch", "lot"])),
            serial: find(&|h| contains_any(h, &["serial", "sno"])),
            quantity: find(&|h| contains_any(h, &["qty", "count", "unrestricted"])),
            plant: find(&|h| contains_any(h, &["plant", "werks", "site"])),
            sloc: find(&|h| contains_any(h, &["sloc", "loc"])),
            expiry: find(&|h| contains_any(h, &["sled", "bbd", "expiry"])),
            age: find(&|h| contains_any(h, &["ageing", "aging", "inv. age"])),
            description,
            customer_name: find(&|h| h.contains("name") || (h.contains("cust") && h.contains("desc"))),
            customer_code: find(&|h| {
                (h.contains("cust") && contains_any(h, &["code", "id", "no", "num"]))
                    || contains_any(h, &["sold-to", "ship-to", "payer", "party", "kunnr"])
                    || (h.contains("customer") && !h.contains("name"))
            }),
            billing_doc: find(&|h| {
                contains_any(h, &["billing document", "billing doc", "bill. doc", "bill doc"])
            }),
            billing_date: find(&|h| {
                contains_any(h, &["billing date", "billing dt", "bill. date", "bill date"])
            }),
        })
    }

    /// Map every data row below the header. Rows with an empty material cell
    /// are dropped.
    pub fn extract(&self, rows: &[Vec<Cell>]) -> Vec<SystemRow> {
        rows.iter()
            .skip(self.header_row + 1)
            .filter(|row| !cell(row, Some(self.material)).is_empty())
            .map(|row| SystemRow {
                material: text(row, Some(self.material)),
                batch: text(row, self.batch),
                serial: text(row, self.serial),
                quantity: self.quantity.and_then(|i| row.get(i)).and_then(Cell::as_number),
                plant: text_or_dash(row, self.plant),
                sloc: text_or_dash(row, self.sloc),
                expiry: text_or_dash(row, self.expiry),
                age: text_or_dash(row, self.age),
                description: text(row, self.description),
                customer_name: text(row, self.customer_name),
                customer_code: text(row, self.customer_code),
                billing_doc: text(row, self.billing_doc),
                billing_date: text(row, self.billing_date),
            })
            .collect()
    }
}

const EMPTY: Cell = Cell::Empty;

fn cell(row: &[Cell], col: Option<usize>) -> &Cell {
    col.and_then(|i| row.get(i)).unwrap_or(&EMPTY)
}

fn text(row: &[Cell], col: Option<usize>) -> String {
    cell(row, col).as_text()
}

fn text_or_dash(row: &[Cell], col: Option<usize>) -> String {
    match col {
        Some(_) => text(row, col),
        None => "-".into(),
    }
}

// ---------------------------------------------------------------------------
// Scan sheet
// ---------------------------------------------------------------------------

/// Layout of the scan sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanColumns {
    pub header_row: Option<usize>,
    pub start_row: usize,
    pub scan: usize,
    pub condition: Option<usize>,
    pub description: Option<usize>,
    pub customer_name: Option<usize>,
    pub customer_code: Option<usize>,
    pub quantity: Option<usize>,
}

/// One non-empty scan line, with the side columns pulled out.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanLine {
    /// 1-based sheet row.
    pub row: usize,
    pub raw: String,
    pub condition: String,
    pub description: String,
    pub customer_name: String,
    pub customer_code: String,
    pub quantity: Option<f64>,
}

impl ScanColumns {
    pub fn detect(rows: &[Vec<Cell>], use_scan_qty: bool) -> Self {
        let starts_with_data = rows
            .first()
            .map(|r| {
                let s = joined_lower(r, "");
                s.contains("(01)") || s.contains("(240)")
            })
            .unwrap_or(false);

        let header_row = if starts_with_data {
            None
        } else {
            rows.iter().position(|r| joined_lower(r, "").contains("scan"))
        };

        let Some(h) = header_row else {
            log::info!("scan sheet has no header; reading column A from row 1");
            let has_second_column = rows.first().map(|r| r.len() > 1).unwrap_or(false);
            return Self {
                header_row: None,
                start_row: 0,
                scan: 0,
                condition: has_second_column.then_some(1),
                description: None,
                customer_name: None,
                customer_code: None,
                quantity: None,
            };
        };

        let headers: Vec<String> = rows[h].iter().map(|c| c.as_text().to_lowercase()).collect();
        let find = |pred: &dyn Fn(&str) -> bool| headers.iter().position(|c| pred(c));
        let scan = find(&|c| c.contains("scan")).unwrap_or(0);
        log::info!("scan header at row {}, scan column {}", h + 1, scan + 1);

        // The column right after the scans holds the condition when it is
        // labelled as such or left unlabelled.
        let condition = headers.get(scan + 1).and_then(|next| {
            let labelled = next.contains("condition") || next.contains("status");
            (labelled || next.trim().is_empty()).then_some(scan + 1)
        });

        Self {
            header_row: Some(h),
            start_row: h + 1,
            scan,
            condition,
            description: find(&|c| {
                contains_any(c, &["desc", "text", "material name", "spec", "detail", "title"])
            }),
            customer_name: find(&|c| contains_any(c, &["name", "client", "buyer", "account"])),
            customer_code: find(&|c| {
                (c.contains("cust") && contains_any(c, &["code", "no", "id"]))
                    || contains_any(c, &["party", "sold-to"])
                    || (c.contains("customer") && !c.contains("name"))
            }),
            quantity: if use_scan_qty {
                find(&|c| contains_any(c, &["qty", "quantity", "count"]))
            } else {
                None
            },
        }
    }

    pub fn lines(&self, rows: &[Vec<Cell>]) -> Vec<ScanLine> {
        rows.iter()
            .enumerate()
            .skip(self.start_row)
            .filter_map(|(i, row)| {
                let raw = text(row, Some(self.scan));
                if raw.trim().is_empty() {
                    return None;
                }
                Some(ScanLine {
                    row: i + 1,
                    raw,
                    condition: crate::model::clean(&text(row, self.condition)),
                    description: crate::model::clean(&text(row, self.description)),
                    customer_name: crate::model::clean(&text(row, self.customer_name)),
                    customer_code: crate::model::clean(&text(row, self.customer_code)),
                    quantity: self.quantity.and_then(|i| row.get(i)).and_then(Cell::as_number),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<Cell>> {
        data.iter().map(|r| r.iter().map(|c| Cell::from(*c)).collect()).collect()
    }

    #[test]
    fn strict_header_skips_title_row() {
        let sheet = rows(&[
            &["Material Report"],
            &[""],
            &["Material", "Batch", "Serial No", "Qty", "Plant", "SLoc"],
            &["100", "B1", "S1", "5", "P1", "RT01"],
        ]);
        let cols = SystemColumns::detect(&sheet).unwrap();
        assert_eq!(cols.header_row, 2);
        assert_eq!(cols.matched_by, HeaderMatch::Strict);
        assert_eq!(cols.material, 0);
        assert_eq!(cols.batch, Some(1));
        assert_eq!(cols.serial, Some(2));
        assert_eq!(cols.quantity, Some(3));
        assert_eq!(cols.plant, Some(4));
        assert_eq!(cols.sloc, Some(5));
    }

    #[test]
    fn material_only_fallback() {
        let sheet = rows(&[&["SKU", "Lot"], &["A1", "L1"]]);
        let cols = SystemColumns::detect(&sheet).unwrap();
        assert_eq!(cols.header_row, 0);
        assert_eq!(cols.matched_by, HeaderMatch::MaterialOnly);
        assert_eq!(cols.batch, Some(1));
    }

    #[test]
    fn batch_serial_fallback_uses_column_a() {
        let sheet = rows(&[&["Report"], &["Ref", "Lot", "Serial"], &["A1", "L1", "S1"]]);
        let cols = SystemColumns::detect(&sheet).unwrap();
        assert_eq!(cols.header_row, 1);
        assert_eq!(cols.matched_by, HeaderMatch::BatchSerial);
        assert_eq!(cols.material, 0);
        assert_eq!(cols.serial, Some(2));
    }

    #[test]
    fn header_not_found() {
        let sheet = rows(&[&["foo", "bar"], &["1", "2"]]);
        let err = SystemColumns::detect(&sheet).unwrap_err();
        assert!(matches!(err, ReconError::HeaderNotFound { .. }));

        let err = SystemColumns::detect(&[]).unwrap_err();
        assert!(matches!(err, ReconError::EmptyInput { .. }));
    }

    #[test]
    fn extended_columns() {
        let sheet = rows(&[&[
            "Material",
            "Material Description",
            "Batch",
            "Serial",
            "Unrestricted",
            "SLED/BBD",
            "Ageing",
            "Customer Name",
            "Customer Code",
            "Billing Document",
            "Billing Date",
        ]]);
        let cols = SystemColumns::detect(&sheet).unwrap();
        assert_eq!(cols.description, Some(1));
        assert_eq!(cols.quantity, Some(4));
        assert_eq!(cols.expiry, Some(5));
        assert_eq!(cols.age, Some(6));
        assert_eq!(cols.customer_name, Some(7));
        assert_eq!(cols.customer_code, Some(8));
        assert_eq!(cols.billing_doc, Some(9));
        assert_eq!(cols.billing_date, Some(10));
    }

    #[test]
    fn extract_rows_with_defaults() {
        let mut sheet = rows(&[&["Material", "Batch", "Qty"], &["100", "B1", ""], &["", "B2", "3"]]);
        sheet.push(vec![Cell::Number(200.0), Cell::from("B3"), Cell::Number(4.0)]);
        let cols = SystemColumns::detect(&sheet).unwrap();
        let out = cols.extract(&sheet);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].material, "100");
        assert_eq!(out[0].quantity, None);
        assert_eq!(out[0].serial, "");
        assert_eq!(out[0].plant, "-");
        assert_eq!(out[1].material, "200");
        assert_eq!(out[1].quantity, Some(4.0));
    }

    #[test]
    fn scan_sheet_without_header() {
        let sheet = rows(&[&["(240)100(10)B1", "Good"], &["(240)200", "Damage"]]);
        let cols = ScanColumns::detect(&sheet, false);
        assert_eq!(cols.header_row, None);
        assert_eq!(cols.start_row, 0);
        assert_eq!(cols.condition, Some(1));
        let lines = cols.lines(&sheet);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].row, 1);
        assert_eq!(lines[1].condition, "DAMAGE");
    }

    #[test]
    fn scan_sheet_with_header_and_side_columns() {
        let sheet = rows(&[
            &["Inventory count"],
            &["Scan Data", "Condition", "Description", "Customer Name", "Cust Code", "Qty"],
            &["(240)100(10)B1", "good", "widget", "acme", "c1", "3"],
            &["", "", "", "", "", ""],
            &["ABCDEFGH", "", "", "", "", "x"],
        ]);
        let cols = ScanColumns::detect(&sheet, true);
        assert_eq!(cols.header_row, Some(1));
        assert_eq!(cols.start_row, 2);
        assert_eq!(cols.scan, 0);
        assert_eq!(cols.condition, Some(1));
        assert_eq!(cols.description, Some(2));
        assert_eq!(cols.customer_name, Some(3));
        assert_eq!(cols.customer_code, Some(4));
        assert_eq!(cols.quantity, Some(5));

        let lines = cols.lines(&sheet);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].row, 3);
        assert_eq!(lines[0].description, "WIDGET");
        assert_eq!(lines[0].quantity, Some(3.0));
        assert_eq!(lines[1].row, 5);
        assert_eq!(lines[1].quantity, None);
    }

    #[test]
    fn scan_quantity_column_ignored_unless_enabled() {
        let sheet = rows(&[&["Scan", "Status", "Qty"]]);
        assert_eq!(ScanColumns::detect(&sheet, false).quantity, None);
    }

    #[test]
    fn labelled_neighbour_is_not_condition() {
        let sheet = rows(&[&["Scan", "Qty"]]);
        assert_eq!(ScanColumns::detect(&sheet, false).condition, None);
    }
}
