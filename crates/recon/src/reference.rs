//! Optional lookup sheets used to fill in descriptions and customer names
//! that neither the system extract nor the scan sheet carries.

use std::collections::BTreeMap;

use crate::error::ReconError;
use crate::index::canonical_numeric;
use crate::model::{clean, Cell};

#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    /// material -> description
    pub descriptions: BTreeMap<String, String>,
    /// customer code -> customer name
    pub customers: BTreeMap<String, String>,
}

impl ReferenceData {
    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty() && self.customers.is_empty()
    }

    pub fn description(&self, material: &str) -> Option<&str> {
        self.descriptions.get(material).map(String::as_str)
    }

    /// Customer name by code, retrying with leading zeros dropped.
    pub fn customer_name(&self, code: &str) -> Option<&str> {
        if code.is_empty() {
            return None;
        }
        self.customers
            .get(code)
            .or_else(|| canonical_numeric(code).and_then(|c| self.customers.get(&c)))
            .map(String::as_str)
    }

    /// Load a material master sheet: header in the first row, a material
    /// column and a description column.
    pub fn load_materials(&mut self, rows: &[Vec<Cell>]) -> Result<usize, ReconError> {
        let headers = first_row_headers(rows, "material master")?;
        let material = headers.iter().position(|h| {
            ["material", "code", "item", "part", "product", "sku"].iter().any(|t| h.contains(t))
        });
        let desc = headers.iter().position(|h| {
            ["desc", "name", "text", "detail", "spec", "title"].iter().any(|t| h.contains(t))
        });
        let (Some(material), Some(desc)) = (material, desc) else {
            return Err(ReconError::HeaderNotFound { source: "material master".into() });
        };

        let mut count = 0;
        for row in &rows[1..] {
            let key = clean(&cell_text(row, material));
            if key.is_empty() {
                continue;
            }
            self.descriptions.insert(key, cell_text(row, desc).trim().to_string());
            count += 1;
        }
        log::info!("material master: {count} entries");
        Ok(count)
    }

    /// Load a customer master sheet: header in the first row, a code column
    /// and a name column. Numeric codes are also stored without leading zeros.
    pub fn load_customers(&mut self, rows: &[Vec<Cell>]) -> Result<usize, ReconError> {
        let headers = first_row_headers(rows, "customer master")?;
        let code = headers
            .iter()
            .position(|h| ["code", "id", "no"].iter().any(|t| h.contains(t)))
            .or_else(|| headers.iter().position(|h| h.contains("customer")));
        let name = headers
            .iter()
            .enumerate()
            .position(|(i, h)| Some(i) != code && ["name", "desc", "customer"].iter().any(|t| h.contains(t)));
        let (Some(code), Some(name)) = (code, name) else {
            return Err(ReconError::HeaderNotFound { source: "customer master".into() });
        };

        let mut count = 0;
        for row in &rows[1..] {
            let key = clean(&cell_text(row, code));
            let value = cell_text(row, name).trim().to_string();
            if key.is_empty() || value.is_empty() {
                continue;
            }
            if let Some(alias) = canonical_numeric(&key) {
                self.customers.insert(alias, value.clone());
            }
            self.customers.insert(key, value);
            count += 1;
        }
        log::info!("customer master: {count} entries");
        Ok(count)
    }
}

fn first_row_headers(rows: &[Vec<Cell>], source: &str) -> Result<Vec<String>, ReconError> {
    let first = rows.first().ok_or_else(|| ReconError::EmptyInput { source: source.into() })?;
    Ok(first.iter().map(|c| c.as_text().to_lowercase()).collect())
}

fn cell_text(row: &[Cell], col: usize) -> String {
    row.get(col).map(Cell::as_text).unwrap_or_default()
}
