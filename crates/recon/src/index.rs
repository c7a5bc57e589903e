//! Multi-level inventory lookup.
//!
//! Records live in an arena and are addressed by [`RecordId`]. Three lookup
//! tables map composite keys to ids:
//! - exact: `"mat|batch|ser"`
//! - batch: `"mat|batch|"`
//! - material: `"mat||"`
//!
//! One record appears in all three tables (and again under smart-zero aliases),
//! so consumption is tracked on the arena entry and never on a bucket.

use std::collections::BTreeMap;

use crate::model::{clean, InventoryRecord, RecordId, SystemRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLevel {
    Full,
    Batch,
    Material,
}

pub fn full_key(material: &str, batch: &str, serial: &str) -> String {
    format!("{material}|{batch}|{serial}")
}

pub fn batch_key(material: &str, batch: &str) -> String {
    format!("{material}|{batch}|")
}

pub fn material_key(material: &str) -> String {
    format!("{material}||")
}

/// Leading-zero-free form of a numeric material, if it differs from the input.
///
/// `"0100"` -> `Some("100")`, `"100"` -> `None`, `"ABC"` -> `None`.
pub fn canonical_numeric(material: &str) -> Option<String> {
    if material.is_empty() {
        return None;
    }
    let canonical = if material.bytes().all(|b| b.is_ascii_digit()) {
        // Digit strings are handled textually so long codes keep every digit.
        let trimmed = material.trim_start_matches('0');
        if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() }
    } else {
        let n = material.parse::<f64>().ok().filter(|n| n.is_finite())?;
        crate::model::format_number(n)
    };
    (canonical != material).then_some(canonical)
}

#[derive(Debug, Clone, Default)]
pub struct InventoryIndex {
    records: Vec<InventoryRecord>,
    exact: BTreeMap<String, Vec<RecordId>>,
    batch: BTreeMap<String, Vec<RecordId>>,
    material: BTreeMap<String, Vec<RecordId>>,
}

impl InventoryIndex {
    pub fn build<I>(rows: I, smart_zero: bool) -> Self
    where
        I: IntoIterator<Item = SystemRow>,
    {
        let mut index = Self::default();
        for row in rows {
            index.insert(row, smart_zero);
        }
        log::info!(
            "inventory index: {} records under {} keys (smart zero {})",
            index.records.len(),
            index.key_count(),
            if smart_zero { "on" } else { "off" }
        );
        index
    }

    /// Add one row. Rows without a material are skipped.
    pub fn insert(&mut self, row: SystemRow, smart_zero: bool) -> Option<RecordId> {
        let material = clean(&row.material);
        if material.is_empty() {
            return None;
        }

        let id = RecordId(self.records.len());
        let record = InventoryRecord {
            id,
            material,
            batch: clean(&row.batch),
            serial: clean(&row.serial),
            // Blank, unparseable and zero quantities all count as one unit.
            quantity: row.quantity.filter(|q| *q != 0.0).map(|q| q.max(0.0)).unwrap_or(1.0),
            consumed: 0.0,
            plant: clean(&row.plant),
            sloc: clean(&row.sloc),
            expiry: clean(&row.expiry),
            age: clean(&row.age),
            description: clean(&row.description),
            customer_name: clean(&row.customer_name),
            customer_code: clean(&row.customer_code),
            billing_doc: clean(&row.billing_doc),
            billing_date: clean(&row.billing_date),
        };

        self.register(&record.material, &record.batch, &record.serial, id);
        if smart_zero {
            if let Some(alias) = canonical_numeric(&record.material) {
                self.register(&alias, &record.batch, &record.serial, id);
            }
        }

        self.records.push(record);
        Some(id)
    }

    fn register(&mut self, material: &str, batch: &str, serial: &str, id: RecordId) {
        self.exact.entry(full_key(material, batch, serial)).or_default().push(id);
        self.batch.entry(batch_key(material, batch)).or_default().push(id);
        self.material.entry(material_key(material)).or_default().push(id);
    }

    pub fn bucket(&self, level: KeyLevel, key: &str) -> Option<&[RecordId]> {
        let table = match level {
            KeyLevel::Full => &self.exact,
            KeyLevel::Batch => &self.batch,
            KeyLevel::Material => &self.material,
        };
        table.get(key).map(Vec::as_slice)
    }

    /// Full-key buckets in key order.
    pub fn exact_buckets(&self) -> impl Iterator<Item = (&str, &[RecordId])> {
        self.exact.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn record(&self, id: RecordId) -> &InventoryRecord {
        &self.records[id.0]
    }

    pub fn records(&self) -> &[InventoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct keys across all three tables.
    pub fn key_count(&self) -> usize {
        self.exact.len() + self.batch.len() + self.material.len()
    }

    /// Take up to `amount` from a record. Returns what was actually taken.
    pub(crate) fn consume(&mut self, id: RecordId, amount: f64) -> f64 {
        let record = &mut self.records[id.0];
        let taken = amount.min(record.available()).max(0.0);
        record.consumed += taken;
        debug_assert!(record.consumed <= record.quantity);
        taken
    }

    /// Zero every record's consumption. The arena holds each record once, so
    /// aliased bucket membership cannot reset anything twice.
    pub fn reset_consumption(&mut self) {
        for record in &mut self.records {
            record.consumed = 0.0;
        }
    }

    pub fn total_quantity(&self) -> f64 {
        self.records.iter().map(|r| r.quantity).sum()
    }

    pub fn total_consumed(&self) -> f64 {
        self.records.iter().map(|r| r.consumed).sum()
    }
}
