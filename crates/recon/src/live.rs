//! Scan-at-a-time reconciliation against a private copy of the inventory.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::allocator::{allocate, AllocationOptions};
use crate::barcode::{BarcodeParser, DEFAULT_SERIAL};
use crate::classify::classify_stock;
use crate::config::ExpiryConfig;
use crate::index::{full_key, InventoryIndex};
use crate::model::{MatchTier, ScanRecord};
use crate::reference::ReferenceData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Condition {
    #[default]
    Good,
    Damage,
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Good => write!(f, "Good"),
            Self::Damage => write!(f, "Damage"),
        }
    }
}

impl std::str::FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "good" | "ok" => Ok(Self::Good),
            "damage" | "damaged" | "dmg" => Ok(Self::Damage),
            other => Err(format!("unknown condition '{other}' (expected good or damage)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LiveOutcome {
    Matched { tier: MatchTier },
    Variance,
    Duplicate,
    Invalid { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveEntry {
    pub raw: String,
    pub material: String,
    pub batch: String,
    pub serial: String,
    pub description: String,
    pub outcome: LiveOutcome,
    pub condition: Condition,
    pub plant: String,
    pub sloc: String,
    pub consumed: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LiveStats {
    /// Accepted scans (matched + variance).
    pub total: usize,
    pub matched: usize,
    pub variance: usize,
    pub duplicate: usize,
}

pub struct LiveSession {
    index: InventoryIndex,
    parser: BarcodeParser,
    expiry: ExpiryConfig,
    reference: ReferenceData,
    today: NaiveDate,
    condition: Condition,
    smart_zero: bool,
    seen: BTreeSet<String>,
    stats: LiveStats,
    /// Oldest first; read through [`LiveSession::entries`].
    log: Vec<LiveEntry>,
}

impl LiveSession {
    pub fn new(
        index: InventoryIndex,
        parser: BarcodeParser,
        expiry: ExpiryConfig,
        reference: ReferenceData,
        today: NaiveDate,
    ) -> Self {
        log::info!("live session started over {} records", index.len());
        Self {
            index,
            parser,
            expiry,
            reference,
            today,
            condition: Condition::Good,
            smart_zero: false,
            seen: BTreeSet::new(),
            stats: LiveStats::default(),
            log: Vec::new(),
        }
    }

    /// Also try padded scans without their leading zeros.
    pub fn with_smart_zero(mut self, smart_zero: bool) -> Self {
        self.smart_zero = smart_zero;
        self
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    pub fn set_condition(&mut self, condition: Condition) {
        self.condition = condition;
    }

    pub fn stats(&self) -> LiveStats {
        self.stats
    }

    /// Newest first.
    pub fn entries(&self) -> impl Iterator<Item = &LiveEntry> {
        self.log.iter().rev()
    }

    pub fn index(&self) -> &InventoryIndex {
        &self.index
    }

    /// Reconcile one scan and append it to the log.
    pub fn scan(&mut self, raw: &str) -> &LiveEntry {
        let barcode = self.parser.parse(raw.trim());
        let timestamp = chrono::Local::now().format("%H:%M:%S").to_string();

        let mut entry = LiveEntry {
            raw: raw.trim().to_string(),
            material: barcode.material.clone(),
            batch: barcode.batch.clone(),
            serial: barcode.serial.clone(),
            description: String::new(),
            outcome: LiveOutcome::Variance,
            condition: self.condition,
            plant: "-".into(),
            sloc: "-".into(),
            consumed: 0.0,
            timestamp,
        };

        if !barcode.is_valid || barcode.material.is_empty() {
            entry.outcome = LiveOutcome::Invalid {
                reason: barcode.error.clone().unwrap_or_else(|| "invalid barcode".into()),
            };
            return self.push(entry);
        }

        let key = full_key(&barcode.material, &barcode.batch, &barcode.serial);
        let tracks_serial = !barcode.serial.is_empty() && barcode.serial != DEFAULT_SERIAL;
        if tracks_serial && self.seen.contains(&key) {
            log::debug!("duplicate live scan {key}");
            self.stats.duplicate += 1;
            entry.outcome = LiveOutcome::Duplicate;
            return self.push(entry);
        }

        let condition = self.condition.to_string();
        let stock = classify_stock(&condition, barcode.expiry, &self.expiry, self.today);
        let quantity = barcode.quantity.filter(|q| *q > 0.0).unwrap_or(1.0);
        let record = ScanRecord {
            row: self.log.len() + 1,
            raw: entry.raw.clone(),
            barcode,
            quantity,
            condition,
            description: String::new(),
            customer_name: String::new(),
            customer_code: String::new(),
            stock,
        };

        let results = allocate(
            std::slice::from_ref(&record),
            &mut self.index,
            &AllocationOptions::first_available().with_smart_zero(self.smart_zero),
        );

        // An exhausted bucket yields a tier with nothing consumed; live mode
        // treats that as variance.
        let hit = results
            .first()
            .filter(|r| r.consumed > 0.0)
            .and_then(|r| r.record.map(|id| (r.tier, r.consumed, id)));
        match hit {
            Some((tier, consumed, id)) => {
                let matched = self.index.record(id);
                entry.outcome = LiveOutcome::Matched { tier };
                entry.plant = matched.plant.clone();
                entry.sloc = matched.sloc.clone();
                entry.description = matched.description.clone();
                entry.consumed = consumed;
                self.stats.matched += 1;
            }
            None => self.stats.variance += 1,
        }
        self.stats.total += 1;

        if entry.description.is_empty() {
            entry.description = self
                .reference
                .description(&entry.material)
                .unwrap_or("Unknown Material")
                .to_string();
        }
        if tracks_serial {
            self.seen.insert(key);
        }
        self.push(entry)
    }

    fn push(&mut self, entry: LiveEntry) -> &LiveEntry {
        self.log.push(entry);
        &self.log[self.log.len() - 1]
    }
}
