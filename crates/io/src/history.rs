// Run history persisted as JSON under the user config dir

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stocktake_recon::{ReconReport, ResultRow};

/// Runs kept, newest first.
pub const MAX_ENTRIES: usize = 5;
/// Result rows stored per run.
pub const MAX_ROWS_PER_ENTRY: usize = 1000;

/// Flattened result row; enough to re-list a past run without the engine types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub row: usize,
    pub raw: String,
    pub status: String,
    pub tier: String,
    pub detail: String,
    pub material: String,
    pub batch: String,
    pub serial: String,
    pub stock_status: String,
    pub assigned_sloc: String,
    pub requested: f64,
    pub consumed: f64,
}

impl From<&ResultRow> for HistoryRow {
    fn from(row: &ResultRow) -> Self {
        Self {
            row: row.row,
            raw: row.raw.clone(),
            status: row.status.to_string(),
            tier: row.tier.to_string(),
            detail: row.detail.clone(),
            material: row.material.clone(),
            batch: row.scan_batch.clone(),
            serial: row.scan_serial.clone(),
            stock_status: row.stock.status.to_string(),
            assigned_sloc: row.assigned_sloc.clone(),
            requested: row.requested,
            consumed: row.consumed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub system_file: String,
    pub scan_file: String,
    pub total_scanned: f64,
    pub matched: f64,
    pub variance: f64,
    pub match_rate: f64,
    pub duration_ms: u64,
    /// Capped at [`MAX_ROWS_PER_ENTRY`].
    pub rows: Vec<HistoryRow>,
    /// Rows in the run before capping.
    pub total_rows: usize,
}

impl HistoryEntry {
    pub fn from_report(report: &ReconReport, system_file: &Path, scan_file: &Path, duration_ms: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            system_file: file_label(system_file),
            scan_file: file_label(scan_file),
            total_scanned: report.stats.total_scanned,
            matched: report.stats.matched(),
            variance: report.stats.variance,
            match_rate: report.stats.match_rate,
            duration_ms,
            rows: report.rows.iter().take(MAX_ROWS_PER_ENTRY).map(HistoryRow::from).collect(),
            total_rows: report.rows.len(),
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct HistoryFile {
    version: u32,
    entries: Vec<HistoryEntry>,
}

const HISTORY_VERSION: u32 = 1;

/// File-backed run history.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stocktake")
            .join("history.json")
    }

    pub fn open_default() -> Self {
        Self::at(Self::default_path())
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, newest first. A missing file is an empty history.
    pub fn list(&self) -> Result<Vec<HistoryEntry>, String> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(format!("cannot read {}: {e}", self.path.display())),
        };
        let file: HistoryFile = serde_json::from_str(&contents)
            .map_err(|e| format!("corrupt history file {}: {e}", self.path.display()))?;
        Ok(file.entries)
    }

    /// Look up by id or unique id prefix.
    pub fn get(&self, id: &str) -> Result<Option<HistoryEntry>, String> {
        let mut matches: Vec<HistoryEntry> =
            self.list()?.into_iter().filter(|e| e.id.starts_with(id)).collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            n => Err(format!("id prefix '{id}' is ambiguous ({n} entries)")),
        }
    }

    /// Prepend an entry, keeping the newest [`MAX_ENTRIES`].
    pub fn record(&self, mut entry: HistoryEntry) -> Result<(), String> {
        entry.rows.truncate(MAX_ROWS_PER_ENTRY);
        let mut entries = self.list()?;
        entries.insert(0, entry);
        entries.truncate(MAX_ENTRIES);
        self.write(entries)?;
        log::info!("history saved to {}", self.path.display());
        Ok(())
    }

    /// Returns whether anything was removed.
    pub fn delete(&self, id: &str) -> Result<bool, String> {
        let Some(target) = self.get(id)? else {
            return Ok(false);
        };
        let entries: Vec<HistoryEntry> =
            self.list()?.into_iter().filter(|e| e.id != target.id).collect();
        self.write(entries)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), String> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(format!("cannot remove {}: {e}", self.path.display())),
        }
    }

    fn write(&self, entries: Vec<HistoryEntry>) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let file = HistoryFile {
            version: HISTORY_VERSION,
            entries,
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| e.to_string())?;
        fs::write(&self.path, json).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(id: &str, rows: usize) -> HistoryEntry {
        HistoryEntry {
            id: id.to_string(),
            timestamp: chrono::Utc::now(),
            system_file: "sap.xlsx".into(),
            scan_file: "scans.csv".into(),
            total_scanned: rows as f64,
            matched: 0.0,
            variance: rows as f64,
            match_rate: 0.0,
            duration_ms: 12,
            rows: (0..rows)
                .map(|i| HistoryRow {
                    row: i + 1,
                    raw: format!("(240){i}"),
                    status: "Variance".into(),
                    tier: "-".into(),
                    detail: "Not found in system".into(),
                    material: i.to_string(),
                    batch: "-".into(),
                    serial: "001".into(),
                    stock_status: "NO EXPIRY".into(),
                    assigned_sloc: "DMG1".into(),
                    requested: 1.0,
                    consumed: 0.0,
                })
                .collect(),
            total_rows: rows,
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::at(dir.path().join("nested/history.json"));
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.get("abc").unwrap(), None);
    }

    #[test]
    fn keeps_newest_five() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::at(dir.path().join("history.json"));
        for i in 0..7 {
            store.record(entry(&format!("run-{i}"), 1)).unwrap();
        }
        let ids: Vec<String> = store.list().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["run-6", "run-5", "run-4", "run-3", "run-2"]);
    }

    #[test]
    fn caps_rows_per_entry() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::at(dir.path().join("history.json"));
        store.record(entry("big", MAX_ROWS_PER_ENTRY + 5)).unwrap();
        let saved = store.get("big").unwrap().unwrap();
        assert_eq!(saved.rows.len(), MAX_ROWS_PER_ENTRY);
        assert_eq!(saved.total_rows, MAX_ROWS_PER_ENTRY + 5);
    }

    #[test]
    fn get_by_prefix_and_delete() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::at(dir.path().join("history.json"));
        store.record(entry("aaa111", 1)).unwrap();
        store.record(entry("aab222", 1)).unwrap();

        assert!(store.get("aa").is_err());
        assert_eq!(store.get("aaa").unwrap().map(|e| e.id), Some("aaa111".to_string()));

        assert!(store.delete("aab").unwrap());
        assert!(!store.delete("zzz").unwrap());
        let ids: Vec<String> = store.list().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["aaa111"]);
    }

    #[test]
    fn clear_removes_file() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::at(dir.path().join("history.json"));
        store.record(entry("one", 1)).unwrap();
        store.clear().unwrap();
        assert!(store.list().unwrap().is_empty());
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not json").unwrap();
        let err = HistoryStore::at(&path).list().unwrap_err();
        assert!(err.contains("corrupt history file"));
    }

    #[test]
    fn entry_from_report() {
        use stocktake_recon::model::SystemRow;
        use stocktake_recon::{Cell, ReconConfig, ReconSession};

        let mut session = ReconSession::from_system_rows(
            ReconConfig::default(),
            vec![SystemRow {
                material: "100".into(),
                batch: "B1".into(),
                serial: "S1".into(),
                quantity: Some(1.0),
                ..SystemRow::default()
            }],
        )
        .unwrap();
        let scans = vec![
            vec![Cell::from("(240)100(10)B1(21)S1")],
            vec![Cell::from("(240)999")],
        ];
        let report = session.run(&scans);

        let entry = HistoryEntry::from_report(&report, Path::new("/data/sap.xlsx"), Path::new("scans.csv"), 40);
        assert_eq!(entry.system_file, "sap.xlsx");
        assert_eq!(entry.total_scanned, 2.0);
        assert_eq!(entry.matched, 1.0);
        assert_eq!(entry.rows.len(), 2);
        assert_eq!(entry.rows[0].status, "Matched");
        assert_eq!(entry.rows[0].tier, "Exact");
        assert_eq!(entry.rows[1].status, "Variance");
        assert!(!entry.id.is_empty());
    }
}
