// Sheet import: CSV/TSV and Excel/ODS workbooks into raw rows of cells

use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use stocktake_recon::Cell;

/// Hard cap on imported rows per sheet.
pub const MAX_ROWS: usize = 1_048_576;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// Delimited text; delimiter sniffed from content.
    Delimited,
    /// Tab-separated.
    Tsv,
    /// xlsx / xlsm / xls / xlsb / ods via calamine.
    Workbook,
}

impl SheetFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(Self::Delimited),
            "tsv" | "tab" => Some(Self::Tsv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(Self::Workbook),
            _ => None,
        }
    }
}

pub fn is_supported(path: &Path) -> bool {
    SheetFormat::from_path(path).is_some()
}

/// Read the first sheet of `path` as rows of cells.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<Cell>>, String> {
    let format = SheetFormat::from_path(path).ok_or_else(|| {
        format!(
            "unsupported file type: {} (expected .csv, .tsv, .xlsx, .xls or .ods)",
            path.display()
        )
    })?;

    let rows = match format {
        SheetFormat::Delimited => {
            let content = read_file_as_utf8(path)?;
            let delimiter = sniff_delimiter(&content);
            rows_from_str(&content, delimiter)?
        }
        SheetFormat::Tsv => rows_from_str(&read_file_as_utf8(path)?, b'\t')?,
        SheetFormat::Workbook => read_workbook(path)?,
    };

    log::info!("read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(10).collect();

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let Some(&target) = counts.first() else {
            continue;
        };
        if target <= 1 {
            continue;
        }

        // More columns breaks ties between equally consistent candidates
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file =
        std::fs::File::open(path).map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s)),
        Err(e) => {
            let bytes = e.into_bytes();
            // Excel on Windows exports CSV as Windows-1252
            log::debug!("{} is not UTF-8; decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

pub fn rows_from_str(content: &str, delimiter: u8) -> Result<Vec<Vec<Cell>>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records().take(MAX_ROWS) {
        let record = result.map_err(|e| e.to_string())?;
        rows.push(record.iter().map(Cell::from).collect());
    }
    Ok(rows)
}

fn read_workbook(path: &Path) -> Result<Vec<Vec<Cell>>, String> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| format!("Failed to open workbook: {e}"))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| "workbook contains no sheets".to_string())?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("Failed to read sheet '{sheet_name}': {e}"))?;

    // Data may not begin at A1; pad so row/column positions match the sheet.
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); start_row as usize];

    for row in range.rows().take(MAX_ROWS.saturating_sub(rows.len())) {
        let mut cells = vec![Cell::Empty; start_col as usize];
        cells.extend(row.iter().map(data_to_cell));
        rows.push(cells);
    }
    Ok(rows)
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::from(s.as_str()),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::from(if *b { "TRUE" } else { "FALSE" }),
        Data::Error(e) => Cell::Text(format!("#{e:?}")),
        // Dates go through as text so expiry/billing columns read like the sheet shows them
        Data::DateTime(dt) => excel_serial_to_text(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from(s.as_str()),
    }
}

/// 1900 date system; serial 1 is 1900-01-01 and the phantom 1900-02-29
/// makes 1899-12-30 the effective epoch for every modern date.
fn excel_serial_to_text(serial: f64) -> Cell {
    let Some(epoch) = chrono::NaiveDate::from_ymd_opt(1899, 12, 30) else {
        return Cell::Number(serial);
    };
    match epoch.checked_add_signed(chrono::Duration::days(serial.floor() as i64)) {
        Some(date) if serial >= 1.0 => Cell::Text(date.format("%Y-%m-%d").to_string()),
        _ => Cell::Number(serial),
    }
}
