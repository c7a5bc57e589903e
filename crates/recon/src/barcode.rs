//! GS1 barcode decoding.
//!
//! Two shapes are accepted:
//! - bracketed human-readable GS1 (`(240)100(10)B1(21)S1`), where each field
//!   is looked up by a prioritized list of Application Identifiers;
//! - a bare material code (anything longer than three characters without a
//!   bracket), which gets the sentinel batch `-` and serial `001`.

use chrono::NaiveDate;

use crate::config::AiCodes;
use crate::model::{clean, ParsedBarcode};

pub const DEFAULT_BATCH: &str = "-";
pub const DEFAULT_SERIAL: &str = "001";

const MATERIAL_FALLBACKS: &[&str] = &["01", "02", "240", "241"];
const BATCH_FALLBACKS: &[&str] = &["10", "23", "310"];
const SERIAL_FALLBACKS: &[&str] = &["21", "250"];
const QUANTITY_AIS: &[&str] = &["37", "30"];
const EXPIRY_AIS: &[&str] = &["17", "15"];

#[derive(Debug, Clone)]
pub struct BarcodeParser {
    material: Vec<String>,
    batch: Vec<String>,
    serial: Vec<String>,
}

impl Default for BarcodeParser {
    fn default() -> Self {
        Self::new(&AiCodes::default())
    }
}

impl BarcodeParser {
    /// Configured codes are tried before the built-in fallbacks.
    pub fn new(ai: &AiCodes) -> Self {
        Self {
            material: priority_list(&ai.material, MATERIAL_FALLBACKS),
            batch: priority_list(&ai.batch, BATCH_FALLBACKS),
            serial: priority_list(&ai.serial, SERIAL_FALLBACKS),
        }
    }

    pub fn parse(&self, raw: &str) -> ParsedBarcode {
        let s = raw.trim();
        if s.is_empty() {
            return invalid("empty");
        }

        if s.contains('(') {
            return self.parse_bracketed(s);
        }

        if s.chars().count() > 3 {
            return ParsedBarcode {
                material: clean(s),
                batch: DEFAULT_BATCH.into(),
                serial: DEFAULT_SERIAL.into(),
                is_default_serial: true,
                is_valid: true,
                ..ParsedBarcode::default()
            };
        }

        invalid("unparseable")
    }

    fn parse_bracketed(&self, s: &str) -> ParsedBarcode {
        let s: String = s.chars().filter(|c| !c.is_control()).collect();
        let mut res = ParsedBarcode::default();

        match extract(&s, &self.material) {
            Some(mat) => {
                let mut mat = clean(mat);
                // GTIN-14 with a zero indicator + zero prefix maps to the internal code.
                if mat.len() == 14 && mat.starts_with("00") {
                    mat = mat[2..].to_string();
                }
                res.material = mat;
                res.is_valid = true;
            }
            None => res.error = Some("Missing material AI".into()),
        }

        match extract(&s, &self.batch) {
            Some(batch) => res.batch = clean(batch),
            None => {
                res.batch = DEFAULT_BATCH.into();
                if res.is_valid {
                    res.warnings.push(format!("Missing batch AI ({})", self.batch.join("/")));
                }
            }
        }

        match extract(&s, &self.serial) {
            Some(ser) => res.serial = clean(ser),
            None => {
                res.serial = DEFAULT_SERIAL.into();
                res.is_default_serial = true;
            }
        }

        res.quantity = extract(&s, QUANTITY_AIS)
            .and_then(|q| q.parse::<f64>().ok())
            .filter(|q| q.is_finite());

        if let Some(exp) = extract(&s, EXPIRY_AIS) {
            match parse_yymmdd(exp) {
                Some(date) => res.expiry = Some(date),
                None => res.warnings.push(format!("Invalid expiry date in barcode: {exp}")),
            }
        }

        res
    }
}

fn invalid(error: &str) -> ParsedBarcode {
    ParsedBarcode {
        error: Some(error.into()),
        ..ParsedBarcode::default()
    }
}

fn priority_list<S: AsRef<str>>(configured: &str, fallbacks: &[S]) -> Vec<String> {
    let mut list = vec![configured.to_string()];
    for ai in fallbacks {
        let ai = ai.as_ref();
        if !list.iter().any(|l| l == ai) {
            list.push(ai.to_string());
        }
    }
    list
}

/// Value following the first `(ai)` in `ais` order that has a non-empty value.
/// The value runs up to the next bracket or the end of the string.
fn extract<'a, S: AsRef<str>>(s: &'a str, ais: &[S]) -> Option<&'a str> {
    ais.iter().find_map(|ai| extract_one(s, ai.as_ref()))
}

fn extract_one<'a>(s: &'a str, ai: &str) -> Option<&'a str> {
    let tag = format!("({ai})");
    let mut from = 0;
    while let Some(pos) = s[from..].find(&tag) {
        let start = from + pos + tag.len();
        let rest = &s[start..];
        let end = rest.find(['(', ')']).unwrap_or(rest.len());
        if end > 0 {
            let value = rest[..end].trim();
            if !value.is_empty() {
                return Some(value);
            }
        }
        from = start;
    }
    None
}

/// GS1 `YYMMDD`, century fixed at 2000.
fn parse_yymmdd(value: &str) -> Option<NaiveDate> {
    let digits = value.get(..6)?;
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let yy: i32 = digits[0..2].parse().ok()?;
    let mm: u32 = digits[2..4].parse().ok()?;
    let dd: u32 = digits[4..6].parse().ok()?;
    NaiveDate::from_ymd_opt(2000 + yy, mm, dd)
}
